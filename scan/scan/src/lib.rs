//! On-device geometry processing for handheld 3D scanning.
//!
//! This umbrella crate re-exports the scan-* crates and adds
//! [`ScanSession`], which wires a patch store to every engine. All crates
//! are Layer 0 (zero Bevy dependencies) and hold no global state: logging
//! goes through `tracing`, and the host decides whether a subscriber is
//! installed.
//!
//! # Quick Start
//!
//! ```
//! use scan::prelude::*;
//!
//! let mut session = ScanSession::new(SessionConfig::default());
//! let patch = SurfacePatch::new(
//!     PatchId(1),
//!     vec![
//!         Point3::new(0.0, 0.0, 1.0),
//!         Point3::new(0.1, 0.0, 1.0),
//!         Point3::new(0.0, 0.1, 1.0),
//!     ],
//!     vec![[0, 1, 2]],
//! );
//! session.on_patch_event(PatchEvent::Added(patch));
//!
//! // Coverage from the current pose.
//! session.on_camera_update(&Matrix4::identity(), Timestamp::zero());
//! let stats = session.coverage_statistics();
//! assert!(stats.total_cells > 0);
//!
//! // Export products.
//! let cloud = session.point_cloud();
//! let mesh = session.corrected_mesh();
//! assert_eq!(cloud.len(), mesh.vertex_count());
//! ```
//!
//! # Module Organization
//!
//! - [`types`] - Patches, depth frames, point clouds, errors, worker pool
//! - [`cloud`] - Depth back-projection and voxel downsampling
//! - [`fusion`] - Primary/secondary depth fusion and vertex refinement
//! - [`repair`] - Degenerate removal, smoothing, hole filling
//! - [`coverage`] - View-coverage grid, gaps and guidance
//!
//! # Feature Flags
//!
//! - `serde` - `Serialize`/`Deserialize` for parameters and data types

#![warn(missing_docs)]
#![warn(clippy::all)]
#![warn(clippy::pedantic)]
// Safety: Deny unwrap/expect in library code. Tests may use them (workspace warns).
#![cfg_attr(not(test), deny(clippy::unwrap_used, clippy::expect_used))]
#![allow(clippy::module_name_repetitions)]

mod session;

pub use session::{ScanSession, SessionConfig};

// =============================================================================
// Re-exports
// =============================================================================

/// Patches, depth frames, point clouds, errors and the worker pool.
pub use scan_types as types;

/// Depth back-projection and voxel downsampling.
pub use scan_cloud as cloud;

/// Primary/secondary depth fusion and vertex refinement.
pub use scan_fusion as fusion;

/// Degenerate removal, smoothing and hole filling.
pub use scan_repair as repair;

/// View-coverage grid, gaps and guidance.
pub use scan_coverage as coverage;

// =============================================================================
// Prelude
// =============================================================================

/// Common imports for scan processing.
///
/// ```
/// use scan::prelude::*;
/// ```
pub mod prelude {
    // Session
    pub use crate::session::{ScanSession, SessionConfig};

    // Data model
    pub use scan_types::{
        CameraIntrinsics, DepthFrame, Matrix4, PatchEvent, PatchId, Point3, PointCloud,
        PointSource, ScanError, ScanResult, SurfacePatch, Timestamp, Vector3,
    };

    // Engines and their parameters
    pub use scan_cloud::{ExtractionParams, PointCloudExtractor};
    pub use scan_coverage::{
        CoverageParams, CoverageQuality, CoverageStatistics, CoverageTracker, Gap,
        SharedCoverageTracker, ViewGuidance,
    };
    pub use scan_fusion::{DepthFusionEngine, FusionParams};
    pub use scan_repair::{CorrectionParams, MeshCorrectionEngine};
}

// =============================================================================
// Tests
// =============================================================================
