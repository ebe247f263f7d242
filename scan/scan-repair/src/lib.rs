//! Mesh correction for scanned surface patches.
//!
//! This crate repairs and smooths the triangle meshes produced by the
//! capture service:
//!
//! - **Degenerate removal**: drop faces with repeated or out-of-range
//!   indices and near-zero area
//! - **Laplacian smoothing**: pull interior vertices toward their neighbors
//!   while keeping open boundaries fixed
//! - **Normal smoothing**: average vertex normals over the adjacency
//! - **Hole filling**: close small boundary loops with a centroid fan
//!
//! [`MeshCorrectionEngine::correct`] runs degenerate removal, Laplacian
//! smoothing and normal smoothing in that order. Every stage is also
//! available on its own and none mutates its input.
//!
//! # Layer 0
//!
//! This is a Layer 0 crate with zero Bevy dependencies.
//!
//! # Example
//!
//! ```
//! use nalgebra::Point3;
//! use scan_repair::{CorrectionParams, MeshCorrectionEngine, fill_small_holes};
//! use scan_types::{PatchId, SurfacePatch};
//!
//! // Tetrahedron with one face missing.
//! let patch = SurfacePatch::new(
//!     PatchId(1),
//!     vec![
//!         Point3::new(0.0, 0.0, 0.0),
//!         Point3::new(1.0, 0.0, 0.0),
//!         Point3::new(0.0, 1.0, 0.0),
//!         Point3::new(0.0, 0.0, 1.0),
//!     ],
//!     vec![[0, 3, 1], [1, 3, 2], [2, 3, 0]],
//! );
//!
//! let (filled, report) = fill_small_holes(&patch, 10);
//! assert_eq!(report.filled, 1);
//! assert_eq!(filled.face_count(), 6);
//!
//! let engine = MeshCorrectionEngine::new(CorrectionParams::light());
//! let corrected = engine.correct(&filled);
//! assert_eq!(corrected.normals.len(), corrected.vertex_count());
//! ```

#![warn(missing_docs)]
#![warn(clippy::all)]
#![warn(clippy::pedantic)]
// Safety: Deny unwrap/expect in library code. Tests may use them (workspace warns).
#![cfg_attr(not(test), deny(clippy::unwrap_used, clippy::expect_used))]
#![allow(clippy::module_name_repetitions)]

mod adjacency;
mod degenerate;
mod engine;
mod holes;
mod params;
mod smooth;

pub use adjacency::MeshAdjacency;
pub use degenerate::remove_degenerate_faces;
pub use engine::{CorrectionEvent, CorrectionResult, CorrectionSummary, MeshCorrectionEngine};
pub use holes::{BoundaryLoop, HoleFillReport, detect_boundary_loops, fill_small_holes};
pub use params::CorrectionParams;
pub use smooth::{laplacian_smooth, smooth_normals};
