//! Core data model for on-device scan processing.
//!
//! This crate provides the types every scan processing crate shares:
//!
//! - [`SurfacePatch`] - A mesh fragment emitted by the capture service
//! - [`PatchStore`] - Latest version of every patch, keyed by [`PatchId`]
//! - [`DepthFrame`] - A depth image with intrinsics and camera pose
//! - [`PointCloud`] - An unordered point set with optional attributes
//! - [`ScanError`] - The error taxonomy shared by all components
//! - [`WorkerPool`], [`CancellationToken`], [`EventHub`] - Batch execution
//!   and event fan-out
//!
//! # Layer 0
//!
//! This is a Layer 0 crate with zero Bevy dependencies. It performs no I/O.
//!
//! # Conventions
//!
//! - Geometry is `f64` ([`nalgebra`] points, vectors and matrices)
//! - Depth is `f32` meters, as produced by the sensor
//! - Transforms are 4×4 local-to-world (patches) or camera-to-world (frames)
//! - Camera space looks down +Z; world up is +Y ([`up`])
//!
//! # Example
//!
//! ```
//! use scan_types::{PatchEvent, PatchId, PatchStore, Point3, SurfacePatch};
//!
//! let mut store = PatchStore::new();
//! let patch = SurfacePatch::new(
//!     PatchId(1),
//!     vec![
//!         Point3::new(0.0, 0.0, 0.0),
//!         Point3::new(1.0, 0.0, 0.0),
//!         Point3::new(0.0, 1.0, 0.0),
//!     ],
//!     vec![[0, 1, 2]],
//! );
//! store.apply(PatchEvent::Added(patch));
//! assert_eq!(store.len(), 1);
//! ```

#![warn(missing_docs)]
#![warn(clippy::all)]
#![warn(clippy::pedantic)]
// Safety: Deny unwrap/expect in library code. Tests may use them (workspace warns).
#![cfg_attr(not(test), deny(clippy::unwrap_used, clippy::expect_used))]
#![allow(clippy::module_name_repetitions)]

mod camera;
mod cloud;
mod depth;
mod error;
mod events;
mod normals;
mod patch;
mod pool;
mod store;
mod time;
mod transform;

pub use camera::CameraIntrinsics;
pub use cloud::{PointCloud, PointSource};
pub use depth::{ConfidenceLevel, DepthFrame, is_valid_depth};
pub use error::{ScanError, ScanResult};
pub use events::{DEFAULT_EVENT_CAPACITY, EventHub};
pub use normals::compute_vertex_normals;
pub use patch::{PatchId, SurfacePatch, merge_patches};
pub use pool::{CancellationToken, WorkerPool};
pub use store::{PatchEvent, PatchStore};
pub use time::Timestamp;
pub use transform::{normal_matrix, transform_normal, transform_point, transform_vector, translation, up};

// Re-export nalgebra types for convenience
pub use nalgebra::{Matrix3, Matrix4, Point3, Vector3};
