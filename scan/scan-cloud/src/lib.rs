//! Point cloud extraction for on-device scanning.
//!
//! This crate turns sensor output into world-space point sets:
//!
//! - [`PointCloudExtractor`] - Back-projects depth frames and collects
//!   surface patch vertices
//! - [`voxel_downsample`] / [`downsample_to_budget`] - Order-independent
//!   voxel grid reduction
//! - [`depth_statistics`] - Min/max/mean/median/stddev and histogram of a
//!   depth frame
//! - [`depth_gradient_normal`] - Per-pixel normals from depth gradients
//!
//! # Layer 0
//!
//! This is a Layer 0 crate with zero Bevy dependencies.
//!
//! # Example
//!
//! ```
//! use scan_cloud::{ExtractionParams, PointCloudExtractor};
//! use scan_types::{CameraIntrinsics, DepthFrame};
//!
//! let frame = DepthFrame::new(8, 8, vec![1.5; 64], CameraIntrinsics::centered(8.0, 8, 8));
//! let extractor = PointCloudExtractor::new(ExtractionParams::default());
//! let cloud = extractor.extract_depth(&frame);
//!
//! // Default stride samples every second pixel in each direction.
//! assert_eq!(cloud.len(), 16);
//! ```

#![warn(missing_docs)]
#![warn(clippy::all)]
#![warn(clippy::pedantic)]
// Safety: Deny unwrap/expect in library code. Tests may use them (workspace warns).
#![cfg_attr(not(test), deny(clippy::unwrap_used, clippy::expect_used))]
#![allow(clippy::module_name_repetitions)]

mod extract;
mod normals;
mod params;
mod stats;
mod voxel;

pub use extract::PointCloudExtractor;
pub use normals::depth_gradient_normal;
pub use params::ExtractionParams;
pub use stats::{DepthStatistics, HISTOGRAM_BINS, depth_statistics};
pub use voxel::{VoxelKey, downsample_to_budget, voxel_downsample, voxel_key};
