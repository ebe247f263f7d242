//! Depth fusion for on-device scanning.
//!
//! Combines a primary depth array (accurate, sparse near edges) with a
//! secondary one (dense, coarse, possibly on an unrelated scale) into a
//! single fused array, and uses the result to refine surface patches.
//!
//! - [`DepthFusionEngine::fuse`] - Per-pixel confidence-weighted fusion
//! - [`DepthFusionEngine::fuse_frames`] - Fusion with resampling of the
//!   secondary to the primary's resolution
//! - [`DepthFusionEngine::refine_patch`] - Vertex refinement along camera rays
//! - [`DepthFusionEngine::fused_to_point_cloud`] - Back-projection with
//!   distance-based confidence
//!
//! # Fusion Policy
//!
//! | Primary | Secondary | Output |
//! |---------|-----------|--------|
//! | valid | valid | weighted blend, or the trusted source if they disagree |
//! | valid | invalid | primary |
//! | invalid | valid | secondary |
//! | invalid | invalid | 0 |
//!
//! # Example
//!
//! ```
//! use scan_fusion::{DepthFusionEngine, FusionParams};
//!
//! let engine = DepthFusionEngine::new(FusionParams::default());
//! let primary = vec![1.0_f32; 16];
//! let secondary = vec![0.9_f32; 16];
//! let fused = engine.fuse(&primary, &secondary, Some(&[1.0; 16]));
//! assert!(fused.iter().all(|d| (d - 1.0).abs() < 1e-6));
//! ```

#![warn(missing_docs)]
#![warn(clippy::all)]
#![warn(clippy::pedantic)]
// Safety: Deny unwrap/expect in library code. Tests may use them (workspace warns).
#![cfg_attr(not(test), deny(clippy::unwrap_used, clippy::expect_used))]
#![allow(clippy::module_name_repetitions)]

mod fuse;
mod normalize;
mod params;
mod refine;

pub use fuse::{DepthFusionEngine, FusionResult, FusionStats};
pub use normalize::{is_valid_secondary, normalize_secondary, resample_bilinear};
pub use params::FusionParams;
pub use refine::RefinementResult;
