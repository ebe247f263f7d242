//! View-coverage tracking for handheld scanning.
//!
//! Space is divided into a uniform grid of cubic cells. Every sampled patch
//! vertex records the direction it was seen from in its cell, and a cell's
//! [`CoverageQuality`] grows with the number of distinct directions:
//!
//! | Distinct views | Quality |
//! |----------------|---------|
//! | 0 | None |
//! | 1 | Poor |
//! | 2 | Fair |
//! | 3 .. excellent | Good |
//! | `min_views_for_excellent`+ | Excellent |
//!
//! Connected clusters of poorly covered or missing cells become [`Gap`]s,
//! each with a suggested camera position, so the user can be guided toward
//! the part of the object that still needs scanning.
//!
//! - [`CoverageTracker`] - Owns the grid; single writer
//! - [`SharedCoverageTracker`] - Mutex-guarded tracker for capture callbacks
//!   on arbitrary threads
//! - [`CoverageQueue`] - Bounded hand-off of capture inputs to the owner
//! - [`detect_gaps`] - Stateless gap clustering over a cell map
//!
//! # Layer 0
//!
//! This is a Layer 0 crate with zero Bevy dependencies.
//!
//! # Example
//!
//! ```
//! use nalgebra::{Matrix4, Point3, Vector3};
//! use scan_coverage::{CoverageParams, CoverageQuality, CoverageTracker};
//! use scan_types::{PatchId, SurfacePatch, Timestamp};
//!
//! let mut tracker = CoverageTracker::new(CoverageParams::default());
//! let patch = SurfacePatch::new(PatchId(7), vec![Point3::new(0.05, 0.05, 0.05)], vec![]);
//!
//! // The same point seen from two perpendicular directions.
//! let front = Matrix4::new_translation(&Vector3::new(0.05, 0.05, -1.0));
//! let side = Matrix4::new_translation(&Vector3::new(-1.0, 0.05, 0.05));
//! tracker.update_coverage(&[patch.clone()], &front, Timestamp::from_millis(0));
//! let revised = SurfacePatch { revision: 1, ..patch };
//! tracker.update_coverage(&[revised], &side, Timestamp::from_millis(500));
//!
//! let cell = tracker.cells().next().unwrap();
//! assert_eq!(cell.quality, CoverageQuality::Fair);
//! assert_eq!(tracker.statistics().covered_cells, 1);
//! ```

#![warn(missing_docs)]
#![warn(clippy::all)]
#![warn(clippy::pedantic)]
// Safety: Deny unwrap/expect in library code. Tests may use them (workspace warns).
#![cfg_attr(not(test), deny(clippy::unwrap_used, clippy::expect_used))]
#![allow(clippy::module_name_repetitions)]

mod cell;
mod gaps;
mod params;
mod shared;
mod tracker;

pub use cell::{CellCoord, CoverageCell, CoverageQuality};
pub use gaps::{Gap, detect_gaps};
pub use params::CoverageParams;
pub use shared::{CoverageInput, CoverageQueue, QueueDrain, SharedCoverageTracker};
pub use tracker::{
    CoverageEvent, CoverageStatistics, CoverageTracker, UpdateOutcome, UpdateSummary,
    ViewGuidance,
};
