//! Coverage tracking parameters.

use std::time::Duration;

#[cfg(feature = "serde")]
use serde::{Deserialize, Serialize};

use scan_types::{ScanError, ScanResult};

/// Parameters for the coverage tracker.
///
/// # Example
///
/// ```
/// use std::time::Duration;
/// use scan_coverage::CoverageParams;
///
/// let params = CoverageParams::default()
///     .with_grid_resolution(0.05)
///     .with_update_interval(Duration::from_millis(100));
/// assert!(params.validate().is_ok());
/// ```
#[derive(Debug, Clone, PartialEq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct CoverageParams {
    /// Edge length of a coverage cell in meters. Default: 0.1.
    pub grid_resolution: f64,

    /// Two view directions closer than this angle count as one view.
    /// Default: 30°.
    pub angle_threshold_degrees: f64,

    /// Distinct views for Excellent quality. Default: 5.
    pub min_views_for_excellent: u32,

    /// Minimum time between applied updates. Default: 200 ms.
    pub update_interval: Duration,

    /// Samples farther than this from the camera are discarded. Default: 5 m.
    pub max_update_distance: f64,

    /// Upper bound on vertices sampled per patch. Default: 1000.
    pub samples_per_patch: usize,

    /// New cells that trigger gap detection. Default: 100.
    pub gap_trigger_cells: usize,

    /// Time after which gap detection runs regardless of new cells.
    /// Default: 1 s.
    pub gap_interval: Duration,

    /// Smallest reported gap, in cells. Default: 3.
    pub min_gap_size_cells: usize,

    /// Most gaps reported, highest priority first. Default: 5.
    pub max_gaps: usize,

    /// Gaps farther than this from the camera get zero priority. Default: 5 m.
    pub gap_priority_range: f64,

    /// Distance from a gap center to its suggested camera position.
    /// Default: 1.5 m.
    pub suggested_camera_distance: f64,

    /// Camera poses kept in the trajectory history. Default: 1000.
    pub trajectory_capacity: usize,
}

impl Default for CoverageParams {
    fn default() -> Self {
        Self {
            grid_resolution: 0.1,
            angle_threshold_degrees: 30.0,
            min_views_for_excellent: 5,
            update_interval: Duration::from_millis(200),
            max_update_distance: 5.0,
            samples_per_patch: 1000,
            gap_trigger_cells: 100,
            gap_interval: Duration::from_secs(1),
            min_gap_size_cells: 3,
            max_gaps: 5,
            gap_priority_range: 5.0,
            suggested_camera_distance: 1.5,
            trajectory_capacity: 1000,
        }
    }
}

impl CoverageParams {
    /// Creates new parameters with defaults.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Creates parameters for small objects scanned up close.
    ///
    /// 5 cm cells, 20° view separation, twice the samples per patch.
    #[must_use]
    pub const fn fine() -> Self {
        Self {
            grid_resolution: 0.05,
            angle_threshold_degrees: 20.0,
            min_views_for_excellent: 5,
            update_interval: Duration::from_millis(200),
            max_update_distance: 2.0,
            samples_per_patch: 2000,
            gap_trigger_cells: 100,
            gap_interval: Duration::from_secs(1),
            min_gap_size_cells: 3,
            max_gaps: 5,
            gap_priority_range: 5.0,
            suggested_camera_distance: 0.5,
            trajectory_capacity: 1000,
        }
    }

    /// Sets the cell size.
    #[must_use]
    pub const fn with_grid_resolution(mut self, resolution: f64) -> Self {
        self.grid_resolution = resolution;
        self
    }

    /// Sets the distinct-view angle.
    #[must_use]
    pub const fn with_angle_threshold_degrees(mut self, degrees: f64) -> Self {
        self.angle_threshold_degrees = degrees;
        self
    }

    /// Sets the views needed for Excellent quality.
    #[must_use]
    pub const fn with_min_views_for_excellent(mut self, views: u32) -> Self {
        self.min_views_for_excellent = views;
        self
    }

    /// Sets the update rate limit.
    #[must_use]
    pub const fn with_update_interval(mut self, interval: Duration) -> Self {
        self.update_interval = interval;
        self
    }

    /// Sets the sample distance cutoff.
    #[must_use]
    pub const fn with_max_update_distance(mut self, distance: f64) -> Self {
        self.max_update_distance = distance;
        self
    }

    /// Sets the per-patch sample budget.
    #[must_use]
    pub const fn with_samples_per_patch(mut self, samples: usize) -> Self {
        self.samples_per_patch = samples;
        self
    }

    /// Sets the gap detection triggers.
    #[must_use]
    pub const fn with_gap_triggers(mut self, cells: usize, interval: Duration) -> Self {
        self.gap_trigger_cells = cells;
        self.gap_interval = interval;
        self
    }

    /// Sets the smallest reported gap.
    #[must_use]
    pub const fn with_min_gap_size_cells(mut self, cells: usize) -> Self {
        self.min_gap_size_cells = cells;
        self
    }

    /// Sets the number of reported gaps.
    #[must_use]
    pub const fn with_max_gaps(mut self, gaps: usize) -> Self {
        self.max_gaps = gaps;
        self
    }

    /// Cosine of the distinct-view angle.
    #[must_use]
    pub fn angle_threshold_cos(&self) -> f64 {
        self.angle_threshold_degrees.to_radians().cos()
    }

    /// Area of one cell face in square meters.
    #[must_use]
    pub fn cell_area(&self) -> f64 {
        self.grid_resolution * self.grid_resolution
    }

    /// Checks that the parameters describe a usable grid.
    ///
    /// # Errors
    ///
    /// Returns [`ScanError::InvalidConfiguration`] for a non-positive grid
    /// resolution or distance cutoff, an angle outside `(0, 180]`, fewer
    /// than three views for Excellent, or a zero sample budget.
    pub fn validate(&self) -> ScanResult<()> {
        if !(self.grid_resolution.is_finite() && self.grid_resolution > 0.0) {
            return Err(ScanError::invalid_config(format!(
                "grid resolution must be positive, got {}",
                self.grid_resolution
            )));
        }
        if !(self.angle_threshold_degrees > 0.0 && self.angle_threshold_degrees <= 180.0) {
            return Err(ScanError::invalid_config("angle threshold must be in (0, 180]"));
        }
        if self.min_views_for_excellent < 3 {
            return Err(ScanError::invalid_config("excellent quality needs at least 3 views"));
        }
        if self.max_update_distance.is_nan() || self.max_update_distance <= 0.0 {
            return Err(ScanError::invalid_config("max update distance must be positive"));
        }
        if self.samples_per_patch == 0 {
            return Err(ScanError::invalid_config("samples per patch must be at least 1"));
        }
        if !(self.suggested_camera_distance.is_finite() && self.suggested_camera_distance >= 0.0) {
            return Err(ScanError::invalid_config("suggested camera distance must be non-negative"));
        }
        Ok(())
    }
}
