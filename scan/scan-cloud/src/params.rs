//! Extraction parameters.

#[cfg(feature = "serde")]
use serde::{Deserialize, Serialize};

use scan_types::{ScanError, ScanResult};

/// Parameters for point cloud extraction.
///
/// # Example
///
/// ```
/// use scan_cloud::ExtractionParams;
///
/// let params = ExtractionParams::default().with_stride(4).with_max_points(10_000);
/// assert!(params.validate().is_ok());
/// ```
#[derive(Debug, Clone, PartialEq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct ExtractionParams {
    /// Depths at or below this are invalid, in meters. Default: 0.1.
    pub min_depth: f32,

    /// Depths at or above this are invalid, in meters. Default: 5.0.
    pub max_depth: f32,

    /// Minimum normalized pixel confidence (`code / 2`). Default: 0.5.
    pub min_confidence: f32,

    /// Sample every `stride`-th pixel in x and y. Default: 2.
    pub stride: u32,

    /// Point budget before voxel downsampling kicks in. Default: 500,000.
    pub max_points: usize,

    /// Voxel edge length for downsampling, in meters. Default: 0.01.
    pub voxel_size: f64,

    /// Estimate per-point normals from depth gradients. Default: false.
    pub estimate_normals: bool,
}

impl Default for ExtractionParams {
    fn default() -> Self {
        Self {
            min_depth: 0.1,
            max_depth: 5.0,
            min_confidence: 0.5,
            stride: 2,
            max_points: 500_000,
            voxel_size: 0.01,
            estimate_normals: false,
        }
    }
}

impl ExtractionParams {
    /// Creates new parameters with defaults.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Creates parameters for the high-resolution export path.
    ///
    /// Every pixel is sampled, low-confidence pixels are admitted, the point
    /// budget is 2,000,000 with 5 mm voxels, and normals are estimated.
    #[must_use]
    pub const fn high_resolution() -> Self {
        Self {
            min_depth: 0.1,
            max_depth: 5.0,
            min_confidence: 0.3,
            stride: 1,
            max_points: 2_000_000,
            voxel_size: 0.005,
            estimate_normals: true,
        }
    }

    /// Sets the valid depth range.
    #[must_use]
    pub const fn with_depth_range(mut self, min_depth: f32, max_depth: f32) -> Self {
        self.min_depth = min_depth;
        self.max_depth = max_depth;
        self
    }

    /// Sets the minimum confidence.
    #[must_use]
    pub const fn with_min_confidence(mut self, min_confidence: f32) -> Self {
        self.min_confidence = min_confidence;
        self
    }

    /// Sets the pixel stride.
    #[must_use]
    pub const fn with_stride(mut self, stride: u32) -> Self {
        self.stride = stride;
        self
    }

    /// Sets the point budget.
    #[must_use]
    pub const fn with_max_points(mut self, max_points: usize) -> Self {
        self.max_points = max_points;
        self
    }

    /// Sets the voxel size.
    #[must_use]
    pub const fn with_voxel_size(mut self, voxel_size: f64) -> Self {
        self.voxel_size = voxel_size;
        self
    }

    /// Enables or disables normal estimation.
    #[must_use]
    pub const fn with_estimate_normals(mut self, estimate: bool) -> Self {
        self.estimate_normals = estimate;
        self
    }

    /// Checks that the parameters describe a usable extraction.
    ///
    /// # Errors
    ///
    /// Returns [`ScanError::InvalidConfiguration`] for an empty depth range,
    /// zero stride, zero point budget or non-positive voxel size.
    pub fn validate(&self) -> ScanResult<()> {
        if !(self.min_depth >= 0.0 && self.max_depth > self.min_depth) {
            return Err(ScanError::invalid_config(format!(
                "depth range ({}, {}) is empty",
                self.min_depth, self.max_depth
            )));
        }
        if self.stride == 0 {
            return Err(ScanError::invalid_config("stride must be at least 1"));
        }
        if self.max_points == 0 {
            return Err(ScanError::invalid_config("max_points must be positive"));
        }
        if !(self.voxel_size.is_finite() && self.voxel_size > 0.0) {
            return Err(ScanError::invalid_config("voxel size must be positive"));
        }
        Ok(())
    }
}
