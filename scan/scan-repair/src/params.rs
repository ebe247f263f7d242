//! Correction parameters.

#[cfg(feature = "serde")]
use serde::{Deserialize, Serialize};

use scan_types::{ScanError, ScanResult};

/// Parameters for the mesh correction pipeline.
///
/// # Example
///
/// ```
/// use scan_repair::CorrectionParams;
///
/// let params = CorrectionParams::default()
///     .with_smoothing_iterations(4)
///     .with_fill_holes(true);
/// assert!(params.validate().is_ok());
/// ```
#[derive(Debug, Clone, PartialEq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct CorrectionParams {
    /// Faces with area below this are degenerate. Default: 1e-10.
    pub area_threshold: f64,

    /// Laplacian smoothing passes. Default: 2.
    pub smoothing_iterations: u32,

    /// Laplacian blend factor λ in `[0, 1]`. Default: 0.5.
    pub smoothing_factor: f64,

    /// Normal smoothing passes. Default: 3.
    pub normal_iterations: u32,

    /// Largest boundary loop (in edges) that hole filling closes. Default: 10.
    pub max_hole_edges: usize,

    /// Run hole filling after normal smoothing. Default: false.
    pub fill_holes: bool,
}

impl Default for CorrectionParams {
    fn default() -> Self {
        Self {
            area_threshold: 1e-10,
            smoothing_iterations: 2,
            smoothing_factor: 0.5,
            normal_iterations: 3,
            max_hole_edges: 10,
            fill_holes: false,
        }
    }
}

impl CorrectionParams {
    /// Creates new parameters with defaults.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Creates parameters for a light touch-up during live preview.
    ///
    /// One gentle smoothing pass (λ = 0.3) and one normal pass.
    #[must_use]
    pub const fn light() -> Self {
        Self {
            area_threshold: 1e-10,
            smoothing_iterations: 1,
            smoothing_factor: 0.3,
            normal_iterations: 1,
            max_hole_edges: 10,
            fill_holes: false,
        }
    }

    /// Sets the degenerate-face area threshold.
    #[must_use]
    pub const fn with_area_threshold(mut self, threshold: f64) -> Self {
        self.area_threshold = threshold;
        self
    }

    /// Sets the number of Laplacian smoothing passes.
    #[must_use]
    pub const fn with_smoothing_iterations(mut self, iterations: u32) -> Self {
        self.smoothing_iterations = iterations;
        self
    }

    /// Sets the Laplacian blend factor.
    #[must_use]
    pub const fn with_smoothing_factor(mut self, lambda: f64) -> Self {
        self.smoothing_factor = lambda;
        self
    }

    /// Sets the number of normal smoothing passes.
    #[must_use]
    pub const fn with_normal_iterations(mut self, iterations: u32) -> Self {
        self.normal_iterations = iterations;
        self
    }

    /// Sets the largest hole that gets filled.
    #[must_use]
    pub const fn with_max_hole_edges(mut self, edges: usize) -> Self {
        self.max_hole_edges = edges;
        self
    }

    /// Enables or disables hole filling in the pipeline.
    #[must_use]
    pub const fn with_fill_holes(mut self, fill: bool) -> Self {
        self.fill_holes = fill;
        self
    }

    /// Checks that the parameters describe a usable correction.
    ///
    /// # Errors
    ///
    /// Returns [`ScanError::InvalidConfiguration`] for a negative or
    /// non-finite area threshold or a blend factor outside `[0, 1]`.
    pub fn validate(&self) -> ScanResult<()> {
        if !(self.area_threshold.is_finite() && self.area_threshold >= 0.0) {
            return Err(ScanError::invalid_config("area threshold must be non-negative"));
        }
        if !(0.0..=1.0).contains(&self.smoothing_factor) {
            return Err(ScanError::invalid_config(format!(
                "smoothing factor {} outside [0, 1]",
                self.smoothing_factor
            )));
        }
        Ok(())
    }
}
