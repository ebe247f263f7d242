//! Fusion parameters.

#[cfg(feature = "serde")]
use serde::{Deserialize, Serialize};

use scan_types::{ScanError, ScanResult};

/// Parameters for depth fusion and mesh refinement.
///
/// # Example
///
/// ```
/// use scan_fusion::FusionParams;
///
/// let params = FusionParams::default().with_base_weight(0.8);
/// assert!(params.validate().is_ok());
/// ```
#[derive(Debug, Clone, PartialEq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct FusionParams {
    /// Weight of the primary depth when no confidence is available, and the
    /// floor of its adaptive weight otherwise. Default: 0.7.
    pub base_weight: f32,

    /// Disagreement beyond which fusion picks one source instead of
    /// blending, in meters. Also the largest shift applied during mesh
    /// refinement. Default: 0.5.
    pub max_discrepancy: f32,

    /// Confidence above which the primary wins a disagreement. Default: 0.7.
    pub high_confidence_threshold: f32,

    /// Primary depths at or below this are invalid, in meters. Default: 0.1.
    pub min_depth: f32,

    /// Primary depths at or above this are invalid, in meters. Default: 5.0.
    pub max_depth: f32,

    /// Refinement ignores depth differences at or below this, in meters.
    /// Default: 0.001.
    pub min_refinement_shift: f32,

    /// Overall confidence of the secondary estimate, used for the
    /// confidence map. Default: 0.7.
    pub secondary_confidence: f32,
}

impl Default for FusionParams {
    fn default() -> Self {
        Self {
            base_weight: 0.7,
            max_discrepancy: 0.5,
            high_confidence_threshold: 0.7,
            min_depth: 0.1,
            max_depth: 5.0,
            min_refinement_shift: 0.001,
            secondary_confidence: 0.7,
        }
    }
}

impl FusionParams {
    /// Creates new parameters with defaults.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Sets the base primary weight.
    #[must_use]
    pub const fn with_base_weight(mut self, base_weight: f32) -> Self {
        self.base_weight = base_weight;
        self
    }

    /// Sets the maximum discrepancy.
    #[must_use]
    pub const fn with_max_discrepancy(mut self, max_discrepancy: f32) -> Self {
        self.max_discrepancy = max_discrepancy;
        self
    }

    /// Sets the high-confidence threshold.
    #[must_use]
    pub const fn with_high_confidence_threshold(mut self, threshold: f32) -> Self {
        self.high_confidence_threshold = threshold;
        self
    }

    /// Sets the valid primary depth range.
    #[must_use]
    pub const fn with_depth_range(mut self, min_depth: f32, max_depth: f32) -> Self {
        self.min_depth = min_depth;
        self.max_depth = max_depth;
        self
    }

    /// Sets the minimum refinement shift.
    #[must_use]
    pub const fn with_min_refinement_shift(mut self, shift: f32) -> Self {
        self.min_refinement_shift = shift;
        self
    }

    /// Sets the secondary estimate's overall confidence.
    #[must_use]
    pub const fn with_secondary_confidence(mut self, confidence: f32) -> Self {
        self.secondary_confidence = confidence;
        self
    }

    /// Weights `(primary, secondary)` for a pixel with the given confidence.
    ///
    /// Without confidence the fixed `base_weight` split is used; with it the
    /// primary weight rises linearly from `base_weight` to 1.
    #[must_use]
    pub fn weights(&self, confidence: Option<f32>) -> (f32, f32) {
        let primary = match confidence {
            Some(c) => self.base_weight + (1.0 - self.base_weight) * c.clamp(0.0, 1.0),
            None => self.base_weight,
        };
        (primary, 1.0 - primary)
    }

    /// Checks that the parameters describe a usable fusion.
    ///
    /// # Errors
    ///
    /// Returns [`ScanError::InvalidConfiguration`] for weights or thresholds
    /// outside `[0, 1]`, an empty depth range, or a refinement window that
    /// admits no shift.
    pub fn validate(&self) -> ScanResult<()> {
        let unit = 0.0..=1.0;
        if !unit.contains(&self.base_weight) {
            return Err(ScanError::invalid_config("base weight must be in [0, 1]"));
        }
        if !unit.contains(&self.high_confidence_threshold) || !unit.contains(&self.secondary_confidence) {
            return Err(ScanError::invalid_config("confidence values must be in [0, 1]"));
        }
        if !(self.min_depth >= 0.0 && self.max_depth > self.min_depth) {
            return Err(ScanError::invalid_config(format!(
                "depth range ({}, {}) is empty",
                self.min_depth, self.max_depth
            )));
        }
        if !(self.min_refinement_shift >= 0.0 && self.max_discrepancy > self.min_refinement_shift) {
            return Err(ScanError::invalid_config(
                "max discrepancy must exceed the minimum refinement shift",
            ));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;

    #[test]
    fn default_weights() {
        let p = FusionParams::default();
        let (wp, ws) = p.weights(None);
        assert_relative_eq!(wp, 0.7);
        assert_relative_eq!(ws, 0.3, epsilon = 1e-6);

        let (wp, ws) = p.weights(Some(1.0));
        assert_relative_eq!(wp, 1.0);
        assert_relative_eq!(ws, 0.0);

        let (wp, _) = p.weights(Some(0.5));
        assert_relative_eq!(wp, 0.85);
    }

    #[test]
    fn validate() {
        assert!(FusionParams::default().validate().is_ok());
        assert!(FusionParams::default().with_base_weight(1.5).validate().is_err());
        assert!(FusionParams::default().with_depth_range(1.0, 1.0).validate().is_err());
        assert!(FusionParams::default().with_max_discrepancy(0.0).validate().is_err());
        assert!(
            FusionParams::default()
                .with_secondary_confidence(-0.1)
                .validate()
                .is_err()
        );
    }
}
