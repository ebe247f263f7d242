//! Per-pixel fusion of primary and secondary depth.

#[cfg(feature = "serde")]
use serde::{Deserialize, Serialize};

use tracing::{debug, warn};

use scan_types::{DepthFrame, ScanError, ScanResult, WorkerPool, is_valid_depth};

use crate::normalize::{is_valid_secondary, normalize_secondary, resample_bilinear};
use crate::params::FusionParams;

/// Confidence assigned to pixels backed by the primary sensor.
const PRIMARY_CONFIDENCE: f32 = 0.9;

/// Largest disagreement penalty subtracted from [`PRIMARY_CONFIDENCE`].
const MAX_DISAGREEMENT_PENALTY: f32 = 0.5;

/// Scale applied to the secondary confidence for secondary-only pixels.
const SECONDARY_ONLY_SCALE: f32 = 0.7;

/// How each pixel of a fused array was produced.
#[derive(Debug, Clone, Copy, PartialEq, Default)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct FusionStats {
    /// Fraction of pixels with a valid primary depth, in `[0, 1]`.
    pub primary_coverage: f32,
    /// Pixels filled from the secondary alone.
    pub secondary_fill: usize,
    /// Pixels blended from both sources.
    pub blended: usize,
    /// Pixels where the sources disagreed and one was picked.
    pub overridden: usize,
    /// Pixels taken from the primary alone.
    pub primary_only: usize,
    /// Pixels with no valid source (output 0).
    pub empty: usize,
}

/// Fused depth with a per-pixel confidence map.
#[derive(Debug, Clone, PartialEq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct FusionResult {
    /// Fused depth in meters; 0 marks pixels with no valid source.
    pub depth: Vec<f32>,
    /// Per-pixel confidence in `[0, 1]`.
    pub confidence: Vec<f32>,
    /// Per-pixel provenance counts.
    pub stats: FusionStats,
}

impl FusionResult {
    /// Copies `frame`'s geometry (size, intrinsics, pose, timestamp) onto
    /// the fused depth, for refinement and back-projection.
    #[must_use]
    pub fn to_frame(&self, frame: &DepthFrame) -> DepthFrame {
        DepthFrame {
            width: frame.width,
            height: frame.height,
            depth: self.depth.clone(),
            confidence: None,
            intrinsics: frame.intrinsics,
            camera_transform: frame.camera_transform,
            timestamp: frame.timestamp,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum PixelSource {
    Blended,
    Overridden,
    PrimaryOnly,
    SecondaryOnly,
    Empty,
}

/// Merges a primary (accurate, sparse) depth array with a secondary (dense,
/// coarse) one, and refines surface patches against the result.
///
/// # Example
///
/// ```
/// use scan_fusion::{DepthFusionEngine, FusionParams};
///
/// let engine = DepthFusionEngine::new(FusionParams::default());
/// let fused = engine.fuse(&[1.0, 0.0], &[2.0, 3.0], None);
/// // Pixel 1 has no primary, so the (rescaled) secondary fills it.
/// assert!(fused[1] > 0.0);
/// ```
#[derive(Debug, Clone, Default)]
pub struct DepthFusionEngine {
    pub(crate) params: FusionParams,
    pub(crate) pool: WorkerPool,
}

impl DepthFusionEngine {
    /// Creates an engine running batch work on rayon's global pool.
    #[must_use]
    pub fn new(params: FusionParams) -> Self {
        Self {
            params,
            pool: WorkerPool::global(),
        }
    }

    /// Sets the worker pool used for batch refinement.
    #[must_use]
    pub fn with_pool(mut self, pool: WorkerPool) -> Self {
        self.pool = pool;
        self
    }

    /// Returns the fusion parameters.
    #[must_use]
    pub fn params(&self) -> &FusionParams {
        &self.params
    }

    /// Fuses two same-sized depth arrays.
    ///
    /// Returns `primary` unchanged if the arrays differ in length or the
    /// parameters are invalid. A confidence array of the wrong length is
    /// ignored.
    #[must_use]
    pub fn fuse(&self, primary: &[f32], secondary: &[f32], confidence: Option<&[f32]>) -> Vec<f32> {
        match self.try_fuse_detailed(primary, secondary, confidence) {
            Ok(result) => result.depth,
            Err(e) => {
                warn!(error = %e, "depth fusion skipped, keeping primary");
                primary.to_vec()
            }
        }
    }

    /// Like [`fuse`](Self::fuse), also returning the confidence map and
    /// provenance counts. On invalid input the primary is passed through.
    #[must_use]
    pub fn fuse_detailed(&self, primary: &[f32], secondary: &[f32], confidence: Option<&[f32]>) -> FusionResult {
        self.try_fuse_detailed(primary, secondary, confidence)
            .unwrap_or_else(|e| {
                warn!(error = %e, "depth fusion skipped, keeping primary");
                self.passthrough(primary)
            })
    }

    /// Fallible form of [`fuse_detailed`](Self::fuse_detailed).
    ///
    /// # Errors
    ///
    /// - [`ScanError::BufferSizeMismatch`] if `secondary.len() != primary.len()`
    /// - [`ScanError::InvalidConfiguration`] for invalid parameters
    pub fn try_fuse_detailed(
        &self,
        primary: &[f32],
        secondary: &[f32],
        confidence: Option<&[f32]>,
    ) -> ScanResult<FusionResult> {
        self.params.validate()?;
        if secondary.len() != primary.len() {
            return Err(ScanError::buffer_mismatch(primary.len(), secondary.len()));
        }

        let confidence = confidence.filter(|c| {
            let ok = c.len() == primary.len();
            if !ok {
                warn!(expected = primary.len(), actual = c.len(), "ignoring mis-sized confidence");
            }
            ok
        });

        let p = &self.params;
        let normalized = normalize_secondary(primary, secondary, p.min_depth, p.max_depth);

        let mut stats = FusionStats::default();
        let mut depth = Vec::with_capacity(primary.len());
        let mut confidence_map = Vec::with_capacity(primary.len());

        for (i, (&pd, &sd)) in primary.iter().zip(&normalized).enumerate() {
            let c = confidence.map(|c| c[i]);
            let (fused, source) = self.fuse_pixel(pd, sd, c);
            match source {
                PixelSource::Blended => stats.blended += 1,
                PixelSource::Overridden => stats.overridden += 1,
                PixelSource::PrimaryOnly => stats.primary_only += 1,
                PixelSource::SecondaryOnly => stats.secondary_fill += 1,
                PixelSource::Empty => stats.empty += 1,
            }
            depth.push(fused);
            confidence_map.push(self.pixel_confidence(pd, sd));
        }

        stats.primary_coverage = coverage(stats.blended + stats.overridden + stats.primary_only, primary.len());

        debug!(
            pixels = primary.len(),
            blended = stats.blended,
            overridden = stats.overridden,
            secondary_fill = stats.secondary_fill,
            "fused depth"
        );

        Ok(FusionResult {
            depth,
            confidence: confidence_map,
            stats,
        })
    }

    /// Fuses a primary frame with a secondary estimate of any resolution.
    ///
    /// A secondary of different size is bilinearly resampled to the
    /// primary's grid. The primary frame's confidence codes drive the
    /// adaptive weights. On invalid input the primary depth is passed
    /// through.
    #[must_use]
    pub fn fuse_frames(&self, primary: &DepthFrame, secondary: &[f32], width: u32, height: u32) -> FusionResult {
        self.try_fuse_frames(primary, secondary, width, height)
            .unwrap_or_else(|e| {
                warn!(error = %e, "frame fusion skipped, keeping primary");
                self.passthrough(&primary.depth)
            })
    }

    /// Fallible form of [`fuse_frames`](Self::fuse_frames).
    ///
    /// # Errors
    ///
    /// - [`ScanError::BufferSizeMismatch`] if either buffer does not match
    ///   its stated dimensions
    /// - [`ScanError::InvalidConfiguration`] for invalid parameters
    pub fn try_fuse_frames(
        &self,
        primary: &DepthFrame,
        secondary: &[f32],
        width: u32,
        height: u32,
    ) -> ScanResult<FusionResult> {
        let expected = primary.pixel_count();
        if primary.depth.len() != expected {
            return Err(ScanError::buffer_mismatch(expected, primary.depth.len()));
        }
        let secondary_expected = width as usize * height as usize;
        if secondary.len() != secondary_expected {
            return Err(ScanError::buffer_mismatch(secondary_expected, secondary.len()));
        }

        let resampled;
        let secondary = if (width, height) == (primary.width, primary.height) {
            secondary
        } else {
            debug!(
                from_width = width,
                from_height = height,
                to_width = primary.width,
                to_height = primary.height,
                "resampling secondary depth"
            );
            resampled = resample_bilinear(secondary, width, height, primary.width, primary.height);
            &resampled
        };

        let confidence = primary.confidence_values();
        self.try_fuse_detailed(&primary.depth, secondary, confidence.as_deref())
    }

    fn fuse_pixel(&self, primary: f32, secondary: f32, confidence: Option<f32>) -> (f32, PixelSource) {
        let p = &self.params;
        let primary_valid = is_valid_depth(primary, p.min_depth, p.max_depth);
        let secondary_valid = is_valid_secondary(secondary);

        match (primary_valid, secondary_valid) {
            (true, true) => {
                if let Some(c) = confidence {
                    if (primary - secondary).abs() > p.max_discrepancy {
                        let pick = if c > p.high_confidence_threshold { primary } else { secondary };
                        return (pick, PixelSource::Overridden);
                    }
                }
                let (wp, ws) = p.weights(confidence);
                (primary * wp + secondary * ws, PixelSource::Blended)
            }
            (true, false) => (primary, PixelSource::PrimaryOnly),
            (false, true) => (secondary, PixelSource::SecondaryOnly),
            (false, false) => (0.0, PixelSource::Empty),
        }
    }

    fn pixel_confidence(&self, primary: f32, secondary: f32) -> f32 {
        let p = &self.params;
        let c = if is_valid_depth(primary, p.min_depth, p.max_depth) {
            let penalty = if is_valid_secondary(secondary) {
                (2.0 * (primary - secondary).abs() / primary).clamp(0.0, MAX_DISAGREEMENT_PENALTY)
            } else {
                0.0
            };
            PRIMARY_CONFIDENCE - penalty
        } else if is_valid_secondary(secondary) {
            p.secondary_confidence * SECONDARY_ONLY_SCALE
        } else {
            0.0
        };
        c.clamp(0.0, 1.0)
    }

    fn passthrough(&self, primary: &[f32]) -> FusionResult {
        let p = &self.params;
        let valid: Vec<bool> = primary
            .iter()
            .map(|&d| is_valid_depth(d, p.min_depth, p.max_depth))
            .collect();
        let primary_only = valid.iter().filter(|&&v| v).count();
        let primary_coverage = coverage(primary_only, primary.len());
        FusionResult {
            depth: primary.to_vec(),
            confidence: valid
                .iter()
                .map(|&v| if v { PRIMARY_CONFIDENCE } else { 0.0 })
                .collect(),
            stats: FusionStats {
                primary_coverage,
                primary_only,
                empty: primary.len() - primary_only,
                ..FusionStats::default()
            },
        }
    }
}

#[allow(clippy::cast_precision_loss)]
fn coverage(valid: usize, total: usize) -> f32 {
    if total == 0 {
        0.0
    } else {
        valid as f32 / total as f32
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;
    use scan_types::CameraIntrinsics;

    fn engine() -> DepthFusionEngine {
        DepthFusionEngine::new(FusionParams::default())
    }

    #[test]
    fn uniform_frames_fuse_to_primary() {
        let primary = vec![1.0; 16];
        let secondary = vec![0.9; 16];
        let confidence = vec![1.0; 16];
        let fused = engine().fuse(&primary, &secondary, Some(&confidence));
        for d in fused {
            assert_relative_eq!(d, 1.0, epsilon = 1e-6);
        }
    }

    #[test]
    fn weighted_sum_without_confidence() {
        let primary = [1.0, 2.0, 3.0, 4.0];
        let secondary = [10.0, 25.0, 30.0, 40.0];
        let e = engine();
        let normalized = normalize_secondary(&primary, &secondary, 0.1, 5.0);
        let fused = e.fuse(&primary, &secondary, None);
        for i in 0..4 {
            assert_relative_eq!(fused[i], primary[i] * 0.7 + normalized[i] * 0.3, epsilon = 1e-6);
        }
    }

    #[test]
    fn length_mismatch_returns_primary() {
        let primary = [1.0, 2.0, 3.0];
        assert_eq!(engine().fuse(&primary, &[1.0, 2.0], None), primary.to_vec());
        assert_eq!(
            engine().try_fuse_detailed(&primary, &[1.0], None).map(|r| r.depth),
            Err(ScanError::buffer_mismatch(3, 1))
        );
    }

    #[test]
    fn single_source_pixels() {
        // Primary: valid, invalid, valid, invalid. Secondary: invalid, valid, valid, invalid.
        let primary = [1.0, 0.0, 2.0, 0.0];
        let secondary = [0.0, 1.0, 3.0, f32::NAN];
        let r = engine().fuse_detailed(&primary, &secondary, None);

        assert_relative_eq!(r.depth[0], 1.0);
        assert!(r.depth[1] > 0.0);
        assert_relative_eq!(r.depth[3], 0.0);
        assert_eq!(r.stats.primary_only, 1);
        assert_eq!(r.stats.secondary_fill, 1);
        assert_eq!(r.stats.blended, 1);
        assert_eq!(r.stats.empty, 1);
        assert_relative_eq!(r.stats.primary_coverage, 0.5);
    }

    #[test]
    fn discrepancy_picks_by_confidence() {
        // Normalized secondary spans [1, 4]; pixel 1 disagrees by 2 m.
        let primary = [1.0, 1.0, 4.0];
        let secondary = [1.0, 3.0, 4.0];
        let e = engine();

        let high = e.fuse_detailed(&primary, &secondary, Some(&[1.0, 0.9, 1.0]));
        assert_relative_eq!(high.depth[1], 1.0);
        assert_eq!(high.stats.overridden, 1);

        let low = e.fuse_detailed(&primary, &secondary, Some(&[1.0, 0.2, 1.0]));
        assert_relative_eq!(low.depth[1], 3.0, epsilon = 1e-6);
    }

    #[test]
    fn adaptive_weights_blend() {
        let primary = [1.0, 1.2, 2.0];
        let secondary = [1.0, 1.0, 2.0];
        let fused = engine().fuse(&primary, &secondary, Some(&[0.5, 0.5, 0.5]));
        // wP = 0.7 + 0.3 * 0.5 = 0.85.
        assert_relative_eq!(fused[1], 1.2 * 0.85 + 1.0 * 0.15, epsilon = 1e-6);
    }

    #[test]
    fn confidence_map() {
        let primary = [2.0, 0.0, 2.0, 0.0];
        let secondary = [2.0, 1.0, 3.0, 0.0];
        let r = engine().fuse_detailed(&primary, &secondary, None);
        // Normalized secondary maps [1, 3] onto [2, 2]; primary-backed pixels agree.
        assert_relative_eq!(r.confidence[0], 0.9);
        assert_relative_eq!(r.confidence[1], 0.49, epsilon = 1e-6);
        assert_relative_eq!(r.confidence[3], 0.0);
    }

    #[test]
    fn disagreement_lowers_confidence() {
        let e = engine();
        assert_relative_eq!(e.pixel_confidence(1.0, 1.1), 0.7, epsilon = 1e-6);
        assert_relative_eq!(e.pixel_confidence(1.0, 3.0), 0.4, epsilon = 1e-6);
    }

    #[test]
    fn frames_with_different_resolution() {
        let primary = DepthFrame::new(4, 4, vec![1.0; 16], CameraIntrinsics::centered(4.0, 4, 4))
            .with_confidence(vec![2; 16]);
        let r = engine().fuse_frames(&primary, &[0.5; 4], 2, 2);
        assert_eq!(r.depth.len(), 16);
        for d in &r.depth {
            assert_relative_eq!(*d, 1.0, epsilon = 1e-6);
        }

        let bad = engine().fuse_frames(&primary, &[0.5; 3], 2, 2);
        assert_eq!(bad.depth, primary.depth);
        assert_eq!(bad.stats.primary_only, 16);
    }
}
