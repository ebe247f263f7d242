//! Depth frame statistics for diagnostics and coverage heuristics.

#[cfg(feature = "serde")]
use serde::{Deserialize, Serialize};

use scan_types::{DepthFrame, is_valid_depth};

/// Number of histogram bins in [`DepthStatistics`].
pub const HISTOGRAM_BINS: usize = 100;

/// Summary of the valid pixels of a depth frame.
#[derive(Debug, Clone, PartialEq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct DepthStatistics {
    /// Number of valid pixels.
    pub valid_count: usize,
    /// Total number of pixels.
    pub total_count: usize,
    /// Smallest valid depth.
    pub min: f32,
    /// Largest valid depth.
    pub max: f32,
    /// Mean valid depth.
    pub mean: f32,
    /// Median valid depth (mean of the middle two for even counts).
    pub median: f32,
    /// Population standard deviation of valid depths.
    pub std_dev: f32,
    /// Counts over [`HISTOGRAM_BINS`] equal bins spanning `[min, max]`.
    pub histogram: Vec<u32>,
}

impl DepthStatistics {
    /// Fraction of pixels that are valid, in `[0, 1]`.
    #[must_use]
    #[allow(clippy::cast_precision_loss)]
    pub fn valid_fraction(&self) -> f64 {
        if self.total_count == 0 {
            0.0
        } else {
            self.valid_count as f64 / self.total_count as f64
        }
    }
}

/// Computes statistics over pixels with depth in `(min_depth, max_depth)`.
///
/// Returns `None` when no pixel is valid.
///
/// # Example
///
/// ```
/// use scan_cloud::depth_statistics;
/// use scan_types::{CameraIntrinsics, DepthFrame};
///
/// let frame = DepthFrame::new(2, 2, vec![1.0, 2.0, 3.0, 0.0], CameraIntrinsics::centered(2.0, 2, 2));
/// let stats = depth_statistics(&frame, 0.1, 5.0).unwrap();
/// assert_eq!(stats.valid_count, 3);
/// assert_eq!(stats.median, 2.0);
/// ```
#[must_use]
pub fn depth_statistics(frame: &DepthFrame, min_depth: f32, max_depth: f32) -> Option<DepthStatistics> {
    let mut values: Vec<f32> = frame
        .depth
        .iter()
        .copied()
        .filter(|&d| is_valid_depth(d, min_depth, max_depth))
        .collect();
    if values.is_empty() {
        return None;
    }
    values.sort_unstable_by(f32::total_cmp);

    let n = values.len();
    let min = values[0];
    let max = values[n - 1];

    #[allow(clippy::cast_precision_loss)]
    let count = n as f64;
    let mean = values.iter().map(|&d| f64::from(d)).sum::<f64>() / count;
    let variance = values
        .iter()
        .map(|&d| (f64::from(d) - mean).powi(2))
        .sum::<f64>()
        / count;

    let median = if n % 2 == 0 {
        (values[n / 2 - 1] + values[n / 2]) / 2.0
    } else {
        values[n / 2]
    };

    let mut histogram = vec![0_u32; HISTOGRAM_BINS];
    let range = max - min;
    for &d in &values {
        let bin = if range > 0.0 {
            #[allow(clippy::cast_possible_truncation, clippy::cast_sign_loss, clippy::cast_precision_loss)]
            let b = ((d - min) / range * HISTOGRAM_BINS as f32) as usize;
            b.min(HISTOGRAM_BINS - 1)
        } else {
            0
        };
        histogram[bin] += 1;
    }

    #[allow(clippy::cast_possible_truncation)]
    let (mean, std_dev) = (mean as f32, variance.sqrt() as f32);
    Some(DepthStatistics {
        valid_count: n,
        total_count: frame.depth.len(),
        min,
        max,
        mean,
        median,
        std_dev,
        histogram,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;
    use scan_types::CameraIntrinsics;

    fn frame(depth: Vec<f32>) -> DepthFrame {
        let n = u32::try_from(depth.len()).unwrap();
        DepthFrame::new(n, 1, depth, CameraIntrinsics::centered(1.0, n, 1))
    }

    #[test]
    fn basic_statistics() {
        let stats = depth_statistics(&frame(vec![1.0, 2.0, 3.0, 4.0, f32::NAN, 9.0]), 0.1, 5.0).unwrap();
        assert_eq!(stats.valid_count, 4);
        assert_eq!(stats.total_count, 6);
        assert_relative_eq!(stats.min, 1.0);
        assert_relative_eq!(stats.max, 4.0);
        assert_relative_eq!(stats.mean, 2.5);
        assert_relative_eq!(stats.median, 2.5);
        assert_relative_eq!(stats.std_dev, 1.25_f32.sqrt(), epsilon = 1e-6);
        assert_relative_eq!(stats.valid_fraction(), 4.0 / 6.0);
    }

    #[test]
    fn histogram_covers_all_valid() {
        let stats = depth_statistics(&frame(vec![1.0, 1.5, 2.0, 2.5, 3.0]), 0.1, 5.0).unwrap();
        assert_eq!(stats.histogram.len(), HISTOGRAM_BINS);
        assert_eq!(stats.histogram.iter().sum::<u32>(), 5);
        assert_eq!(stats.histogram[0], 1);
        assert_eq!(stats.histogram[HISTOGRAM_BINS - 1], 1);
    }

    #[test]
    fn single_valued_range() {
        let stats = depth_statistics(&frame(vec![2.0; 4]), 0.1, 5.0).unwrap();
        assert_eq!(stats.histogram[0], 4);
        assert_relative_eq!(stats.std_dev, 0.0);
    }

    #[test]
    fn no_valid_pixels() {
        assert!(depth_statistics(&frame(vec![0.0, 7.0]), 0.1, 5.0).is_none());
    }
}
