//! Depth frames from the capture service.

use nalgebra::Matrix4;

#[cfg(feature = "serde")]
use serde::{Deserialize, Serialize};

use crate::error::{ScanError, ScanResult};
use crate::{CameraIntrinsics, Timestamp};

/// Per-pixel confidence reported by the depth sensor.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub enum ConfidenceLevel {
    /// Raw code 0.
    Low,
    /// Raw code 1.
    Medium,
    /// Raw code 2.
    High,
}

impl ConfidenceLevel {
    /// Decodes a raw sensor confidence code. Codes above 2 saturate to `High`.
    #[must_use]
    pub const fn from_code(code: u8) -> Self {
        match code {
            0 => Self::Low,
            1 => Self::Medium,
            _ => Self::High,
        }
    }

    /// Normalized confidence in `[0, 1]` (`code / 2`).
    #[must_use]
    pub const fn value(self) -> f32 {
        match self {
            Self::Low => 0.0,
            Self::Medium => 0.5,
            Self::High => 1.0,
        }
    }
}

/// A depth frame with camera calibration and pose.
///
/// # Depth Values
///
/// - Depth is stored in meters as `f32`, row-major: `depth[y * width + x]`
/// - Zero, `NaN`, and out-of-range values are invalid
/// - `confidence`, when present, holds raw codes 0 (low) to 2 (high)
///
/// # Example
///
/// ```
/// use scan_types::{CameraIntrinsics, DepthFrame};
///
/// let frame = DepthFrame::new(4, 4, vec![1.0; 16], CameraIntrinsics::centered(4.0, 4, 4));
/// assert!(frame.validate().is_ok());
/// assert_eq!(frame.get(3, 3), Some(1.0));
/// ```
#[derive(Debug, Clone, PartialEq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct DepthFrame {
    /// Image width in pixels.
    pub width: u32,
    /// Image height in pixels.
    pub height: u32,
    /// Per-pixel depth in meters.
    pub depth: Vec<f32>,
    /// Optional per-pixel confidence codes (0, 1, 2).
    pub confidence: Option<Vec<u8>>,
    /// Camera intrinsics at the depth resolution.
    pub intrinsics: CameraIntrinsics,
    /// Camera-to-world transform at capture time.
    pub camera_transform: Matrix4<f64>,
    /// Capture time.
    pub timestamp: Timestamp,
}

impl DepthFrame {
    /// Creates a frame with identity pose, no confidence map, and zero timestamp.
    #[must_use]
    pub fn new(width: u32, height: u32, depth: Vec<f32>, intrinsics: CameraIntrinsics) -> Self {
        Self {
            width,
            height,
            depth,
            confidence: None,
            intrinsics,
            camera_transform: Matrix4::identity(),
            timestamp: Timestamp::zero(),
        }
    }

    /// Attaches a confidence map.
    #[must_use]
    pub fn with_confidence(mut self, confidence: Vec<u8>) -> Self {
        self.confidence = Some(confidence);
        self
    }

    /// Sets the camera-to-world transform.
    #[must_use]
    pub fn with_camera_transform(mut self, camera_transform: Matrix4<f64>) -> Self {
        self.camera_transform = camera_transform;
        self
    }

    /// Sets the capture timestamp.
    #[must_use]
    pub fn with_timestamp(mut self, timestamp: Timestamp) -> Self {
        self.timestamp = timestamp;
        self
    }

    /// Returns `width * height`.
    #[must_use]
    pub const fn pixel_count(&self) -> usize {
        self.width as usize * self.height as usize
    }

    /// Checks buffer sizes and intrinsics.
    ///
    /// # Errors
    ///
    /// Returns [`ScanError::BufferSizeMismatch`] when the depth or confidence
    /// buffer does not hold `width * height` values, and
    /// [`ScanError::InvalidConfiguration`] for unusable intrinsics.
    pub fn validate(&self) -> ScanResult<()> {
        let expected = self.pixel_count();
        if self.depth.len() != expected {
            return Err(ScanError::buffer_mismatch(expected, self.depth.len()));
        }
        if let Some(confidence) = &self.confidence {
            if confidence.len() != expected {
                return Err(ScanError::buffer_mismatch(expected, confidence.len()));
            }
        }
        self.intrinsics.validate()
    }

    /// Row-major buffer index for a pixel, or `None` if out of bounds.
    #[must_use]
    pub const fn index(&self, x: u32, y: u32) -> Option<usize> {
        if x >= self.width || y >= self.height {
            return None;
        }
        Some(y as usize * self.width as usize + x as usize)
    }

    /// Depth at a pixel, or `None` if out of bounds.
    #[must_use]
    pub fn get(&self, x: u32, y: u32) -> Option<f32> {
        self.index(x, y).and_then(|i| self.depth.get(i).copied())
    }

    /// Normalized confidence at a buffer index.
    ///
    /// Frames without a confidence map report full confidence.
    #[must_use]
    pub fn confidence_at(&self, index: usize) -> f32 {
        self.confidence
            .as_ref()
            .and_then(|c| c.get(index))
            .map_or(1.0, |&code| ConfidenceLevel::from_code(code).value())
    }

    /// Normalized confidence map, if the frame carries one.
    #[must_use]
    pub fn confidence_values(&self) -> Option<Vec<f32>> {
        self.confidence.as_ref().map(|codes| {
            codes
                .iter()
                .map(|&code| ConfidenceLevel::from_code(code).value())
                .collect()
        })
    }
}

/// Returns true if `depth` is finite and strictly inside `(min_depth, max_depth)`.
#[inline]
#[must_use]
pub fn is_valid_depth(depth: f32, min_depth: f32, max_depth: f32) -> bool {
    depth.is_finite() && depth > min_depth && depth < max_depth
}

#[cfg(test)]
mod tests {
    use super::*;

    fn frame() -> DepthFrame {
        DepthFrame::new(4, 3, vec![1.0; 12], CameraIntrinsics::centered(4.0, 4, 3))
    }

    #[test]
    fn confidence_levels() {
        assert_eq!(ConfidenceLevel::from_code(0), ConfidenceLevel::Low);
        assert_eq!(ConfidenceLevel::from_code(1), ConfidenceLevel::Medium);
        assert_eq!(ConfidenceLevel::from_code(2), ConfidenceLevel::High);
        assert_eq!(ConfidenceLevel::from_code(7), ConfidenceLevel::High);
        assert!((ConfidenceLevel::Medium.value() - 0.5).abs() < f32::EPSILON);
    }

    #[test]
    fn validate_size_mismatch() {
        let mut f = frame();
        f.depth.pop();
        assert_eq!(f.validate(), Err(ScanError::buffer_mismatch(12, 11)));
    }

    #[test]
    fn validate_confidence_mismatch() {
        let f = frame().with_confidence(vec![2; 5]);
        assert_eq!(f.validate(), Err(ScanError::buffer_mismatch(12, 5)));
    }

    #[test]
    fn validate_bad_intrinsics() {
        let mut f = frame();
        f.intrinsics.fx = 0.0;
        assert!(matches!(
            f.validate(),
            Err(ScanError::InvalidConfiguration { .. })
        ));
    }

    #[test]
    fn indexing() {
        let f = frame();
        assert_eq!(f.index(1, 2), Some(9));
        assert_eq!(f.index(4, 0), None);
        assert_eq!(f.get(0, 3), None);
    }

    #[test]
    fn confidence_defaults_to_full() {
        let f = frame();
        assert!((f.confidence_at(0) - 1.0).abs() < f32::EPSILON);
        assert!(f.confidence_values().is_none());

        let f = frame().with_confidence(vec![1; 12]);
        assert!((f.confidence_at(3) - 0.5).abs() < f32::EPSILON);
    }

    #[test]
    fn depth_validity() {
        assert!(is_valid_depth(1.0, 0.1, 5.0));
        assert!(!is_valid_depth(0.1, 0.1, 5.0));
        assert!(!is_valid_depth(5.0, 0.1, 5.0));
        assert!(!is_valid_depth(f32::NAN, 0.1, 5.0));
        assert!(!is_valid_depth(0.0, 0.1, 5.0));
    }
}
