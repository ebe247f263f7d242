//! Pinhole camera model.

use nalgebra::{Matrix3, Point3};

#[cfg(feature = "serde")]
use serde::{Deserialize, Serialize};

use crate::error::{ScanError, ScanResult};

/// Camera intrinsic parameters (pinhole model, no distortion).
///
/// Camera space has +Z pointing forward along the optical axis, so a pixel
/// `(u, v)` at depth `d` back-projects to:
///
/// ```text
/// X = (u - cx) / fx * d
/// Y = (v - cy) / fy * d
/// Z = d
/// ```
///
/// # Example
///
/// ```
/// use scan_types::CameraIntrinsics;
///
/// let k = CameraIntrinsics::new(500.0, 500.0, 320.0, 240.0);
/// let p = k.unproject(320.0, 240.0, 2.0);
/// assert_eq!(p.z, 2.0);
/// assert_eq!(k.project(&p), Some((320.0, 240.0)));
/// ```
#[derive(Debug, Clone, Copy, PartialEq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct CameraIntrinsics {
    /// Focal length in pixels (x direction).
    pub fx: f64,
    /// Focal length in pixels (y direction).
    pub fy: f64,
    /// Principal point x-coordinate in pixels.
    pub cx: f64,
    /// Principal point y-coordinate in pixels.
    pub cy: f64,
}

impl CameraIntrinsics {
    /// Creates new camera intrinsics.
    #[must_use]
    pub const fn new(fx: f64, fy: f64, cx: f64, cy: f64) -> Self {
        Self { fx, fy, cx, cy }
    }

    /// Creates ideal intrinsics with the principal point at the image center.
    #[must_use]
    pub fn centered(focal: f64, width: u32, height: u32) -> Self {
        Self::new(
            focal,
            focal,
            f64::from(width) / 2.0,
            f64::from(height) / 2.0,
        )
    }

    /// Reads intrinsics from a 3×3 camera matrix `K`.
    ///
    /// ```text
    /// | fx  0  cx |
    /// |  0 fy  cy |
    /// |  0  0   1 |
    /// ```
    #[must_use]
    pub fn from_matrix(k: &Matrix3<f64>) -> Self {
        Self::new(k[(0, 0)], k[(1, 1)], k[(0, 2)], k[(1, 2)])
    }

    /// Returns the 3×3 camera matrix `K`.
    #[must_use]
    pub fn to_matrix(&self) -> Matrix3<f64> {
        Matrix3::new(
            self.fx, 0.0, self.cx, //
            0.0, self.fy, self.cy, //
            0.0, 0.0, 1.0,
        )
    }

    /// Checks that both focal lengths are positive and all values finite.
    ///
    /// # Errors
    ///
    /// Returns [`ScanError::InvalidConfiguration`] for a non-positive or
    /// non-finite focal length or principal point.
    pub fn validate(&self) -> ScanResult<()> {
        if !(self.fx.is_finite() && self.fy.is_finite() && self.fx > 0.0 && self.fy > 0.0) {
            return Err(ScanError::invalid_config(format!(
                "focal length must be positive, got fx={} fy={}",
                self.fx, self.fy
            )));
        }
        if !(self.cx.is_finite() && self.cy.is_finite()) {
            return Err(ScanError::invalid_config("principal point must be finite"));
        }
        Ok(())
    }

    /// Back-projects pixel `(u, v)` at depth `depth` into camera space.
    #[must_use]
    pub fn unproject(&self, u: f64, v: f64, depth: f64) -> Point3<f64> {
        Point3::new(
            (u - self.cx) / self.fx * depth,
            (v - self.cy) / self.fy * depth,
            depth,
        )
    }

    /// Projects a camera-space point to pixel coordinates.
    ///
    /// Returns `None` for points on or behind the image plane.
    #[must_use]
    pub fn project(&self, point: &Point3<f64>) -> Option<(f64, f64)> {
        if point.z <= 0.0 {
            return None;
        }
        Some((
            self.fx * point.x / point.z + self.cx,
            self.fy * point.y / point.z + self.cy,
        ))
    }
}
