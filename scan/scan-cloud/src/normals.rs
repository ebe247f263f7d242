//! Normal estimation from depth image gradients.
//!
//! For a pixel with depth `z`, central differences give the image-space
//! slopes `gx = dz/du` and `gy = dz/dv`. Scaling by `f/z` converts them to
//! metric slopes, and the surface normal in camera space is
//! `normalize(gx·fx/z, gy·fy/z, -1)`, which faces the camera.

use nalgebra::Vector3;

use scan_types::{DepthFrame, is_valid_depth};

/// Camera-space normal at pixel `(x, y)` from central depth differences.
///
/// Returns `None` at the image border or when the pixel or any of its four
/// neighbors lies outside `(min_depth, max_depth)`.
#[must_use]
pub fn depth_gradient_normal(
    frame: &DepthFrame,
    x: u32,
    y: u32,
    min_depth: f32,
    max_depth: f32,
) -> Option<Vector3<f64>> {
    if x == 0 || y == 0 {
        return None;
    }
    let valid = |x: u32, y: u32| {
        frame
            .get(x, y)
            .filter(|&d| is_valid_depth(d, min_depth, max_depth))
            .map(f64::from)
    };

    let z = valid(x, y)?;
    let left = valid(x - 1, y)?;
    let right = valid(x + 1, y)?;
    let above = valid(x, y - 1)?;
    let below = valid(x, y + 1)?;

    let gx = (right - left) / 2.0;
    let gy = (below - above) / 2.0;
    let k = &frame.intrinsics;

    Vector3::new(gx * k.fx / z, gy * k.fy / z, -1.0).try_normalize(f64::EPSILON)
}
