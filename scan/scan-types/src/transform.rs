//! Homogeneous transform helpers.
//!
//! Poses and patch transforms are 4×4 local-to-world matrices. These helpers
//! apply them to points, directions and normals without repeating the
//! homogeneous bookkeeping at every call site.

use nalgebra::{Matrix3, Matrix4, Point3, Vector3};

/// The world up vector (+Y, gravity-aligned capture convention).
#[must_use]
pub fn up() -> Vector3<f64> {
    Vector3::new(0.0, 1.0, 0.0)
}

/// Applies a 4×4 transform to a point.
#[inline]
#[must_use]
pub fn transform_point(m: &Matrix4<f64>, p: &Point3<f64>) -> Point3<f64> {
    m.transform_point(p)
}

/// Applies the linear part of a 4×4 transform to a direction.
#[inline]
#[must_use]
pub fn transform_vector(m: &Matrix4<f64>, v: &Vector3<f64>) -> Vector3<f64> {
    m.transform_vector(v)
}

/// Returns the translation column of a 4×4 transform.
#[inline]
#[must_use]
pub fn translation(m: &Matrix4<f64>) -> Point3<f64> {
    Point3::new(m[(0, 3)], m[(1, 3)], m[(2, 3)])
}

/// Returns the matrix that maps normals under `m`.
///
/// This is the inverse-transpose of the linear part. When the linear part is
/// singular the linear part itself is returned.
#[must_use]
pub fn normal_matrix(m: &Matrix4<f64>) -> Matrix3<f64> {
    let linear: Matrix3<f64> = m.fixed_view::<3, 3>(0, 0).into_owned();
    linear
        .try_inverse()
        .map_or(linear, |inverse| inverse.transpose())
}

/// Transforms a normal and re-normalizes it.
///
/// Falls back to `fallback` when the transformed normal has zero length.
#[must_use]
pub fn transform_normal(
    normal_matrix: &Matrix3<f64>,
    n: &Vector3<f64>,
    fallback: Vector3<f64>,
) -> Vector3<f64> {
    (normal_matrix * n).try_normalize(f64::EPSILON).unwrap_or(fallback)
}
