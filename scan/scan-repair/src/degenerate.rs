//! Degenerate face removal.

use nalgebra::Point3;
use tracing::debug;

use scan_types::SurfacePatch;

/// Area of the triangle `(v0, v1, v2)`.
#[inline]
fn triangle_area(v0: &Point3<f64>, v1: &Point3<f64>, v2: &Point3<f64>) -> f64 {
    (v1 - v0).cross(&(v2 - v0)).norm() * 0.5
}

/// Returns true if `face` should be dropped from a mesh with `vertices`.
fn is_degenerate(face: &[u32; 3], vertices: &[Point3<f64>], area_threshold: f64) -> bool {
    let [a, b, c] = *face;
    if a == b || b == c || a == c {
        return true;
    }
    let n = vertices.len();
    if face.iter().any(|&i| i as usize >= n) {
        return true;
    }
    let area = triangle_area(&vertices[a as usize], &vertices[b as usize], &vertices[c as usize]);
    area.is_nan() || area < area_threshold
}

/// Removes faces with repeated indices, out-of-range indices, or an area
/// below `area_threshold`.
///
/// Vertices are left untouched (unreferenced vertices stay in the patch).
/// A per-face classification array is filtered alongside the faces. The
/// operation is idempotent.
///
/// Returns the cleaned patch and the number of faces removed.
///
/// # Example
///
/// ```
/// use nalgebra::Point3;
/// use scan_repair::remove_degenerate_faces;
/// use scan_types::{PatchId, SurfacePatch};
///
/// let patch = SurfacePatch::new(
///     PatchId(1),
///     vec![Point3::origin(), Point3::new(1.0, 0.0, 0.0), Point3::new(0.0, 1.0, 0.0)],
///     vec![[0, 1, 2], [0, 0, 1], [0, 1, 7]],
/// );
/// let (cleaned, removed) = remove_degenerate_faces(&patch, 1e-10);
/// assert_eq!(removed, 2);
/// assert_eq!(cleaned.faces, vec![[0, 1, 2]]);
/// ```
#[must_use]
pub fn remove_degenerate_faces(patch: &SurfacePatch, area_threshold: f64) -> (SurfacePatch, usize) {
    let keep: Vec<bool> = patch
        .faces
        .iter()
        .map(|f| !is_degenerate(f, &patch.vertices, area_threshold))
        .collect();
    let removed = keep.iter().filter(|&&k| !k).count();
    if removed == 0 {
        return (patch.clone(), 0);
    }

    let faces = patch
        .faces
        .iter()
        .zip(&keep)
        .filter_map(|(f, &k)| k.then_some(*f))
        .collect();

    let classification = if patch.has_face_classification() {
        patch.classification.as_ref().map(|classes| {
            classes
                .iter()
                .zip(&keep)
                .filter_map(|(c, &k)| k.then_some(*c))
                .collect()
        })
    } else {
        patch.classification.clone()
    };

    debug!(id = %patch.id, removed, "removed degenerate faces");

    (
        SurfacePatch {
            faces,
            classification,
            ..patch.clone()
        },
        removed,
    )
}
