//! Boundary-preserving Laplacian smoothing and normal smoothing.

use nalgebra::{Point3, Vector3};
use tracing::debug;

use scan_types::{SurfacePatch, compute_vertex_normals};

use crate::adjacency::MeshAdjacency;

/// Moves every interior vertex toward the centroid of its neighbors.
///
/// Each of the `iterations` passes computes, from the previous pass's
/// positions, `v' = v + lambda * (centroid(neighbors) - v)`. Boundary
/// vertices (endpoints of an edge used by exactly one face) and isolated
/// vertices stay fixed so open edges do not shrink. `lambda = 0` or zero
/// iterations return the input unchanged.
///
/// Faces with out-of-range indices are ignored when building adjacency.
///
/// # Example
///
/// ```
/// use nalgebra::Point3;
/// use scan_repair::laplacian_smooth;
/// use scan_types::{PatchId, SurfacePatch};
///
/// let patch = SurfacePatch::new(
///     PatchId(1),
///     vec![Point3::origin(), Point3::new(1.0, 0.0, 0.0), Point3::new(0.0, 1.0, 0.0)],
///     vec![[0, 1, 2]],
/// );
/// // A lone triangle is all boundary, so nothing moves.
/// assert_eq!(laplacian_smooth(&patch, 3, 0.5).vertices, patch.vertices);
/// ```
#[must_use]
pub fn laplacian_smooth(patch: &SurfacePatch, iterations: u32, lambda: f64) -> SurfacePatch {
    if iterations == 0 || lambda == 0.0 || patch.is_empty() {
        return patch.clone();
    }

    let adjacency = MeshAdjacency::build(&patch.faces, patch.vertex_count());
    let movable: Vec<u32> = (0..adjacency.vertex_count())
        .filter_map(|v| u32::try_from(v).ok())
        .filter(|&v| !adjacency.is_boundary_vertex(v) && !adjacency.neighbors(v).is_empty())
        .collect();

    let mut current = patch.vertices.clone();
    for _ in 0..iterations {
        let previous = current.clone();
        for &v in &movable {
            let neighbors = adjacency.neighbors(v);
            let sum = neighbors
                .iter()
                .fold(Vector3::zeros(), |acc, &n| acc + previous[n as usize].coords);
            #[allow(clippy::cast_precision_loss)]
            let centroid = Point3::from(sum / neighbors.len() as f64);
            let p = previous[v as usize];
            current[v as usize] = p + (centroid - p) * lambda;
        }
    }

    debug!(id = %patch.id, iterations, lambda, moved = movable.len(), "laplacian smoothing");

    SurfacePatch {
        vertices: current,
        ..patch.clone()
    }
}

/// Smooths vertex normals over the mesh adjacency.
///
/// Each pass replaces a normal with the normalized sum of itself and its
/// neighbors' normals from the previous pass; a zero-length sum keeps the
/// prior normal. A patch without normals gets area-weighted normals
/// computed from its faces first.
#[must_use]
pub fn smooth_normals(patch: &SurfacePatch, iterations: u32) -> SurfacePatch {
    if patch.is_empty() {
        return patch.clone();
    }

    let mut current = if patch.has_normals() {
        patch.normals.clone()
    } else {
        compute_vertex_normals(&patch.vertices, &patch.faces, None)
    };

    if iterations > 0 {
        let adjacency = MeshAdjacency::build(&patch.faces, patch.vertex_count());
        for _ in 0..iterations {
            let previous = current.clone();
            for (v, normal) in current.iter_mut().enumerate() {
                let Ok(index) = u32::try_from(v) else {
                    break;
                };
                let sum = adjacency
                    .neighbors(index)
                    .iter()
                    .fold(previous[v], |acc, &n| acc + previous[n as usize]);
                if let Some(n) = sum.try_normalize(f64::EPSILON) {
                    *normal = n;
                }
            }
        }
    }

    SurfacePatch {
        normals: current,
        ..patch.clone()
    }
}
