//! Boundary loop detection and fan filling of small holes.
//!
//! A hole is a closed loop of boundary edges (edges with only one adjacent
//! face). Small holes are closed by adding one vertex at the loop centroid
//! and connecting every loop edge to it.

use hashbrown::{HashMap, HashSet};
use nalgebra::{Point3, Vector3};
use tracing::{debug, info, warn};

#[cfg(feature = "serde")]
use serde::{Deserialize, Serialize};

use scan_types::{SurfacePatch, up};

use crate::adjacency::MeshAdjacency;

/// A chain of boundary vertices found by walking boundary edges.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BoundaryLoop {
    /// Vertex indices in walk order.
    pub vertices: Vec<u32>,
    /// True if the last vertex connects back to the first.
    pub closed: bool,
}

impl BoundaryLoop {
    /// Number of boundary edges in the loop.
    #[must_use]
    pub fn edge_count(&self) -> usize {
        if self.closed {
            self.vertices.len()
        } else {
            self.vertices.len().saturating_sub(1)
        }
    }
}

/// Outcome of [`fill_small_holes`].
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct HoleFillReport {
    /// Closed loops that were filled.
    pub filled: usize,
    /// Closed loops left open because they exceed the size bound.
    pub skipped_large: usize,
    /// Boundary chains that do not close.
    pub skipped_open: usize,
    /// Centroid vertices added.
    pub vertices_added: usize,
    /// Fan triangles added.
    pub faces_added: usize,
}

/// Groups the boundary edges of a mesh into loops.
///
/// Boundary vertices are visited in ascending order. Each walk starts at the
/// smallest unvisited boundary vertex and repeatedly moves to its smallest
/// unvisited boundary neighbor until none remain. The walk is closed when it
/// has at least three vertices and its last vertex shares a boundary edge
/// with its first.
///
/// # Example
///
/// ```
/// use scan_repair::detect_boundary_loops;
///
/// // A single triangle is bounded by one 3-edge loop.
/// let loops = detect_boundary_loops(&[[0, 1, 2]], 3);
/// assert_eq!(loops.len(), 1);
/// assert!(loops[0].closed);
/// assert_eq!(loops[0].edge_count(), 3);
/// ```
#[must_use]
pub fn detect_boundary_loops(faces: &[[u32; 3]], vertex_count: usize) -> Vec<BoundaryLoop> {
    let adjacency = MeshAdjacency::build(faces, vertex_count);
    let boundary_edges = adjacency.boundary_edges();
    if boundary_edges.is_empty() {
        return Vec::new();
    }

    let mut edge_neighbors: HashMap<u32, Vec<u32>> = HashMap::new();
    for &(a, b) in &boundary_edges {
        edge_neighbors.entry(a).or_default().push(b);
        edge_neighbors.entry(b).or_default().push(a);
    }
    for list in edge_neighbors.values_mut() {
        list.sort_unstable();
    }

    let mut starts: Vec<u32> = edge_neighbors.keys().copied().collect();
    starts.sort_unstable();

    let mut visited: HashSet<u32> = HashSet::new();
    let mut loops = Vec::new();

    for start in starts {
        if visited.contains(&start) {
            continue;
        }

        let mut vertices = Vec::new();
        let mut current = start;
        loop {
            visited.insert(current);
            vertices.push(current);
            let next = edge_neighbors
                .get(&current)
                .and_then(|n| n.iter().find(|v| !visited.contains(*v)));
            match next {
                Some(&n) => current = n,
                None => break,
            }
        }

        let closed = vertices.len() >= 3
            && edge_neighbors
                .get(&current)
                .is_some_and(|n| n.binary_search(&start).is_ok());
        loops.push(BoundaryLoop { vertices, closed });
    }

    debug!(
        boundary_edges = boundary_edges.len(),
        loops = loops.len(),
        "detected boundary loops"
    );

    loops
}

/// Closes every boundary loop with `3..=max_hole_edges` edges.
///
/// For each such loop one vertex is added at the centroid of the loop
/// vertices and one triangle per loop edge connects the edge to it. Fan
/// triangles take the orientation opposite to the existing face on each
/// edge, so the filled surface stays consistently wound. When the patch has
/// normals, the new vertex gets the normalized sum of the loop normals (up
/// when that sum vanishes). Per-face classification is extended with `0`
/// for new faces, per-vertex classification with `0` for new vertices, and
/// texture coordinates with the loop mean.
///
/// Larger loops and open chains are left untouched and counted in the
/// report. A patch that fails [`SurfacePatch::validate`] (out-of-range faces
/// or attribute arrays of the wrong length) is returned unchanged with an
/// empty report.
#[must_use]
pub fn fill_small_holes(patch: &SurfacePatch, max_hole_edges: usize) -> (SurfacePatch, HoleFillReport) {
    if let Err(e) = patch.validate() {
        warn!(id = %patch.id, error = %e, "hole filling skipped for invalid patch");
        return (patch.clone(), HoleFillReport::default());
    }

    let loops = detect_boundary_loops(&patch.faces, patch.vertex_count());
    let mut report = HoleFillReport::default();
    if loops.is_empty() {
        return (patch.clone(), report);
    }

    let directed: HashSet<(u32, u32)> = patch
        .faces
        .iter()
        .flat_map(|f| [(f[0], f[1]), (f[1], f[2]), (f[2], f[0])])
        .collect();

    let face_classes = patch.has_face_classification();
    let vertex_classes = !face_classes
        && patch
            .classification
            .as_ref()
            .is_some_and(|c| c.len() == patch.vertex_count());
    let with_normals = patch.has_normals();

    let mut out = patch.clone();

    for boundary in &loops {
        if !boundary.closed {
            report.skipped_open += 1;
            continue;
        }
        let n = boundary.edge_count();
        if n < 3 || n > max_hole_edges {
            report.skipped_large += 1;
            continue;
        }
        let Ok(center) = u32::try_from(out.vertices.len()) else {
            break;
        };

        let idx: Vec<usize> = boundary.vertices.iter().map(|&v| v as usize).collect();
        #[allow(clippy::cast_precision_loss)]
        let count = n as f64;
        let sum = idx
            .iter()
            .fold(Vector3::zeros(), |acc, &i| acc + patch.vertices[i].coords);
        out.vertices.push(Point3::from(sum / count));

        if with_normals {
            let normal = idx
                .iter()
                .fold(Vector3::zeros(), |acc, &i| acc + patch.normals[i])
                .try_normalize(f64::EPSILON)
                .unwrap_or_else(up);
            out.normals.push(normal);
        }

        if let Some(uv) = out.texture_coordinates.as_mut() {
            if let Some(mean) = mean_uv(uv, &idx) {
                uv.push(mean);
            }
        }

        for k in 0..n {
            let a = boundary.vertices[k];
            let b = boundary.vertices[(k + 1) % n];
            let face = if directed.contains(&(a, b)) {
                [b, a, center]
            } else {
                [a, b, center]
            };
            out.faces.push(face);
        }

        if let Some(classes) = out.classification.as_mut() {
            if face_classes {
                classes.extend(std::iter::repeat_n(0, n));
            } else if vertex_classes {
                classes.push(0);
            }
        }

        report.filled += 1;
        report.vertices_added += 1;
        report.faces_added += n;
    }

    if report.filled > 0 {
        info!(
            id = %patch.id,
            filled = report.filled,
            skipped_large = report.skipped_large,
            faces_added = report.faces_added,
            "filled small holes"
        );
    }

    (out, report)
}

/// Mean of the texture coordinates at `indices`, if all are present.
fn mean_uv(uv: &[[f32; 2]], indices: &[usize]) -> Option<[f32; 2]> {
    if indices.is_empty() || indices.iter().any(|&i| i >= uv.len()) {
        return None;
    }
    let (u, v) = indices
        .iter()
        .fold((0.0_f32, 0.0_f32), |(u, v), &i| (u + uv[i][0], v + uv[i][1]));
    #[allow(clippy::cast_precision_loss)]
    let count = indices.len() as f32;
    Some([u / count, v / count])
}
