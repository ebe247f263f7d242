//! Vertex and edge adjacency for surface patches.
//!
//! Built once per operation from the face list; vertices are plain indices.

use hashbrown::HashMap;

/// Undirected adjacency of a triangle mesh.
///
/// Provides lookups for:
/// - The neighbors of a vertex (deduplicated, ascending)
/// - The number of faces using an edge
/// - Boundary edges (edges with exactly one adjacent face) and their vertices
#[derive(Debug, Clone)]
pub struct MeshAdjacency {
    /// Sorted, deduplicated neighbor indices per vertex.
    neighbors: Vec<Vec<u32>>,
    /// Maps edge (v0, v1), v0 < v1, to the number of faces using it.
    edge_faces: HashMap<(u32, u32), u32>,
    /// True for endpoints of boundary edges.
    boundary: Vec<bool>,
}

impl MeshAdjacency {
    /// Builds adjacency for `vertex_count` vertices.
    ///
    /// Faces with an index `>= vertex_count` are ignored. Repeated indices
    /// within a face never make a vertex its own neighbor.
    ///
    /// # Example
    ///
    /// ```
    /// use scan_repair::MeshAdjacency;
    ///
    /// let adj = MeshAdjacency::build(&[[0, 1, 2], [1, 3, 2]], 4);
    /// assert_eq!(adj.neighbors(1), &[0, 2, 3]);
    /// assert_eq!(adj.boundary_edge_count(), 4);
    /// ```
    #[must_use]
    pub fn build(faces: &[[u32; 3]], vertex_count: usize) -> Self {
        let mut neighbors = vec![Vec::new(); vertex_count];
        let mut edge_faces: HashMap<(u32, u32), u32> = HashMap::new();

        for face in faces {
            if face.iter().any(|&i| i as usize >= vertex_count) {
                continue;
            }
            for k in 0..3 {
                let (a, b) = (face[k], face[(k + 1) % 3]);
                if a == b {
                    continue;
                }
                neighbors[a as usize].push(b);
                neighbors[b as usize].push(a);
                *edge_faces.entry(normalize_edge(a, b)).or_default() += 1;
            }
        }

        for list in &mut neighbors {
            list.sort_unstable();
            list.dedup();
        }

        let mut boundary = vec![false; vertex_count];
        for (&(a, b), &count) in &edge_faces {
            if count == 1 {
                boundary[a as usize] = true;
                boundary[b as usize] = true;
            }
        }

        Self {
            neighbors,
            edge_faces,
            boundary,
        }
    }

    /// Number of vertices this adjacency was built for.
    #[must_use]
    pub fn vertex_count(&self) -> usize {
        self.neighbors.len()
    }

    /// Neighbors of vertex `v`, ascending. Empty for isolated or unknown vertices.
    #[must_use]
    pub fn neighbors(&self, v: u32) -> &[u32] {
        self.neighbors.get(v as usize).map_or(&[], Vec::as_slice)
    }

    /// Returns true if `v` is an endpoint of a boundary edge.
    #[must_use]
    pub fn is_boundary_vertex(&self, v: u32) -> bool {
        self.boundary.get(v as usize).copied().unwrap_or(false)
    }

    /// Number of faces using the edge between `v0` and `v1`.
    #[must_use]
    pub fn edge_face_count(&self, v0: u32, v1: u32) -> u32 {
        self.edge_faces
            .get(&normalize_edge(v0, v1))
            .copied()
            .unwrap_or(0)
    }

    /// Boundary edges as `(low, high)` pairs, ascending.
    #[must_use]
    pub fn boundary_edges(&self) -> Vec<(u32, u32)> {
        let mut edges: Vec<(u32, u32)> = self
            .edge_faces
            .iter()
            .filter(|&(_, &count)| count == 1)
            .map(|(&edge, _)| edge)
            .collect();
        edges.sort_unstable();
        edges
    }

    /// Count the number of boundary edges.
    #[must_use]
    pub fn boundary_edge_count(&self) -> usize {
        self.edge_faces.values().filter(|&&count| count == 1).count()
    }

    /// Get the total number of edges.
    #[must_use]
    pub fn edge_count(&self) -> usize {
        self.edge_faces.len()
    }
}

/// Normalize edge direction so v0 < v1.
#[inline]
fn normalize_edge(v0: u32, v1: u32) -> (u32, u32) {
    if v0 < v1 { (v0, v1) } else { (v1, v0) }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn two_triangles_sharing_edge() -> Vec<[u32; 3]> {
        vec![[0, 1, 2], [1, 3, 2]]
    }

    #[test]
    fn neighbors_deduplicated() {
        let adj = MeshAdjacency::build(&two_triangles_sharing_edge(), 4);
        assert_eq!(adj.neighbors(2), &[0, 1, 3]);
        assert_eq!(adj.neighbors(0), &[1, 2]);
        assert_eq!(adj.edge_count(), 5);
    }

    #[test]
    fn edge_face_counts() {
        let adj = MeshAdjacency::build(&two_triangles_sharing_edge(), 4);
        assert_eq!(adj.edge_face_count(1, 2), 2);
        assert_eq!(adj.edge_face_count(2, 1), 2);
        assert_eq!(adj.edge_face_count(0, 1), 1);
        assert_eq!(adj.edge_face_count(0, 3), 0);
    }

    #[test]
    fn boundary_of_open_strip() {
        let adj = MeshAdjacency::build(&two_triangles_sharing_edge(), 4);
        assert_eq!(adj.boundary_edges(), vec![(0, 1), (0, 2), (1, 3), (2, 3)]);
        assert!((0..4).all(|v| adj.is_boundary_vertex(v)));
    }

    #[test]
    fn closed_tetrahedron_has_no_boundary() {
        let faces = [[0, 1, 2], [0, 3, 1], [1, 3, 2], [2, 3, 0]];
        let adj = MeshAdjacency::build(&faces, 4);
        assert_eq!(adj.boundary_edge_count(), 0);
        assert!(!adj.is_boundary_vertex(0));
    }

    #[test]
    fn isolated_and_out_of_range() {
        let adj = MeshAdjacency::build(&[[0, 1, 2], [0, 1, 9]], 4);
        assert!(adj.neighbors(3).is_empty());
        assert!(adj.neighbors(99).is_empty());
        assert_eq!(adj.edge_count(), 3);
    }

    #[test]
    fn repeated_index_not_self_neighbor() {
        let adj = MeshAdjacency::build(&[[0, 0, 1]], 2);
        assert_eq!(adj.neighbors(0), &[1]);
    }
}
