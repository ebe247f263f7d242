//! Vertex normal computation from face geometry.

use nalgebra::{Point3, Vector3};

use crate::transform::up;

/// Computes area-weighted vertex normals from triangle faces.
///
/// Each face contributes its unnormalized cross product (twice its area) to
/// its three vertices. Faces with out-of-range indices are ignored. A vertex
/// whose accumulated normal has zero length keeps `previous[i]` when given
/// (and non-zero), otherwise it gets the up vector.
///
/// # Example
///
/// ```
/// use nalgebra::Point3;
/// use scan_types::compute_vertex_normals;
///
/// let vertices = vec![
///     Point3::new(0.0, 0.0, 0.0),
///     Point3::new(1.0, 0.0, 0.0),
///     Point3::new(0.0, 1.0, 0.0),
/// ];
/// let normals = compute_vertex_normals(&vertices, &[[0, 1, 2]], None);
/// assert!((normals[0].z - 1.0).abs() < 1e-12);
/// ```
#[must_use]
pub fn compute_vertex_normals(
    vertices: &[Point3<f64>],
    faces: &[[u32; 3]],
    previous: Option<&[Vector3<f64>]>,
) -> Vec<Vector3<f64>> {
    let mut accumulated = vec![Vector3::zeros(); vertices.len()];

    for face in faces {
        let [a, b, c] = face.map(|i| i as usize);
        if a >= vertices.len() || b >= vertices.len() || c >= vertices.len() {
            continue;
        }
        let weighted = (vertices[b] - vertices[a]).cross(&(vertices[c] - vertices[a]));
        accumulated[a] += weighted;
        accumulated[b] += weighted;
        accumulated[c] += weighted;
    }

    accumulated
        .into_iter()
        .enumerate()
        .map(|(i, n)| {
            n.try_normalize(f64::EPSILON).unwrap_or_else(|| {
                previous
                    .and_then(|prev| prev.get(i))
                    .and_then(|p| p.try_normalize(f64::EPSILON))
                    .unwrap_or_else(up)
            })
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;

    #[test]
    fn area_weighting_favors_large_faces() {
        // Vertex 0 is shared by a large face in the XY plane and a small one in XZ.
        let vertices = vec![
            Point3::new(0.0, 0.0, 0.0),
            Point3::new(10.0, 0.0, 0.0),
            Point3::new(0.0, 10.0, 0.0),
            Point3::new(0.0, 0.0, 0.1),
        ];
        let faces = [[0, 1, 2], [0, 3, 1]];
        let normals = compute_vertex_normals(&vertices, &faces, None);
        assert!(normals[0].z > 0.9);
        assert_relative_eq!(normals[2], Vector3::z(), epsilon = 1e-12);
    }

    #[test]
    fn isolated_vertex_keeps_previous() {
        let vertices = vec![
            Point3::new(0.0, 0.0, 0.0),
            Point3::new(1.0, 0.0, 0.0),
            Point3::new(0.0, 1.0, 0.0),
            Point3::new(5.0, 5.0, 5.0),
        ];
        let previous = vec![Vector3::x(); 4];
        let normals = compute_vertex_normals(&vertices, &[[0, 1, 2]], Some(&previous));
        assert_relative_eq!(normals[3], Vector3::x());

        let normals = compute_vertex_normals(&vertices, &[[0, 1, 2]], None);
        assert_relative_eq!(normals[3], up());
    }

    #[test]
    fn out_of_range_face_ignored() {
        let vertices = vec![Point3::origin(); 2];
        let normals = compute_vertex_normals(&vertices, &[[0, 1, 7]], None);
        assert_eq!(normals.len(), 2);
        assert_relative_eq!(normals[0], up());
    }
}
