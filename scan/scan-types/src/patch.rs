//! Surface patches emitted by the capture service.

use std::fmt;

use nalgebra::{Matrix4, Point3, Vector3};
use tracing::warn;

#[cfg(feature = "serde")]
use serde::{Deserialize, Serialize};

use crate::error::{ScanError, ScanResult};
use crate::transform::{normal_matrix, transform_normal, up};

/// Stable identifier of a surface patch, assigned by the capture service.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Default)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct PatchId(pub u128);

impl fmt::Display for PatchId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:032x}", self.0)
    }
}

/// A locally consistent fragment of reconstructed geometry.
///
/// Vertices and normals are in the patch's local frame; `transform` maps
/// local coordinates to world coordinates.
///
/// # Invariants
///
/// - Every face index is `< vertices.len()`
/// - `normals` is empty or has one entry per vertex
/// - `classification`, when present, has one entry per face or per vertex
/// - `texture_coordinates`, when present, has one entry per vertex
///
/// [`validate`](Self::validate) checks all of these.
///
/// # Example
///
/// ```
/// use nalgebra::Point3;
/// use scan_types::{PatchId, SurfacePatch};
///
/// let patch = SurfacePatch::new(
///     PatchId(7),
///     vec![Point3::origin(), Point3::new(1.0, 0.0, 0.0), Point3::new(0.0, 1.0, 0.0)],
///     vec![[0, 1, 2]],
/// );
/// assert!(patch.validate().is_ok());
/// assert_eq!(patch.face_count(), 1);
/// ```
#[derive(Debug, Clone, PartialEq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct SurfacePatch {
    /// Capture-service identifier.
    pub id: PatchId,
    /// Incremented by the patch store each time the patch is replaced.
    pub revision: u64,
    /// Local-to-world transform.
    pub transform: Matrix4<f64>,
    /// Vertex positions in the local frame.
    pub vertices: Vec<Point3<f64>>,
    /// Unit vertex normals in the local frame.
    pub normals: Vec<Vector3<f64>>,
    /// Triangle vertex indices.
    pub faces: Vec<[u32; 3]>,
    /// Optional semantic class per face (or per vertex).
    pub classification: Option<Vec<u8>>,
    /// Optional per-vertex texture coordinates.
    pub texture_coordinates: Option<Vec<[f32; 2]>>,
}

impl SurfacePatch {
    /// Creates a patch with identity transform and no normals.
    #[must_use]
    pub fn new(id: PatchId, vertices: Vec<Point3<f64>>, faces: Vec<[u32; 3]>) -> Self {
        Self {
            id,
            revision: 0,
            transform: Matrix4::identity(),
            vertices,
            normals: Vec::new(),
            faces,
            classification: None,
            texture_coordinates: None,
        }
    }

    /// Sets per-vertex normals.
    #[must_use]
    pub fn with_normals(mut self, normals: Vec<Vector3<f64>>) -> Self {
        self.normals = normals;
        self
    }

    /// Sets the local-to-world transform.
    #[must_use]
    pub fn with_transform(mut self, transform: Matrix4<f64>) -> Self {
        self.transform = transform;
        self
    }

    /// Sets the classification array.
    #[must_use]
    pub fn with_classification(mut self, classification: Vec<u8>) -> Self {
        self.classification = Some(classification);
        self
    }

    /// Number of vertices.
    #[must_use]
    pub fn vertex_count(&self) -> usize {
        self.vertices.len()
    }

    /// Number of faces.
    #[must_use]
    pub fn face_count(&self) -> usize {
        self.faces.len()
    }

    /// Returns true if the patch has no vertices.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.vertices.is_empty()
    }

    /// Returns true if `normals` is parallel to `vertices`.
    #[must_use]
    pub fn has_normals(&self) -> bool {
        !self.vertices.is_empty() && self.normals.len() == self.vertices.len()
    }

    /// Returns true if the classification array is per-face.
    #[must_use]
    pub fn has_face_classification(&self) -> bool {
        self.classification
            .as_ref()
            .is_some_and(|c| c.len() == self.faces.len())
    }

    /// Checks the structural invariants.
    ///
    /// # Errors
    ///
    /// - [`ScanError::InvalidFaceIndex`] for a face referencing a missing vertex
    /// - [`ScanError::BufferSizeMismatch`] for a normals, classification or
    ///   texture coordinate array of the wrong length
    pub fn validate(&self) -> ScanResult<()> {
        let vertex_count = self.vertices.len();

        for (face, indices) in self.faces.iter().enumerate() {
            if let Some(&index) = indices.iter().find(|&&i| i as usize >= vertex_count) {
                return Err(ScanError::InvalidFaceIndex {
                    face,
                    index,
                    vertex_count,
                });
            }
        }

        if !self.normals.is_empty() && self.normals.len() != vertex_count {
            return Err(ScanError::buffer_mismatch(vertex_count, self.normals.len()));
        }

        if let Some(classes) = &self.classification {
            if classes.len() != self.faces.len() && classes.len() != vertex_count {
                return Err(ScanError::buffer_mismatch(self.faces.len(), classes.len()));
            }
        }

        if let Some(uv) = &self.texture_coordinates {
            if uv.len() != vertex_count {
                return Err(ScanError::buffer_mismatch(vertex_count, uv.len()));
            }
        }

        Ok(())
    }

    /// Vertex positions transformed to world space.
    #[must_use]
    pub fn world_vertices(&self) -> Vec<Point3<f64>> {
        self.vertices
            .iter()
            .map(|v| self.transform.transform_point(v))
            .collect()
    }

    /// Normals transformed to world space by the inverse-transpose of the
    /// linear part. Empty if the patch carries no normals.
    #[must_use]
    pub fn world_normals(&self) -> Vec<Vector3<f64>> {
        let nm = normal_matrix(&self.transform);
        self.normals
            .iter()
            .map(|n| transform_normal(&nm, n, up()))
            .collect()
    }
}

/// Merges patches into a single world-space patch.
///
/// Each patch's transform is baked into its vertices and normals; faces are
/// concatenated with offset indices and the result has an identity
/// transform. Normals are kept only when every merged patch has them;
/// per-face classification is kept only when every merged patch has it.
/// The merged patch takes the smallest input id (or the default id when
/// `patches` is empty).
///
/// Patches that fail [`SurfacePatch::validate`] are skipped with a warning.
/// Merging stops before the first patch whose vertices would push a face
/// index past `u32::MAX`.
#[must_use]
pub fn merge_patches(patches: &[SurfacePatch]) -> SurfacePatch {
    let usable: Vec<&SurfacePatch> = patches
        .iter()
        .filter(|p| !p.is_empty())
        .filter(|p| match p.validate() {
            Ok(()) => true,
            Err(e) => {
                warn!(id = %p.id, error = %e, "skipping invalid patch in merge");
                false
            }
        })
        .collect();

    let id = patches.iter().map(|p| p.id).min().unwrap_or_default();
    let keep_normals = !usable.is_empty() && usable.iter().all(|p| p.has_normals());
    let keep_classes = !usable.is_empty() && usable.iter().all(|p| p.has_face_classification());

    let vertex_total: usize = usable.iter().map(|p| p.vertex_count()).sum();
    let face_total: usize = usable.iter().map(|p| p.face_count()).sum();

    let mut vertices = Vec::with_capacity(vertex_total);
    let mut normals = Vec::with_capacity(if keep_normals { vertex_total } else { 0 });
    let mut faces = Vec::with_capacity(face_total);
    let mut classes = Vec::with_capacity(if keep_classes { face_total } else { 0 });

    for patch in usable {
        let Some(offset) = index_offset(vertices.len(), patch.vertex_count()) else {
            warn!(
                id = %patch.id,
                merged_vertices = vertices.len(),
                "merged patch exceeds u32 face indices; dropping remaining patches"
            );
            break;
        };
        vertices.extend(patch.world_vertices());
        if keep_normals {
            normals.extend(patch.world_normals());
        }
        faces.extend(
            patch
                .faces
                .iter()
                .map(|f| [f[0] + offset, f[1] + offset, f[2] + offset]),
        );
        if keep_classes {
            if let Some(c) = &patch.classification {
                classes.extend_from_slice(c);
            }
        }
    }

    SurfacePatch {
        id,
        revision: 0,
        transform: Matrix4::identity(),
        vertices,
        normals,
        faces,
        classification: keep_classes.then_some(classes),
        texture_coordinates: None,
    }
}

/// Index offset for appending `count` vertices after `merged`, if every
/// resulting index fits in `u32`.
fn index_offset(merged: usize, count: usize) -> Option<u32> {
    let end = merged.checked_add(count)?;
    u32::try_from(end).ok()?;
    u32::try_from(merged).ok()
}
