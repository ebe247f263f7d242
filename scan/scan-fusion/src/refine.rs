//! Mesh refinement against fused depth, and fused-depth back-projection.

use nalgebra::Point3;
use tracing::{debug, warn};

use scan_types::{
    CancellationToken, DepthFrame, PointCloud, PointSource, ScanError, ScanResult, SurfacePatch,
    compute_vertex_normals, is_valid_depth,
};

use crate::fuse::DepthFusionEngine;
use crate::normalize::is_valid_secondary;

/// Outcome of refining one patch.
#[derive(Debug, Clone, PartialEq)]
pub struct RefinementResult {
    /// The refined patch (normals recomputed).
    pub patch: SurfacePatch,
    /// Vertices shifted onto the fused depth.
    pub vertices_moved: usize,
    /// Vertices behind the camera or outside the image.
    pub vertices_unseen: usize,
    /// Largest shift applied, in meters.
    pub max_shift: f64,
}

impl DepthFusionEngine {
    /// Moves patch vertices onto the fused depth along their camera rays.
    ///
    /// Returns the patch unchanged when the patch or frame is invalid or a
    /// transform cannot be inverted.
    #[must_use]
    pub fn refine_patch(&self, patch: &SurfacePatch, fused: &DepthFrame) -> SurfacePatch {
        match self.try_refine_patch(patch, fused) {
            Ok(result) => result.patch,
            Err(e) => {
                warn!(id = %patch.id, error = %e, "refinement skipped, keeping patch");
                patch.clone()
            }
        }
    }

    /// Fallible form of [`refine_patch`](Self::refine_patch).
    ///
    /// Each vertex is moved to world space, then into camera space through
    /// the inverse camera pose. Vertices behind the camera or projecting
    /// outside the image are left alone. Otherwise the fused depth at the
    /// nearest pixel is compared with the vertex depth; when the difference
    /// is strictly between `min_refinement_shift` and `max_discrepancy` the
    /// vertex slides along its camera ray to the fused depth. Normals are
    /// recomputed from the faces afterwards.
    ///
    /// # Errors
    ///
    /// - Validation errors of the patch or fused frame
    /// - [`ScanError::InvalidConfiguration`] if the camera pose or patch
    ///   transform is not invertible
    pub fn try_refine_patch(&self, patch: &SurfacePatch, fused: &DepthFrame) -> ScanResult<RefinementResult> {
        self.params.validate()?;
        patch.validate()?;
        let expected = fused.pixel_count();
        if fused.depth.len() != expected {
            return Err(ScanError::buffer_mismatch(expected, fused.depth.len()));
        }
        fused.intrinsics.validate()?;

        let world_to_camera = fused
            .camera_transform
            .try_inverse()
            .ok_or_else(|| ScanError::invalid_config("camera transform is not invertible"))?;
        let world_to_local = patch
            .transform
            .try_inverse()
            .ok_or_else(|| ScanError::invalid_config("patch transform is not invertible"))?;
        let local_to_camera = world_to_camera * patch.transform;
        let camera_to_local = world_to_local * fused.camera_transform;

        let min_shift = f64::from(self.params.min_refinement_shift);
        let max_shift = f64::from(self.params.max_discrepancy);

        let mut vertices = patch.vertices.clone();
        let mut moved = 0;
        let mut unseen = 0;
        let mut largest = 0.0_f64;

        for v in &mut vertices {
            let camera = local_to_camera.transform_point(v);
            let Some(depth) = sample_nearest(fused, &camera) else {
                unseen += 1;
                continue;
            };
            let diff = depth - camera.z;
            if diff.abs() > min_shift && diff.abs() < max_shift {
                let shifted = Point3::from(camera.coords * (depth / camera.z));
                *v = camera_to_local.transform_point(&shifted);
                moved += 1;
                largest = largest.max(diff.abs());
            }
        }

        let previous = patch.has_normals().then_some(patch.normals.as_slice());
        let normals = compute_vertex_normals(&vertices, &patch.faces, previous);

        debug!(id = %patch.id, moved, unseen, max_shift = largest, "refined patch");

        Ok(RefinementResult {
            patch: SurfacePatch {
                vertices,
                normals,
                ..patch.clone()
            },
            vertices_moved: moved,
            vertices_unseen: unseen,
            max_shift: largest,
        })
    }

    /// Refines every patch on the worker pool, in input order.
    #[must_use]
    pub fn refine_patches(&self, patches: &[SurfacePatch], fused: &DepthFrame) -> Vec<SurfacePatch> {
        self.pool.map(patches, |patch| self.refine_patch(patch, fused))
    }

    /// Like [`refine_patches`](Self::refine_patches), abandoning the batch
    /// between patches once `token` is cancelled.
    ///
    /// # Errors
    ///
    /// Returns [`ScanError::Cancelled`] if the batch was cancelled.
    pub fn try_refine_patches(
        &self,
        patches: &[SurfacePatch],
        fused: &DepthFrame,
        token: &CancellationToken,
    ) -> ScanResult<Vec<SurfacePatch>> {
        self.pool
            .try_map(patches, token, |patch| self.refine_patch(patch, fused))
    }

    /// Back-projects a fused depth frame into a world-space point cloud.
    ///
    /// Every pixel inside the valid depth range contributes one point, with
    /// a synthetic confidence that falls linearly with distance:
    /// `clamp(1 - depth / max_depth, 0, 1)`. Returns an empty cloud for an
    /// invalid frame.
    #[must_use]
    pub fn fused_to_point_cloud(&self, fused: &DepthFrame) -> PointCloud {
        let empty = || PointCloud::empty(PointSource::Lidar).with_timestamp(fused.timestamp);
        if let Err(e) = fused.intrinsics.validate() {
            warn!(error = %e, "fused depth not back-projected");
            return empty();
        }
        if fused.depth.len() != fused.pixel_count() {
            warn!(
                expected = fused.pixel_count(),
                actual = fused.depth.len(),
                "fused depth not back-projected"
            );
            return empty();
        }

        let p = &self.params;
        let mut points = Vec::new();
        let mut confidences = Vec::new();
        for y in 0..fused.height {
            for x in 0..fused.width {
                let i = y as usize * fused.width as usize + x as usize;
                let d = fused.depth[i];
                if !is_valid_depth(d, p.min_depth, p.max_depth) {
                    continue;
                }
                let camera = fused
                    .intrinsics
                    .unproject(f64::from(x), f64::from(y), f64::from(d));
                points.push(fused.camera_transform.transform_point(&camera));
                confidences.push((1.0 - d / p.max_depth).clamp(0.0, 1.0));
            }
        }

        PointCloud {
            points,
            confidences: Some(confidences),
            colors: None,
            normals: None,
            timestamp: fused.timestamp,
            source: PointSource::Lidar,
        }
    }
}

/// Fused depth at the pixel nearest to a camera-space point's projection.
#[allow(clippy::cast_possible_truncation, clippy::cast_sign_loss)]
fn sample_nearest(frame: &DepthFrame, camera: &Point3<f64>) -> Option<f64> {
    let (u, v) = frame.intrinsics.project(camera)?;
    let (u, v) = (u.round(), v.round());
    if u < 0.0 || v < 0.0 || u >= f64::from(frame.width) || v >= f64::from(frame.height) {
        return None;
    }
    let d = frame.get(u as u32, v as u32)?;
    is_valid_secondary(d).then(|| f64::from(d))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::params::FusionParams;
    use approx::assert_relative_eq;
    use nalgebra::{Matrix4, Vector3};
    use scan_types::{CameraIntrinsics, PatchId, WorkerPool};

    fn wall(depth: f32) -> DepthFrame {
        DepthFrame::new(
            10,
            10,
            vec![depth; 100],
            CameraIntrinsics::new(10.0, 10.0, 5.0, 5.0),
        )
    }

    fn patch_at(z: f64) -> SurfacePatch {
        SurfacePatch::new(
            PatchId(1),
            vec![
                Point3::new(0.0, 0.0, z),
                Point3::new(0.1, 0.0, z),
                Point3::new(0.0, 0.1, z),
            ],
            vec![[0, 1, 2]],
        )
        .with_normals(vec![Vector3::new(0.0, 0.0, -1.0); 3])
    }

    fn engine() -> DepthFusionEngine {
        DepthFusionEngine::new(FusionParams::default())
    }

    #[test]
    fn vertices_snap_to_fused_depth() {
        let result = engine().try_refine_patch(&patch_at(1.0), &wall(1.2)).unwrap();
        assert_eq!(result.vertices_moved, 3);
        for v in &result.patch.vertices {
            assert_relative_eq!(v.z, 1.2, epsilon = 1e-6);
        }
        // Shift is along the ray, so x scales with depth.
        assert_relative_eq!(result.patch.vertices[1].x, 0.12, epsilon = 1e-6);
        assert_relative_eq!(result.max_shift, 0.2, epsilon = 1e-6);
    }

    #[test]
    fn shifts_outside_window_ignored() {
        let tiny = engine().try_refine_patch(&patch_at(1.0), &wall(1.0005)).unwrap();
        assert_eq!(tiny.vertices_moved, 0);
        let huge = engine().try_refine_patch(&patch_at(1.0), &wall(2.0)).unwrap();
        assert_eq!(huge.vertices_moved, 0);
        assert_eq!(huge.patch.vertices, patch_at(1.0).vertices);
    }

    #[test]
    fn vertices_behind_camera_untouched() {
        let result = engine().try_refine_patch(&patch_at(-1.0), &wall(1.2)).unwrap();
        assert_eq!(result.vertices_unseen, 3);
        assert_eq!(result.vertices_moved, 0);
    }

    #[test]
    fn patch_transform_respected() {
        let patch = patch_at(0.0).with_transform(Matrix4::new_translation(&Vector3::new(0.0, 0.0, 1.0)));
        let refined = engine().refine_patch(&patch, &wall(1.1));
        // Local z goes from 0 to 0.1 so the world z lands on the fused depth.
        assert_relative_eq!(refined.vertices[0].z, 0.1, epsilon = 1e-6);
    }

    #[test]
    fn normals_recomputed() {
        let refined = engine().refine_patch(&patch_at(1.0), &wall(1.2));
        assert_eq!(refined.normals.len(), 3);
        assert_relative_eq!(refined.normals[0], Vector3::z(), epsilon = 1e-9);
    }

    #[test]
    fn singular_pose_keeps_patch() {
        let frame = wall(1.2).with_camera_transform(Matrix4::zeros());
        let patch = patch_at(1.0);
        assert_eq!(engine().refine_patch(&patch, &frame), patch);
        assert!(matches!(
            engine().try_refine_patch(&patch, &frame),
            Err(ScanError::InvalidConfiguration { .. })
        ));
    }

    #[test]
    fn batch_refinement() {
        let e = engine().with_pool(WorkerPool::sequential());
        let patches = vec![patch_at(1.0), patch_at(1.1)];
        let refined = e.refine_patches(&patches, &wall(1.2));
        assert_eq!(refined.len(), 2);
        assert_relative_eq!(refined[1].vertices[0].z, 1.2, epsilon = 1e-6);

        let token = CancellationToken::new();
        token.cancel();
        assert_eq!(
            e.try_refine_patches(&patches, &wall(1.2), &token),
            Err(ScanError::Cancelled)
        );
    }

    #[test]
    fn fused_cloud_confidence() {
        let mut frame = wall(1.0);
        frame.depth[0] = 0.0;
        frame.depth[1] = 4.0;
        let cloud = engine().fused_to_point_cloud(&frame);
        assert_eq!(cloud.len(), 99);
        assert_eq!(cloud.source, PointSource::Lidar);
        let conf = cloud.confidences.unwrap();
        assert_relative_eq!(conf[0], 0.2, epsilon = 1e-6);
        assert_relative_eq!(conf[1], 0.8, epsilon = 1e-6);
    }
}
