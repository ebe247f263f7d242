//! Back-projection of depth frames and surface patches into point clouds.

use nalgebra::{Point3, Vector3};
use rayon::prelude::*;
use tracing::{debug, warn};

use scan_types::{
    ConfidenceLevel, DepthFrame, PointCloud, PointSource, ScanError, ScanResult, SurfacePatch,
    WorkerPool, is_valid_depth, normal_matrix, transform_normal, up,
};

use crate::normals::depth_gradient_normal;
use crate::params::ExtractionParams;
use crate::voxel::downsample_to_budget;

/// Converts depth frames and surface patches into world-space point clouds.
///
/// # Example
///
/// ```
/// use scan_cloud::{ExtractionParams, PointCloudExtractor};
/// use scan_types::{CameraIntrinsics, DepthFrame};
///
/// let frame = DepthFrame::new(4, 4, vec![1.0; 16], CameraIntrinsics::centered(4.0, 4, 4));
/// let extractor = PointCloudExtractor::new(ExtractionParams::default().with_stride(1));
/// let cloud = extractor.extract_depth(&frame);
/// assert_eq!(cloud.len(), 16);
/// ```
#[derive(Debug, Clone, Default)]
pub struct PointCloudExtractor {
    params: ExtractionParams,
    pool: WorkerPool,
}

/// One row of back-projected samples.
#[derive(Default)]
struct RowSamples {
    points: Vec<Point3<f64>>,
    confidences: Vec<f32>,
    normals: Vec<Vector3<f64>>,
}

impl PointCloudExtractor {
    /// Creates an extractor running on rayon's global pool.
    #[must_use]
    pub fn new(params: ExtractionParams) -> Self {
        Self {
            params,
            pool: WorkerPool::global(),
        }
    }

    /// Sets the worker pool used for batch extraction.
    #[must_use]
    pub fn with_pool(mut self, pool: WorkerPool) -> Self {
        self.pool = pool;
        self
    }

    /// Returns the extraction parameters.
    #[must_use]
    pub fn params(&self) -> &ExtractionParams {
        &self.params
    }

    /// Back-projects a depth frame, returning an empty cloud on invalid input.
    #[must_use]
    pub fn extract_depth(&self, frame: &DepthFrame) -> PointCloud {
        self.try_extract_depth(frame).unwrap_or_else(|e| {
            warn!(error = %e, "depth frame skipped");
            PointCloud::empty(PointSource::Lidar).with_timestamp(frame.timestamp)
        })
    }

    /// Back-projects a depth frame into world space.
    ///
    /// Pixels are sampled on the configured stride. A pixel contributes when
    /// its depth is inside `(min_depth, max_depth)` and its normalized
    /// confidence is at least `min_confidence`. A confidence map of the wrong
    /// size is ignored (with a warning) rather than rejecting the frame.
    ///
    /// # Errors
    ///
    /// - [`ScanError::InvalidConfiguration`] for invalid parameters or intrinsics
    /// - [`ScanError::BufferSizeMismatch`] if the depth buffer is not `width * height`
    pub fn try_extract_depth(&self, frame: &DepthFrame) -> ScanResult<PointCloud> {
        self.params.validate()?;
        let expected = frame.pixel_count();
        if frame.depth.len() != expected {
            return Err(ScanError::buffer_mismatch(expected, frame.depth.len()));
        }
        frame.intrinsics.validate()?;

        let confidence = frame.confidence.as_deref().filter(|c| {
            let ok = c.len() == expected;
            if !ok {
                warn!(expected, actual = c.len(), "ignoring mis-sized confidence map");
            }
            ok
        });

        let p = &self.params;
        let pose = frame.camera_transform;
        let rotate = normal_matrix(&pose);
        let stride = p.stride as usize;

        let row = |y: u32| {
            let mut samples = RowSamples::default();
            for x in (0..frame.width).step_by(stride) {
                let i = y as usize * frame.width as usize + x as usize;
                let d = frame.depth[i];
                if !is_valid_depth(d, p.min_depth, p.max_depth) {
                    continue;
                }
                let c = confidence.map_or(1.0, |c| ConfidenceLevel::from_code(c[i]).value());
                if c < p.min_confidence {
                    continue;
                }
                let camera = frame
                    .intrinsics
                    .unproject(f64::from(x), f64::from(y), f64::from(d));
                samples.points.push(pose.transform_point(&camera));
                samples.confidences.push(c);
                if p.estimate_normals {
                    let normal = depth_gradient_normal(frame, x, y, p.min_depth, p.max_depth)
                        .map_or_else(up, |n| transform_normal(&rotate, &n, up()));
                    samples.normals.push(normal);
                }
            }
            samples
        };

        let rows: Vec<u32> = (0..frame.height).step_by(stride).collect();
        let sampled: Vec<RowSamples> = if self.pool.is_sequential() {
            rows.iter().map(|&y| row(y)).collect()
        } else {
            rows.par_iter().map(|&y| row(y)).collect()
        };

        let total: usize = sampled.iter().map(|r| r.points.len()).sum();
        let mut cloud = PointCloud {
            points: Vec::with_capacity(total),
            confidences: Some(Vec::with_capacity(total)),
            colors: None,
            normals: p.estimate_normals.then(|| Vec::with_capacity(total)),
            timestamp: frame.timestamp,
            source: PointSource::Lidar,
        };
        for r in sampled {
            cloud.points.extend(r.points);
            if let Some(c) = &mut cloud.confidences {
                c.extend(r.confidences);
            }
            if let Some(n) = &mut cloud.normals {
                n.extend(r.normals);
            }
        }

        debug!(
            width = frame.width,
            height = frame.height,
            points = cloud.len(),
            "extracted depth frame"
        );
        Ok(downsample_to_budget(&cloud, p.voxel_size, p.max_points))
    }

    /// Collects the world-space vertices of a set of patches.
    ///
    /// Empty patches and patches whose normals do not match their vertices
    /// are skipped. Normals are kept only when every contributing patch has
    /// them. Returns an empty cloud for invalid parameters.
    #[must_use]
    pub fn extract_patches(&self, patches: &[SurfacePatch]) -> PointCloud {
        self.try_extract_patches(patches).unwrap_or_else(|e| {
            warn!(error = %e, "patch extraction skipped");
            PointCloud::empty(PointSource::SceneMesh)
        })
    }

    /// Fallible form of [`extract_patches`](Self::extract_patches).
    ///
    /// # Errors
    ///
    /// Returns [`ScanError::InvalidConfiguration`] for invalid parameters.
    pub fn try_extract_patches(&self, patches: &[SurfacePatch]) -> ScanResult<PointCloud> {
        self.params.validate()?;

        let usable: Vec<&SurfacePatch> = patches
            .iter()
            .filter(|patch| {
                let undersized = !patch.normals.is_empty() && patch.normals.len() != patch.vertices.len();
                if patch.is_empty() || undersized {
                    warn!(id = %patch.id, "skipping empty or undersized patch");
                    return false;
                }
                true
            })
            .collect();

        let keep_normals = !usable.is_empty() && usable.iter().all(|p| p.has_normals());
        let per_patch = self.pool.map(&usable, |patch| {
            let normals = if keep_normals {
                patch.world_normals()
            } else {
                Vec::new()
            };
            (patch.world_vertices(), normals)
        });

        let mut cloud = PointCloud::empty(PointSource::SceneMesh);
        let mut normals = Vec::new();
        for (points, patch_normals) in per_patch {
            cloud.points.extend(points);
            normals.extend(patch_normals);
        }
        if keep_normals {
            cloud.normals = Some(normals);
        }

        debug!(patches = usable.len(), points = cloud.len(), "extracted surface patches");
        Ok(downsample_to_budget(
            &cloud,
            self.params.voxel_size,
            self.params.max_points,
        ))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;
    use nalgebra::Matrix4;
    use scan_types::{CameraIntrinsics, PatchId, Timestamp};

    fn frame(depth: Vec<f32>, w: u32, h: u32) -> DepthFrame {
        DepthFrame::new(w, h, depth, CameraIntrinsics::new(2.0, 2.0, 1.0, 1.0))
    }

    fn dense() -> ExtractionParams {
        ExtractionParams::default().with_stride(1)
    }

    #[test]
    fn back_projection_and_pose() {
        let pose = Matrix4::new_translation(&Vector3::new(0.0, 0.0, 1.0));
        let f = frame(vec![2.0; 4], 2, 2)
            .with_camera_transform(pose)
            .with_timestamp(Timestamp::from_millis(7));
        let cloud = PointCloudExtractor::new(dense()).extract_depth(&f);

        assert_eq!(cloud.len(), 4);
        assert_eq!(cloud.timestamp, Timestamp::from_millis(7));
        // Pixel (0, 0): ((0 - 1) / 2 * 2, (0 - 1) / 2 * 2, 2) then +1 in z.
        assert_relative_eq!(cloud.points[0], Point3::new(-1.0, -1.0, 3.0));
        assert!(cloud.validate().is_ok());
    }

    #[test]
    fn depth_range_and_stride() {
        let depth = vec![1.0, 0.05, 6.0, f32::NAN, 1.0, 1.0, 1.0, 1.0, 1.0];
        let f = frame(depth, 3, 3);
        let all = PointCloudExtractor::new(dense()).extract_depth(&f);
        assert_eq!(all.len(), 6);

        let strided = PointCloudExtractor::new(ExtractionParams::default()).extract_depth(&f);
        // Pixels (0,0), (2,0), (0,2), (2,2); (2,0) is out of range.
        assert_eq!(strided.len(), 3);
    }

    #[test]
    fn confidence_filter() {
        let f = frame(vec![1.0; 4], 2, 2).with_confidence(vec![0, 1, 2, 2]);
        let cloud = PointCloudExtractor::new(dense()).extract_depth(&f);
        assert_eq!(cloud.len(), 3);
        assert_eq!(cloud.confidences, Some(vec![0.5, 1.0, 1.0]));
    }

    #[test]
    fn mis_sized_confidence_ignored() {
        let f = frame(vec![1.0; 4], 2, 2).with_confidence(vec![0; 3]);
        let cloud = PointCloudExtractor::new(dense()).extract_depth(&f);
        assert_eq!(cloud.len(), 4);
    }

    #[test]
    fn invalid_frame_gives_empty_cloud() {
        let f = frame(vec![1.0; 3], 2, 2);
        let extractor = PointCloudExtractor::new(dense());
        assert!(extractor.extract_depth(&f).is_empty());
        assert_eq!(
            extractor.try_extract_depth(&f),
            Err(ScanError::buffer_mismatch(4, 3))
        );

        let mut f = frame(vec![1.0; 4], 2, 2);
        f.intrinsics.fx = 0.0;
        assert!(extractor.extract_depth(&f).is_empty());
    }

    #[test]
    fn max_points_triggers_downsampling() {
        let f = DepthFrame::new(20, 20, vec![1.0; 400], CameraIntrinsics::centered(20.0, 20, 20));
        let params = dense().with_max_points(50);
        let cloud = PointCloudExtractor::new(params).extract_depth(&f);
        assert!(cloud.len() <= 50);
        assert!(!cloud.is_empty());
    }

    #[test]
    fn estimated_normals_parallel_to_points() {
        let f = DepthFrame::new(5, 5, vec![1.0; 25], CameraIntrinsics::centered(5.0, 5, 5));
        let cloud = PointCloudExtractor::new(dense().with_estimate_normals(true)).extract_depth(&f);
        let normals = cloud.normals.as_ref().unwrap();
        assert_eq!(normals.len(), cloud.len());
        // Interior pixel (2, 2) sees a flat wall.
        assert_relative_eq!(normals[12], Vector3::new(0.0, 0.0, -1.0), epsilon = 1e-12);
        // Border pixel falls back to up.
        assert_relative_eq!(normals[0], up());
    }

    #[test]
    fn sequential_matches_parallel() {
        let depth: Vec<f32> = (0..64u8).map(|i| 0.5 + f32::from(i) * 0.01).collect();
        let f = DepthFrame::new(8, 8, depth, CameraIntrinsics::centered(8.0, 8, 8));
        let a = PointCloudExtractor::new(dense()).extract_depth(&f);
        let b = PointCloudExtractor::new(dense())
            .with_pool(WorkerPool::sequential())
            .extract_depth(&f);
        assert_eq!(a, b);
    }

    #[test]
    fn patches_to_world() {
        let a = SurfacePatch::new(
            PatchId(1),
            vec![Point3::origin(), Point3::new(1.0, 0.0, 0.0)],
            Vec::new(),
        )
        .with_transform(Matrix4::new_translation(&Vector3::new(0.0, 5.0, 0.0)));
        let empty = SurfacePatch::new(PatchId(2), Vec::new(), Vec::new());
        let mut undersized = SurfacePatch::new(PatchId(3), vec![Point3::origin(); 3], Vec::new());
        undersized.normals = vec![Vector3::z()];

        let cloud = PointCloudExtractor::new(dense()).extract_patches(&[a, empty, undersized]);
        assert_eq!(cloud.len(), 2);
        assert_eq!(cloud.source, PointSource::SceneMesh);
        assert_relative_eq!(cloud.points[1], Point3::new(1.0, 5.0, 0.0));
        assert!(cloud.normals.is_none());
    }

    #[test]
    fn patch_normals_kept_when_complete() {
        let a = SurfacePatch::new(PatchId(1), vec![Point3::origin()], Vec::new())
            .with_normals(vec![Vector3::z()]);
        let cloud = PointCloudExtractor::new(dense())
            .with_pool(WorkerPool::sequential())
            .extract_patches(&[a]);
        assert_eq!(cloud.normals, Some(vec![Vector3::z()]));
    }
}
