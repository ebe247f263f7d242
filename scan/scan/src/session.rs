//! A scanning session wiring the patch store to every engine.

use crossbeam_channel::Receiver;
use nalgebra::Matrix4;
use tracing::{debug, info};

#[cfg(feature = "serde")]
use serde::{Deserialize, Serialize};

use scan_cloud::{ExtractionParams, PointCloudExtractor, downsample_to_budget};
use scan_coverage::{
    CoverageEvent, CoverageParams, CoverageStatistics, Gap, SharedCoverageTracker, UpdateOutcome,
    ViewGuidance,
};
use scan_fusion::{DepthFusionEngine, FusionParams};
use scan_repair::{CorrectionEvent, CorrectionParams, CorrectionResult, MeshCorrectionEngine};
use scan_types::{
    DepthFrame, PatchEvent, PatchStore, PointCloud, ScanResult, SurfacePatch, Timestamp,
    WorkerPool, merge_patches,
};

/// Parameters for every engine in a [`ScanSession`].
///
/// # Example
///
/// ```
/// use scan::SessionConfig;
/// use scan::coverage::CoverageParams;
///
/// let config = SessionConfig::default().with_coverage(CoverageParams::fine());
/// assert!(config.validate().is_ok());
/// ```
#[derive(Debug, Clone, PartialEq, Default)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
#[cfg_attr(feature = "serde", serde(default))]
pub struct SessionConfig {
    /// Point cloud extraction.
    pub extraction: ExtractionParams,
    /// Depth fusion and refinement.
    pub fusion: FusionParams,
    /// Mesh correction.
    pub correction: CorrectionParams,
    /// Coverage tracking.
    pub coverage: CoverageParams,
}

impl SessionConfig {
    /// Creates a configuration with every component at its defaults.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Sets the extraction parameters.
    #[must_use]
    pub fn with_extraction(mut self, params: ExtractionParams) -> Self {
        self.extraction = params;
        self
    }

    /// Sets the fusion parameters.
    #[must_use]
    pub fn with_fusion(mut self, params: FusionParams) -> Self {
        self.fusion = params;
        self
    }

    /// Sets the correction parameters.
    #[must_use]
    pub fn with_correction(mut self, params: CorrectionParams) -> Self {
        self.correction = params;
        self
    }

    /// Sets the coverage parameters.
    #[must_use]
    pub fn with_coverage(mut self, params: CoverageParams) -> Self {
        self.coverage = params;
        self
    }

    /// Validates every component's parameters.
    ///
    /// # Errors
    ///
    /// Returns the first [`ScanError::InvalidConfiguration`] found, checking
    /// extraction, fusion, correction and coverage in that order.
    ///
    /// [`ScanError::InvalidConfiguration`]: scan_types::ScanError::InvalidConfiguration
    pub fn validate(&self) -> ScanResult<()> {
        self.extraction.validate()?;
        self.fusion.validate()?;
        self.correction.validate()?;
        self.coverage.validate()
    }
}

/// One handheld scan: the latest surface patches plus the engines that
/// consume them.
///
/// Patch lifecycle events go to [`on_patch_event`](Self::on_patch_event);
/// camera updates feed the stored patches to the coverage tracker. Outputs
/// (point clouds, the corrected mesh, coverage figures) are computed on
/// demand from a snapshot of the store.
///
/// The coverage tracker is shared: [`coverage`](Self::coverage) hands out a
/// handle that capture callbacks on other threads can update directly.
///
/// # Example
///
/// ```
/// use nalgebra::{Matrix4, Point3};
/// use scan::{ScanSession, SessionConfig};
/// use scan::types::{PatchEvent, PatchId, SurfacePatch, Timestamp};
///
/// let mut session = ScanSession::new(SessionConfig::default());
/// let patch = SurfacePatch::new(
///     PatchId(1),
///     vec![
///         Point3::new(0.0, 0.0, 1.0),
///         Point3::new(0.1, 0.0, 1.0),
///         Point3::new(0.0, 0.1, 1.0),
///     ],
///     vec![[0, 1, 2]],
/// );
/// session.on_patch_event(PatchEvent::Added(patch));
/// session.on_camera_update(&Matrix4::identity(), Timestamp::zero());
///
/// assert_eq!(session.point_cloud().len(), 3);
/// assert!(session.coverage_statistics().total_cells > 0);
/// assert_eq!(session.corrected_mesh().face_count(), 1);
/// ```
#[derive(Debug)]
pub struct ScanSession {
    config: SessionConfig,
    store: PatchStore,
    coverage: SharedCoverageTracker,
    extractor: PointCloudExtractor,
    fusion: DepthFusionEngine,
    correction: MeshCorrectionEngine,
}

impl Default for ScanSession {
    fn default() -> Self {
        Self::new(SessionConfig::default())
    }
}

impl ScanSession {
    /// Creates a session running batch work on rayon's global pool.
    ///
    /// Invalid parameters are not rejected here; each engine reports them
    /// when it is used. Call [`try_new`](Self::try_new) to check up front.
    #[must_use]
    pub fn new(config: SessionConfig) -> Self {
        Self::with_pool(config, WorkerPool::global())
    }

    /// Creates a session after validating `config`.
    ///
    /// # Errors
    ///
    /// Returns the configuration error of the first invalid component.
    pub fn try_new(config: SessionConfig) -> ScanResult<Self> {
        config.validate()?;
        Ok(Self::new(config))
    }

    /// Creates a session running batch work on `pool`.
    #[must_use]
    pub fn with_pool(config: SessionConfig, pool: WorkerPool) -> Self {
        Self {
            store: PatchStore::new(),
            coverage: SharedCoverageTracker::new(config.coverage.clone()),
            extractor: PointCloudExtractor::new(config.extraction.clone()).with_pool(pool.clone()),
            fusion: DepthFusionEngine::new(config.fusion.clone()).with_pool(pool.clone()),
            correction: MeshCorrectionEngine::new(config.correction.clone()).with_pool(pool),
            config,
        }
    }

    /// Returns the session configuration.
    #[must_use]
    pub fn config(&self) -> &SessionConfig {
        &self.config
    }

    /// Returns the patch store.
    #[must_use]
    pub fn store(&self) -> &PatchStore {
        &self.store
    }

    /// Returns a handle to the coverage tracker.
    #[must_use]
    pub fn coverage(&self) -> &SharedCoverageTracker {
        &self.coverage
    }

    /// Applies a patch lifecycle event. Returns true if the store changed.
    pub fn on_patch_event(&mut self, event: PatchEvent) -> bool {
        self.store.apply(event)
    }

    /// Feeds the stored patches seen from `camera_transform` to the coverage
    /// tracker.
    ///
    /// Patches already sampled at their current revision are skipped by the
    /// tracker. A throttled update returns before the store is copied.
    pub fn on_camera_update(
        &self,
        camera_transform: &Matrix4<f64>,
        now: Timestamp,
    ) -> UpdateOutcome {
        self.coverage.update_with(camera_transform, now, || self.store.snapshot())
    }

    /// Current coverage figures.
    #[must_use]
    pub fn coverage_statistics(&self) -> CoverageStatistics {
        self.coverage.statistics()
    }

    /// Current gaps, highest priority first.
    #[must_use]
    pub fn gaps(&self) -> Vec<Gap> {
        self.coverage.gaps()
    }

    /// Where to move the camera next, if any gap is known.
    #[must_use]
    pub fn guidance(&self) -> Option<ViewGuidance> {
        self.coverage.guidance()
    }

    /// Subscribes to coverage events.
    pub fn subscribe_coverage(&self) -> Receiver<CoverageEvent> {
        self.coverage.subscribe()
    }

    /// Subscribes to mesh correction events.
    pub fn subscribe_corrections(&self) -> Receiver<CorrectionEvent> {
        self.correction.subscribe()
    }

    /// World-space point cloud of every stored patch.
    #[must_use]
    pub fn point_cloud(&self) -> PointCloud {
        self.extractor.extract_patches(&self.store.snapshot())
    }

    /// Point cloud back-projected from a single primary depth frame.
    #[must_use]
    pub fn depth_point_cloud(&self, frame: &DepthFrame) -> PointCloud {
        self.extractor.extract_depth(frame)
    }

    /// Fuses `primary` with a secondary depth estimate of `width × height`
    /// and back-projects the result, downsampled to the extraction budget.
    ///
    /// Invalid secondary input falls back to the primary depth.
    #[must_use]
    pub fn fused_point_cloud(
        &self,
        primary: &DepthFrame,
        secondary: &[f32],
        width: u32,
        height: u32,
    ) -> PointCloud {
        let fused = self.fusion.fuse_frames(primary, secondary, width, height);
        let cloud = self.fusion.fused_to_point_cloud(&fused.to_frame(primary));
        let extraction = &self.config.extraction;
        let reduced = downsample_to_budget(&cloud, extraction.voxel_size, extraction.max_points);
        debug!(
            fused = cloud.len(),
            kept = reduced.len(),
            primary_coverage = fused.stats.primary_coverage,
            "fused point cloud"
        );
        reduced
    }

    /// Refines every stored patch against `primary` fused with a secondary
    /// depth estimate. Patches whose vertices moved are stored as new
    /// revisions.
    ///
    /// Returns the number of patches that changed.
    pub fn refine_with(
        &mut self,
        primary: &DepthFrame,
        secondary: &[f32],
        width: u32,
        height: u32,
    ) -> usize {
        let fused = self.fusion.fuse_frames(primary, secondary, width, height);
        let frame = fused.to_frame(primary);
        let current = self.store.snapshot();
        let refined = self.fusion.refine_patches(&current, &frame);

        let mut changed = 0;
        for (before, after) in current.iter().zip(refined) {
            if after.vertices != before.vertices && self.store.apply(PatchEvent::Updated(after)) {
                changed += 1;
            }
        }
        info!(patches = changed, "refined stored patches");
        changed
    }

    /// Merges every stored patch into world space and corrects the result.
    #[must_use]
    pub fn corrected_mesh(&self) -> SurfacePatch {
        self.corrected_mesh_detailed().patch
    }

    /// [`corrected_mesh`](Self::corrected_mesh) with the correction summary.
    #[must_use]
    pub fn corrected_mesh_detailed(&self) -> CorrectionResult {
        let merged = merge_patches(&self.store.snapshot());
        self.correction.correct_detailed(&merged)
    }

    /// Discards every patch and all coverage for a new scan.
    pub fn reset(&mut self) {
        self.store.clear();
        self.coverage.reset();
        info!("scan session reset");
    }
}

