//! The correction pipeline and its batch and event surface.

use std::sync::Arc;

use crossbeam_channel::Receiver;
use tracing::{debug, warn};

#[cfg(feature = "serde")]
use serde::{Deserialize, Serialize};

use scan_types::{
    CancellationToken, EventHub, PatchId, ScanError, ScanResult, SurfacePatch, WorkerPool,
};

use crate::degenerate::remove_degenerate_faces;
use crate::holes::{HoleFillReport, fill_small_holes};
use crate::params::CorrectionParams;
use crate::smooth::{laplacian_smooth, smooth_normals};

/// What the pipeline did to one patch.
#[derive(Debug, Clone, Copy, Default, PartialEq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct CorrectionSummary {
    /// Faces dropped as degenerate.
    pub faces_removed: usize,
    /// Vertices moved by Laplacian smoothing.
    pub vertices_moved: usize,
    /// Largest vertex displacement from smoothing, in patch units.
    pub max_displacement: f64,
    /// Hole filling outcome, if the stage ran.
    pub holes: Option<HoleFillReport>,
}

/// A corrected patch and its summary.
#[derive(Debug, Clone, PartialEq)]
pub struct CorrectionResult {
    /// The corrected patch.
    pub patch: SurfacePatch,
    /// What changed.
    pub summary: CorrectionSummary,
}

/// Published to subscribers after each pipeline run.
#[derive(Debug, Clone, PartialEq)]
pub enum CorrectionEvent {
    /// The patch was corrected.
    Completed {
        /// Patch identifier.
        id: PatchId,
        /// What changed.
        summary: CorrectionSummary,
    },
    /// The patch was rejected and returned unchanged.
    Failed {
        /// Patch identifier.
        id: PatchId,
        /// Why it was rejected.
        error: ScanError,
    },
}

/// Runs degenerate removal, Laplacian smoothing and normal smoothing (and
/// optionally hole filling) over surface patches.
///
/// Each stage produces a new patch; the input is never mutated. Clones share
/// the same subscribers.
///
/// # Example
///
/// ```
/// use nalgebra::Point3;
/// use scan_repair::{CorrectionParams, MeshCorrectionEngine};
/// use scan_types::{PatchId, SurfacePatch};
///
/// let engine = MeshCorrectionEngine::new(CorrectionParams::default());
/// let patch = SurfacePatch::new(
///     PatchId(1),
///     vec![Point3::origin(), Point3::new(1.0, 0.0, 0.0), Point3::new(0.0, 1.0, 0.0)],
///     vec![[0, 1, 2], [0, 0, 2]],
/// );
/// let corrected = engine.correct(&patch);
/// assert_eq!(corrected.face_count(), 1);
/// assert_eq!(corrected.normals.len(), 3);
/// ```
#[derive(Debug, Clone, Default)]
pub struct MeshCorrectionEngine {
    params: CorrectionParams,
    pool: WorkerPool,
    events: Arc<EventHub<CorrectionEvent>>,
}

impl MeshCorrectionEngine {
    /// Creates an engine running batch work on rayon's global pool.
    #[must_use]
    pub fn new(params: CorrectionParams) -> Self {
        Self {
            params,
            pool: WorkerPool::global(),
            events: Arc::new(EventHub::default()),
        }
    }

    /// Sets the worker pool used by [`correct_batch`](Self::correct_batch).
    #[must_use]
    pub fn with_pool(mut self, pool: WorkerPool) -> Self {
        self.pool = pool;
        self
    }

    /// Returns the correction parameters.
    #[must_use]
    pub fn params(&self) -> &CorrectionParams {
        &self.params
    }

    /// Subscribes to [`CorrectionEvent`]s.
    pub fn subscribe(&self) -> Receiver<CorrectionEvent> {
        self.events.subscribe()
    }

    /// Corrects a patch, returning it unchanged if it is rejected.
    #[must_use]
    pub fn correct(&self, patch: &SurfacePatch) -> SurfacePatch {
        self.correct_detailed(patch).patch
    }

    /// Like [`correct`](Self::correct), also returning the summary. A
    /// rejected patch comes back unchanged with an empty summary.
    #[must_use]
    pub fn correct_detailed(&self, patch: &SurfacePatch) -> CorrectionResult {
        self.try_correct(patch).unwrap_or_else(|e| {
            warn!(id = %patch.id, error = %e, "mesh correction skipped, keeping patch");
            CorrectionResult {
                patch: patch.clone(),
                summary: CorrectionSummary::default(),
            }
        })
    }

    /// Runs the pipeline.
    ///
    /// Out-of-range face indices are not an error here: the degenerate
    /// stage drops those faces.
    ///
    /// # Errors
    ///
    /// - [`ScanError::InvalidConfiguration`] for invalid parameters
    /// - [`ScanError::BufferSizeMismatch`] for a normals, classification or
    ///   texture coordinate array that does not match the patch
    pub fn try_correct(&self, patch: &SurfacePatch) -> ScanResult<CorrectionResult> {
        let result = self.run(patch);
        match &result {
            Ok(r) => self.events.publish(&CorrectionEvent::Completed {
                id: patch.id,
                summary: r.summary,
            }),
            Err(e) => self.events.publish(&CorrectionEvent::Failed {
                id: patch.id,
                error: e.clone(),
            }),
        };
        result
    }

    /// Corrects every patch on the worker pool, in input order.
    ///
    /// Rejected patches come back unchanged.
    ///
    /// # Errors
    ///
    /// Returns [`ScanError::Cancelled`] if `token` was cancelled before the
    /// batch finished. Patches already in progress still complete.
    pub fn correct_batch(
        &self,
        patches: &[SurfacePatch],
        token: &CancellationToken,
    ) -> ScanResult<Vec<SurfacePatch>> {
        self.pool.try_map(patches, token, |patch| self.correct(patch))
    }

    fn run(&self, patch: &SurfacePatch) -> ScanResult<CorrectionResult> {
        self.params.validate()?;
        check_buffers(patch)?;

        let p = &self.params;
        let (cleaned, faces_removed) = remove_degenerate_faces(patch, p.area_threshold);
        let smoothed = laplacian_smooth(&cleaned, p.smoothing_iterations, p.smoothing_factor);

        let mut vertices_moved = 0;
        let mut max_displacement = 0.0_f64;
        for (before, after) in cleaned.vertices.iter().zip(&smoothed.vertices) {
            let d = (after - before).norm();
            if d > 0.0 {
                vertices_moved += 1;
                max_displacement = max_displacement.max(d);
            }
        }

        let mut corrected = smooth_normals(&smoothed, p.normal_iterations);
        let mut holes = None;
        if p.fill_holes {
            let (filled, report) = fill_small_holes(&corrected, p.max_hole_edges);
            corrected = filled;
            holes = Some(report);
        }

        debug!(
            id = %patch.id,
            faces_removed,
            vertices_moved,
            max_displacement,
            "corrected patch"
        );

        Ok(CorrectionResult {
            patch: corrected,
            summary: CorrectionSummary {
                faces_removed,
                vertices_moved,
                max_displacement,
                holes,
            },
        })
    }
}

/// Checks the per-vertex and per-face attribute arrays.
fn check_buffers(patch: &SurfacePatch) -> ScanResult<()> {
    let vertex_count = patch.vertex_count();
    if !patch.normals.is_empty() && patch.normals.len() != vertex_count {
        return Err(ScanError::buffer_mismatch(vertex_count, patch.normals.len()));
    }
    if let Some(classes) = &patch.classification {
        if classes.len() != patch.face_count() && classes.len() != vertex_count {
            return Err(ScanError::buffer_mismatch(patch.face_count(), classes.len()));
        }
    }
    if let Some(uv) = &patch.texture_coordinates {
        if uv.len() != vertex_count {
            return Err(ScanError::buffer_mismatch(vertex_count, uv.len()));
        }
    }
    Ok(())
}
