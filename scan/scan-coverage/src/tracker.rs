//! The coverage tracker.

use std::collections::VecDeque;

use crossbeam_channel::Receiver;
use hashbrown::{HashMap, HashSet};
use nalgebra::{Matrix4, Point3, Vector3};
use tracing::{debug, info, warn};

#[cfg(feature = "serde")]
use serde::{Deserialize, Serialize};

use scan_types::{EventHub, PatchId, ScanError, ScanResult, SurfacePatch, Timestamp, translation};

use crate::cell::{CellCoord, CoverageCell, CoverageQuality};
use crate::gaps::{Gap, detect_gaps};
use crate::params::CoverageParams;

/// Aggregate coverage figures for on-screen feedback.
#[derive(Debug, Clone, Copy, Default, PartialEq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct CoverageStatistics {
    /// Cells observed at least once.
    pub total_cells: usize,
    /// Cells at Fair or better.
    pub covered_cells: usize,
    /// `covered_cells / total_cells` as a percentage (0 with no cells).
    pub coverage_percentage: f64,
    /// Mean quality ordinal, from 0 (None) to 4 (Excellent).
    pub average_quality: f64,
    /// Gaps currently reported.
    pub gap_count: usize,
    /// Percentage of cells at Good or better.
    pub estimated_completion: f64,
    /// `covered_cells` times the cell face area, in square meters.
    pub scanned_area_m2: f64,
}

/// Where the user should move next, from the highest-priority gap.
#[derive(Debug, Clone, Copy, PartialEq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct ViewGuidance {
    /// Center of the gap to capture.
    pub gap_center: Point3<f64>,
    /// Unit direction to look along.
    pub view_direction: Vector3<f64>,
    /// Suggested camera position.
    pub camera_position: Point3<f64>,
}

impl From<&Gap> for ViewGuidance {
    fn from(gap: &Gap) -> Self {
        Self {
            gap_center: gap.center,
            view_direction: gap.suggested_view_direction,
            camera_position: gap.suggested_camera_position,
        }
    }
}

/// What an applied update changed.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct UpdateSummary {
    /// Patches sampled (not previously processed at this revision).
    pub patches_sampled: usize,
    /// Patches skipped as already processed.
    pub patches_skipped: usize,
    /// Patches rejected as invalid.
    pub patches_rejected: usize,
    /// World points sampled within range.
    pub points_sampled: usize,
    /// Cells created.
    pub cells_added: usize,
    /// Distinct views recorded.
    pub views_added: usize,
    /// Whether gap detection ran.
    pub gaps_recomputed: bool,
}

/// Result of [`CoverageTracker::update_coverage`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum UpdateOutcome {
    /// The update arrived within the rate limit and was ignored.
    Throttled,
    /// The update was rejected (invalid parameters or camera pose).
    Rejected,
    /// The update was applied.
    Applied(UpdateSummary),
}

/// Notifications published by the tracker.
#[derive(Debug, Clone, PartialEq)]
pub enum CoverageEvent {
    /// Coverage changed after an applied update.
    Updated(CoverageStatistics),
    /// Gap detection produced a new gap list.
    GapsDetected(Vec<Gap>),
    /// The tracker was reset for a new scan.
    Reset,
}

/// Accumulates per-cell view statistics from surface patches and camera
/// poses, and derives gaps and guidance from them.
///
/// Updates are rate-limited and gap detection is throttled, both against the
/// caller-supplied capture time.
///
/// # Example
///
/// ```
/// use nalgebra::{Matrix4, Point3};
/// use scan_coverage::{CoverageParams, CoverageQuality, CoverageTracker};
/// use scan_types::{PatchId, SurfacePatch, Timestamp};
///
/// let mut tracker = CoverageTracker::new(CoverageParams::default());
/// let patch = SurfacePatch::new(PatchId(1), vec![Point3::new(0.05, 0.05, 1.05)], vec![]);
/// tracker.update_coverage(&[patch], &Matrix4::identity(), Timestamp::zero());
///
/// assert_eq!(tracker.cell_count(), 1);
/// let cell = tracker.cells().next().unwrap();
/// assert_eq!(cell.view_count, 1);
/// assert_eq!(cell.quality, CoverageQuality::Poor);
/// ```
#[derive(Debug)]
pub struct CoverageTracker {
    params: CoverageParams,
    cells: HashMap<CellCoord, CoverageCell>,
    gaps: Vec<Gap>,
    processed: HashSet<(PatchId, u64)>,
    trajectory: VecDeque<Matrix4<f64>>,
    last_update: Option<Timestamp>,
    last_gap_detection: Option<Timestamp>,
    cells_since_gap_detection: usize,
    events: EventHub<CoverageEvent>,
}

impl Default for CoverageTracker {
    fn default() -> Self {
        Self::new(CoverageParams::default())
    }
}

impl CoverageTracker {
    /// Creates an empty tracker.
    #[must_use]
    pub fn new(params: CoverageParams) -> Self {
        Self {
            params,
            cells: HashMap::new(),
            gaps: Vec::new(),
            processed: HashSet::new(),
            trajectory: VecDeque::new(),
            last_update: None,
            last_gap_detection: None,
            cells_since_gap_detection: 0,
            events: EventHub::default(),
        }
    }

    /// Returns the tracker parameters.
    #[must_use]
    pub fn params(&self) -> &CoverageParams {
        &self.params
    }

    /// Subscribes to [`CoverageEvent`]s.
    pub fn subscribe(&self) -> Receiver<CoverageEvent> {
        self.events.subscribe()
    }

    /// Ingests patches observed from `camera_transform` (camera-to-world).
    ///
    /// Invalid patches are skipped with a warning; an invalid parameter set
    /// or camera pose rejects the whole update.
    pub fn update_coverage(
        &mut self,
        patches: &[SurfacePatch],
        camera_transform: &Matrix4<f64>,
        now: Timestamp,
    ) -> UpdateOutcome {
        match self.try_update_coverage(patches, camera_transform, now) {
            Ok(outcome) => outcome,
            Err(e) => {
                warn!(error = %e, "coverage update rejected");
                UpdateOutcome::Rejected
            }
        }
    }

    /// Fallible form of [`update_coverage`](Self::update_coverage).
    ///
    /// 1. Updates closer than `update_interval` to the last applied one are
    ///    ignored.
    /// 2. Each patch not yet processed at its revision has up to
    ///    `samples_per_patch` vertices sampled (evenly strided) into world
    ///    space; samples beyond `max_update_distance` are discarded.
    /// 3. Every sample records its camera-to-point direction in its cell
    ///    unless a recorded direction is within the threshold angle.
    /// 4. Gap detection runs once `gap_trigger_cells` new cells have
    ///    accumulated or `gap_interval` has passed.
    ///
    /// # Errors
    ///
    /// - [`ScanError::InvalidConfiguration`] for invalid parameters
    /// - [`ScanError::InvalidInput`] for a non-finite camera transform
    pub fn try_update_coverage(
        &mut self,
        patches: &[SurfacePatch],
        camera_transform: &Matrix4<f64>,
        now: Timestamp,
    ) -> ScanResult<UpdateOutcome> {
        self.params.validate()?;
        if camera_transform.iter().any(|v| !v.is_finite()) {
            return Err(ScanError::invalid_input("camera transform is not finite"));
        }

        if self.is_throttled(now) {
            return Ok(UpdateOutcome::Throttled);
        }
        self.last_update = Some(now);
        self.record_pose(*camera_transform);

        let camera = translation(camera_transform);
        let resolution = self.params.grid_resolution;
        let cos_threshold = self.params.angle_threshold_cos();
        let min_excellent = self.params.min_views_for_excellent;
        let max_distance = self.params.max_update_distance;

        let mut summary = UpdateSummary::default();

        for patch in patches {
            let key = (patch.id, patch.revision);
            if self.processed.contains(&key) {
                summary.patches_skipped += 1;
                continue;
            }
            if let Err(e) = patch.validate() {
                warn!(id = %patch.id, error = %e, "skipping invalid patch for coverage");
                summary.patches_rejected += 1;
                continue;
            }

            let stride = patch
                .vertex_count()
                .div_ceil(self.params.samples_per_patch)
                .max(1);
            for local in patch.vertices.iter().step_by(stride) {
                let point = patch.transform.transform_point(local);
                let offset = point - camera;
                let distance = offset.norm();
                if !distance.is_finite() || distance > max_distance {
                    continue;
                }
                let Some(direction) = offset.try_normalize(f64::EPSILON) else {
                    continue;
                };
                summary.points_sampled += 1;

                let coord = CellCoord::from_point(&point, resolution);
                let cell = self.cells.entry(coord).or_insert_with(|| {
                    summary.cells_added += 1;
                    CoverageCell::new(coord, resolution, now)
                });
                if cell.observe(direction, cos_threshold, min_excellent, now) {
                    summary.views_added += 1;
                }
            }

            self.processed.insert(key);
            summary.patches_sampled += 1;
        }

        self.cells_since_gap_detection += summary.cells_added;
        let due = self
            .last_gap_detection
            .is_none_or(|last| now.saturating_since(last) >= self.params.gap_interval);
        if self.cells_since_gap_detection >= self.params.gap_trigger_cells || due {
            self.gaps = detect_gaps(&self.cells, &camera, &self.params);
            self.last_gap_detection = Some(now);
            self.cells_since_gap_detection = 0;
            summary.gaps_recomputed = true;
            self.events.publish(&CoverageEvent::GapsDetected(self.gaps.clone()));
        }

        let stats = self.statistics();
        debug!(
            patches = summary.patches_sampled,
            points = summary.points_sampled,
            cells_added = summary.cells_added,
            views_added = summary.views_added,
            coverage = stats.coverage_percentage,
            "coverage updated"
        );
        self.events.publish(&CoverageEvent::Updated(stats));

        Ok(UpdateOutcome::Applied(summary))
    }

    /// Returns true if an update at `now` would be dropped by the
    /// `update_interval` rate limit.
    #[must_use]
    pub fn is_throttled(&self, now: Timestamp) -> bool {
        self.last_update
            .is_some_and(|last| now.saturating_since(last) < self.params.update_interval)
    }

    fn record_pose(&mut self, pose: Matrix4<f64>) {
        if self.params.trajectory_capacity == 0 {
            return;
        }
        while self.trajectory.len() >= self.params.trajectory_capacity {
            self.trajectory.pop_front();
        }
        self.trajectory.push_back(pose);
    }

    /// Current coverage figures.
    #[must_use]
    #[allow(clippy::cast_precision_loss)]
    pub fn statistics(&self) -> CoverageStatistics {
        let total = self.cells.len();
        let covered = self.cells.values().filter(|c| c.quality.is_covered()).count();
        let good = self
            .cells
            .values()
            .filter(|c| c.quality >= CoverageQuality::Good)
            .count();
        let quality_sum: u64 = self.cells.values().map(|c| u64::from(c.quality.ordinal())).sum();

        let percent = |n: usize| {
            if total == 0 {
                0.0
            } else {
                n as f64 / total as f64 * 100.0
            }
        };

        CoverageStatistics {
            total_cells: total,
            covered_cells: covered,
            coverage_percentage: percent(covered),
            average_quality: if total == 0 {
                0.0
            } else {
                quality_sum as f64 / total as f64
            },
            gap_count: self.gaps.len(),
            estimated_completion: percent(good),
            scanned_area_m2: covered as f64 * self.params.cell_area(),
        }
    }

    /// Gaps from the last detection, highest priority first.
    #[must_use]
    pub fn gaps(&self) -> &[Gap] {
        &self.gaps
    }

    /// Guidance toward the highest-priority gap, if any.
    #[must_use]
    pub fn guidance(&self) -> Option<ViewGuidance> {
        self.gaps.first().map(ViewGuidance::from)
    }

    /// Number of observed cells.
    #[must_use]
    pub fn cell_count(&self) -> usize {
        self.cells.len()
    }

    /// Looks up one cell.
    #[must_use]
    pub fn cell(&self, coord: CellCoord) -> Option<&CoverageCell> {
        self.cells.get(&coord)
    }

    /// All observed cells, in no particular order.
    pub fn cells(&self) -> impl Iterator<Item = &CoverageCell> {
        self.cells.values()
    }

    /// Camera poses of applied updates, oldest first.
    pub fn trajectory(&self) -> impl Iterator<Item = &Matrix4<f64>> {
        self.trajectory.iter()
    }

    /// Returns true if the patch revision has already been sampled.
    #[must_use]
    pub fn is_processed(&self, id: PatchId, revision: u64) -> bool {
        self.processed.contains(&(id, revision))
    }

    /// Clears all state for a new scan. Subscribers are kept.
    pub fn reset(&mut self) {
        self.cells.clear();
        self.gaps.clear();
        self.processed.clear();
        self.trajectory.clear();
        self.last_update = None;
        self.last_gap_detection = None;
        self.cells_since_gap_detection = 0;
        info!("coverage tracker reset");
        self.events.publish(&CoverageEvent::Reset);
    }
}
