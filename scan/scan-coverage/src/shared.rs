//! Single-writer access to a tracker from capture callbacks.
//!
//! Capture callbacks can arrive on any thread at sensor frame rate. They
//! either go through [`SharedCoverageTracker`], which serializes updates
//! behind a mutex, or are queued on a [`CoverageQueue`] that the owning
//! thread drains.

use std::sync::Arc;

use crossbeam_channel::{Receiver, Sender, TrySendError, bounded};
use nalgebra::Matrix4;
use parking_lot::Mutex;
use tracing::{debug, warn};

use scan_types::{ScanError, ScanResult, SurfacePatch, Timestamp};

use crate::gaps::Gap;
use crate::params::CoverageParams;
use crate::tracker::{
    CoverageEvent, CoverageStatistics, CoverageTracker, UpdateOutcome, ViewGuidance,
};

/// A coverage tracker shared between threads.
///
/// Clones refer to the same tracker. [`update`](Self::update) waits for the
/// lock; [`try_update`](Self::try_update) fails with [`ScanError::Busy`]
/// instead of waiting.
///
/// # Example
///
/// ```
/// use nalgebra::{Matrix4, Point3};
/// use scan_coverage::{CoverageParams, SharedCoverageTracker};
/// use scan_types::{PatchId, SurfacePatch, Timestamp};
///
/// let shared = SharedCoverageTracker::new(CoverageParams::default());
/// let handle = shared.clone();
/// std::thread::spawn(move || {
///     let patch = SurfacePatch::new(PatchId(1), vec![Point3::new(0.0, 0.0, 1.0)], vec![]);
///     handle.update(&[patch], &Matrix4::identity(), Timestamp::zero());
/// })
/// .join()
/// .unwrap();
/// assert_eq!(shared.statistics().total_cells, 1);
/// ```
#[derive(Debug, Clone)]
pub struct SharedCoverageTracker {
    inner: Arc<Mutex<CoverageTracker>>,
}

impl Default for SharedCoverageTracker {
    fn default() -> Self {
        Self::new(CoverageParams::default())
    }
}

impl SharedCoverageTracker {
    /// Creates a shared tracker with the given parameters.
    #[must_use]
    pub fn new(params: CoverageParams) -> Self {
        Self::from_tracker(CoverageTracker::new(params))
    }

    /// Wraps an existing tracker.
    #[must_use]
    pub fn from_tracker(tracker: CoverageTracker) -> Self {
        Self {
            inner: Arc::new(Mutex::new(tracker)),
        }
    }

    /// Applies an update, waiting for any update in progress to finish.
    pub fn update(
        &self,
        patches: &[SurfacePatch],
        camera_transform: &Matrix4<f64>,
        now: Timestamp,
    ) -> UpdateOutcome {
        self.inner.lock().update_coverage(patches, camera_transform, now)
    }

    /// Applies an update whose patches are produced by `patches` only once
    /// the rate limit has been checked.
    ///
    /// A throttled update returns [`UpdateOutcome::Throttled`] without
    /// calling `patches`, so an expensive gather is skipped at frame rate.
    pub fn update_with(
        &self,
        camera_transform: &Matrix4<f64>,
        now: Timestamp,
        patches: impl FnOnce() -> Vec<SurfacePatch>,
    ) -> UpdateOutcome {
        let mut tracker = self.inner.lock();
        if tracker.is_throttled(now) {
            return UpdateOutcome::Throttled;
        }
        tracker.update_coverage(&patches(), camera_transform, now)
    }

    /// Applies an update only if no other update is in progress.
    ///
    /// # Errors
    ///
    /// Returns [`ScanError::Busy`] if the tracker is locked, or the
    /// tracker's own error for invalid parameters or pose.
    pub fn try_update(
        &self,
        patches: &[SurfacePatch],
        camera_transform: &Matrix4<f64>,
        now: Timestamp,
    ) -> ScanResult<UpdateOutcome> {
        let Some(mut tracker) = self.inner.try_lock() else {
            debug!("coverage tracker busy, rejecting update");
            return Err(ScanError::Busy);
        };
        tracker.try_update_coverage(patches, camera_transform, now)
    }

    /// Runs `f` with exclusive access to the tracker.
    pub fn with<R>(&self, f: impl FnOnce(&mut CoverageTracker) -> R) -> R {
        f(&mut self.inner.lock())
    }

    /// Current coverage figures.
    #[must_use]
    pub fn statistics(&self) -> CoverageStatistics {
        self.inner.lock().statistics()
    }

    /// Copy of the current gaps.
    #[must_use]
    pub fn gaps(&self) -> Vec<Gap> {
        self.inner.lock().gaps().to_vec()
    }

    /// Guidance toward the highest-priority gap, if any.
    #[must_use]
    pub fn guidance(&self) -> Option<ViewGuidance> {
        self.inner.lock().guidance()
    }

    /// Subscribes to the tracker's events.
    pub fn subscribe(&self) -> Receiver<CoverageEvent> {
        self.inner.lock().subscribe()
    }

    /// Clears the tracker for a new scan.
    pub fn reset(&self) {
        self.inner.lock().reset();
    }
}

/// One capture callback's worth of tracker input.
#[derive(Debug, Clone, PartialEq)]
pub struct CoverageInput {
    /// Patches observed in this frame.
    pub patches: Vec<SurfacePatch>,
    /// Camera-to-world pose.
    pub camera_transform: Matrix4<f64>,
    /// Capture time.
    pub timestamp: Timestamp,
}

/// Outcome counts from one [`CoverageQueue::process_pending`] call.
///
/// Throttled and rejected inputs are consumed from the queue but their
/// patches were not sampled; resubmit them with a later timestamp if they
/// still matter.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct QueueDrain {
    /// Inputs taken from the queue.
    pub drained: usize,
    /// Inputs applied to the tracker.
    pub applied: usize,
    /// Inputs dropped by the update interval.
    pub throttled: usize,
    /// Inputs rejected for invalid parameters or pose.
    pub rejected: usize,
}

/// Bounded queue of tracker inputs.
///
/// Producers on any thread [`submit`](Self::submit) without blocking; a full
/// queue rejects the input. The owner of the tracker drains the queue in
/// arrival order with [`process_pending`](Self::process_pending). Clones
/// share the same queue.
///
/// # Example
///
/// ```
/// use nalgebra::{Matrix4, Point3};
/// use scan_coverage::{CoverageInput, CoverageQueue, CoverageTracker};
/// use scan_types::{PatchId, SurfacePatch, Timestamp};
///
/// let queue = CoverageQueue::new(8);
/// queue
///     .submit(CoverageInput {
///         patches: vec![SurfacePatch::new(PatchId(1), vec![Point3::new(0.0, 0.0, 1.0)], vec![])],
///         camera_transform: Matrix4::identity(),
///         timestamp: Timestamp::zero(),
///     })
///     .unwrap();
///
/// let mut tracker = CoverageTracker::default();
/// let drain = queue.process_pending(&mut tracker);
/// assert_eq!((drain.drained, drain.applied), (1, 1));
/// assert_eq!(tracker.cell_count(), 1);
/// ```
#[derive(Debug, Clone)]
pub struct CoverageQueue {
    tx: Sender<CoverageInput>,
    rx: Receiver<CoverageInput>,
}

impl CoverageQueue {
    /// Creates a queue holding up to `capacity` inputs (at least one).
    #[must_use]
    pub fn new(capacity: usize) -> Self {
        let (tx, rx) = bounded(capacity.max(1));
        Self { tx, rx }
    }

    /// Enqueues an input without blocking.
    ///
    /// # Errors
    ///
    /// Returns [`ScanError::Busy`] if the queue is full.
    pub fn submit(&self, input: CoverageInput) -> ScanResult<()> {
        match self.tx.try_send(input) {
            Ok(()) => Ok(()),
            Err(TrySendError::Full(_) | TrySendError::Disconnected(_)) => {
                warn!(capacity = self.capacity(), "coverage queue full, dropping input");
                Err(ScanError::Busy)
            }
        }
    }

    /// Applies every queued input to `tracker` in arrival order.
    ///
    /// Inputs closer together than the tracker's `update_interval` are
    /// throttled like direct updates; the returned [`QueueDrain`] says how
    /// many.
    pub fn process_pending(&self, tracker: &mut CoverageTracker) -> QueueDrain {
        let mut drain = QueueDrain::default();
        for input in self.rx.try_iter() {
            drain.drained += 1;
            match tracker.update_coverage(&input.patches, &input.camera_transform, input.timestamp)
            {
                UpdateOutcome::Applied(_) => drain.applied += 1,
                UpdateOutcome::Throttled => drain.throttled += 1,
                UpdateOutcome::Rejected => drain.rejected += 1,
            }
        }
        if drain.throttled > 0 {
            warn!(
                drained = drain.drained,
                throttled = drain.throttled,
                "queued coverage inputs dropped by update interval"
            );
        }
        drain
    }

    /// Inputs waiting.
    #[must_use]
    pub fn len(&self) -> usize {
        self.rx.len()
    }

    /// Returns true if nothing is waiting.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.rx.is_empty()
    }

    /// Maximum number of waiting inputs.
    #[must_use]
    pub fn capacity(&self) -> usize {
        self.tx.capacity().unwrap_or(0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use nalgebra::Point3;
    use scan_types::PatchId;
    use std::time::Duration;

    fn input(id: u128, x: f64, t: u64) -> CoverageInput {
        CoverageInput {
            patches: vec![SurfacePatch::new(PatchId(id), vec![Point3::new(x, 0.0, 1.0)], vec![])],
            camera_transform: Matrix4::identity(),
            timestamp: Timestamp::from_millis(t),
        }
    }

    #[test]
    fn try_update_rejects_when_locked() {
        let shared = SharedCoverageTracker::default();
        let other = shared.clone();
        shared.with(|_| {
            let i = input(1, 0.0, 0);
            assert_eq!(
                other.try_update(&i.patches, &i.camera_transform, i.timestamp),
                Err(ScanError::Busy)
            );
        });
        let i = input(1, 0.0, 0);
        assert!(matches!(
            other.try_update(&i.patches, &i.camera_transform, i.timestamp),
            Ok(UpdateOutcome::Applied(_))
        ));
    }

    #[test]
    fn concurrent_updates_serialized() {
        let params = CoverageParams::default().with_update_interval(Duration::ZERO);
        let shared = SharedCoverageTracker::new(params);
        let handles: Vec<_> = (0..4_u32)
            .map(|t| {
                let shared = shared.clone();
                std::thread::spawn(move || {
                    for k in 0..10_u32 {
                        let id = u128::from(t * 100 + k);
                        let x = f64::from(t * 10 + k) * 0.1 + 0.05;
                        let i = input(id, x, u64::from(k));
                        shared.update(&i.patches, &i.camera_transform, i.timestamp);
                    }
                })
            })
            .collect();
        for h in handles {
            h.join().unwrap();
        }
        assert_eq!(shared.statistics().total_cells, 40);
    }

    #[test]
    fn queue_bounded_and_ordered() {
        let queue = CoverageQueue::new(2);
        assert!(queue.is_empty());
        queue.submit(input(1, 0.05, 0)).unwrap();
        queue.submit(input(2, 0.15, 300)).unwrap();
        assert_eq!(queue.submit(input(3, 0.25, 600)), Err(ScanError::Busy));
        assert_eq!(queue.len(), 2);
        assert_eq!(queue.capacity(), 2);

        let mut tracker = CoverageTracker::default();
        let drain = queue.process_pending(&mut tracker);
        assert_eq!(drain.drained, 2);
        assert_eq!(drain.applied, 2);
        assert!(queue.is_empty());
        assert_eq!(tracker.cell_count(), 2);
    }

    #[test]
    fn producers_on_other_threads() {
        let queue = CoverageQueue::new(16);
        let producer = queue.clone();
        std::thread::spawn(move || {
            for k in 0..3_u32 {
                producer
                    .submit(input(u128::from(k), f64::from(k) + 0.05, u64::from(k) * 300))
                    .unwrap();
            }
        })
        .join()
        .unwrap();

        let mut tracker = CoverageTracker::default();
        assert_eq!(queue.process_pending(&mut tracker).applied, 3);
        assert_eq!(tracker.cell_count(), 3);
    }

    #[test]
    fn drain_reports_throttled_inputs() {
        let queue = CoverageQueue::new(4);
        queue.submit(input(1, 0.05, 0)).unwrap();
        queue.submit(input(2, 0.15, 100)).unwrap();
        queue.submit(input(3, 0.25, 250)).unwrap();

        let mut tracker = CoverageTracker::default();
        let drain = queue.process_pending(&mut tracker);
        assert_eq!(
            drain,
            QueueDrain {
                drained: 3,
                applied: 2,
                throttled: 1,
                rejected: 0,
            }
        );
        assert_eq!(tracker.cell_count(), 2);
        assert!(!tracker.is_processed(PatchId(2), 0));
    }

    #[test]
    fn throttled_update_skips_gather() {
        let shared = SharedCoverageTracker::default();
        let first = input(1, 0.05, 0);
        assert!(matches!(
            shared.update_with(&first.camera_transform, first.timestamp, || first.patches.clone()),
            UpdateOutcome::Applied(_)
        ));

        let mut gathered = false;
        let outcome = shared.update_with(&Matrix4::identity(), Timestamp::from_millis(50), || {
            gathered = true;
            Vec::new()
        });
        assert_eq!(outcome, UpdateOutcome::Throttled);
        assert!(!gathered);

        let later = input(2, 0.15, 200);
        assert!(matches!(
            shared.update_with(&later.camera_transform, later.timestamp, || later.patches),
            UpdateOutcome::Applied(_)
        ));
        assert_eq!(shared.statistics().total_cells, 2);
    }
}
