//! Bounded worker pool and batch cancellation.
//!
//! Batch operations (many patches, many meshes) run their per-item work on a
//! [`WorkerPool`] and join before returning, so results always come back in
//! input order and callers merge them serially. A [`CancellationToken`] lets
//! a caller abandon a batch between items; an item that has started always
//! runs to completion.

use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};

use rayon::prelude::*;

use crate::error::{ScanError, ScanResult};

/// Cooperative cancellation flag shared between a caller and a batch.
///
/// # Example
///
/// ```
/// use scan_types::CancellationToken;
///
/// let token = CancellationToken::new();
/// let handle = token.clone();
/// handle.cancel();
/// assert!(token.is_cancelled());
/// ```
#[derive(Debug, Clone, Default)]
pub struct CancellationToken {
    cancelled: Arc<AtomicBool>,
}

impl CancellationToken {
    /// Creates an un-cancelled token.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Requests cancellation.
    pub fn cancel(&self) {
        self.cancelled.store(true, Ordering::Release);
    }

    /// Returns true once [`cancel`](Self::cancel) has been called on any clone.
    #[must_use]
    pub fn is_cancelled(&self) -> bool {
        self.cancelled.load(Ordering::Acquire)
    }
}

#[derive(Debug, Clone)]
enum Mode {
    Global,
    Dedicated(Arc<rayon::ThreadPool>),
    Sequential,
}

/// Where batch work runs.
#[derive(Debug, Clone)]
pub struct WorkerPool {
    mode: Mode,
}

impl Default for WorkerPool {
    fn default() -> Self {
        Self::global()
    }
}

impl WorkerPool {
    /// Uses rayon's global thread pool.
    #[must_use]
    pub const fn global() -> Self {
        Self { mode: Mode::Global }
    }

    /// Runs everything on the calling thread, in order.
    #[must_use]
    pub const fn sequential() -> Self {
        Self {
            mode: Mode::Sequential,
        }
    }

    /// Creates a dedicated pool with at most `threads` workers.
    ///
    /// # Errors
    ///
    /// Returns [`ScanError::InvalidConfiguration`] if `threads` is zero or
    /// the pool cannot be created.
    pub fn with_threads(threads: usize) -> ScanResult<Self> {
        if threads == 0 {
            return Err(ScanError::invalid_config("worker pool needs at least one thread"));
        }
        let pool = rayon::ThreadPoolBuilder::new()
            .num_threads(threads)
            .thread_name(|i| format!("scan-worker-{i}"))
            .build()
            .map_err(|e| ScanError::invalid_config(e.to_string()))?;
        Ok(Self {
            mode: Mode::Dedicated(Arc::new(pool)),
        })
    }

    /// Returns true if work runs on the calling thread only.
    #[must_use]
    pub const fn is_sequential(&self) -> bool {
        matches!(self.mode, Mode::Sequential)
    }

    /// Maps `f` over `items`, returning results in input order.
    pub fn map<T, R, F>(&self, items: &[T], f: F) -> Vec<R>
    where
        T: Sync,
        R: Send,
        F: Fn(&T) -> R + Sync + Send,
    {
        match &self.mode {
            Mode::Sequential => items.iter().map(f).collect(),
            Mode::Global => items.par_iter().map(f).collect(),
            Mode::Dedicated(pool) => pool.install(|| items.par_iter().map(f).collect()),
        }
    }

    /// Like [`map`](Self::map), but checks `token` before starting each item.
    ///
    /// # Errors
    ///
    /// Returns [`ScanError::Cancelled`] if the token was cancelled before the
    /// batch finished. Partial results are discarded.
    pub fn try_map<T, R, F>(&self, items: &[T], token: &CancellationToken, f: F) -> ScanResult<Vec<R>>
    where
        T: Sync,
        R: Send,
        F: Fn(&T) -> R + Sync + Send,
    {
        let guarded = |item: &T| {
            if token.is_cancelled() {
                None
            } else {
                Some(f(item))
            }
        };
        let results: Vec<Option<R>> = self.map(items, guarded);
        if token.is_cancelled() {
            return Err(ScanError::Cancelled);
        }
        results.into_iter().collect::<Option<Vec<R>>>().ok_or(ScanError::Cancelled)
    }
}
