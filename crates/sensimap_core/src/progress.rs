use std::sync::Arc;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};

#[derive(Debug, Default)]
struct Counters {
    completed: AtomicUsize,
    total: AtomicUsize,
    cancelled: AtomicBool,
}

/// Shared progress and cancellation handle for a sensitivity run.
///
/// Clones observe the same run, so a front end can poll or cancel through
/// one handle while the executor holds another. Cancellation is sticky: once
/// cancelled, a handle stays cancelled for every later run it is passed to.
#[derive(Debug, Clone, Default)]
pub struct RunProgress {
    counters: Arc<Counters>,
}

impl RunProgress {
    #[must_use]
    pub fn new(total: usize) -> Self {
        let progress = Self::default();
        progress.counters.total.store(total, Ordering::Relaxed);
        progress
    }

    /// Jobs finished so far, failed ones included
    #[must_use]
    pub fn completed(&self) -> usize {
        self.counters.completed.load(Ordering::Relaxed)
    }

    /// Jobs in the current batch
    #[must_use]
    pub fn total(&self) -> usize {
        self.counters.total.load(Ordering::Relaxed)
    }

    /// Completed share of the batch in `[0, 1]`; zero before a batch starts
    #[must_use]
    pub fn fraction(&self) -> f64 {
        match self.total() {
            0 => 0.0,
            total => (self.completed() as f64 / total as f64).min(1.0),
        }
    }

    pub fn increment(&self) {
        self.counters.completed.fetch_add(1, Ordering::Relaxed);
    }

    /// Start counting a new batch of `total` jobs; cancellation is kept
    pub fn reset(&self, total: usize) {
        self.counters.completed.store(0, Ordering::Relaxed);
        self.counters.total.store(total, Ordering::Relaxed);
    }

    /// Ask executors to skip every job they have not started
    pub fn cancel(&self) {
        self.counters.cancelled.store(true, Ordering::Relaxed);
    }

    #[must_use]
    pub fn is_cancelled(&self) -> bool {
        self.counters.cancelled.load(Ordering::Relaxed)
    }
}
