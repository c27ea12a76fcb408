use std::sync::atomic::{AtomicU32, AtomicU64, Ordering};
use serde::Serialize;

use crate::worker::RefreshOutcome;

/// Outcome counters, shared between the worker and whoever reports on it
#[derive(Debug, Default)]
pub struct WorkerStats {
    refreshed: AtomicU64,
    skipped: AtomicU64,
    missed: AtomicU64,
    requeued: AtomicU64,
    failed: AtomicU64,
    consecutive_errors: AtomicU32,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct WorkerStatsSnapshot {
    pub refreshed: u64,
    pub skipped: u64,
    pub missed: u64,
    pub requeued: u64,
    pub failed: u64,
    pub consecutive_errors: u32,
}

impl WorkerStatsSnapshot {
    /// Iterations that persisted metadata
    pub fn completed(&self) -> u64 {
        self.refreshed + self.skipped + self.missed
    }
}

impl WorkerStats {
    pub fn record_outcome(&self, outcome: RefreshOutcome) {
        let counter = match outcome {
            RefreshOutcome::Refreshed => &self.refreshed,
            RefreshOutcome::Skipped => &self.skipped,
            RefreshOutcome::Missed => &self.missed,
            RefreshOutcome::Requeued => &self.requeued,
        };
        counter.fetch_add(1, Ordering::SeqCst);
        metrics::counter!("pw_refresh_outcome_total", "outcome" => outcome.as_str()).increment(1);
    }

    pub fn record_failure(&self, consecutive_errors: u32) {
        self.failed.fetch_add(1, Ordering::SeqCst);
        self.consecutive_errors.store(consecutive_errors, Ordering::SeqCst);
        metrics::counter!("pw_refresh_errors_total").increment(1);
    }

    pub fn reset_errors(&self) {
        self.consecutive_errors.store(0, Ordering::SeqCst);
    }

    pub fn snapshot(&self) -> WorkerStatsSnapshot {
        WorkerStatsSnapshot {
            refreshed: self.refreshed.load(Ordering::SeqCst),
            skipped: self.skipped.load(Ordering::SeqCst),
            missed: self.missed.load(Ordering::SeqCst),
            requeued: self.requeued.load(Ordering::SeqCst),
            failed: self.failed.load(Ordering::SeqCst),
            consecutive_errors: self.consecutive_errors.load(Ordering::SeqCst),
        }
    }
}
