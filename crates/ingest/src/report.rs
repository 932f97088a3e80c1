//! Run counters, the final report, and the observer hook.

use std::sync::atomic::{AtomicU64, Ordering};

use fleetpos_core::StoreError;
use serde::Serialize;

use crate::error::RowFailure;

/// Live counters shared between the producer and the workers.
#[derive(Debug, Default)]
pub struct IngestStats {
    pub rows_read: AtomicU64,
    pub rows_skipped: AtomicU64,
    pub records_parsed: AtomicU64,
    pub batches_dispatched: AtomicU64,
    pub batches_persisted: AtomicU64,
    pub batches_failed: AtomicU64,
    pub records_persisted: AtomicU64,
    pub records_failed: AtomicU64,
    pub worker_panics: AtomicU64,
}

impl IngestStats {
    pub(crate) fn add(counter: &AtomicU64, n: u64) {
        counter.fetch_add(n, Ordering::Relaxed);
    }

    /// Point-in-time copy of the counters.
    pub fn snapshot(&self) -> IngestReport {
        IngestReport {
            rows_read: self.rows_read.load(Ordering::Relaxed),
            rows_skipped: self.rows_skipped.load(Ordering::Relaxed),
            records_parsed: self.records_parsed.load(Ordering::Relaxed),
            batches_dispatched: self.batches_dispatched.load(Ordering::Relaxed),
            batches_persisted: self.batches_persisted.load(Ordering::Relaxed),
            batches_failed: self.batches_failed.load(Ordering::Relaxed),
            records_persisted: self.records_persisted.load(Ordering::Relaxed),
            records_failed: self.records_failed.load(Ordering::Relaxed),
            worker_panics: self.worker_panics.load(Ordering::Relaxed),
            cancelled: false,
            duration_ms: 0,
        }
    }
}

/// Summary of a finished (or cancelled) ingestion run.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct IngestReport {
    /// Data rows read, including skipped ones.
    pub rows_read: u64,
    pub rows_skipped: u64,
    pub records_parsed: u64,
    pub batches_dispatched: u64,
    pub batches_persisted: u64,
    pub batches_failed: u64,
    pub records_persisted: u64,
    pub records_failed: u64,
    pub worker_panics: u64,
    /// The run stopped early on request; queued batches were still drained.
    pub cancelled: bool,
    pub duration_ms: u64,
}

impl IngestReport {
    /// Every dispatched batch was written without error.
    pub fn is_clean(&self) -> bool {
        self.batches_failed == 0
            && self.worker_panics == 0
            && self.batches_persisted == self.batches_dispatched
    }
}

/// Result of one bulk write, as seen by a worker.
#[derive(Debug, Clone, PartialEq)]
pub struct BatchOutcome {
    pub worker_id: usize,
    pub seq: u64,
    pub records: usize,
    pub error: Option<StoreError>,
}

impl BatchOutcome {
    pub fn is_success(&self) -> bool {
        self.error.is_none()
    }
}

/// Hook for callers that want per-row and per-batch results as they happen.
///
/// Called from the producer and from worker tasks; implementations must be
/// cheap and must not block.
pub trait IngestObserver: Send + Sync {
    fn row_skipped(&self, _row: u64, _failure: &RowFailure) {}

    fn batch_completed(&self, _outcome: &BatchOutcome) {}
}

/// Observer that ignores everything.
#[derive(Debug, Default, Clone, Copy)]
pub struct NoopObserver;

impl IngestObserver for NoopObserver {}
