//! Ingestion run orchestration.
//!
//! An [`Ingestor`] owns one run end to end: it starts the worker pool, reads
//! and batches the input on the calling task, then closes the queue and waits
//! for every worker before returning.
//!
//! ```text
//! input ──▶ RowReader ──▶ parse_row ──▶ BatchBuilder ──▶ [bounded queue] ──▶ worker × N ──▶ store
//! ```
//!
//! The queue is bounded: a full queue suspends the producer until a worker
//! takes a batch, so memory stays proportional to
//! `queue_capacity × batch_size` regardless of input size.

use std::sync::Arc;
use std::time::Instant;

use chrono::Utc;
use fleetpos_core::{IngestConfig, LocationStore};
use tokio::io::{AsyncRead, BufReader};
use tokio_util::sync::CancellationToken;
use tracing::{error, info, warn};

use crate::error::IngestError;
use crate::producer::{produce_batches, ProduceContext, ProduceOutcome};
use crate::reader::RowReader;
use crate::report::{IngestObserver, IngestReport, IngestStats, NoopObserver};
use crate::worker::WorkerPool;

pub struct Ingestor {
    store: Arc<dyn LocationStore>,
    config: IngestConfig,
    observer: Arc<dyn IngestObserver>,
}

impl Ingestor {
    pub fn new(store: Arc<dyn LocationStore>, config: IngestConfig) -> Self {
        Self {
            store,
            config,
            observer: Arc::new(NoopObserver),
        }
    }

    pub fn with_observer(mut self, observer: Arc<dyn IngestObserver>) -> Self {
        self.observer = observer;
        self
    }

    pub fn config(&self) -> &IngestConfig {
        &self.config
    }

    /// Ingest the whole input.
    ///
    /// Returns a report once every dispatched batch has been attempted.
    /// Per-row and per-batch failures are counted in the report; only an
    /// unreadable input stream fails the run.
    pub async fn ingest<R>(&self, input: R) -> Result<IngestReport, IngestError>
    where
        R: AsyncRead + Unpin + Send,
    {
        self.ingest_until(input, CancellationToken::new()).await
    }

    /// Like [`ingest`](Self::ingest), but stops dispatching new batches once
    /// `cancel` fires. Batches already queued are still written and the
    /// report comes back with `cancelled` set.
    pub async fn ingest_until<R>(
        &self,
        input: R,
        cancel: CancellationToken,
    ) -> Result<IngestReport, IngestError>
    where
        R: AsyncRead + Unpin + Send,
    {
        let started = Instant::now();
        let observed_at = Utc::now();
        let batch_size = self.config.batch_size.max(1);
        let workers = self.config.max_workers.max(1);
        let capacity = self.config.queue_capacity.max(1);

        info!(batch_size, workers, queue_capacity = capacity, "Ingestion started");

        let stats = Arc::new(IngestStats::default());
        let (tx, rx) = async_channel::bounded(capacity);
        let pool = WorkerPool::spawn(
            workers,
            rx,
            Arc::clone(&self.store),
            Arc::clone(&stats),
            Arc::clone(&self.observer),
        );

        let mut reader = RowReader::new(BufReader::new(input), self.config.delimiter);
        let produced = produce_batches(
            &mut reader,
            &tx,
            ProduceContext {
                batch_size,
                observed_at,
                stats: &stats,
                observer: self.observer.as_ref(),
                cancel: &cancel,
            },
        )
        .await;

        tx.close();
        pool.join().await;

        let mut report = stats.snapshot();
        report.duration_ms = u64::try_from(started.elapsed().as_millis()).unwrap_or(u64::MAX);

        match produced {
            Ok(outcome) => {
                report.cancelled = outcome == ProduceOutcome::Cancelled;
                if report.cancelled {
                    warn!(
                        rows_read = report.rows_read,
                        batches_dispatched = report.batches_dispatched,
                        "Ingestion cancelled"
                    );
                } else {
                    info!(
                        rows_read = report.rows_read,
                        rows_skipped = report.rows_skipped,
                        batches_persisted = report.batches_persisted,
                        batches_failed = report.batches_failed,
                        duration_ms = report.duration_ms,
                        "Ingestion complete"
                    );
                }
                Ok(report)
            }
            Err(e) => {
                error!(
                    error = %e,
                    batches_dispatched = report.batches_dispatched,
                    batches_persisted = report.batches_persisted,
                    "Ingestion aborted"
                );
                Err(e)
            }
        }
    }
}
