//! Fixed pool of persistence workers draining the shared work queue.

use std::any::Any;
use std::panic::AssertUnwindSafe;
use std::sync::Arc;

use async_channel::Receiver;
use fleetpos_core::{LocationStore, StoreError};
use futures::future::join_all;
use futures::FutureExt;
use tokio::task::JoinHandle;
use tracing::{debug, error, warn};

use crate::batcher::Batch;
use crate::report::{BatchOutcome, IngestObserver, IngestStats};

pub(crate) struct WorkerPool {
    handles: Vec<JoinHandle<()>>,
    stats: Arc<IngestStats>,
}

impl WorkerPool {
    /// Spawn `count` workers (at least one), each pulling from `rx`.
    pub(crate) fn spawn(
        count: usize,
        rx: Receiver<Batch>,
        store: Arc<dyn LocationStore>,
        stats: Arc<IngestStats>,
        observer: Arc<dyn IngestObserver>,
    ) -> Self {
        let handles = (0..count.max(1))
            .map(|worker_id| {
                let rx = rx.clone();
                let store = Arc::clone(&store);
                let stats = Arc::clone(&stats);
                let observer = Arc::clone(&observer);
                tokio::spawn(async move {
                    run_worker(worker_id, rx, store, stats, observer).await;
                })
            })
            .collect();
        Self { handles, stats }
    }

    /// Wait for every worker to exit. Workers exit once the queue is closed
    /// and empty. A worker task that died anyway is logged and counted.
    pub(crate) async fn join(self) {
        for (worker_id, result) in join_all(self.handles).await.into_iter().enumerate() {
            if let Err(e) = result {
                error!(worker_id, error = %e, "Ingest worker panicked");
                IngestStats::add(&self.stats.worker_panics, 1);
            }
        }
    }
}

async fn run_worker(
    worker_id: usize,
    rx: Receiver<Batch>,
    store: Arc<dyn LocationStore>,
    stats: Arc<IngestStats>,
    observer: Arc<dyn IngestObserver>,
) {
    debug!(worker_id, "Ingest worker started");
    while let Ok(batch) = rx.recv().await {
        let seq = batch.seq;
        let records = batch.len();
        let result = match AssertUnwindSafe(store.bulk_create(batch.records))
            .catch_unwind()
            .await
        {
            Ok(result) => result,
            Err(payload) => {
                let message = panic_message(payload.as_ref());
                IngestStats::add(&stats.worker_panics, 1);
                error!(worker_id, seq, records, panic = %message, "Bulk write panicked");
                Err(StoreError::Backend(format!("bulk write panicked: {message}")))
            }
        };

        match &result {
            Ok(()) => {
                IngestStats::add(&stats.batches_persisted, 1);
                IngestStats::add(&stats.records_persisted, records as u64);
                debug!(worker_id, seq, records, "Batch persisted");
            }
            Err(StoreError::Partial { failed, .. }) => {
                let failed = (*failed).min(records) as u64;
                IngestStats::add(&stats.batches_failed, 1);
                IngestStats::add(&stats.records_failed, failed);
                IngestStats::add(&stats.records_persisted, records as u64 - failed);
                warn!(worker_id, seq, records, failed, "Bulk write partially failed");
            }
            Err(e) => {
                IngestStats::add(&stats.batches_failed, 1);
                IngestStats::add(&stats.records_failed, records as u64);
                error!(worker_id, seq, records, error = %e, "Bulk write failed");
            }
        }

        observer.batch_completed(&BatchOutcome {
            worker_id,
            seq,
            records,
            error: result.err(),
        });
    }
    debug!(worker_id, "Ingest worker stopped");
}

fn panic_message(payload: &(dyn Any + Send)) -> String {
    if let Some(s) = payload.downcast_ref::<&str>() {
        (*s).to_string()
    } else if let Some(s) = payload.downcast_ref::<String>() {
        s.clone()
    } else {
        "non-string panic payload".to_string()
    }
}
