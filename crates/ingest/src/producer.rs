//! Producer side of the pipeline: rows in, batches onto the work queue.

use async_channel::Sender;
use chrono::{DateTime, Utc};
use tokio::io::AsyncBufRead;
use tokio_util::sync::CancellationToken;
use tracing::{debug, warn};

use crate::batcher::{Batch, BatchBuilder};
use crate::error::{IngestError, RowFailure};
use crate::parser::parse_row;
use crate::reader::RowReader;
use crate::report::{IngestObserver, IngestStats};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum ProduceOutcome {
    Completed,
    Cancelled,
}

/// Everything the producer needs besides the reader and the queue.
pub(crate) struct ProduceContext<'a> {
    pub batch_size: usize,
    pub observed_at: DateTime<Utc>,
    pub stats: &'a IngestStats,
    pub observer: &'a dyn IngestObserver,
    pub cancel: &'a CancellationToken,
}

/// Read rows until end of input, pushing each full batch onto the queue.
///
/// Malformed rows are logged, counted, reported, and skipped. An I/O error on
/// the input flushes whatever was already parsed and then fails the run.
/// Blocks while the queue is full.
pub(crate) async fn produce_batches<R: AsyncBufRead + Unpin>(
    reader: &mut RowReader<R>,
    tx: &Sender<Batch>,
    ctx: ProduceContext<'_>,
) -> Result<ProduceOutcome, IngestError> {
    let mut builder = BatchBuilder::new(ctx.batch_size, ctx.observed_at);

    loop {
        let next = tokio::select! {
            biased;
            _ = ctx.cancel.cancelled() => return Ok(ProduceOutcome::Cancelled),
            next = reader.next_row() => next,
        };

        let row = match next {
            Ok(Some(row)) => row,
            Ok(None) => break,
            Err(source) => {
                let row = reader.rows_read();
                if let Some(batch) = builder.flush() {
                    if dispatch(tx, batch, &ctx).await? == ProduceOutcome::Cancelled {
                        return Ok(ProduceOutcome::Cancelled);
                    }
                }
                return Err(IngestError::Io { row, source });
            }
        };
        IngestStats::add(&ctx.stats.rows_read, 1);

        let parsed = row
            .map_err(RowFailure::from)
            .and_then(|raw| {
                parse_row(&raw.fields, raw.number, ctx.observed_at).map_err(RowFailure::from)
            });
        let record = match parsed {
            Ok(record) => record,
            Err(failure) => {
                warn!(row = failure.row(), error = %failure, "Skipping row");
                IngestStats::add(&ctx.stats.rows_skipped, 1);
                ctx.observer.row_skipped(failure.row(), &failure);
                continue;
            }
        };
        IngestStats::add(&ctx.stats.records_parsed, 1);

        if let Some(batch) = builder.push(record) {
            if dispatch(tx, batch, &ctx).await? == ProduceOutcome::Cancelled {
                return Ok(ProduceOutcome::Cancelled);
            }
        }
    }

    if let Some(batch) = builder.flush() {
        return dispatch(tx, batch, &ctx).await;
    }
    Ok(ProduceOutcome::Completed)
}

/// Push one batch, waiting for queue space unless cancelled first.
async fn dispatch(
    tx: &Sender<Batch>,
    batch: Batch,
    ctx: &ProduceContext<'_>,
) -> Result<ProduceOutcome, IngestError> {
    let seq = batch.seq;
    let records = batch.len();
    tokio::select! {
        biased;
        _ = ctx.cancel.cancelled() => {
            debug!(seq, records, "Batch dropped on cancellation");
            Ok(ProduceOutcome::Cancelled)
        }
        sent = tx.send(batch) => match sent {
            Ok(()) => {
                IngestStats::add(&ctx.stats.batches_dispatched, 1);
                debug!(seq, records, "Batch queued");
                Ok(ProduceOutcome::Completed)
            }
            Err(async_channel::SendError(batch)) => Err(IngestError::WorkersExited {
                undelivered: batch.len(),
            }),
        },
    }
}
