//! Size-bounded accumulator for parsed records.
//!
//! Collects [`LocationRecord`]s and hands back a [`Batch`] as soon as the
//! size threshold is reached. The final partial batch is taken with
//! [`BatchBuilder::flush`] at end of input.

use chrono::{DateTime, Utc};
use fleetpos_core::LocationRecord;

/// Upper bound on the up-front buffer allocation.
const MAX_PREALLOC: usize = 1_024;

/// An ordered group of records written with one bulk call.
#[derive(Debug, Clone, PartialEq)]
pub struct Batch {
    /// 0-based position of the batch within the run.
    pub seq: u64,
    /// Timestamp shared by every record of the run.
    pub ingested_at: DateTime<Utc>,
    pub records: Vec<LocationRecord>,
}

impl Batch {
    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }
}

/// Accumulates records into batches of at most `max_size`.
pub struct BatchBuilder {
    buffer: Vec<LocationRecord>,
    max_size: usize,
    ingested_at: DateTime<Utc>,
    next_seq: u64,
}

impl BatchBuilder {
    /// `max_size` is clamped to a minimum of 1.
    pub fn new(max_size: usize, ingested_at: DateTime<Utc>) -> Self {
        let max_size = max_size.max(1);
        Self {
            buffer: Vec::with_capacity(max_size.min(MAX_PREALLOC)),
            max_size,
            ingested_at,
            next_seq: 0,
        }
    }

    /// Add a record; returns the completed batch once the buffer is full.
    pub fn push(&mut self, record: LocationRecord) -> Option<Batch> {
        self.buffer.push(record);
        if self.buffer.len() >= self.max_size {
            Some(self.take())
        } else {
            None
        }
    }

    /// Take whatever is buffered, or `None` when empty.
    pub fn flush(&mut self) -> Option<Batch> {
        if self.buffer.is_empty() {
            None
        } else {
            Some(self.take())
        }
    }

    /// Batches handed out so far.
    pub fn batches_emitted(&self) -> u64 {
        self.next_seq
    }

    pub fn len(&self) -> usize {
        self.buffer.len()
    }

    pub fn is_empty(&self) -> bool {
        self.buffer.is_empty()
    }

    fn take(&mut self) -> Batch {
        let capacity = self.max_size.min(MAX_PREALLOC);
        let records = std::mem::replace(&mut self.buffer, Vec::with_capacity(capacity));
        let seq = self.next_seq;
        self.next_seq += 1;
        Batch {
            seq,
            ingested_at: self.ingested_at,
            records,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use fleetpos_core::GeoPoint;

    fn record(id: i64) -> LocationRecord {
        LocationRecord::new(id, GeoPoint::new(29.0, 41.0), Utc::now())
    }

    #[test]
    fn emits_when_full() {
        let mut builder = BatchBuilder::new(2, Utc::now());
        assert!(builder.push(record(1)).is_none());
        let batch = builder.push(record(2)).expect("batch should be full");
        assert_eq!(batch.seq, 0);
        assert_eq!(batch.len(), 2);
        assert!(builder.is_empty());
    }

    #[test]
    fn flush_returns_partial_batch_once() {
        let mut builder = BatchBuilder::new(10, Utc::now());
        builder.push(record(1));
        builder.push(record(2));
        builder.push(record(3));
        let batch = builder.flush().unwrap();
        assert_eq!(
            batch.records.iter().map(|r| r.subject_id).collect::<Vec<_>>(),
            vec![1, 2, 3]
        );
        assert!(builder.flush().is_none());
    }

    #[test]
    fn sequence_numbers_increase() {
        let mut builder = BatchBuilder::new(1, Utc::now());
        let seqs: Vec<u64> = (0..3)
            .filter_map(|i| builder.push(record(i)))
            .map(|b| b.seq)
            .collect();
        assert_eq!(seqs, vec![0, 1, 2]);
        assert_eq!(builder.batches_emitted(), 3);
    }

    #[test]
    fn zero_size_is_clamped() {
        let mut builder = BatchBuilder::new(0, Utc::now());
        assert!(builder.push(record(1)).is_some());
    }

    #[test]
    fn batches_share_the_run_timestamp() {
        let at: DateTime<Utc> = "2024-05-01T12:00:00Z".parse().unwrap();
        let mut builder = BatchBuilder::new(1, at);
        let first = builder.push(record(1)).unwrap();
        let second = builder.push(record(2)).unwrap();
        assert_eq!(first.ingested_at, at);
        assert_eq!(second.ingested_at, at);
    }

    #[test]
    fn empty_input_produces_no_batch() {
        let mut builder = BatchBuilder::new(5, Utc::now());
        assert!(builder.flush().is_none());
        assert_eq!(builder.len(), 0);
    }
}
