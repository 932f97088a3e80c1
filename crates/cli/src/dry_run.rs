//! Counting sink used by `fleetpos check`.

use std::sync::atomic::{AtomicU64, Ordering};

use async_trait::async_trait;
use fleetpos_core::{LocationRecord, LocationStore, StorageId, StoreError};
use uuid::Uuid;

/// Accepts every write and keeps only counts; nothing is persisted.
#[derive(Debug, Default)]
pub struct DryRunStore {
    creates: AtomicU64,
    bulk_calls: AtomicU64,
    records: AtomicU64,
}

impl DryRunStore {
    pub fn bulk_calls(&self) -> u64 {
        self.bulk_calls.load(Ordering::Relaxed)
    }

    /// Records received through single and bulk writes.
    pub fn records(&self) -> u64 {
        self.records.load(Ordering::Relaxed) + self.creates.load(Ordering::Relaxed)
    }
}

#[async_trait]
impl LocationStore for DryRunStore {
    async fn create(&self, record: LocationRecord) -> Result<LocationRecord, StoreError> {
        self.creates.fetch_add(1, Ordering::Relaxed);
        Ok(record.with_id(StorageId::new(Uuid::new_v4().to_string())))
    }

    async fn bulk_create(&self, records: Vec<LocationRecord>) -> Result<(), StoreError> {
        self.bulk_calls.fetch_add(1, Ordering::Relaxed);
        self.records.fetch_add(records.len() as u64, Ordering::Relaxed);
        Ok(())
    }

    async fn find_nearest(&self, _: f64, _: f64) -> Result<LocationRecord, StoreError> {
        Err(StoreError::Unavailable("dry run has no backing store".into()))
    }
}
