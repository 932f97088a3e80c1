//! Persistence port for location records.

use std::sync::Arc;

use async_trait::async_trait;

use crate::error::StoreError;
use crate::location::LocationRecord;

/// Storage backend for location records.
///
/// The nearest-neighbour search is delegated entirely to the backend's own
/// spatial index; nothing in this workspace computes distances.
#[async_trait]
pub trait LocationStore: Send + Sync {
    /// Insert one record, returning it with its assigned storage id.
    async fn create(&self, record: LocationRecord) -> Result<LocationRecord, StoreError>;

    /// Insert a batch of records.
    ///
    /// Expected to be unordered and best-effort: a rejected record must not
    /// prevent the others from being written. A partial failure is reported
    /// as [`StoreError::Partial`].
    async fn bulk_create(&self, records: Vec<LocationRecord>) -> Result<(), StoreError>;

    /// Return the record closest to the given point.
    async fn find_nearest(&self, longitude: f64, latitude: f64)
        -> Result<LocationRecord, StoreError>;
}

#[async_trait]
impl<T: LocationStore + ?Sized> LocationStore for Arc<T> {
    async fn create(&self, record: LocationRecord) -> Result<LocationRecord, StoreError> {
        (**self).create(record).await
    }

    async fn bulk_create(&self, records: Vec<LocationRecord>) -> Result<(), StoreError> {
        (**self).bulk_create(records).await
    }

    async fn find_nearest(
        &self,
        longitude: f64,
        latitude: f64,
    ) -> Result<LocationRecord, StoreError> {
        (**self).find_nearest(longitude, latitude).await
    }
}
