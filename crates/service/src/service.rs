use std::sync::Arc;

use chrono::Utc;
use fleetpos_breaker::{CircuitBreaker, CircuitState};
use fleetpos_core::{validate_point, IngestConfig, LocationRecord, LocationStore};
use fleetpos_ingest::{IngestObserver, IngestReport, Ingestor};
use serde::Serialize;
use tokio::io::AsyncRead;
use tokio_util::sync::CancellationToken;
use tracing::{info, instrument};

use crate::error::LocationError;
use crate::gate::NearestGate;

/// Breaker state as reported by health endpoints.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ServiceHealth {
    pub breaker: String,
    pub state: CircuitState,
    pub failure_count: u32,
    pub max_failures: u32,
}

/// Front door for location writes and queries.
///
/// The breaker is injected so callers decide how it is shared; it guards
/// only the nearest-location query.
pub struct LocationService {
    store: Arc<dyn LocationStore>,
    gate: NearestGate,
    ingestor: Ingestor,
}

impl LocationService {
    pub fn new(
        store: Arc<dyn LocationStore>,
        breaker: Arc<CircuitBreaker>,
        ingest: IngestConfig,
    ) -> Self {
        Self {
            gate: NearestGate::new(Arc::clone(&store), breaker),
            ingestor: Ingestor::new(Arc::clone(&store), ingest),
            store,
        }
    }

    /// Attach an observer to every bulk ingestion run.
    pub fn with_ingest_observer(mut self, observer: Arc<dyn IngestObserver>) -> Self {
        self.ingestor = self.ingestor.with_observer(observer);
        self
    }

    pub fn breaker(&self) -> &Arc<CircuitBreaker> {
        self.gate.breaker()
    }

    pub fn health(&self) -> ServiceHealth {
        let breaker = self.breaker();
        let snapshot = breaker.snapshot();
        ServiceHealth {
            breaker: breaker.name().to_string(),
            state: snapshot.state,
            failure_count: snapshot.failure_count,
            max_failures: breaker.max_failures(),
        }
    }

    /// Store one record, stamped with the current time.
    ///
    /// Any incoming timestamp is overwritten.
    #[instrument(skip_all, fields(subject_id = record.subject_id))]
    pub async fn create(&self, mut record: LocationRecord) -> Result<LocationRecord, LocationError> {
        validate_point(&record.point)?;
        record.observed_at = Utc::now();
        let created = self.store.create(record).await?;
        info!(id = ?created.id, "Location created");
        Ok(created)
    }

    /// Ingest delimited `latitude,longitude` rows from `input`.
    pub async fn bulk_create<R>(&self, input: R) -> Result<IngestReport, LocationError>
    where
        R: AsyncRead + Unpin + Send,
    {
        Ok(self.ingestor.ingest(input).await?)
    }

    /// Like [`bulk_create`](Self::bulk_create), stopping early when `cancel` fires.
    pub async fn bulk_create_until<R>(
        &self,
        input: R,
        cancel: CancellationToken,
    ) -> Result<IngestReport, LocationError>
    where
        R: AsyncRead + Unpin + Send,
    {
        Ok(self.ingestor.ingest_until(input, cancel).await?)
    }

    pub async fn find_nearest(
        &self,
        longitude: f64,
        latitude: f64,
    ) -> Result<LocationRecord, LocationError> {
        self.gate.find_nearest(longitude, latitude).await
    }
}
