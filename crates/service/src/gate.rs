//! Breaker-protected nearest-location lookup.

use std::sync::Arc;

use fleetpos_breaker::CircuitBreaker;
use fleetpos_core::{validate, LocationRecord, LocationStore, StoreError};
use tracing::debug;

use crate::error::LocationError;

/// Routes nearest-neighbour queries through a [`CircuitBreaker`].
///
/// Only store failures count against the breaker; a query that simply finds
/// nothing is a healthy answer.
#[derive(Clone)]
pub struct NearestGate {
    store: Arc<dyn LocationStore>,
    breaker: Arc<CircuitBreaker>,
}

impl NearestGate {
    pub fn new(store: Arc<dyn LocationStore>, breaker: Arc<CircuitBreaker>) -> Self {
        Self { store, breaker }
    }

    pub fn breaker(&self) -> &Arc<CircuitBreaker> {
        &self.breaker
    }

    /// Find the record closest to `(longitude, latitude)`.
    ///
    /// Invalid coordinates are rejected before the breaker is consulted.
    pub async fn find_nearest(
        &self,
        longitude: f64,
        latitude: f64,
    ) -> Result<LocationRecord, LocationError> {
        validate(latitude, longitude)?;

        let store = Arc::clone(&self.store);
        let result = self
            .breaker
            .execute_classified(
                || async move { store.find_nearest(longitude, latitude).await },
                StoreError::is_failure,
            )
            .await;

        result.map_err(|e| {
            debug!(
                breaker = self.breaker.name(),
                state = self.breaker.state().as_str(),
                error = %e,
                "Nearest lookup failed"
            );
            LocationError::from(e)
        })
    }
}
