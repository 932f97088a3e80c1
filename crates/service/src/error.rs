use fleetpos_breaker::BreakerError;
use fleetpos_core::{CoordinateError, StoreError};
use fleetpos_ingest::IngestError;
use thiserror::Error;

/// Errors surfaced by [`LocationService`](crate::LocationService).
#[derive(Debug, Error)]
pub enum LocationError {
    #[error(transparent)]
    InvalidCoordinates(#[from] CoordinateError),

    #[error("no driver location found")]
    NotFound,

    /// The nearest-query circuit is open; no store call was made.
    #[error("location lookup suspended: circuit open")]
    CircuitOpen,

    /// The circuit is testing the store with another trial request.
    #[error("location lookup busy: circuit half-open, try again shortly")]
    CircuitHalfOpenBusy,

    #[error(transparent)]
    Store(StoreError),

    #[error(transparent)]
    Ingest(#[from] IngestError),
}

impl LocationError {
    /// Whether the same request may succeed later.
    ///
    /// `NotFound` and invalid coordinates are final answers; breaker
    /// rejections and store outages are not.
    pub fn is_retryable(&self) -> bool {
        match self {
            Self::CircuitOpen | Self::CircuitHalfOpenBusy => true,
            Self::Store(e) => e.is_failure(),
            Self::Ingest(_) => true,
            Self::InvalidCoordinates(_) | Self::NotFound => false,
        }
    }

    /// Map to an HTTP status code for API responses.
    pub fn status_code(&self) -> u16 {
        match self {
            Self::InvalidCoordinates(_) => 400,
            Self::NotFound => 404,
            Self::CircuitHalfOpenBusy => 429,
            Self::CircuitOpen => 503,
            Self::Store(StoreError::Unavailable(_)) => 503,
            Self::Store(_) | Self::Ingest(_) => 500,
        }
    }
}

impl From<StoreError> for LocationError {
    fn from(e: StoreError) -> Self {
        match e {
            StoreError::NotFound => Self::NotFound,
            other => Self::Store(other),
        }
    }
}

impl From<BreakerError<StoreError>> for LocationError {
    fn from(e: BreakerError<StoreError>) -> Self {
        match e {
            BreakerError::Open => Self::CircuitOpen,
            BreakerError::HalfOpenBusy => Self::CircuitHalfOpenBusy,
            BreakerError::Inner(inner) => inner.into(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn breaker_errors_map_to_distinct_kinds() {
        assert!(matches!(
            LocationError::from(BreakerError::<StoreError>::Open),
            LocationError::CircuitOpen
        ));
        assert!(matches!(
            LocationError::from(BreakerError::<StoreError>::HalfOpenBusy),
            LocationError::CircuitHalfOpenBusy
        ));
        assert!(matches!(
            LocationError::from(BreakerError::Inner(StoreError::NotFound)),
            LocationError::NotFound
        ));
        assert!(matches!(
            LocationError::from(BreakerError::Inner(StoreError::Backend("x".into()))),
            LocationError::Store(StoreError::Backend(_))
        ));
    }

    #[test]
    fn retryable_separates_later_from_never() {
        assert!(LocationError::CircuitOpen.is_retryable());
        assert!(LocationError::CircuitHalfOpenBusy.is_retryable());
        assert!(LocationError::Store(StoreError::Unavailable("down".into())).is_retryable());
        assert!(!LocationError::NotFound.is_retryable());
        assert!(!LocationError::InvalidCoordinates(CoordinateError::LatitudeOutOfRange(95.0))
            .is_retryable());
    }

    #[test]
    fn status_codes() {
        assert_eq!(LocationError::NotFound.status_code(), 404);
        assert_eq!(LocationError::CircuitOpen.status_code(), 503);
        assert_eq!(LocationError::CircuitHalfOpenBusy.status_code(), 429);
        assert_eq!(
            LocationError::InvalidCoordinates(CoordinateError::LongitudeOutOfRange(200.0))
                .status_code(),
            400
        );
        assert_eq!(LocationError::Store(StoreError::Backend("x".into())).status_code(), 500);
    }
}
