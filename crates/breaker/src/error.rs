//! Circuit breaker error types.

use thiserror::Error;

/// Outcome of a call routed through a [`CircuitBreaker`](crate::CircuitBreaker).
///
/// `Open` and `HalfOpenBusy` are produced without invoking the wrapped
/// operation. `Inner` carries the operation's own error unchanged.
#[derive(Debug, Error, PartialEq)]
pub enum BreakerError<E> {
    #[error("circuit open: downstream calls are suspended")]
    Open,

    #[error("circuit half-open: a trial call is already in flight")]
    HalfOpenBusy,

    #[error(transparent)]
    Inner(E),
}

impl<E> BreakerError<E> {
    /// Whether the breaker rejected the call before it reached the operation.
    pub fn is_rejection(&self) -> bool {
        matches!(self, BreakerError::Open | BreakerError::HalfOpenBusy)
    }

    /// Extract the operation's own error, if the call got that far.
    pub fn into_inner(self) -> Option<E> {
        match self {
            BreakerError::Inner(e) => Some(e),
            _ => None,
        }
    }
}

/// Why [`CircuitBreaker::allow_request`](crate::CircuitBreaker::allow_request)
/// refused a call.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
pub enum Rejection {
    #[error("circuit open")]
    Open,

    #[error("circuit half-open with a trial in flight")]
    HalfOpenBusy,
}

impl<E> From<Rejection> for BreakerError<E> {
    fn from(rejection: Rejection) -> Self {
        match rejection {
            Rejection::Open => BreakerError::Open,
            Rejection::HalfOpenBusy => BreakerError::HalfOpenBusy,
        }
    }
}
