//! Three-state circuit breaker (Closed, Open, HalfOpen) guarding calls to an
//! unreliable dependency.
//!
//! [`CircuitBreaker::execute`] runs a future only when the circuit admits it.
//! While Open, calls are rejected with [`BreakerError::Open`] without touching
//! the dependency; after the reset timeout a single trial call decides whether
//! the circuit closes again.

pub mod breaker;
pub mod error;

pub use breaker::{Admission, BreakerSnapshot, CircuitBreaker, CircuitState};
pub use error::{BreakerError, Rejection};
