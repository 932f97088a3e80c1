//! Location service: single-record writes, bulk ingestion, and the
//! breaker-gated nearest-driver query over one [`LocationStore`].
//!
//! [`LocationStore`]: fleetpos_core::LocationStore

pub mod error;
pub mod gate;
pub mod service;

pub use error::LocationError;
pub use gate::NearestGate;
pub use service::{LocationService, ServiceHealth};
