//! Shared types for fleetpos: position records, coordinate validation,
//! the [`LocationStore`] contract, store errors, and profile-based config.
//!
//! Every other crate in the workspace depends on this one; it carries no
//! async runtime of its own.

pub mod config;
pub mod error;
pub mod location;
pub mod store;
pub mod validate;

pub use config::{BreakerConfig, Config, IngestConfig};
pub use error::*;
pub use location::*;
pub use store::LocationStore;
pub use validate::{validate, validate_point};
