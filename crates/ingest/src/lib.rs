//! Bulk ingestion of driver position fixes from delimited text.
//!
//! Pipeline flow: input bytes → [`RowReader`] → [`parse_row`] → [`BatchBuilder`]
//! → bounded work queue → worker pool → [`LocationStore::bulk_create`].
//!
//! [`LocationStore::bulk_create`]: fleetpos_core::LocationStore::bulk_create

pub mod batcher;
pub mod error;
pub mod orchestrator;
pub mod parser;
mod producer;
pub mod reader;
pub mod report;
mod worker;

pub use batcher::{Batch, BatchBuilder};
pub use error::{IngestError, ParseError, ReadError, RowFailure};
pub use orchestrator::Ingestor;
pub use parser::parse_row;
pub use reader::{RawRow, RowReader, DEFAULT_MAX_RECORD_LEN};
pub use report::{BatchOutcome, IngestObserver, IngestReport, IngestStats, NoopObserver};
