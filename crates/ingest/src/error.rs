//! Ingestion error types.
//!
//! Row-level errors ([`ReadError`], [`ParseError`]) are contained: the row is
//! skipped and the run continues. Only [`IngestError`] aborts a run.

use std::num::ParseFloatError;

use fleetpos_core::CoordinateError;
use thiserror::Error;

/// A row that could not be split into fields.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum ReadError {
    #[error("row {row}: line is not valid UTF-8")]
    InvalidUtf8 { row: u64 },

    #[error("row {row}: unterminated quoted field")]
    UnterminatedQuote { row: u64 },

    #[error("row {row}: record exceeds {limit} bytes")]
    RecordTooLong { row: u64, limit: usize },
}

impl ReadError {
    pub fn row(&self) -> u64 {
        match self {
            ReadError::InvalidUtf8 { row }
            | ReadError::UnterminatedQuote { row }
            | ReadError::RecordTooLong { row, .. } => *row,
        }
    }
}

/// A row whose fields do not describe a valid position fix.
#[derive(Debug, Error, Clone, PartialEq)]
pub enum ParseError {
    #[error("row {row}: expected at least 2 fields, found {found}")]
    TooFewFields { row: u64, found: usize },

    #[error("row {row}: invalid {column} {value:?}: {source}")]
    InvalidNumber {
        row: u64,
        column: &'static str,
        value: String,
        #[source]
        source: ParseFloatError,
    },

    #[error("validation error on row {row}: {source}")]
    OutOfRange {
        row: u64,
        #[source]
        source: CoordinateError,
    },
}

impl ParseError {
    pub fn row(&self) -> u64 {
        match self {
            ParseError::TooFewFields { row, .. }
            | ParseError::InvalidNumber { row, .. }
            | ParseError::OutOfRange { row, .. } => *row,
        }
    }
}

/// Why a row was skipped.
#[derive(Debug, Error, Clone, PartialEq)]
pub enum RowFailure {
    #[error(transparent)]
    Read(#[from] ReadError),

    #[error(transparent)]
    Parse(#[from] ParseError),
}

impl RowFailure {
    pub fn row(&self) -> u64 {
        match self {
            RowFailure::Read(e) => e.row(),
            RowFailure::Parse(e) => e.row(),
        }
    }
}

/// Failures that abort an ingestion run.
#[derive(Debug, Error)]
pub enum IngestError {
    /// The input stream itself could not be read.
    #[error("failed to read input after row {row}: {source}")]
    Io {
        row: u64,
        #[source]
        source: std::io::Error,
    },

    /// Every worker exited before the queue was drained.
    #[error("work queue closed with {undelivered} records undelivered: no workers left")]
    WorkersExited { undelivered: usize },
}
