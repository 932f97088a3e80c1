use thiserror::Error;

/// A coordinate outside its geographic range.
///
/// Non-finite values (NaN, ±Inf) are reported as out of range.
#[derive(Error, Debug, Clone, Copy, PartialEq)]
pub enum CoordinateError {
    #[error("latitude out of range: {0} (expected -90..=90)")]
    LatitudeOutOfRange(f64),

    #[error("longitude out of range: {0} (expected -180..=180)")]
    LongitudeOutOfRange(f64),
}

/// Errors returned by a [`LocationStore`](crate::store::LocationStore) implementation.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum StoreError {
    /// No record satisfies the query.
    #[error("no location record matches the query")]
    NotFound,

    /// The backing store could not be reached.
    #[error("store unavailable: {0}")]
    Unavailable(String),

    /// An unordered bulk write inserted some records but not all.
    #[error("bulk write partially failed: {failed} of {total} records rejected")]
    Partial { failed: usize, total: usize },

    #[error("store error: {0}")]
    Backend(String),
}

impl StoreError {
    /// Whether this outcome means the downstream store misbehaved.
    ///
    /// `NotFound` is a healthy answer to a query and is not a failure.
    pub fn is_failure(&self) -> bool {
        !matches!(self, StoreError::NotFound)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn not_found_is_not_a_failure() {
        assert!(!StoreError::NotFound.is_failure());
        assert!(StoreError::Unavailable("down".into()).is_failure());
        assert!(StoreError::Backend("boom".into()).is_failure());
        assert!(StoreError::Partial { failed: 1, total: 3 }.is_failure());
    }

    #[test]
    fn coordinate_error_messages_name_the_axis() {
        let lat = CoordinateError::LatitudeOutOfRange(91.0).to_string();
        let lon = CoordinateError::LongitudeOutOfRange(-181.0).to_string();
        assert!(lat.starts_with("latitude out of range"));
        assert!(lon.starts_with("longitude out of range"));
    }
}
