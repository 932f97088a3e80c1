//! Converts a split row into a [`LocationRecord`].

use chrono::{DateTime, Utc};
use fleetpos_core::{validate, GeoPoint, LocationRecord};

use crate::error::ParseError;

/// Parse one data row: latitude in field 0, longitude in field 1.
///
/// Fields beyond the second are ignored. The subject id is the 1-based row
/// number, and the point is stored longitude first.
pub fn parse_row<S: AsRef<str>>(
    fields: &[S],
    row: u64,
    observed_at: DateTime<Utc>,
) -> Result<LocationRecord, ParseError> {
    let [lat, lon, ..] = fields else {
        return Err(ParseError::TooFewFields {
            row,
            found: fields.len(),
        });
    };
    let latitude = parse_coordinate(lat.as_ref(), row, "latitude")?;
    let longitude = parse_coordinate(lon.as_ref(), row, "longitude")?;
    validate(latitude, longitude).map_err(|source| ParseError::OutOfRange { row, source })?;

    let subject_id = i64::try_from(row).unwrap_or(i64::MAX);
    Ok(LocationRecord::new(
        subject_id,
        GeoPoint::from_lat_lon(latitude, longitude),
        observed_at,
    ))
}

fn parse_coordinate(value: &str, row: u64, column: &'static str) -> Result<f64, ParseError> {
    let value = value.trim();
    value
        .parse::<f64>()
        .map_err(|source| ParseError::InvalidNumber {
            row,
            column,
            value: value.to_string(),
            source,
        })
}
