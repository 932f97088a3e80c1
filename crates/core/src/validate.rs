//! Coordinate range checks.
//!
//! Latitude must lie in `[-90, 90]` and longitude in `[-180, 180]`.
//! Both bounds are inclusive; NaN and infinities are rejected.

use crate::error::CoordinateError;
use crate::location::GeoPoint;

pub const MIN_LATITUDE: f64 = -90.0;
pub const MAX_LATITUDE: f64 = 90.0;
pub const MIN_LONGITUDE: f64 = -180.0;
pub const MAX_LONGITUDE: f64 = 180.0;

/// Check that a latitude/longitude pair is within its geographic range.
///
/// Arguments are taken in source order (latitude first). Latitude is
/// checked before longitude, so a pair with both out of range reports
/// the latitude.
pub fn validate(latitude: f64, longitude: f64) -> Result<(), CoordinateError> {
    if !(MIN_LATITUDE..=MAX_LATITUDE).contains(&latitude) {
        return Err(CoordinateError::LatitudeOutOfRange(latitude));
    }
    if !(MIN_LONGITUDE..=MAX_LONGITUDE).contains(&longitude) {
        return Err(CoordinateError::LongitudeOutOfRange(longitude));
    }
    Ok(())
}

/// Validate a point stored in longitude-first order.
pub fn validate_point(point: &GeoPoint) -> Result<(), CoordinateError> {
    validate(point.latitude(), point.longitude())
}
