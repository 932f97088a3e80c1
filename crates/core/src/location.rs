use std::fmt;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Opaque identifier assigned by the store when a record is persisted.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct StorageId(String);

impl StorageId {
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for StorageId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// GeoJSON geometry kind. Only points are stored.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum GeometryKind {
    #[default]
    Point,
}

/// A GeoJSON point. Coordinates are stored longitude first, then latitude.
///
/// The fixed-size array guarantees exactly two coordinates; deserialising
/// any other length fails.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct GeoPoint {
    #[serde(rename = "type", default)]
    pub kind: GeometryKind,
    pub coordinates: [f64; 2],
}

impl GeoPoint {
    /// Build a point from longitude and latitude (storage order).
    pub fn new(longitude: f64, latitude: f64) -> Self {
        Self {
            kind: GeometryKind::Point,
            coordinates: [longitude, latitude],
        }
    }

    /// Build a point from latitude and longitude (source order).
    pub fn from_lat_lon(latitude: f64, longitude: f64) -> Self {
        Self::new(longitude, latitude)
    }

    pub fn longitude(&self) -> f64 {
        self.coordinates[0]
    }

    pub fn latitude(&self) -> f64 {
        self.coordinates[1]
    }
}

/// A single driver position fix.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LocationRecord {
    /// Assigned by the store; absent until persisted.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub id: Option<StorageId>,
    #[serde(rename = "driver_id", alias = "subject_id")]
    pub subject_id: i64,
    #[serde(rename = "location")]
    pub point: GeoPoint,
    #[serde(rename = "updated_at", default = "Utc::now")]
    pub observed_at: DateTime<Utc>,
}

impl LocationRecord {
    pub fn new(subject_id: i64, point: GeoPoint, observed_at: DateTime<Utc>) -> Self {
        Self {
            id: None,
            subject_id,
            point,
            observed_at,
        }
    }

    /// Return the record tagged with the id the store assigned to it.
    pub fn with_id(mut self, id: StorageId) -> Self {
        self.id = Some(id);
        self
    }

    pub fn is_persisted(&self) -> bool {
        self.id.is_some()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn point_keeps_longitude_first() {
        let point = GeoPoint::from_lat_lon(41.0, 29.0);
        assert_eq!(point.coordinates, [29.0, 41.0]);
        assert_eq!(point.longitude(), 29.0);
        assert_eq!(point.latitude(), 41.0);
    }

    #[test]
    fn record_json_uses_geojson_shape() {
        let observed = "2024-05-01T12:00:00Z".parse::<DateTime<Utc>>().unwrap();
        let record = LocationRecord::new(7, GeoPoint::new(29.0, 41.0), observed);

        let json = serde_json::to_value(&record).unwrap();
        assert_eq!(json["driver_id"], 7);
        assert_eq!(json["location"]["type"], "Point");
        assert_eq!(json["location"]["coordinates"], serde_json::json!([29.0, 41.0]));
        assert!(json.get("id").is_none(), "unpersisted records carry no id");
    }

    #[test]
    fn deserialize_rejects_wrong_coordinate_count() {
        let body = r#"{"driver_id":5,"location":{"type":"Point","coordinates":[29,41,3]}}"#;
        assert!(serde_json::from_str::<LocationRecord>(body).is_err());

        let body = r#"{"driver_id":5,"location":{"type":"Point","coordinates":[29]}}"#;
        assert!(serde_json::from_str::<LocationRecord>(body).is_err());
    }

    #[test]
    fn deserialize_accepts_api_body_without_timestamp() {
        let body = r#"{"driver_id":5,"location":{"type":"Point","coordinates":[29,41]}}"#;
        let record: LocationRecord = serde_json::from_str(body).unwrap();
        assert_eq!(record.subject_id, 5);
        assert_eq!(record.point.latitude(), 41.0);
        assert!(!record.is_persisted());
    }

    #[test]
    fn with_id_marks_record_persisted() {
        let record = LocationRecord::new(1, GeoPoint::new(0.0, 0.0), Utc::now())
            .with_id(StorageId::new("abc123"));
        assert!(record.is_persisted());
        assert_eq!(record.id.unwrap().as_str(), "abc123");
    }
}
