use chrono::{DateTime, Utc};
use geo_types::Point;
use serde::{Deserialize, Serialize};

/// One reported device position with its capture timestamp.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Position {
    pub position: Point,
    pub timestamp: DateTime<Utc>,
}

impl Position {
    pub fn new(position: Point, timestamp: DateTime<Utc>) -> Self {
        Self {
            position,
            timestamp,
        }
    }

    pub fn from_lat_lon(latitude: f64, longitude: f64, timestamp: DateTime<Utc>) -> Self {
        Self {
            position: Point::new(longitude, latitude),
            timestamp,
        }
    }

    pub fn latitude(&self) -> f64 {
        self.position.y()
    }

    pub fn longitude(&self) -> f64 {
        self.position.x()
    }

    /// True if both samples report the same coordinates, ignoring timestamps.
    pub fn same_coordinates(&self, other: &Position) -> bool {
        self.position == other.position
    }
}

#[test]
fn lat_lon_accessors_match_construction() {
    let pos = Position::from_lat_lon(28.70, 77.10, Utc::now());
    assert_eq!(pos.latitude(), 28.70);
    assert_eq!(pos.longitude(), 77.10);
}

#[test]
fn same_coordinates_ignores_timestamp() {
    let a = Position::from_lat_lon(28.70, 77.10, Utc::now());
    let b = Position::from_lat_lon(28.70, 77.10, Utc::now() + chrono::Duration::seconds(5));
    assert!(a.same_coordinates(&b));
    assert!(!a.same_coordinates(&Position::from_lat_lon(28.71, 77.10, Utc::now())));
}
