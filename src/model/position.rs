//! Position types: what the location source yields.

use jiff::Timestamp;
use serde::{Deserialize, Serialize};

use crate::geo::Coordinate;

/// A single fix: where and when.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Position {
    pub latitude: f64,
    pub longitude: f64,
    pub timestamp: Timestamp,
}

impl Position {
    pub const fn new(latitude: f64, longitude: f64, timestamp: Timestamp) -> Self {
        Self {
            latitude,
            longitude,
            timestamp,
        }
    }

    pub const fn coordinate(&self) -> Coordinate {
        Coordinate::new(self.latitude, self.longitude)
    }
}

/// A position as delivered by a location source, with its reported accuracy.
///
/// Serialized flat, one object per line in recorded tracks:
/// `{"latitude":…,"longitude":…,"timestamp":"…","accuracyMeters":…}`.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LocationSample {
    #[serde(flatten)]
    pub position: Position,

    /// Radius of uncertainty reported by the source, when known.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub accuracy_meters: Option<f64>,
}

impl From<Position> for LocationSample {
    fn from(position: Position) -> Self {
        Self {
            position,
            accuracy_meters: None,
        }
    }
}
