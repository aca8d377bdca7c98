//! Bone drops: time-limited geolocated collectibles.

use std::fmt;
use std::str::FromStr;

use jiff::Timestamp;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::geo::Coordinate;

/// Who a drop is for.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DropKind {
    /// Visible to everyone; first collector wins.
    Shared,

    /// Seeded for a single user.
    Personal,
}

impl DropKind {
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Shared => "shared",
            Self::Personal => "personal",
        }
    }
}

impl fmt::Display for DropKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for DropKind {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "shared" => Ok(Self::Shared),
            "personal" => Ok(Self::Personal),
            other => Err(format!("unknown drop type: {other}")),
        }
    }
}

/// A collectible worth a fixed number of bones.
///
/// Once `collected_by` is set the drop is spent and never offered again.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BoneDrop {
    pub id: Uuid,
    #[serde(rename = "type")]
    pub kind: DropKind,
    pub latitude: f64,
    pub longitude: f64,
    pub bone_value: u32,
    pub expires_at: Timestamp,
    pub collected_by: Option<String>,
    pub collected_at: Option<Timestamp>,

    /// Owner of a personal drop.
    pub user_id: Option<String>,

    /// Human-readable place the drop was seeded at.
    pub location_name: Option<String>,
}

impl BoneDrop {
    pub const fn coordinate(&self) -> Coordinate {
        Coordinate::new(self.latitude, self.longitude)
    }
}
