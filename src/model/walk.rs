//! Walk types: the summary a finished session produces and its archived row.

use jiff::Timestamp;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use super::Position;

/// Immutable result of stopping a walk session.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct WalkSummary {
    pub started_at: Timestamp,
    pub ended_at: Timestamp,

    /// Accumulated distance, rounded to the nearest meter.
    pub distance_meters: u64,

    /// Number of one-second ticks observed while the walk was active.
    pub duration_seconds: u64,

    /// Accepted positions, in order. The first entry is the anchor.
    pub path: Vec<Position>,
}

/// A completed walk as archived in the `walks` table.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct WalkRecord {
    pub id: Uuid,
    pub user_id: String,
    pub started_at: Timestamp,
    pub ended_at: Timestamp,
    pub distance_meters: u64,
    pub duration_seconds: u64,
    pub bones_earned: i64,
    pub path: Vec<Position>,
}
