//! Walk session: turns noisy position samples and clock ticks into a distance
//! and duration you can trust.
//!
//! A session is `Idle` until [`WalkSession::start`], then `Active` until
//! [`WalkSession::stop`] hands back an immutable [`WalkSummary`].
//!
//! While active, each sample is measured against the *anchor* (the last
//! accepted position). A sample is accepted only if it moved more than
//! [`MIN_STEP_METERS`] and the implied speed stays under
//! [`MAX_SPEED_METERS_PER_SECOND`]. Speed, not raw distance, gates the big
//! jumps: a 600 m gap after a minute in a tunnel is fine, the same gap one
//! second later is a GPS teleport.

use jiff::Timestamp;

use crate::model::{Position, WalkSummary};

/// Movement at or below this is treated as GPS jitter.
pub const MIN_STEP_METERS: f64 = 5.0;

/// Implied speeds at or above this (about 55 mph) are treated as teleports.
pub const MAX_SPEED_METERS_PER_SECOND: f64 = 25.0;

/// Misuse of the session state machine.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum WalkError {
    #[error("a walk is already in progress")]
    AlreadyActive,

    #[error("no walk is in progress")]
    NotActive,
}

/// What happened to a sample handed to [`WalkSession::record`].
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum SampleOutcome {
    /// First sample of the walk; becomes the anchor.
    Anchored,

    /// Accepted; `meters` were added to the distance.
    Accepted { meters: f64 },

    /// Moved too little to count.
    Jitter { meters: f64 },

    /// Moved implausibly fast since the anchor.
    Teleport { meters: f64, speed: f64 },

    /// Coordinates are not a real place (NaN, infinite, or out of range).
    Invalid,

    /// The session is idle.
    Ignored,
}

impl SampleOutcome {
    pub const fn is_accepted(self) -> bool {
        matches!(self, Self::Anchored | Self::Accepted { .. })
    }
}

#[derive(Debug, Clone, PartialEq)]
enum Status {
    Idle,
    Active { started_at: Timestamp },
}

/// A single walk in progress, owned by its caller.
#[derive(Debug, Clone, PartialEq)]
pub struct WalkSession {
    status: Status,
    elapsed_seconds: u64,
    distance_meters: f64,
    path: Vec<Position>,
}

impl Default for WalkSession {
    fn default() -> Self {
        Self::new()
    }
}

impl WalkSession {
    pub const fn new() -> Self {
        Self {
            status: Status::Idle,
            elapsed_seconds: 0,
            distance_meters: 0.0,
            path: Vec::new(),
        }
    }

    pub const fn is_active(&self) -> bool {
        matches!(self.status, Status::Active { .. })
    }

    pub const fn started_at(&self) -> Option<Timestamp> {
        match self.status {
            Status::Active { started_at } => Some(started_at),
            Status::Idle => None,
        }
    }

    pub const fn elapsed_seconds(&self) -> u64 {
        self.elapsed_seconds
    }

    /// Unrounded accumulated distance.
    pub const fn distance_meters(&self) -> f64 {
        self.distance_meters
    }

    pub fn path(&self) -> &[Position] {
        &self.path
    }

    /// The last accepted position.
    pub fn anchor(&self) -> Option<&Position> {
        self.path.last()
    }

    /// Begins a walk, clearing anything left from the previous one.
    pub fn start(&mut self, now: Timestamp) -> Result<(), WalkError> {
        if self.is_active() {
            return Err(WalkError::AlreadyActive);
        }
        self.status = Status::Active { started_at: now };
        self.elapsed_seconds = 0;
        self.distance_meters = 0.0;
        self.path.clear();
        tracing::debug!(%now, "walk started");
        Ok(())
    }

    /// One second of wall-clock time has passed.
    pub fn tick(&mut self) {
        if self.is_active() {
            self.elapsed_seconds += 1;
        }
    }

    /// Runs the acceptance filter on one sample.
    pub fn record(&mut self, position: Position) -> SampleOutcome {
        if !self.is_active() {
            return SampleOutcome::Ignored;
        }
        if !is_valid(&position) {
            tracing::warn!(
                latitude = position.latitude,
                longitude = position.longitude,
                "rejected invalid sample"
            );
            return SampleOutcome::Invalid;
        }

        let Some(anchor) = self.path.last() else {
            self.path.push(position);
            tracing::debug!(
                latitude = position.latitude,
                longitude = position.longitude,
                "anchored walk"
            );
            return SampleOutcome::Anchored;
        };

        let meters = anchor.coordinate().distance_to(position.coordinate());
        let seconds = position
            .timestamp
            .duration_since(anchor.timestamp)
            .as_secs_f64();
        let speed = if seconds > 0.0 {
            meters / seconds
        } else {
            f64::INFINITY
        };

        if meters <= MIN_STEP_METERS {
            tracing::trace!(meters, "rejected jitter");
            return SampleOutcome::Jitter { meters };
        }
        if speed >= MAX_SPEED_METERS_PER_SECOND {
            tracing::trace!(meters, speed, "rejected teleport");
            return SampleOutcome::Teleport { meters, speed };
        }

        self.distance_meters += meters;
        self.path.push(position);
        tracing::debug!(meters, speed, total = self.distance_meters, "accepted sample");
        SampleOutcome::Accepted { meters }
    }

    /// Ends the walk and returns its summary.
    pub fn stop(&mut self, now: Timestamp) -> Result<WalkSummary, WalkError> {
        let Status::Active { started_at } = self.status else {
            return Err(WalkError::NotActive);
        };
        self.status = Status::Idle;

        let summary = WalkSummary {
            started_at,
            ended_at: now,
            distance_meters: self.distance_meters.round() as u64,
            duration_seconds: self.elapsed_seconds,
            path: std::mem::take(&mut self.path),
        };
        tracing::debug!(
            distance = summary.distance_meters,
            duration = summary.duration_seconds,
            "walk stopped"
        );
        Ok(summary)
    }
}

fn is_valid(position: &Position) -> bool {
    (-90.0..=90.0).contains(&position.latitude) && (-180.0..=180.0).contains(&position.longitude)
}
