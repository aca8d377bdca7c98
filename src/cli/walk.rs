//! Walk commands: replay a recorded track, list archived walks.

use std::path::{Path, PathBuf};

use clap::Subcommand;
use jiff::Timestamp;

use woof::location::ReplaySource;
use woof::rewards;
use woof::storage::Storage;
use woof::tracker::{self, WalkTracker};

use super::format::{format_distance, format_duration, format_time, short_id};

#[derive(Debug, Subcommand)]
pub enum WalkCommand {
    /// Walk a recorded track, archive it, and pay out the bonus.
    ///
    /// The track is JSON lines, one sample per line:
    /// `{"latitude": 40.7, "longitude": -74.0, "timestamp": "2025-06-15T08:00:00Z"}`
    Replay {
        /// Track file (JSON lines).
        track: PathBuf,

        /// Play samples back in real time instead of all at once.
        #[arg(long)]
        pace: bool,
    },

    /// List archived walks.
    List,
}

pub(super) fn cmd_replay(
    storage: &Storage,
    user_id: &str,
    track: &Path,
    pace: bool,
) -> Result<(), String> {
    let source = ReplaySource::from_file(track)
        .map_err(|e| format!("failed to load {}: {e}", track.display()))?;

    let summary = if pace {
        let mut tracker = WalkTracker::new();
        tracker
            .start(&source.paced(true), Timestamp::now())
            .map_err(|e| format!("failed to start walk: {e}"))?;
        tracker.wait_for_source();
        tracker
            .stop(Timestamp::now())
            .map_err(|e| format!("failed to stop walk: {e}"))?
    } else {
        tracker::replay(source.samples())
            .ok_or_else(|| format!("{} has no samples", track.display()))?
    };

    let record = rewards::complete_walk(storage, user_id, summary, Timestamp::now())
        .map_err(|e| format!("failed to save walk: {e}"))?;

    println!("Walk {}", short_id(record.id));
    println!("  distance  {}", format_distance(record.distance_meters as f64));
    println!("  duration  {}", format_duration(record.duration_seconds));
    println!("  samples   {}", record.path.len());
    println!("  bones     +{}", record.bones_earned);
    Ok(())
}

pub(super) fn cmd_list(storage: &Storage, user_id: &str) -> Result<(), String> {
    let walks = storage
        .list_walks(user_id)
        .map_err(|e| format!("failed to list walks: {e}"))?;

    if walks.is_empty() {
        println!("No walks");
        return Ok(());
    }

    for w in &walks {
        println!(
            "{}  {}  {:>8}  {:>11}  +{}",
            short_id(w.id),
            format_time(w.started_at),
            format_distance(w.distance_meters as f64),
            format_duration(w.duration_seconds),
            w.bones_earned
        );
    }

    Ok(())
}
