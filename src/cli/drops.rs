//! Bone drop commands: nearby, collect, seed, reset.

use clap::Subcommand;
use fastrand::Rng;
use jiff::Timestamp;
use jiff::tz::TimeZone;
use uuid::Uuid;

use woof::geo::Coordinate;
use woof::model::BoneDrop;
use woof::proximity::{COLLECTION_RADIUS_METERS, CollectOutcome, NearbyDrop, ProximityEngine};
use woof::seed;
use woof::storage::Storage;

use super::LocationArgs;
use super::format::{format_distance, format_time, short_id};

#[derive(Debug, Subcommand)]
pub enum DropsCommand {
    /// Show the closest uncollected drops. `*` marks one within reach.
    Nearby {
        #[command(flatten)]
        at: LocationArgs,

        /// Print the drops as JSON.
        #[arg(long)]
        json: bool,
    },

    /// Collect a drop you're standing on.
    Collect {
        /// Drop ID: full UUID or unambiguous prefix (e.g. `3f2`).
        drop: String,

        #[command(flatten)]
        at: LocationArgs,
    },

    /// Scatter today's shared drops around a position.
    Seed {
        #[command(flatten)]
        at: LocationArgs,

        /// Also place a personal drop for the acting user.
        #[arg(long)]
        personal: bool,
    },

    /// Clear expired drops and seed a fresh batch.
    Reset {
        #[command(flatten)]
        at: LocationArgs,
    },
}

fn load_engine(storage: &Storage, position: Coordinate) -> Result<ProximityEngine, String> {
    let mut engine = ProximityEngine::new();
    engine
        .refresh(storage, position, Timestamp::now())
        .map_err(|e| format!("failed to load drops: {e}"))?;
    engine.update_position(position);
    Ok(engine)
}

pub(super) fn cmd_nearby(storage: &Storage, position: Coordinate, json: bool) -> Result<(), String> {
    let engine = load_engine(storage, position)?;

    if json {
        let json = serde_json::to_string_pretty(engine.visible())
            .map_err(|e| format!("failed to serialize drops: {e}"))?;
        println!("{json}");
        return Ok(());
    }

    if engine.visible().is_empty() {
        println!("No drops nearby");
        return Ok(());
    }

    let nearest = engine.nearest().map(|n| n.drop.id);
    for n in engine.visible() {
        let marker = if Some(n.drop.id) == nearest { "*" } else { " " };
        println!(
            "{marker} {}  {:>7}  {:>3} bones  [{}]  {}",
            short_id(n.drop.id),
            format_distance(n.distance_meters),
            n.drop.bone_value,
            n.drop.kind,
            n.drop.location_name.as_deref().unwrap_or("")
        );
    }

    Ok(())
}

pub(super) fn cmd_collect(
    storage: &Storage,
    user_id: &str,
    reference: &str,
    position: Coordinate,
) -> Result<(), String> {
    let mut engine = load_engine(storage, position)?;
    let target = resolve_drop(engine.visible(), reference)?;

    if engine.nearest().map(|n| n.drop.id) != Some(target.drop.id) {
        return Err(format!(
            "drop {} is {} away; get within {COLLECTION_RADIUS_METERS:.0} m",
            short_id(target.drop.id),
            format_distance(target.distance_meters)
        ));
    }

    let id = target.drop.id;
    let outcome = engine
        .collect(storage, id, user_id, Timestamp::now())
        .map_err(|e| format!("failed to collect drop: {e}"))?;

    match outcome {
        CollectOutcome::Collected {
            bones_earned,
            balance,
        } => {
            println!("Collected {bones_earned} bones! Balance: {balance}");
            Ok(())
        }
        CollectOutcome::AlreadyCollected => Err(format!(
            "drop {} was already collected by someone else",
            short_id(id)
        )),
    }
}

pub(super) fn cmd_seed(
    storage: &Storage,
    owner: Option<&str>,
    position: Coordinate,
) -> Result<(), String> {
    let mut rng = Rng::new();
    let now = Timestamp::now();
    let tz = TimeZone::system();

    let shared = seed::seed_shared_drops(storage, &mut rng, position, now, &tz)
        .map_err(|e| format!("failed to seed drops: {e}"))?;
    print_seeded(&shared);

    if let Some(owner) = owner {
        let personal = seed::seed_personal_drop(storage, &mut rng, owner, position, now, &tz)
            .map_err(|e| format!("failed to seed personal drop: {e}"))?;
        match personal {
            Some(drop) => print_seeded(std::slice::from_ref(&drop)),
            None => eprintln!("No park within 1 km; no personal drop for {owner}"),
        }
    }

    Ok(())
}

pub(super) fn cmd_reset(
    storage: &Storage,
    owner: Option<&str>,
    position: Coordinate,
) -> Result<(), String> {
    let report = seed::daily_reset(
        storage,
        &mut Rng::new(),
        position,
        owner,
        Timestamp::now(),
        &TimeZone::system(),
    )
    .map_err(|e| format!("failed to reset drops: {e}"))?;

    eprintln!("Cleared {} expired drop(s)", report.cleared);
    print_seeded(&report.shared);
    if let Some(drop) = &report.personal {
        print_seeded(std::slice::from_ref(drop));
    }

    Ok(())
}

fn print_seeded(drops: &[BoneDrop]) {
    for d in drops {
        println!(
            "{}  {:>3} bones  [{}]  {}  until {}",
            short_id(d.id),
            d.bone_value,
            d.kind,
            d.location_name.as_deref().unwrap_or(""),
            format_time(d.expires_at)
        );
    }
}

/// Resolve a drop reference (full UUID or unambiguous prefix) among the
/// visible drops.
fn resolve_drop<'a>(visible: &'a [NearbyDrop], reference: &str) -> Result<&'a NearbyDrop, String> {
    // Try full UUID first.
    if let Ok(id) = reference.parse::<Uuid>() {
        return visible
            .iter()
            .find(|n| n.drop.id == id)
            .ok_or_else(|| format!("drop {id} is not nearby"));
    }

    let matches: Vec<&NearbyDrop> = visible
        .iter()
        .filter(|n| n.drop.id.to_string().starts_with(reference))
        .collect();

    match matches.len() {
        0 => Err(format!("no nearby drop matching '{reference}'")),
        1 => Ok(matches[0]),
        n => {
            let ids: Vec<String> = matches.iter().map(|m| short_id(m.drop.id)).collect();
            Err(format!(
                "'{reference}' is ambiguous: matches {n} drops: {}",
                ids.join(", ")
            ))
        }
    }
}
