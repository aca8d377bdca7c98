//! Bone drop seeding: scatter fresh drops near known parks each day.
//!
//! Shared drops land around parks within a kilometer of the user, or
//! around the user when no park is close. Personal drops only land near
//! parks. Everything seeded expires at the next local midnight.

use fastrand::Rng;
use jiff::Timestamp;
use jiff::tz::TimeZone;
use uuid::Uuid;

use crate::geo::Coordinate;
use crate::model::{BoneDrop, DropKind};
use crate::storage::{Storage, StorageError};

/// How far from the user a park may be to host drops.
pub const PARK_SEARCH_RADIUS_METERS: f64 = 1000.0;

/// Full width of the box shared drops scatter in, in degrees (about ±330 m).
const SHARED_SCATTER_DEGREES: f64 = 0.006;

/// Personal drops stay close to their park (about ±55 m).
const PERSONAL_SCATTER_DEGREES: f64 = 0.001;

const FALLBACK_NAME: &str = "Mystery Drop";

/// A known, dog-friendly place to seed drops.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Park {
    pub name: &'static str,
    pub location: Coordinate,
}

const fn park(name: &'static str, latitude: f64, longitude: f64) -> Park {
    Park {
        name,
        location: Coordinate::new(latitude, longitude),
    }
}

pub const SAFE_PARKS: &[Park] = &[
    // Jersey City
    park("Liberty State Park", 40.7059, -74.0565),
    park("Van Vorst Park", 40.7198, -74.0463),
    park("Hamilton Park", 40.7201, -74.0400),
    park("Lincoln Park", 40.7328, -74.0756),
    // Hoboken
    park("Pier A Park", 40.7353, -74.0297),
    park("Church Square Park", 40.7422, -74.0307),
    park("Elysian Park", 40.7451, -74.0258),
    // NYC
    park("Battery Park", 40.7033, -74.0170),
    park("Washington Square Park", 40.7308, -73.9973),
    park("Union Square Park", 40.7359, -73.9911),
    park("Madison Square Park", 40.7422, -73.9877),
    park("Bryant Park", 40.7536, -73.9832),
    park("Central Park South", 40.7678, -73.9718),
];

#[derive(Debug, thiserror::Error)]
pub enum SeedError {
    #[error("could not compute drop expiry: {0}")]
    Expiry(#[from] jiff::Error),

    #[error(transparent)]
    Storage(#[from] StorageError),
}

/// What a daily reset did.
#[derive(Debug, Clone, PartialEq)]
pub struct ResetReport {
    pub cleared: usize,
    pub shared: Vec<BoneDrop>,
    pub personal: Option<BoneDrop>,
}

/// Parks within `radius_meters` of `position`, in list order.
pub fn parks_within(position: Coordinate, radius_meters: f64) -> Vec<&'static Park> {
    SAFE_PARKS
        .iter()
        .filter(|p| position.distance_to(p.location) <= radius_meters)
        .collect()
}

/// A random value for a drop: shared 20–100, personal 5–20.
pub fn bone_value(rng: &mut Rng, kind: DropKind) -> u32 {
    match kind {
        DropKind::Shared => rng.u32(20..=100),
        DropKind::Personal => rng.u32(5..=20),
    }
}

/// The first midnight after `now` in `tz`.
pub fn next_midnight(now: Timestamp, tz: &TimeZone) -> Result<Timestamp, jiff::Error> {
    let today = now.to_zoned(tz.clone()).date();
    Ok(today.tomorrow()?.to_zoned(tz.clone())?.timestamp())
}

fn scatter(rng: &mut Rng, around: Coordinate, spread: f64) -> Coordinate {
    Coordinate::new(
        around.latitude + (rng.f64() - 0.5) * spread,
        around.longitude + (rng.f64() - 0.5) * spread,
    )
}

/// Seeds two or three shared drops around `position` and stores them.
pub fn seed_shared_drops(
    storage: &Storage,
    rng: &mut Rng,
    position: Coordinate,
    now: Timestamp,
    tz: &TimeZone,
) -> Result<Vec<BoneDrop>, SeedError> {
    let parks = parks_within(position, PARK_SEARCH_RADIUS_METERS);
    let hosts: Vec<(Coordinate, &str)> = if parks.is_empty() {
        tracing::info!("no known park within 1 km; seeding mystery drops");
        vec![(position, FALLBACK_NAME); 3]
    } else {
        parks.iter().map(|p| (p.location, p.name)).collect()
    };

    let expires_at = next_midnight(now, tz)?;
    let count = rng.usize(2..=3);
    let drops: Vec<BoneDrop> = (0..count)
        .map(|i| {
            let (location, name) = hosts[i % hosts.len()];
            let spot = scatter(rng, location, SHARED_SCATTER_DEGREES);
            BoneDrop {
                id: Uuid::new_v4(),
                kind: DropKind::Shared,
                latitude: spot.latitude,
                longitude: spot.longitude,
                bone_value: bone_value(rng, DropKind::Shared),
                expires_at,
                collected_by: None,
                collected_at: None,
                user_id: None,
                location_name: Some(name.to_string()),
            }
        })
        .collect();

    storage.insert_drops(&drops)?;
    tracing::info!(count = drops.len(), "seeded shared bone drops");
    Ok(drops)
}

/// Seeds one personal drop for `user_id` near a park, if any park is close.
pub fn seed_personal_drop(
    storage: &Storage,
    rng: &mut Rng,
    user_id: &str,
    position: Coordinate,
    now: Timestamp,
    tz: &TimeZone,
) -> Result<Option<BoneDrop>, SeedError> {
    let parks = parks_within(position, PARK_SEARCH_RADIUS_METERS);
    let Some(park) = rng.choice(parks) else {
        tracing::info!(user_id, "no park within 1 km for a personal drop");
        return Ok(None);
    };

    let spot = scatter(rng, park.location, PERSONAL_SCATTER_DEGREES);
    let drop = BoneDrop {
        id: Uuid::new_v4(),
        kind: DropKind::Personal,
        latitude: spot.latitude,
        longitude: spot.longitude,
        bone_value: bone_value(rng, DropKind::Personal),
        expires_at: next_midnight(now, tz)?,
        collected_by: None,
        collected_at: None,
        user_id: Some(user_id.to_string()),
        location_name: Some(park.name.to_string()),
    };

    storage.insert_drops(std::slice::from_ref(&drop))?;
    tracing::info!(user_id, park = park.name, "seeded personal bone drop");
    Ok(Some(drop))
}

/// Removes drops that expired before `now`.
pub fn clear_expired_drops(storage: &Storage, now: Timestamp) -> Result<usize, SeedError> {
    let cleared = storage.delete_expired_drops(now)?;
    tracing::info!(cleared, "cleared expired bone drops");
    Ok(cleared)
}

/// Clears expired drops and seeds a fresh batch (plus a personal drop when
/// a user is given).
pub fn daily_reset(
    storage: &Storage,
    rng: &mut Rng,
    position: Coordinate,
    user_id: Option<&str>,
    now: Timestamp,
    tz: &TimeZone,
) -> Result<ResetReport, SeedError> {
    let cleared = clear_expired_drops(storage, now)?;
    let shared = seed_shared_drops(storage, rng, position, now, tz)?;
    let personal = match user_id {
        Some(user_id) => seed_personal_drop(storage, rng, user_id, position, now, tz)?,
        None => None,
    };
    Ok(ResetReport {
        cleared,
        shared,
        personal,
    })
}
