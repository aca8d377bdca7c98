//! Proximity engine: which bone drops are near, which one you're standing
//! on, and the at-most-once claim that collects it.
//!
//! The engine keeps a small visible set, rebuilt from storage on every
//! [`ProximityEngine::refresh`]: uncollected, unexpired drops within
//! [`VISIBILITY_RADIUS_METERS`], nearest first, at most
//! [`MAX_VISIBLE_DROPS`]. Each position update re-checks that set for a drop
//! within [`COLLECTION_RADIUS_METERS`].
//!
//! Collection claims the drop in storage first (compare-and-set on
//! `collected_by`). Bones are credited only after the claim is won, and a
//! claim is never undone: if crediting fails afterwards the drop stays spent
//! and the caller gets [`CollectError::CreditFailed`].

use jiff::Timestamp;
use serde::Serialize;
use serde_json::json;
use uuid::Uuid;

use crate::geo::Coordinate;
use crate::model::{BoneDrop, TransactionKind};
use crate::rewards::{self, RewardError};
use crate::storage::{BoneStore, StorageError};

/// Drops farther than this are not shown at all.
pub const VISIBILITY_RADIUS_METERS: f64 = 1000.0;

/// Drops within this distance can be collected.
pub const COLLECTION_RADIUS_METERS: f64 = 30.0;

/// Size cap of the visible set.
pub const MAX_VISIBLE_DROPS: usize = 3;

/// A drop paired with its distance from the position it was measured at.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct NearbyDrop {
    #[serde(flatten)]
    pub drop: BoneDrop,
    pub distance_meters: f64,
}

/// Result of a collection attempt that reached storage.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CollectOutcome {
    /// This user won the claim and was paid.
    Collected { bones_earned: u32, balance: i64 },

    /// Someone else got there first.
    AlreadyCollected,
}

#[derive(Debug, thiserror::Error)]
pub enum CollectError {
    /// The drop isn't in this engine's visible set, so its value is unknown.
    #[error("drop {0} is not among the visible drops")]
    NotVisible(Uuid),

    /// The claim could not be attempted or its result is unknown.
    #[error("could not claim drop: {0}")]
    Storage(#[from] StorageError),

    /// The claim succeeded but the wallet or ledger write did not.
    #[error("claimed drop {drop_id} but crediting {bones} bones failed: {source}")]
    CreditFailed {
        drop_id: Uuid,
        bones: u32,
        source: RewardError,
    },
}

/// Picks the closest drop within collection range. Ties go to the first found.
pub fn find_nearest(position: Coordinate, visible: &[NearbyDrop]) -> Option<NearbyDrop> {
    let mut nearest: Option<NearbyDrop> = None;
    for candidate in visible {
        let distance = position.distance_to(candidate.drop.coordinate());
        if distance > COLLECTION_RADIUS_METERS {
            continue;
        }
        if nearest
            .as_ref()
            .is_none_or(|best| distance < best.distance_meters)
        {
            nearest = Some(NearbyDrop {
                drop: candidate.drop.clone(),
                distance_meters: distance,
            });
        }
    }
    nearest
}

/// Filters, sorts, and caps `drops` around `position`.
pub fn nearby_drops(position: Coordinate, drops: Vec<BoneDrop>) -> Vec<NearbyDrop> {
    let mut nearby: Vec<NearbyDrop> = drops
        .into_iter()
        .map(|drop| NearbyDrop {
            distance_meters: position.distance_to(drop.coordinate()),
            drop,
        })
        .filter(|n| n.distance_meters <= VISIBILITY_RADIUS_METERS)
        .collect();
    nearby.sort_by(|a, b| a.distance_meters.total_cmp(&b.distance_meters));
    nearby.truncate(MAX_VISIBLE_DROPS);
    nearby
}

/// Visible drops and the collectible one, for a single viewer.
#[derive(Debug, Default)]
pub struct ProximityEngine {
    visible: Vec<NearbyDrop>,
    nearest: Option<NearbyDrop>,
}

impl ProximityEngine {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn visible(&self) -> &[NearbyDrop] {
        &self.visible
    }

    pub fn nearest(&self) -> Option<&NearbyDrop> {
        self.nearest.as_ref()
    }

    /// Reloads the visible set around `position`.
    ///
    /// The previous set is replaced wholesale. On error it is left untouched.
    pub fn refresh(
        &mut self,
        store: &impl BoneStore,
        position: Coordinate,
        now: Timestamp,
    ) -> Result<&[NearbyDrop], StorageError> {
        let drops = store.active_drops(now).inspect_err(|e| {
            tracing::warn!(error = %e, "failed to fetch bone drops");
        })?;
        let fetched = drops.len();
        self.visible = nearby_drops(position, drops);
        tracing::debug!(fetched, visible = self.visible.len(), "refreshed bone drops");
        Ok(&self.visible)
    }

    /// Re-checks which visible drop, if any, is within collection range.
    pub fn update_position(&mut self, position: Coordinate) -> Option<&NearbyDrop> {
        self.nearest = find_nearest(position, &self.visible);
        self.nearest.as_ref()
    }

    /// Tries to collect a visible drop for `user_id`.
    pub fn collect(
        &mut self,
        store: &impl BoneStore,
        drop_id: Uuid,
        user_id: &str,
        now: Timestamp,
    ) -> Result<CollectOutcome, CollectError> {
        let drop = self
            .visible
            .iter()
            .find(|n| n.drop.id == drop_id)
            .map(|n| n.drop.clone())
            .ok_or(CollectError::NotVisible(drop_id))?;

        let claimed = store.claim_drop(drop_id, user_id, now).inspect_err(|e| {
            tracing::warn!(%drop_id, error = %e, "bone drop claim failed");
        })?;

        // Won or lost, the drop is no longer on offer.
        self.forget(drop_id);

        if !claimed {
            tracing::debug!(%drop_id, user_id, "bone drop already collected");
            return Ok(CollectOutcome::AlreadyCollected);
        }

        let balance = rewards::credit(
            store,
            user_id,
            i64::from(drop.bone_value),
            TransactionKind::DropCollect,
            json!({ "drop_id": drop_id, "drop_type": drop.kind }),
            now,
        )
        .map_err(|source| {
            tracing::error!(
                %drop_id,
                user_id,
                bones = drop.bone_value,
                error = %source,
                "bone drop claimed but not credited; needs reconciliation"
            );
            CollectError::CreditFailed {
                drop_id,
                bones: drop.bone_value,
                source,
            }
        })?;

        tracing::info!(%drop_id, user_id, bones = drop.bone_value, balance, "collected bone drop");
        Ok(CollectOutcome::Collected {
            bones_earned: drop.bone_value,
            balance,
        })
    }

    fn forget(&mut self, drop_id: Uuid) {
        self.visible.retain(|n| n.drop.id != drop_id);
        self.nearest = None;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    use std::cell::Cell;
    use std::sync::Barrier;
    use std::thread;

    use jiff::ToSpan;

    use crate::model::{DropKind, Transaction, WalkRecord};
    use crate::storage::test_support::{fail_inserts_into, fund, test_storage};
    use crate::storage::{Result as StorageResult, Storage};

    fn now() -> Timestamp {
        Timestamp::new(1_750_000_000, 0).unwrap()
    }

    fn origin() -> Coordinate {
        Coordinate::new(40.7, -74.0)
    }

    /// A shared drop `north_meters` due north of [`origin`].
    fn drop_north(north_meters: f64, bone_value: u32) -> BoneDrop {
        BoneDrop {
            id: Uuid::new_v4(),
            kind: DropKind::Shared,
            latitude: 40.7 + north_meters / 111_195.0,
            longitude: -74.0,
            bone_value,
            expires_at: now() + 1.hour(),
            collected_by: None,
            collected_at: None,
            user_id: None,
            location_name: None,
        }
    }

    fn nearby(drop: &BoneDrop) -> NearbyDrop {
        NearbyDrop {
            distance_meters: origin().distance_to(drop.coordinate()),
            drop: drop.clone(),
        }
    }

    #[test]
    fn nearby_filters_sorts_and_caps() {
        let drops = vec![
            drop_north(900.0, 1),
            drop_north(1_200.0, 2),
            drop_north(10.0, 3),
            drop_north(500.0, 4),
            drop_north(50.0, 5),
        ];

        let visible = nearby_drops(origin(), drops);

        let values: Vec<u32> = visible.iter().map(|n| n.drop.bone_value).collect();
        assert_eq!(values, vec![3, 5, 4]);
        assert!(
            visible
                .windows(2)
                .all(|w| w[0].distance_meters <= w[1].distance_meters)
        );
    }

    #[test]
    fn find_nearest_within_radius() {
        let far = drop_north(25.0, 1);
        let near = drop_north(8.0, 2);
        let visible = vec![nearby(&far), nearby(&near), nearby(&drop_north(300.0, 3))];

        let nearest = find_nearest(origin(), &visible).unwrap();

        assert_eq!(nearest.drop.id, near.id);
        assert!((nearest.distance_meters - 8.0).abs() < 0.5);
    }

    #[test]
    fn find_nearest_none_out_of_range() {
        let visible = vec![nearby(&drop_north(31.0, 1)), nearby(&drop_north(400.0, 2))];
        assert!(find_nearest(origin(), &visible).is_none());
    }

    #[test]
    fn find_nearest_tie_keeps_first() {
        let a = drop_north(10.0, 1);
        let mut b = a.clone();
        b.id = Uuid::new_v4();

        let nearest = find_nearest(origin(), &[nearby(&a), nearby(&b)]).unwrap();

        assert_eq!(nearest.drop.id, a.id);
    }

    #[test]
    fn refresh_twice_is_identical() {
        let (_dir, storage) = test_storage();
        storage
            .insert_drops(&[
                drop_north(700.0, 1),
                drop_north(20.0, 2),
                drop_north(300.0, 3),
                drop_north(999.0, 4),
                drop_north(2_000.0, 5),
            ])
            .unwrap();
        let mut engine = ProximityEngine::new();

        let first = engine.refresh(&storage, origin(), now()).unwrap().to_vec();
        let second = engine.refresh(&storage, origin(), now()).unwrap().to_vec();

        assert_eq!(first, second);
        assert_eq!(first.len(), MAX_VISIBLE_DROPS);
        let values: Vec<u32> = first.iter().map(|n| n.drop.bone_value).collect();
        assert_eq!(values, vec![2, 3, 1]);
    }

    #[test]
    fn refresh_replaces_visible_set() {
        let (_dir, storage) = test_storage();
        storage.insert_drops(&[drop_north(20.0, 1)]).unwrap();
        let mut engine = ProximityEngine::new();
        engine.refresh(&storage, origin(), now()).unwrap();

        // Far away from everything.
        let elsewhere = Coordinate::new(51.5, -0.12);
        engine.refresh(&storage, elsewhere, now()).unwrap();

        assert!(engine.visible().is_empty());
    }

    #[test]
    fn refresh_skips_expired_drops() {
        let (_dir, storage) = test_storage();
        let mut stale = drop_north(20.0, 1);
        stale.expires_at = now() - 1.second();
        storage.insert_drops(&[stale]).unwrap();
        let mut engine = ProximityEngine::new();

        assert!(engine.refresh(&storage, origin(), now()).unwrap().is_empty());
    }

    #[test]
    fn update_position_tracks_nearest() {
        let (_dir, storage) = test_storage();
        let drop = drop_north(20.0, 10);
        storage.insert_drops(std::slice::from_ref(&drop)).unwrap();
        let mut engine = ProximityEngine::new();
        engine.refresh(&storage, origin(), now()).unwrap();

        assert_eq!(engine.update_position(origin()).unwrap().drop.id, drop.id);
        let away = Coordinate::new(40.7 - 200.0 / 111_195.0, -74.0);
        assert!(engine.update_position(away).is_none());
        assert!(engine.nearest().is_none());
    }

    #[test]
    fn collect_credits_wallet_and_ledger() {
        let (_dir, storage) = test_storage();
        let drop = drop_north(5.0, 40);
        storage.insert_drops(std::slice::from_ref(&drop)).unwrap();
        let mut engine = ProximityEngine::new();
        engine.refresh(&storage, origin(), now()).unwrap();
        engine.update_position(origin());

        let outcome = engine.collect(&storage, drop.id, "luna", now()).unwrap();

        assert_eq!(
            outcome,
            CollectOutcome::Collected {
                bones_earned: 40,
                balance: 40
            }
        );
        assert!(engine.visible().is_empty());
        assert!(engine.nearest().is_none());
        assert_eq!(
            storage.load_drop(drop.id).unwrap().collected_by.as_deref(),
            Some("luna")
        );
        let ledger = storage.list_transactions("luna").unwrap();
        assert_eq!(ledger.len(), 1);
        assert_eq!(ledger[0].kind, TransactionKind::DropCollect);
        assert_eq!(ledger[0].meta["drop_type"], json!("shared"));
    }

    #[test]
    fn collect_adds_to_existing_balance() {
        let (_dir, storage) = test_storage();
        fund(&storage, "luna", 15);
        let drop = drop_north(5.0, 40);
        storage.insert_drops(std::slice::from_ref(&drop)).unwrap();
        let mut engine = ProximityEngine::new();
        engine.refresh(&storage, origin(), now()).unwrap();

        let outcome = engine.collect(&storage, drop.id, "luna", now()).unwrap();

        assert!(matches!(outcome, CollectOutcome::Collected { balance: 55, .. }));
    }

    #[test]
    fn collect_invisible_drop_claims_nothing() {
        let (_dir, storage) = test_storage();
        let drop = drop_north(5.0, 40);
        storage.insert_drops(std::slice::from_ref(&drop)).unwrap();
        let mut engine = ProximityEngine::new();

        let err = engine.collect(&storage, drop.id, "luna", now()).unwrap_err();

        assert!(matches!(err, CollectError::NotVisible(id) if id == drop.id));
        assert!(storage.load_drop(drop.id).unwrap().collected_by.is_none());
    }

    #[test]
    fn second_collector_gets_already_collected() {
        let (_dir, storage) = test_storage();
        let drop = drop_north(5.0, 40);
        storage.insert_drops(std::slice::from_ref(&drop)).unwrap();
        let mut luna = ProximityEngine::new();
        let mut rex = ProximityEngine::new();
        luna.refresh(&storage, origin(), now()).unwrap();
        rex.refresh(&storage, origin(), now()).unwrap();

        luna.collect(&storage, drop.id, "luna", now()).unwrap();
        let outcome = rex.collect(&storage, drop.id, "rex", now()).unwrap();

        assert_eq!(outcome, CollectOutcome::AlreadyCollected);
        assert!(rex.visible().is_empty());
        assert!(storage.load_wallet("rex").unwrap().is_none());
    }

    #[test]
    fn concurrent_collectors_one_winner() {
        let (_dir, storage) = test_storage();
        let drop = drop_north(5.0, 40);
        storage.insert_drops(std::slice::from_ref(&drop)).unwrap();
        let users = ["luna", "rex", "biscuit", "pepper"];
        let barrier = Barrier::new(users.len());

        let outcomes: Vec<(String, CollectOutcome)> = thread::scope(|s| {
            let handles: Vec<_> = users
                .iter()
                .map(|user| {
                    let storage = &storage;
                    let barrier = &barrier;
                    s.spawn(move || {
                        let mut engine = ProximityEngine::new();
                        engine.refresh(storage, origin(), now()).unwrap();
                        barrier.wait();
                        let outcome = engine.collect(storage, drop.id, user, now()).unwrap();
                        ((*user).to_string(), outcome)
                    })
                })
                .collect();
            handles.into_iter().map(|h| h.join().unwrap()).collect()
        });

        let winners: Vec<&String> = outcomes
            .iter()
            .filter(|(_, o)| matches!(o, CollectOutcome::Collected { .. }))
            .map(|(user, _)| user)
            .collect();
        assert_eq!(winners.len(), 1);

        let winner = winners[0];
        assert_eq!(
            storage.load_drop(drop.id).unwrap().collected_by.as_ref(),
            Some(winner)
        );
        for user in users {
            let credited = storage.load_wallet(user).unwrap().map(|w| w.balance);
            let expected = (user == winner.as_str()).then_some(40);
            assert_eq!(credited, expected, "wallet of {user}");
        }
    }

    /// Storage whose reads, claims, or credits fail on demand.
    struct FlakyStore<'a> {
        inner: &'a Storage,
        fail_fetch: Cell<bool>,
        fail_claim: Cell<bool>,
        fail_credit: Cell<bool>,
    }

    impl<'a> FlakyStore<'a> {
        fn new(inner: &'a Storage) -> Self {
            Self {
                inner,
                fail_fetch: Cell::new(false),
                fail_claim: Cell::new(false),
                fail_credit: Cell::new(false),
            }
        }
    }

    fn unavailable() -> StorageError {
        StorageError::Io(std::io::Error::other("database unavailable"))
    }

    impl BoneStore for FlakyStore<'_> {
        fn active_drops(&self, now: Timestamp) -> StorageResult<Vec<BoneDrop>> {
            if self.fail_fetch.get() {
                return Err(unavailable());
            }
            self.inner.active_drops(now)
        }

        fn claim_drop(&self, id: Uuid, user_id: &str, at: Timestamp) -> StorageResult<bool> {
            if self.fail_claim.get() {
                return Err(unavailable());
            }
            self.inner.claim_drop(id, user_id, at)
        }

        fn credit_with_entry(&self, entry: &Transaction) -> StorageResult<i64> {
            if self.fail_credit.get() {
                return Err(unavailable());
            }
            self.inner.credit_with_entry(entry)
        }

        fn debit_with_entry(&self, entry: &Transaction) -> StorageResult<i64> {
            self.inner.debit_with_entry(entry)
        }

        fn archive_walk(
            &self,
            walk: &WalkRecord,
            payout: Option<&Transaction>,
        ) -> StorageResult<Option<i64>> {
            self.inner.archive_walk(walk, payout)
        }
    }

    #[test]
    fn failed_refresh_keeps_visible_set() {
        let (_dir, storage) = test_storage();
        storage
            .insert_drops(&[drop_north(10.0, 1), drop_north(400.0, 2)])
            .unwrap();
        let flaky = FlakyStore::new(&storage);
        let mut engine = ProximityEngine::new();
        let before = engine.refresh(&flaky, origin(), now()).unwrap().to_vec();

        flaky.fail_fetch.set(true);
        let elsewhere = Coordinate::new(51.5, -0.12);
        let err = engine.refresh(&flaky, elsewhere, now()).unwrap_err();

        assert!(matches!(err, StorageError::Io(_)));
        assert_eq!(engine.visible(), before.as_slice());
    }

    #[test]
    fn failed_claim_changes_nothing() {
        let (_dir, storage) = test_storage();
        let drop = drop_north(5.0, 40);
        storage.insert_drops(std::slice::from_ref(&drop)).unwrap();
        let flaky = FlakyStore::new(&storage);
        let mut engine = ProximityEngine::new();
        engine.refresh(&flaky, origin(), now()).unwrap();
        engine.update_position(origin());

        flaky.fail_claim.set(true);
        let err = engine.collect(&flaky, drop.id, "luna", now()).unwrap_err();

        assert!(matches!(err, CollectError::Storage(_)));
        assert_eq!(engine.visible().len(), 1);
        assert_eq!(engine.nearest().map(|n| n.drop.id), Some(drop.id));
        assert!(storage.load_drop(drop.id).unwrap().collected_by.is_none());
        assert!(storage.load_wallet("luna").unwrap().is_none());

        // Once storage recovers the same drop can still be collected.
        flaky.fail_claim.set(false);
        let outcome = engine.collect(&flaky, drop.id, "luna", now()).unwrap();
        assert!(matches!(outcome, CollectOutcome::Collected { balance: 40, .. }));
    }

    #[test]
    fn failed_credit_is_reported_and_drop_stays_claimed() {
        let (_dir, storage) = test_storage();
        let drop = drop_north(5.0, 40);
        storage.insert_drops(std::slice::from_ref(&drop)).unwrap();
        let flaky = FlakyStore::new(&storage);
        flaky.fail_credit.set(true);
        let mut engine = ProximityEngine::new();
        engine.refresh(&flaky, origin(), now()).unwrap();

        let err = engine.collect(&flaky, drop.id, "luna", now()).unwrap_err();

        assert!(matches!(
            err,
            CollectError::CreditFailed { bones: 40, .. }
        ));
        assert_eq!(
            storage.load_drop(drop.id).unwrap().collected_by.as_deref(),
            Some("luna")
        );
        assert!(storage.load_wallet("luna").unwrap().is_none());
        assert!(storage.list_transactions("luna").unwrap().is_empty());

        // The spent drop is not offered again.
        flaky.fail_credit.set(false);
        assert!(engine.refresh(&flaky, origin(), now()).unwrap().is_empty());
    }

    #[test]
    fn rolled_back_ledger_write_pays_nothing() {
        let (_dir, storage) = test_storage();
        let drop = drop_north(5.0, 40);
        storage.insert_drops(std::slice::from_ref(&drop)).unwrap();
        fail_inserts_into(&storage, "bone_transactions");
        let mut engine = ProximityEngine::new();
        engine.refresh(&storage, origin(), now()).unwrap();

        let err = engine.collect(&storage, drop.id, "luna", now()).unwrap_err();

        assert!(matches!(err, CollectError::CreditFailed { .. }));
        assert!(storage.load_wallet("luna").unwrap().is_none());
        assert_eq!(storage.ledger_total("luna").unwrap(), 0);
    }
}
