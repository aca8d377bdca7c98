//! Bone rewards: walk bonuses, wallet credits, and redemptions.
//!
//! Every flow that moves bones pairs one balance change with one ledger
//! entry, and storage applies the pair atomically: on error, neither
//! happened.

use jiff::Timestamp;
use serde_json::json;
use uuid::Uuid;

use crate::model::{Transaction, TransactionKind, WalkRecord, WalkSummary};
use crate::storage::{BoneStore, StorageError};

/// Walks this short or shorter earn nothing.
pub const MIN_REWARDED_METERS: u64 = 100;

/// Floor for any rewarded walk.
pub const MIN_WALK_BONES: i64 = 5;

pub const BONES_PER_KILOMETER: f64 = 20.0;

#[derive(Debug, thiserror::Error)]
pub enum RewardError {
    #[error("amount must be positive, got {0}")]
    InvalidAmount(i64),

    #[error(transparent)]
    Storage(#[from] StorageError),
}

/// Something bones can buy.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Deal {
    /// Catalog id, when the deal comes from one.
    pub id: Option<String>,
    pub title: String,
    pub bones_cost: i64,
}

/// Bones earned for a walk of `distance_meters`.
pub fn walk_bonus(distance_meters: u64) -> i64 {
    if distance_meters <= MIN_REWARDED_METERS {
        return 0;
    }
    let earned = (distance_meters as f64 / 1000.0 * BONES_PER_KILOMETER).round() as i64;
    earned.max(MIN_WALK_BONES)
}

/// Credits `amount` bones and records why.
///
/// Returns the new balance.
pub fn credit(
    store: &impl BoneStore,
    user_id: &str,
    amount: i64,
    kind: TransactionKind,
    meta: serde_json::Value,
    now: Timestamp,
) -> Result<i64, RewardError> {
    if amount <= 0 {
        return Err(RewardError::InvalidAmount(amount));
    }
    let entry = Transaction::new(user_id, amount, kind, meta, now);
    let balance = store.credit_with_entry(&entry).inspect_err(|e| {
        tracing::warn!(user_id, amount, kind = %kind, error = %e, "credit failed");
    })?;
    tracing::debug!(user_id, amount, kind = %kind, balance, "credited bones");
    Ok(balance)
}

/// Spends bones on `deal`, refusing if the balance is short.
///
/// Returns the new balance.
pub fn redeem(
    store: &impl BoneStore,
    user_id: &str,
    deal: &Deal,
    now: Timestamp,
) -> Result<i64, RewardError> {
    if deal.bones_cost <= 0 {
        return Err(RewardError::InvalidAmount(deal.bones_cost));
    }
    let entry = Transaction::new(
        user_id,
        -deal.bones_cost,
        TransactionKind::StoreRedeem,
        json!({ "deal_id": deal.id, "deal_title": deal.title }),
        now,
    );
    let balance = store.debit_with_entry(&entry)?;
    tracing::debug!(user_id, cost = deal.bones_cost, deal = %deal.title, balance, "redeemed bones");
    Ok(balance)
}

/// Archives a finished walk and pays out its bonus, as one unit.
///
/// Walks that earn nothing are archived without touching the wallet or ledger.
pub fn complete_walk(
    store: &impl BoneStore,
    user_id: &str,
    summary: WalkSummary,
    now: Timestamp,
) -> Result<WalkRecord, RewardError> {
    let bones_earned = walk_bonus(summary.distance_meters);
    let record = WalkRecord {
        id: Uuid::new_v4(),
        user_id: user_id.to_string(),
        started_at: summary.started_at,
        ended_at: summary.ended_at,
        distance_meters: summary.distance_meters,
        duration_seconds: summary.duration_seconds,
        bones_earned,
        path: summary.path,
    };
    let payout = (bones_earned > 0).then(|| {
        Transaction::new(
            user_id,
            bones_earned,
            TransactionKind::WalkEarn,
            json!({ "walk_id": record.id }),
            now,
        )
    });

    let balance = store.archive_walk(&record, payout.as_ref())?;
    tracing::info!(
        walk_id = %record.id,
        user_id,
        distance = record.distance_meters,
        bones = bones_earned,
        ?balance,
        "walk completed"
    );
    Ok(record)
}

#[cfg(test)]
mod tests {
    use super::*;

    use crate::storage::test_support::{fail_inserts_into, fund, test_storage};

    fn now() -> Timestamp {
        Timestamp::new(1_750_000_000, 0).unwrap()
    }

    fn summary(distance_meters: u64) -> WalkSummary {
        WalkSummary {
            started_at: now(),
            ended_at: now(),
            distance_meters,
            duration_seconds: 600,
            path: Vec::new(),
        }
    }

    fn chew_toy(bones_cost: i64) -> Deal {
        Deal {
            id: Some("deal-7".into()),
            title: "Chew toy".into(),
            bones_cost,
        }
    }

    #[test]
    fn bonus_schedule() {
        assert_eq!(walk_bonus(0), 0);
        assert_eq!(walk_bonus(100), 0);
        // 101 m is 2 bones by rate, floored up to the minimum.
        assert_eq!(walk_bonus(101), 5);
        assert_eq!(walk_bonus(250), 5);
        assert_eq!(walk_bonus(1_000), 20);
        assert_eq!(walk_bonus(1_113), 22);
        assert_eq!(walk_bonus(5_000), 100);
    }

    #[test]
    fn complete_walk_archives_and_credits() {
        let (_dir, storage) = test_storage();

        let record = complete_walk(&storage, "luna", summary(1_113), now()).unwrap();

        assert_eq!(record.bones_earned, 22);
        assert_eq!(storage.list_walks("luna").unwrap(), vec![record.clone()]);
        assert_eq!(storage.load_wallet("luna").unwrap().unwrap().balance, 22);

        let ledger = storage.list_transactions("luna").unwrap();
        assert_eq!(ledger.len(), 1);
        assert_eq!(ledger[0].kind, TransactionKind::WalkEarn);
        assert_eq!(ledger[0].meta["walk_id"], json!(record.id));
    }

    #[test]
    fn short_walk_is_archived_without_payout() {
        let (_dir, storage) = test_storage();

        let record = complete_walk(&storage, "luna", summary(40), now()).unwrap();

        assert_eq!(record.bones_earned, 0);
        assert_eq!(storage.list_walks("luna").unwrap().len(), 1);
        assert!(storage.load_wallet("luna").unwrap().is_none());
        assert!(storage.list_transactions("luna").unwrap().is_empty());
    }

    #[test]
    fn failed_ledger_write_credits_nothing() {
        let (_dir, storage) = test_storage();
        fail_inserts_into(&storage, "bone_transactions");

        let err = credit(
            &storage,
            "luna",
            40,
            TransactionKind::DropCollect,
            json!({}),
            now(),
        )
        .unwrap_err();

        assert!(matches!(err, RewardError::Storage(_)));
        assert!(storage.load_wallet("luna").unwrap().is_none());
        assert_eq!(storage.ledger_total("luna").unwrap(), 0);
    }

    #[test]
    fn failed_walk_payout_archives_nothing() {
        let (_dir, storage) = test_storage();
        fail_inserts_into(&storage, "bone_transactions");

        assert!(complete_walk(&storage, "luna", summary(2_000), now()).is_err());

        // Nothing stands, so retrying cannot pay the walk twice.
        assert!(storage.list_walks("luna").unwrap().is_empty());
        assert!(storage.load_wallet("luna").unwrap().is_none());
    }

    #[test]
    fn redeem_debits_and_records() {
        let (_dir, storage) = test_storage();
        fund(&storage, "luna", 50);

        let balance = redeem(&storage, "luna", &chew_toy(30), now()).unwrap();

        assert_eq!(balance, 20);
        let ledger = storage.list_transactions("luna").unwrap();
        let spend = &ledger[1];
        assert_eq!(spend.amount, -30);
        assert_eq!(spend.kind, TransactionKind::StoreRedeem);
        assert_eq!(spend.meta, json!({ "deal_id": "deal-7", "deal_title": "Chew toy" }));
        assert_eq!(storage.ledger_total("luna").unwrap(), 20);
    }

    #[test]
    fn redeem_short_balance_changes_nothing() {
        let (_dir, storage) = test_storage();
        fund(&storage, "luna", 10);

        let err = redeem(&storage, "luna", &chew_toy(30), now()).unwrap_err();

        assert!(matches!(
            err,
            RewardError::Storage(StorageError::InsufficientBalance { .. })
        ));
        assert_eq!(storage.load_wallet("luna").unwrap().unwrap().balance, 10);
        assert_eq!(storage.list_transactions("luna").unwrap().len(), 1);
    }

    #[test]
    fn non_positive_amounts_are_rejected() {
        let (_dir, storage) = test_storage();

        assert!(matches!(
            redeem(&storage, "luna", &chew_toy(0), now()),
            Err(RewardError::InvalidAmount(0))
        ));
        assert!(matches!(
            credit(&storage, "luna", -5, TransactionKind::WalkEarn, json!({}), now()),
            Err(RewardError::InvalidAmount(-5))
        ));
    }
}
