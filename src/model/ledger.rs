//! Wallets and the append-only bone ledger.

use std::fmt;
use std::str::FromStr;

use jiff::Timestamp;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// A user's bone balance.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Wallet {
    pub user_id: String,
    pub balance: i64,
}

/// Why bones moved.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TransactionKind {
    /// Bonus for completing a walk.
    WalkEarn,

    /// A bone drop was collected.
    DropCollect,

    /// Bones spent on a marketplace deal.
    StoreRedeem,
}

impl TransactionKind {
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::WalkEarn => "walk_earn",
            Self::DropCollect => "drop_collect",
            Self::StoreRedeem => "store_redeem",
        }
    }
}

impl fmt::Display for TransactionKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for TransactionKind {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "walk_earn" => Ok(Self::WalkEarn),
            "drop_collect" => Ok(Self::DropCollect),
            "store_redeem" => Ok(Self::StoreRedeem),
            other => Err(format!("unknown transaction type: {other}")),
        }
    }
}

/// One immutable ledger line. Positive amounts credit, negative debit.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Transaction {
    pub id: Uuid,
    pub user_id: String,
    pub amount: i64,
    #[serde(rename = "type")]
    pub kind: TransactionKind,

    /// Free-form context, e.g. `{"drop_id": …, "drop_type": "shared"}`.
    pub meta: serde_json::Value,
    pub created_at: Timestamp,
}

impl Transaction {
    pub fn new(
        user_id: &str,
        amount: i64,
        kind: TransactionKind,
        meta: serde_json::Value,
        created_at: Timestamp,
    ) -> Self {
        Self {
            id: Uuid::new_v4(),
            user_id: user_id.to_string(),
            amount,
            kind,
            meta,
            created_at,
        }
    }
}
