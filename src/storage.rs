//! Local persistence for drops, wallets, the ledger, and archived walks.
//!
//! Everything lives in a single `SQLite` database:
//!
//! ```text
//! bone_drops         # Seeded collectibles; `collected_by` is claimed exactly once
//! bone_wallets       # One balance per user
//! bone_transactions  # Append-only ledger
//! walks              # Archived walk summaries
//! ```
//!
//! Each operation opens its own connection with a busy timeout, so several
//! engines (threads or processes) can share one database file. Timestamps are
//! stored as Unix milliseconds.

mod drops;
mod transactions;
mod walks;
mod wallets;

use std::{fs, io, path::PathBuf, time::Duration};

use jiff::Timestamp;
use rusqlite::Connection;
use uuid::Uuid;

use crate::model::{BoneDrop, Transaction, WalkRecord};

/// How long a connection waits on a locked database before giving up.
const BUSY_TIMEOUT: Duration = Duration::from_secs(5);

const SCHEMA: &str = "
CREATE TABLE IF NOT EXISTS bone_drops (
    id            TEXT PRIMARY KEY,
    type          TEXT NOT NULL,
    latitude      REAL NOT NULL,
    longitude     REAL NOT NULL,
    bone_value    INTEGER NOT NULL CHECK (bone_value > 0),
    expires_at    INTEGER NOT NULL,
    collected_by  TEXT,
    collected_at  INTEGER,
    user_id       TEXT,
    location_name TEXT
);
CREATE INDEX IF NOT EXISTS bone_drops_open ON bone_drops (collected_by, expires_at);

CREATE TABLE IF NOT EXISTS bone_wallets (
    user_id TEXT PRIMARY KEY,
    balance INTEGER NOT NULL
);

CREATE TABLE IF NOT EXISTS bone_transactions (
    id         TEXT PRIMARY KEY,
    user_id    TEXT NOT NULL,
    amount     INTEGER NOT NULL,
    type       TEXT NOT NULL,
    meta       TEXT NOT NULL,
    created_at INTEGER NOT NULL
);
CREATE INDEX IF NOT EXISTS bone_transactions_user ON bone_transactions (user_id, created_at);

CREATE TABLE IF NOT EXISTS walks (
    id               TEXT PRIMARY KEY,
    user_id          TEXT NOT NULL,
    started_at       INTEGER NOT NULL,
    ended_at         INTEGER NOT NULL,
    distance_meters  INTEGER NOT NULL,
    duration_seconds INTEGER NOT NULL,
    bones_earned     INTEGER NOT NULL,
    path             TEXT NOT NULL
);
CREATE INDEX IF NOT EXISTS walks_user ON walks (user_id, started_at);
";

/// Errors that can occur during storage operations.
#[derive(Debug, thiserror::Error)]
pub enum StorageError {
    #[error("drop not found: {0}")]
    DropNotFound(Uuid),

    #[error("insufficient balance for {user_id}: have {balance}, need {needed}")]
    InsufficientBalance {
        user_id: String,
        balance: i64,
        needed: i64,
    },

    #[error("corrupt record: {0}")]
    Corrupt(String),

    #[error("I/O error: {0}")]
    Io(#[from] io::Error),

    #[error("SQLite error: {0}")]
    Sqlite(#[from] rusqlite::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}

pub type Result<T> = core::result::Result<T, StorageError>;

/// The persistence operations the engine depends on.
///
/// [`Storage`] is the real implementation; tests wrap it to inject failures.
pub trait BoneStore {
    /// Drops with no collector whose expiry is after `now`.
    fn active_drops(&self, now: Timestamp) -> Result<Vec<BoneDrop>>;

    /// Marks a drop collected by `user_id`, only if nobody has collected it yet.
    ///
    /// Returns `true` when this call made the claim, `false` when the drop was
    /// already collected or does not exist.
    fn claim_drop(&self, id: Uuid, user_id: &str, at: Timestamp) -> Result<bool>;

    /// Adds `entry.amount` to the entry's wallet and records the entry, as
    /// one unit. Returns the new balance.
    fn credit_with_entry(&self, entry: &Transaction) -> Result<i64>;

    /// Takes `-entry.amount` from the entry's wallet unless that would go
    /// negative, and records the entry, as one unit. Returns the new balance.
    fn debit_with_entry(&self, entry: &Transaction) -> Result<i64>;

    /// Archives a completed walk together with its payout, as one unit.
    fn archive_walk(
        &self,
        walk: &WalkRecord,
        payout: Option<&Transaction>,
    ) -> Result<Option<i64>>;
}

/// `SQLite`-backed storage.
#[derive(Debug, Clone)]
pub struct Storage {
    path: PathBuf,
}

impl Storage {
    /// Opens (creating if needed) the database at `path` and applies the schema.
    ///
    /// The parent directory is created if it doesn't exist.
    pub fn new(path: impl Into<PathBuf>) -> Result<Self> {
        let path = path.into();
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent)?;
        }
        let storage = Self { path };
        let conn = storage.open_db()?;
        // Readers never block the writer claiming a drop.
        conn.pragma_update_and_check(None, "journal_mode", "WAL", |row| {
            row.get::<_, String>(0)
        })?;
        conn.execute_batch(SCHEMA)?;
        Ok(storage)
    }

    /// Returns the default database path: `~/.woof/woof.sqlite`.
    pub fn default_path() -> Option<PathBuf> {
        dirs::home_dir().map(|h| h.join(".woof").join("woof.sqlite"))
    }

    fn open_db(&self) -> Result<Connection> {
        let conn = Connection::open(&self.path)?;
        conn.busy_timeout(BUSY_TIMEOUT)?;
        Ok(conn)
    }
}

impl BoneStore for Storage {
    fn active_drops(&self, now: Timestamp) -> Result<Vec<BoneDrop>> {
        Storage::active_drops(self, now)
    }

    fn claim_drop(&self, id: Uuid, user_id: &str, at: Timestamp) -> Result<bool> {
        Storage::claim_drop(self, id, user_id, at)
    }

    fn credit_with_entry(&self, entry: &Transaction) -> Result<i64> {
        Storage::credit_with_entry(self, entry)
    }

    fn debit_with_entry(&self, entry: &Transaction) -> Result<i64> {
        Storage::debit_with_entry(self, entry)
    }

    fn archive_walk(
        &self,
        walk: &WalkRecord,
        payout: Option<&Transaction>,
    ) -> Result<Option<i64>> {
        Storage::archive_walk(self, walk, payout)
    }
}

// ── Column conversions ──

fn to_millis(ts: Timestamp) -> i64 {
    ts.as_millisecond()
}

fn from_millis(ms: i64, column: &str) -> Result<Timestamp> {
    Timestamp::from_millisecond(ms)
        .map_err(|e| StorageError::Corrupt(format!("invalid {column}: {e}")))
}

fn parse_uuid(s: &str, column: &str) -> Result<Uuid> {
    s.parse::<Uuid>()
        .map_err(|e| StorageError::Corrupt(format!("invalid {column}: {e}")))
}
