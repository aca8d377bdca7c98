//! Wallet storage: balances change only together with a ledger entry.
//!
//! Every credit or debit runs the balance update and the ledger insert in
//! one `SQLite` transaction, so the wallet and the ledger never disagree.

use rusqlite::{Connection, OptionalExtension, TransactionBehavior};

use crate::model::{Transaction, Wallet};

use super::transactions::insert_transaction_row;
use super::{Result, Storage, StorageError};

impl Storage {
    /// Loads a user's wallet, if one exists.
    pub fn load_wallet(&self, user_id: &str) -> Result<Option<Wallet>> {
        let conn = self.open_db()?;
        let balance = read_balance(&conn, user_id)?;
        Ok(balance.map(|balance| Wallet {
            user_id: user_id.to_string(),
            balance,
        }))
    }

    /// Adds `entry.amount` to the entry's user and records the entry.
    ///
    /// A missing wallet is created. Returns the new balance; on error
    /// neither the wallet nor the ledger changed.
    pub fn credit_with_entry(&self, entry: &Transaction) -> Result<i64> {
        let mut conn = self.open_db()?;
        let tx = conn.transaction_with_behavior(TransactionBehavior::Immediate)?;
        let balance = credit_in(&tx, entry)?;
        tx.commit()?;
        Ok(balance)
    }

    /// Spends `-entry.amount` if the balance covers it and records the entry.
    ///
    /// Returns the new balance; on error neither the wallet nor the ledger
    /// changed.
    pub fn debit_with_entry(&self, entry: &Transaction) -> Result<i64> {
        let mut conn = self.open_db()?;
        let tx = conn.transaction_with_behavior(TransactionBehavior::Immediate)?;
        let balance = debit_in(&tx, &entry.user_id, -entry.amount)?;
        insert_transaction_row(&tx, entry)?;
        tx.commit()?;
        Ok(balance)
    }
}

/// Credits inside an open transaction. Shared with walk archiving.
pub(super) fn credit_in(conn: &Connection, entry: &Transaction) -> Result<i64> {
    let balance = conn.query_row(
        "INSERT INTO bone_wallets (user_id, balance) VALUES (?1, ?2)
         ON CONFLICT (user_id) DO UPDATE SET balance = balance + excluded.balance
         RETURNING balance",
        rusqlite::params![&entry.user_id, entry.amount],
        |row| row.get(0),
    )?;
    insert_transaction_row(conn, entry)?;
    Ok(balance)
}

fn debit_in(conn: &Connection, user_id: &str, amount: i64) -> Result<i64> {
    let balance = conn
        .query_row(
            "UPDATE bone_wallets SET balance = balance - ?2
             WHERE user_id = ?1 AND balance >= ?2
             RETURNING balance",
            rusqlite::params![user_id, amount],
            |row| row.get(0),
        )
        .optional()?;

    match balance {
        Some(balance) => Ok(balance),
        None => Err(StorageError::InsufficientBalance {
            user_id: user_id.to_string(),
            balance: read_balance(conn, user_id)?.unwrap_or(0),
            needed: amount,
        }),
    }
}

fn read_balance(conn: &Connection, user_id: &str) -> Result<Option<i64>> {
    let balance = conn
        .query_row(
            "SELECT balance FROM bone_wallets WHERE user_id = ?1",
            [user_id],
            |row| row.get::<_, i64>(0),
        )
        .optional()?;
    Ok(balance)
}
