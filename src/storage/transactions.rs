//! Ledger storage: list bone transactions.
//!
//! Entries are written only alongside a balance change (see the wallet
//! module) and are never updated or deleted.

use rusqlite::Connection;

use crate::model::{Transaction, TransactionKind};

use super::{Result, Storage, StorageError, from_millis, parse_uuid, to_millis};

/// Appends a ledger entry on `conn`, inside the caller's transaction.
pub(super) fn insert_transaction_row(conn: &Connection, transaction: &Transaction) -> Result<()> {
    conn.execute(
        "INSERT INTO bone_transactions (id, user_id, amount, type, meta, created_at)
         VALUES (?1, ?2, ?3, ?4, ?5, ?6)",
        rusqlite::params![
            transaction.id.to_string(),
            &transaction.user_id,
            transaction.amount,
            transaction.kind.as_str(),
            serde_json::to_string(&transaction.meta)?,
            to_millis(transaction.created_at),
        ],
    )?;
    Ok(())
}

impl Storage {
    /// Lists a user's ledger, oldest first.
    pub fn list_transactions(&self, user_id: &str) -> Result<Vec<Transaction>> {
        let conn = self.open_db()?;
        let mut stmt = conn.prepare(
            "SELECT id, amount, type, meta, created_at FROM bone_transactions
             WHERE user_id = ?1
             ORDER BY created_at, rowid",
        )?;
        let rows = stmt.query_map([user_id], |row| {
            Ok((
                row.get::<_, String>(0)?,
                row.get::<_, i64>(1)?,
                row.get::<_, String>(2)?,
                row.get::<_, String>(3)?,
                row.get::<_, i64>(4)?,
            ))
        })?;

        let mut transactions = Vec::new();
        for row in rows {
            let (id, amount, kind, meta, created_at) = row?;
            transactions.push(Transaction {
                id: parse_uuid(&id, "transaction id")?,
                user_id: user_id.to_string(),
                amount,
                kind: kind
                    .parse::<TransactionKind>()
                    .map_err(StorageError::Corrupt)?,
                meta: serde_json::from_str(&meta)?,
                created_at: from_millis(created_at, "created_at")?,
            });
        }
        Ok(transactions)
    }

    /// Sums a user's ledger. Always equals the wallet balance.
    pub fn ledger_total(&self, user_id: &str) -> Result<i64> {
        let conn = self.open_db()?;
        let total = conn.query_row(
            "SELECT COALESCE(SUM(amount), 0) FROM bone_transactions WHERE user_id = ?1",
            [user_id],
            |row| row.get(0),
        )?;
        Ok(total)
    }
}
