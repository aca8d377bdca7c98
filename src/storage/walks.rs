//! Walk storage: archive completed walks and list a user's history.

use rusqlite::{Connection, TransactionBehavior};

use crate::model::{Transaction, WalkRecord};

use super::wallets::credit_in;
use super::{Result, Storage, from_millis, parse_uuid, to_millis};

impl Storage {
    /// Archives a completed walk and, when given, pays out its ledger entry.
    ///
    /// Both happen in one transaction: either the walk is archived and paid,
    /// or nothing changed. Returns the new balance when a payout was made.
    pub fn archive_walk(
        &self,
        walk: &WalkRecord,
        payout: Option<&Transaction>,
    ) -> Result<Option<i64>> {
        let mut conn = self.open_db()?;
        let tx = conn.transaction_with_behavior(TransactionBehavior::Immediate)?;
        insert_walk_row(&tx, walk)?;
        let balance = payout.map(|entry| credit_in(&tx, entry)).transpose()?;
        tx.commit()?;
        Ok(balance)
    }

    /// Lists a user's walks, oldest first.
    pub fn list_walks(&self, user_id: &str) -> Result<Vec<WalkRecord>> {
        let conn = self.open_db()?;
        let mut stmt = conn.prepare(
            "SELECT id, started_at, ended_at, distance_meters, duration_seconds,
                    bones_earned, path
             FROM walks WHERE user_id = ?1
             ORDER BY started_at",
        )?;
        let rows = stmt.query_map([user_id], |row| {
            Ok((
                row.get::<_, String>(0)?,
                row.get::<_, i64>(1)?,
                row.get::<_, i64>(2)?,
                row.get::<_, u64>(3)?,
                row.get::<_, u64>(4)?,
                row.get::<_, i64>(5)?,
                row.get::<_, String>(6)?,
            ))
        })?;

        let mut walks = Vec::new();
        for row in rows {
            let (id, started_at, ended_at, distance_meters, duration_seconds, bones_earned, path) =
                row?;
            walks.push(WalkRecord {
                id: parse_uuid(&id, "walk id")?,
                user_id: user_id.to_string(),
                started_at: from_millis(started_at, "started_at")?,
                ended_at: from_millis(ended_at, "ended_at")?,
                distance_meters,
                duration_seconds,
                bones_earned,
                path: serde_json::from_str(&path)?,
            });
        }
        Ok(walks)
    }
}

/// The path is stored as a JSON array.
fn insert_walk_row(conn: &Connection, walk: &WalkRecord) -> Result<()> {
    conn.execute(
        "INSERT INTO walks (id, user_id, started_at, ended_at, distance_meters,
                            duration_seconds, bones_earned, path)
         VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8)",
        rusqlite::params![
            walk.id.to_string(),
            &walk.user_id,
            to_millis(walk.started_at),
            to_millis(walk.ended_at),
            walk.distance_meters,
            walk.duration_seconds,
            walk.bones_earned,
            serde_json::to_string(&walk.path)?,
        ],
    )?;
    Ok(())
}
