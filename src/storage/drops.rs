//! Bone drop storage: seed, list, claim, and expire drops.

use jiff::Timestamp;
use rusqlite::{Connection, OptionalExtension, Row};
use uuid::Uuid;

use crate::model::{BoneDrop, DropKind};

use super::{Result, Storage, StorageError, from_millis, parse_uuid, to_millis};

const DROP_COLUMNS: &str = "id, type, latitude, longitude, bone_value, expires_at, \
                            collected_by, collected_at, user_id, location_name";

impl Storage {
    /// Inserts a batch of drops in one transaction.
    pub fn insert_drops(&self, drops: &[BoneDrop]) -> Result<()> {
        let mut conn = self.open_db()?;
        let tx = conn.transaction()?;
        for drop in drops {
            insert_drop_row(&tx, drop)?;
        }
        tx.commit()?;
        Ok(())
    }

    /// Loads a single drop by id.
    pub fn load_drop(&self, id: Uuid) -> Result<BoneDrop> {
        let conn = self.open_db()?;
        let row = conn
            .query_row(
                &format!("SELECT {DROP_COLUMNS} FROM bone_drops WHERE id = ?1"),
                [id.to_string()],
                read_drop_row,
            )
            .optional()?;
        row.ok_or(StorageError::DropNotFound(id))?.into_drop()
    }

    /// Lists every drop, collected and expired ones included.
    pub fn list_drops(&self) -> Result<Vec<BoneDrop>> {
        let conn = self.open_db()?;
        let mut stmt = conn.prepare(&format!(
            "SELECT {DROP_COLUMNS} FROM bone_drops ORDER BY expires_at, id"
        ))?;
        let rows = stmt.query_map([], read_drop_row)?;
        rows.map(|row| row?.into_drop()).collect()
    }

    /// Drops nobody has collected that expire after `now`.
    pub fn active_drops(&self, now: Timestamp) -> Result<Vec<BoneDrop>> {
        let conn = self.open_db()?;
        let mut stmt = conn.prepare(&format!(
            "SELECT {DROP_COLUMNS} FROM bone_drops
             WHERE collected_by IS NULL AND expires_at > ?1
             ORDER BY id"
        ))?;
        let rows = stmt.query_map([to_millis(now)], read_drop_row)?;
        rows.map(|row| row?.into_drop()).collect()
    }

    /// Claims a drop for `user_id` if it is still uncollected.
    ///
    /// The `collected_by IS NULL` guard makes this a compare-and-set: of any
    /// number of racing claims, exactly one updates a row.
    pub fn claim_drop(&self, id: Uuid, user_id: &str, at: Timestamp) -> Result<bool> {
        let conn = self.open_db()?;
        let rows = conn.execute(
            "UPDATE bone_drops
             SET collected_by = ?1, collected_at = ?2
             WHERE id = ?3 AND collected_by IS NULL",
            rusqlite::params![user_id, to_millis(at), id.to_string()],
        )?;
        Ok(rows == 1)
    }

    /// Deletes every drop that expired before `now`. Returns how many were removed.
    pub fn delete_expired_drops(&self, now: Timestamp) -> Result<usize> {
        let conn = self.open_db()?;
        let rows = conn.execute(
            "DELETE FROM bone_drops WHERE expires_at < ?1",
            [to_millis(now)],
        )?;
        Ok(rows)
    }
}

fn insert_drop_row(conn: &Connection, drop: &BoneDrop) -> Result<()> {
    conn.execute(
        &format!(
            "INSERT INTO bone_drops ({DROP_COLUMNS})
             VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10)"
        ),
        rusqlite::params![
            drop.id.to_string(),
            drop.kind.as_str(),
            drop.latitude,
            drop.longitude,
            drop.bone_value,
            to_millis(drop.expires_at),
            drop.collected_by,
            drop.collected_at.map(to_millis),
            drop.user_id,
            drop.location_name,
        ],
    )?;
    Ok(())
}

/// Raw column values, parsed into a [`BoneDrop`] outside the row callback.
struct DropRow {
    id: String,
    kind: String,
    latitude: f64,
    longitude: f64,
    bone_value: u32,
    expires_at: i64,
    collected_by: Option<String>,
    collected_at: Option<i64>,
    user_id: Option<String>,
    location_name: Option<String>,
}

fn read_drop_row(row: &Row<'_>) -> rusqlite::Result<DropRow> {
    Ok(DropRow {
        id: row.get(0)?,
        kind: row.get(1)?,
        latitude: row.get(2)?,
        longitude: row.get(3)?,
        bone_value: row.get(4)?,
        expires_at: row.get(5)?,
        collected_by: row.get(6)?,
        collected_at: row.get(7)?,
        user_id: row.get(8)?,
        location_name: row.get(9)?,
    })
}

impl DropRow {
    fn into_drop(self) -> Result<BoneDrop> {
        let kind = self
            .kind
            .parse::<DropKind>()
            .map_err(StorageError::Corrupt)?;
        let collected_at = self
            .collected_at
            .map(|ms| from_millis(ms, "collected_at"))
            .transpose()?;

        Ok(BoneDrop {
            id: parse_uuid(&self.id, "drop id")?,
            kind,
            latitude: self.latitude,
            longitude: self.longitude,
            bone_value: self.bone_value,
            expires_at: from_millis(self.expires_at, "expires_at")?,
            collected_by: self.collected_by,
            collected_at,
            user_id: self.user_id,
            location_name: self.location_name,
        })
    }
}
