//! SQLite-backed record store.
//!
//! # Responsibility
//! - Persist the serialized document collection in one `kv_slots` row.
//! - Replace the row in a single statement so the slot is never half-written.
//!
//! # Invariants
//! - The store is usable only on migrated connections (`kv_slots` present).
//! - `write_all` encodes and checks the quota before touching the database.

use crate::model::document::DocumentRecord;
use crate::store::{
    check_quota, decode_records, encode_records, RecordStore, StoreError, StoreResult,
};
use log::{debug, error, info};
use rusqlite::{params, Connection, OptionalExtension};
use std::time::Instant;

/// Record store persisting the collection under one slot key.
pub struct SqliteRecordStore<'conn> {
    conn: &'conn Connection,
    slot_key: String,
    max_value_bytes: Option<usize>,
}

impl<'conn> SqliteRecordStore<'conn> {
    /// Constructs a store from a migrated connection.
    ///
    /// # Errors
    /// - `MissingRequiredTable` when `kv_slots` has not been created.
    pub fn try_new(conn: &'conn Connection, slot_key: impl Into<String>) -> StoreResult<Self> {
        if !table_exists(conn, "kv_slots")? {
            return Err(StoreError::MissingRequiredTable("kv_slots"));
        }
        Ok(Self {
            conn,
            slot_key: slot_key.into(),
            max_value_bytes: None,
        })
    }

    /// Caps the encoded slot size; larger writes fail with `QuotaExceeded`.
    pub fn with_quota(mut self, max_value_bytes: usize) -> Self {
        self.max_value_bytes = Some(max_value_bytes);
        self
    }

    pub fn slot_key(&self) -> &str {
        self.slot_key.as_str()
    }

    /// Reads the raw slot value without decoding.
    pub fn read_raw(&self) -> StoreResult<Option<String>> {
        let value = self
            .conn
            .query_row(
                "SELECT value FROM kv_slots WHERE key = ?1;",
                [self.slot_key.as_str()],
                |row| row.get::<_, String>(0),
            )
            .optional()?;
        Ok(value)
    }

    /// Replaces the raw slot value without validation.
    ///
    /// Intended for import and diagnostics tooling; regular writes go through
    /// `write_all`.
    pub fn write_raw(&self, value: &str) -> StoreResult<()> {
        self.conn.execute(
            "INSERT INTO kv_slots (key, value, updated_at)
             VALUES (?1, ?2, (strftime('%s', 'now') * 1000))
             ON CONFLICT(key) DO UPDATE SET
                value = excluded.value,
                updated_at = excluded.updated_at;",
            params![self.slot_key.as_str(), value],
        )?;
        Ok(())
    }
}

impl RecordStore for SqliteRecordStore<'_> {
    fn read_all(&self) -> StoreResult<Vec<DocumentRecord>> {
        let raw = self.read_raw().map_err(|err| {
            error!(
                "event=store_read module=store status=error backend=sqlite error_code={} error={}",
                err.code(),
                err
            );
            err
        })?;

        let records = raw.as_deref().map(decode_records).unwrap_or_default();
        debug!(
            "event=store_read module=store status=ok backend=sqlite slot_present={} records={}",
            raw.is_some(),
            records.len()
        );
        Ok(records)
    }

    fn write_all(&self, records: &[DocumentRecord]) -> StoreResult<()> {
        let started_at = Instant::now();
        let result = encode_records(records)
            .and_then(|encoded| {
                check_quota(&encoded, self.max_value_bytes)?;
                Ok(encoded)
            })
            .and_then(|encoded| self.write_raw(&encoded).map(|()| encoded.len()));

        match result {
            Ok(size_bytes) => {
                info!(
                    "event=store_write module=store status=ok backend=sqlite slot={} records={} size_bytes={} duration_ms={}",
                    self.slot_key(),
                    records.len(),
                    size_bytes,
                    started_at.elapsed().as_millis()
                );
                Ok(())
            }
            Err(err) => {
                error!(
                    "event=store_write module=store status=error backend=sqlite records={} duration_ms={} error_code={} error={}",
                    records.len(),
                    started_at.elapsed().as_millis(),
                    err.code(),
                    err
                );
                Err(err)
            }
        }
    }
}

fn table_exists(conn: &Connection, table: &str) -> StoreResult<bool> {
    let exists: i64 = conn.query_row(
        "SELECT EXISTS(
            SELECT 1
            FROM sqlite_master
            WHERE type = 'table' AND name = ?1
        );",
        [table],
        |row| row.get(0),
    )?;
    Ok(exists == 1)
}
