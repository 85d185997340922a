//! Record store contracts over a single persisted slot.
//!
//! # Responsibility
//! - Define the `RecordStore` read-all/write-all contract used by lifecycle
//!   and autosave code.
//! - Own the slot blob codec (JSON array of document records).
//!
//! # Invariants
//! - The whole collection is read and written as one value; there are no
//!   per-record writes.
//! - Absent or malformed slot data reads as an empty collection.
//! - Writes reject collections with duplicate ids.
//! - A failed write leaves the previously persisted value intact.

use crate::db::DbError;
use crate::model::document::{DocumentId, DocumentRecord};
use log::warn;
use serde_json::Value;
use std::collections::HashSet;
use std::error::Error;
use std::fmt::{Display, Formatter};
use std::sync::Arc;

pub mod memory;
pub mod sqlite;

/// Name of the slot holding the serialized document collection.
pub const DEFAULT_SLOT_KEY: &str = "documents";

pub type StoreResult<T> = Result<T, StoreError>;

/// Failure reported by a record store operation.
#[derive(Debug)]
pub enum StoreError {
    Db(DbError),
    Serialization(serde_json::Error),
    /// Encoded collection exceeds the configured slot quota.
    QuotaExceeded { size_bytes: usize, limit_bytes: usize },
    /// Collection handed to `write_all` violates id uniqueness.
    DuplicateId(DocumentId),
    MissingRequiredTable(&'static str),
    /// Backend refused the operation (e.g. storage offline).
    Unavailable(String),
}

impl Display for StoreError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Db(err) => write!(f, "{err}"),
            Self::Serialization(err) => write!(f, "failed to encode documents: {err}"),
            Self::QuotaExceeded {
                size_bytes,
                limit_bytes,
            } => write!(
                f,
                "storage quota exceeded: {size_bytes} bytes over limit of {limit_bytes} bytes"
            ),
            Self::DuplicateId(id) => write!(f, "duplicate document id in write: {id}"),
            Self::MissingRequiredTable(table) => write!(f, "missing required table `{table}`"),
            Self::Unavailable(reason) => write!(f, "storage unavailable: {reason}"),
        }
    }
}

impl Error for StoreError {
    fn source(&self) -> Option<&(dyn Error + 'static)> {
        match self {
            Self::Db(err) => Some(err),
            Self::Serialization(err) => Some(err),
            _ => None,
        }
    }
}

impl StoreError {
    /// Stable machine-readable code for log lines.
    pub fn code(&self) -> &'static str {
        match self {
            Self::Db(_) => "store_db_failed",
            Self::Serialization(_) => "store_encode_failed",
            Self::QuotaExceeded { .. } => "store_quota_exceeded",
            Self::DuplicateId(_) => "store_duplicate_id",
            Self::MissingRequiredTable(_) => "store_schema_missing",
            Self::Unavailable(_) => "store_unavailable",
        }
    }
}

impl From<DbError> for StoreError {
    fn from(value: DbError) -> Self {
        Self::Db(value)
    }
}

impl From<rusqlite::Error> for StoreError {
    fn from(value: rusqlite::Error) -> Self {
        Self::Db(DbError::Sqlite(value))
    }
}

impl From<serde_json::Error> for StoreError {
    fn from(value: serde_json::Error) -> Self {
        Self::Serialization(value)
    }
}

/// Durable collection of document records kept in one slot.
///
/// Implementations replace the slot atomically on `write_all`: readers see
/// either the old or the new collection, never a mix.
pub trait RecordStore {
    /// Reads the full collection.
    ///
    /// Malformed data yields `Ok(vec![])`; only transport failures are errors.
    fn read_all(&self) -> StoreResult<Vec<DocumentRecord>>;

    /// Replaces the full collection.
    fn write_all(&self, records: &[DocumentRecord]) -> StoreResult<()>;
}

impl<T: RecordStore + ?Sized> RecordStore for &T {
    fn read_all(&self) -> StoreResult<Vec<DocumentRecord>> {
        (**self).read_all()
    }

    fn write_all(&self, records: &[DocumentRecord]) -> StoreResult<()> {
        (**self).write_all(records)
    }
}

impl<T: RecordStore + ?Sized> RecordStore for Arc<T> {
    fn read_all(&self) -> StoreResult<Vec<DocumentRecord>> {
        (**self).read_all()
    }

    fn write_all(&self, records: &[DocumentRecord]) -> StoreResult<()> {
        (**self).write_all(records)
    }
}

/// Decodes a slot value into records.
///
/// Never fails: unparsable JSON or a non-array root decode to an empty
/// collection, entries without a usable id are skipped, and later duplicates
/// of an id are dropped in favor of the first occurrence.
pub fn decode_records(raw: &str) -> Vec<DocumentRecord> {
    let entries = match serde_json::from_str::<Value>(raw) {
        Ok(Value::Array(entries)) => entries,
        Ok(_) => {
            warn!("event=store_decode module=store status=skipped reason=non_array_root");
            return Vec::new();
        }
        Err(err) => {
            warn!(
                "event=store_decode module=store status=skipped reason=malformed_json line={} column={}",
                err.line(),
                err.column()
            );
            return Vec::new();
        }
    };

    let total = entries.len();
    let mut seen = HashSet::with_capacity(total);
    let records: Vec<DocumentRecord> = entries
        .iter()
        .filter_map(DocumentRecord::from_json)
        .filter(|record| seen.insert(record.id.clone()))
        .collect();

    if records.len() != total {
        warn!(
            "event=store_decode module=store status=partial entries={} kept={}",
            total,
            records.len()
        );
    }
    records
}

/// Encodes records into a slot value, enforcing id uniqueness.
pub fn encode_records(records: &[DocumentRecord]) -> StoreResult<String> {
    let mut seen = HashSet::with_capacity(records.len());
    for record in records {
        if !seen.insert(record.id.as_str()) {
            return Err(StoreError::DuplicateId(record.id.clone()));
        }
    }
    Ok(serde_json::to_string(records)?)
}

/// Rejects encoded values larger than `limit_bytes`, when a limit is set.
pub(crate) fn check_quota(encoded: &str, limit_bytes: Option<usize>) -> StoreResult<()> {
    match limit_bytes {
        Some(limit_bytes) if encoded.len() > limit_bytes => Err(StoreError::QuotaExceeded {
            size_bytes: encoded.len(),
            limit_bytes,
        }),
        _ => Ok(()),
    }
}

#[cfg(test)]
mod tests {
    use super::{check_quota, decode_records, encode_records, StoreError};
    use crate::model::document::DocumentRecord;
    use chrono::{TimeZone, Utc};

    fn record(id: &str) -> DocumentRecord {
        let now = Utc.with_ymd_and_hms(2024, 5, 1, 12, 0, 0).unwrap();
        DocumentRecord::with_id(id, now)
    }

    #[test]
    fn decode_treats_garbage_as_empty() {
        assert!(decode_records("").is_empty());
        assert!(decode_records("{not json").is_empty());
        assert!(decode_records("{\"id\":\"x\"}").is_empty());
        assert!(decode_records("null").is_empty());
    }

    #[test]
    fn decode_skips_entries_without_id_and_keeps_first_duplicate() {
        let raw = r#"[
            {"id":"a","title":"first"},
            {"title":"orphan"},
            7,
            {"id":"a","title":"second"},
            {"id":"b"}
        ]"#;
        let records = decode_records(raw);
        let ids: Vec<&str> = records.iter().map(|record| record.id.as_str()).collect();
        assert_eq!(ids, vec!["a", "b"]);
        assert_eq!(records[0].title, "first");
    }

    #[test]
    fn encode_rejects_duplicate_ids() {
        let err = encode_records(&[record("a"), record("a")]).unwrap_err();
        assert!(matches!(err, StoreError::DuplicateId(id) if id == "a"));
    }

    #[test]
    fn encode_then_decode_is_stable() {
        let mut second = record("b");
        second.title = "Notes \"quoted\"".to_string();
        second.content = "<p>Hello <strong>world</strong></p>".to_string();
        let records = vec![record("a"), second];

        let encoded = encode_records(&records).unwrap();
        let decoded = decode_records(&encoded);
        assert_eq!(decoded, records);
        assert_eq!(encode_records(&decoded).unwrap(), encoded);
    }

    #[test]
    fn quota_check_only_applies_when_limit_is_set() {
        assert!(check_quota("0123456789", None).is_ok());
        assert!(check_quota("0123456789", Some(10)).is_ok());
        let err = check_quota("0123456789", Some(9)).unwrap_err();
        assert!(matches!(
            err,
            StoreError::QuotaExceeded {
                size_bytes: 10,
                limit_bytes: 9
            }
        ));
    }
}
