//! In-memory record store.
//!
//! Holds the encoded slot value in process memory so tests and embedders can
//! substitute it for the SQLite store. Supports write-failure injection and
//! counts write calls.

use crate::model::document::DocumentRecord;
use crate::store::{
    check_quota, decode_records, encode_records, RecordStore, StoreError, StoreResult,
};
use log::warn;
use std::sync::Mutex;

#[derive(Debug, Default)]
struct MemorySlot {
    value: Option<String>,
    fail_writes: Option<String>,
    write_calls: usize,
    max_value_bytes: Option<usize>,
}

/// Record store keeping the serialized slot in memory.
#[derive(Debug, Default)]
pub struct MemoryRecordStore {
    slot: Mutex<MemorySlot>,
}

impl MemoryRecordStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Creates a store whose slot already holds `raw`, parsable or not.
    pub fn with_raw(raw: impl Into<String>) -> Self {
        let store = Self::new();
        store.lock().value = Some(raw.into());
        store
    }

    /// Caps the encoded slot size; larger writes fail with `QuotaExceeded`.
    pub fn with_quota(self, max_value_bytes: usize) -> Self {
        self.lock().max_value_bytes = Some(max_value_bytes);
        self
    }

    /// Returns the current raw slot value.
    pub fn raw(&self) -> Option<String> {
        self.lock().value.clone()
    }

    /// Makes subsequent writes fail with `Unavailable(reason)`; `None` heals.
    pub fn set_write_failure(&self, reason: Option<&str>) {
        self.lock().fail_writes = reason.map(str::to_string);
    }

    /// Number of `write_all` calls, successful or not.
    pub fn write_count(&self) -> usize {
        self.lock().write_calls
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, MemorySlot> {
        self.slot
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
    }
}

impl RecordStore for MemoryRecordStore {
    fn read_all(&self) -> StoreResult<Vec<DocumentRecord>> {
        Ok(self
            .lock()
            .value
            .as_deref()
            .map(decode_records)
            .unwrap_or_default())
    }

    fn write_all(&self, records: &[DocumentRecord]) -> StoreResult<()> {
        let mut slot = self.lock();
        slot.write_calls += 1;

        if let Some(reason) = slot.fail_writes.clone() {
            warn!(
                "event=store_write module=store status=error backend=memory error_code=store_unavailable"
            );
            return Err(StoreError::Unavailable(reason));
        }

        let encoded = encode_records(records)?;
        check_quota(&encoded, slot.max_value_bytes)?;
        slot.value = Some(encoded);
        Ok(())
    }
}
