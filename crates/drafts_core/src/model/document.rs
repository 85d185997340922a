//! Document record model.
//!
//! # Responsibility
//! - Define the record shape persisted in the `documents` slot.
//! - Decode persisted JSON leniently, applying field defaults instead of
//!   trusting the stored shape.
//!
//! # Invariants
//! - `id` is never empty and never changes after creation.
//! - `updated_at` is kept at millisecond precision so that encoding is stable
//!   across read/write round trips.
//! - `updated_at` only moves forward through `touch`.

use chrono::{DateTime, SecondsFormat, Utc};
use serde::{Serialize, Serializer};
use serde_json::Value;
use uuid::Uuid;

/// Title assigned to new documents and to records persisted without one.
pub const DEFAULT_TITLE: &str = "Untitled Document";

/// Opaque document identifier.
///
/// Kept as a string alias: ids come from navigation context and persisted data,
/// where any non-empty string is a valid reference.
pub type DocumentId = String;

/// Generates a new globally unique document id (UUID v4).
pub fn new_document_id() -> DocumentId {
    Uuid::new_v4().to_string()
}

/// Canonical persisted document record.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct DocumentRecord {
    pub id: DocumentId,
    pub title: String,
    /// Serialized rich-text markup, stored and restored verbatim.
    pub content: String,
    #[serde(serialize_with = "serialize_timestamp")]
    pub updated_at: DateTime<Utc>,
}

impl DocumentRecord {
    /// Creates a new record with a generated id and default title/content.
    pub fn new(now: DateTime<Utc>) -> Self {
        Self::with_id(new_document_id(), now)
    }

    /// Creates a record with a caller-provided id and default title/content.
    pub fn with_id(id: impl Into<DocumentId>, now: DateTime<Utc>) -> Self {
        Self {
            id: id.into(),
            title: DEFAULT_TITLE.to_string(),
            content: String::new(),
            updated_at: truncate_to_millis(now),
        }
    }

    /// Advances `updated_at` to `now`, never moving it backwards.
    ///
    /// Returns the timestamp actually applied.
    pub fn touch(&mut self, now: DateTime<Utc>) -> DateTime<Utc> {
        let now = truncate_to_millis(now);
        if now > self.updated_at {
            self.updated_at = now;
        }
        self.updated_at
    }

    /// Decodes one persisted entry, applying defaults for absent or mistyped
    /// fields.
    ///
    /// Returns `None` when the entry carries no usable id: without identity the
    /// record cannot be addressed, so it is treated as noise.
    pub fn from_json(value: &Value) -> Option<Self> {
        let object = value.as_object()?;
        let id = object
            .get("id")
            .and_then(Value::as_str)
            .filter(|id| !id.trim().is_empty())?;

        let title = object
            .get("title")
            .and_then(Value::as_str)
            .unwrap_or(DEFAULT_TITLE);
        let content = object
            .get("content")
            .and_then(Value::as_str)
            .unwrap_or_default();
        let updated_at = object
            .get("updatedAt")
            .and_then(Value::as_str)
            .and_then(parse_timestamp)
            .unwrap_or(DateTime::<Utc>::UNIX_EPOCH);

        Some(Self {
            id: id.to_string(),
            title: title.to_string(),
            content: content.to_string(),
            updated_at,
        })
    }
}

/// Formats a timestamp the way it is persisted (RFC 3339, millis, `Z`).
pub fn format_timestamp(value: &DateTime<Utc>) -> String {
    value.to_rfc3339_opts(SecondsFormat::Millis, true)
}

/// Parses a persisted timestamp, accepting any RFC 3339 offset.
pub fn parse_timestamp(raw: &str) -> Option<DateTime<Utc>> {
    DateTime::parse_from_rfc3339(raw.trim())
        .ok()
        .map(|parsed| truncate_to_millis(parsed.with_timezone(&Utc)))
}

/// Drops sub-millisecond precision.
pub fn truncate_to_millis(value: DateTime<Utc>) -> DateTime<Utc> {
    DateTime::from_timestamp_millis(value.timestamp_millis()).unwrap_or(value)
}

fn serialize_timestamp<S>(value: &DateTime<Utc>, serializer: S) -> Result<S::Ok, S::Error>
where
    S: Serializer,
{
    serializer.serialize_str(&format_timestamp(value))
}
