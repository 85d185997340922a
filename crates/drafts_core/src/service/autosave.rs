//! Autosave coordinator for one editing session.
//!
//! # Responsibility
//! - Turn title/content mutation events from the editing surface into
//!   record commits.
//! - Guard against overlapping commits within one session.
//! - Track the session's "unsaved" status for the host.
//!
//! # Invariants
//! - At most one commit is in flight per session (`SaveState::Saving`).
//! - Events arriving while `Saving` are not queued; they only refresh the
//!   session's mirror of the editor state, which the next triggered commit
//!   picks up.
//! - A commit merges only fields changed since the last successful commit,
//!   so a title-only edit never overwrites content written by another
//!   session and vice versa.
//! - `updated_at` never regresses: commits apply `max(now, stored)`.
//! - Failed commits are not retried; their fields stay dirty for the next
//!   event.
//! - A `PendingSave` commits only through the session that started it; a
//!   dropped `PendingSave` returns its session to `Idle`.
//!
//! The write path is split in two steps so hosts with an asynchronous store
//! can suspend between them: `begin` performs the `Idle -> Saving`
//! transition and captures the editor state, `commit` runs the
//! read-merge-write and returns to `Idle`.

use crate::clock::{Clock, SystemClock};
use crate::model::document::{DocumentId, DocumentRecord};
use crate::store::{RecordStore, StoreError};
use chrono::{DateTime, Utc};
use log::{debug, error, info, warn};
use std::error::Error;
use std::fmt::{Display, Formatter};
use std::sync::{Arc, Mutex, MutexGuard};
use std::time::Instant;

/// Per-session save state.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SaveState {
    Idle,
    Saving,
}

/// Mutation event emitted by the editing surface.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Mutation {
    Title(String),
    /// Full serialized rich-text content after the change.
    Content(String),
}

impl Mutation {
    fn label(&self) -> &'static str {
        match self {
            Self::Title(_) => "title",
            Self::Content(_) => "content",
        }
    }
}

/// Commit failure for one save cycle.
#[derive(Debug)]
pub enum SaveError {
    /// The session's document disappeared from the store.
    DocumentMissing(DocumentId),
    /// The pending save was started by a different session.
    ForeignPendingSave(DocumentId),
    Store(StoreError),
}

impl Display for SaveError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::DocumentMissing(id) => write!(f, "document not found: {id}"),
            Self::ForeignPendingSave(id) => {
                write!(f, "pending save for document {id} belongs to another session")
            }
            Self::Store(err) => write!(f, "{err}"),
        }
    }
}

impl Error for SaveError {
    fn source(&self) -> Option<&(dyn Error + 'static)> {
        match self {
            Self::DocumentMissing(_) | Self::ForeignPendingSave(_) => None,
            Self::Store(err) => Some(err),
        }
    }
}

impl From<StoreError> for SaveError {
    fn from(value: StoreError) -> Self {
        Self::Store(value)
    }
}

impl SaveError {
    fn code(&self) -> &'static str {
        match self {
            Self::DocumentMissing(_) => "doc_missing",
            Self::ForeignPendingSave(_) => "pending_save_foreign",
            Self::Store(err) => err.code(),
        }
    }
}

/// Fields captured for one commit.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
struct ChangedFields {
    title: Option<String>,
    content: Option<String>,
}

/// State shared by a session and its in-flight `PendingSave`.
#[derive(Debug, Default)]
struct SaveCycle {
    /// Fields handed back by a pending save dropped without commit.
    abandoned: Mutex<Option<ChangedFields>>,
}

impl SaveCycle {
    fn abandoned(&self) -> MutexGuard<'_, Option<ChangedFields>> {
        self.abandoned
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
    }
}

/// Save cycle started by `AutosaveSession::begin`.
///
/// The session stays in `Saving` while this value is alive. Committing it
/// through its own session finishes the cycle; dropping it abandons the cycle,
/// and the captured fields are persisted by the session's next save.
#[derive(Debug)]
#[must_use = "dropping a pending save abandons the cycle without writing"]
pub struct PendingSave {
    document_id: DocumentId,
    cycle: Arc<SaveCycle>,
    fields: ChangedFields,
    settled: bool,
}

impl PendingSave {
    pub fn document_id(&self) -> &str {
        self.document_id.as_str()
    }
}

impl Drop for PendingSave {
    fn drop(&mut self) {
        if !self.settled {
            *self.cycle.abandoned() = Some(std::mem::take(&mut self.fields));
        }
    }
}

/// Autosave state machine bound to one document.
pub struct AutosaveSession<S: RecordStore, C: Clock = SystemClock> {
    store: S,
    clock: C,
    document_id: DocumentId,
    title: String,
    content: String,
    title_dirty: bool,
    content_dirty: bool,
    /// Cycle of the current `PendingSave`; `Saving` while it is still held.
    in_flight: Option<Arc<SaveCycle>>,
    last_saved_at: Option<DateTime<Utc>>,
    last_error: Option<String>,
    dropped_events: u64,
}

impl<S: RecordStore> AutosaveSession<S> {
    /// Opens a session for a resolved record using the system clock.
    pub fn open(store: S, record: &DocumentRecord) -> Self {
        Self::open_with_clock(store, SystemClock, record)
    }
}

impl<S: RecordStore, C: Clock> AutosaveSession<S, C> {
    /// Opens a session whose editor mirror starts at the record's fields.
    pub fn open_with_clock(store: S, clock: C, record: &DocumentRecord) -> Self {
        info!(
            "event=session_open module=autosave status=ok doc_id={}",
            record.id
        );
        Self {
            store,
            clock,
            document_id: record.id.clone(),
            title: record.title.clone(),
            content: record.content.clone(),
            title_dirty: false,
            content_dirty: false,
            in_flight: None,
            last_saved_at: Some(record.updated_at),
            last_error: None,
            dropped_events: 0,
        }
    }

    pub fn document_id(&self) -> &str {
        self.document_id.as_str()
    }

    /// Current title as last reported by the editing surface.
    pub fn title(&self) -> &str {
        self.title.as_str()
    }

    /// Current content as last reported by the editing surface.
    pub fn content(&self) -> &str {
        self.content.as_str()
    }

    pub fn state(&self) -> SaveState {
        match &self.in_flight {
            Some(cycle) if Arc::strong_count(cycle) > 1 => SaveState::Saving,
            _ => SaveState::Idle,
        }
    }

    /// `updated_at` of the last successful commit (or of the loaded record).
    pub fn last_saved_at(&self) -> Option<DateTime<Utc>> {
        self.last_saved_at
    }

    /// Diagnostic from the most recent failed commit; cleared on success.
    pub fn last_error(&self) -> Option<&str> {
        self.last_error.as_deref()
    }

    /// Whether the editor state holds changes no commit has persisted yet.
    pub fn has_unsaved_changes(&self) -> bool {
        self.title_dirty || self.content_dirty || self.has_abandoned_cycle()
    }

    /// Number of events that arrived while a commit was in flight.
    pub fn dropped_events(&self) -> u64 {
        self.dropped_events
    }

    /// Records a mutation and starts a save cycle when `Idle`.
    ///
    /// Returns `None` while another commit is in flight: the event only
    /// updates the editor mirror and triggers nothing.
    pub fn begin(&mut self, mutation: Mutation) -> Option<PendingSave> {
        let kind = mutation.label();
        match mutation {
            Mutation::Title(title) => {
                self.title = title;
                self.title_dirty = true;
            }
            Mutation::Content(content) => {
                self.content = content;
                self.content_dirty = true;
            }
        }
        self.reclaim_abandoned_cycle();

        if self.state() == SaveState::Saving {
            self.dropped_events += 1;
            debug!(
                "event=autosave_trigger module=autosave status=skipped reason=in_flight doc_id={} kind={}",
                self.document_id, kind
            );
            return None;
        }

        let fields = ChangedFields {
            title: self.title_dirty.then(|| self.title.clone()),
            content: self.content_dirty.then(|| self.content.clone()),
        };
        self.title_dirty = false;
        self.content_dirty = false;

        let cycle = Arc::new(SaveCycle::default());
        self.in_flight = Some(Arc::clone(&cycle));
        Some(PendingSave {
            document_id: self.document_id.clone(),
            cycle,
            fields,
            settled: false,
        })
    }

    /// Runs the read-merge-write for a pending save and returns to `Idle`.
    ///
    /// # Errors
    /// - `ForeignPendingSave` when `pending` was started by another session.
    ///   Neither this session nor the store is touched; the owning session
    ///   gets its fields back as if the pending save had been dropped.
    /// - `DocumentMissing` when the record vanished from the store.
    /// - `Store` on read or write failure.
    ///
    /// On `DocumentMissing` and `Store` the session is back in `Idle` and the
    /// captured fields are marked dirty again.
    pub fn commit(&mut self, mut pending: PendingSave) -> Result<DocumentRecord, SaveError> {
        let owned = self
            .in_flight
            .as_ref()
            .is_some_and(|cycle| Arc::ptr_eq(cycle, &pending.cycle));
        if !owned {
            let err = SaveError::ForeignPendingSave(pending.document_id.clone());
            warn!(
                "event=autosave_commit module=autosave status=rejected doc_id={} pending_doc_id={} error_code={}",
                self.document_id,
                pending.document_id,
                err.code()
            );
            return Err(err);
        }

        pending.settled = true;
        let fields = std::mem::take(&mut pending.fields);
        let started_at = Instant::now();
        let result = self.merge_and_write(&fields);
        self.in_flight = None;

        match result {
            Ok(record) => {
                self.last_saved_at = Some(record.updated_at);
                self.last_error = None;
                info!(
                    "event=autosave_commit module=autosave status=ok doc_id={} title_changed={} content_changed={} duration_ms={}",
                    self.document_id,
                    fields.title.is_some(),
                    fields.content.is_some(),
                    started_at.elapsed().as_millis()
                );
                Ok(record)
            }
            Err(err) => {
                // Editor state remains the source of truth; re-arm the fields so
                // the next event persists them.
                self.rearm(&fields);
                self.last_error = Some(err.to_string());
                error!(
                    "event=autosave_commit module=autosave status=error doc_id={} duration_ms={} error_code={} error={}",
                    self.document_id,
                    started_at.elapsed().as_millis(),
                    err.code(),
                    err
                );
                Err(err)
            }
        }
    }

    /// Applies one mutation end to end.
    ///
    /// Returns `Ok(None)` when the event was dropped by the in-flight guard.
    pub fn apply(&mut self, mutation: Mutation) -> Result<Option<DocumentRecord>, SaveError> {
        match self.begin(mutation) {
            Some(pending) => self.commit(pending).map(Some),
            None => Ok(None),
        }
    }

    /// Shorthand for `apply(Mutation::Content(..))`.
    pub fn content_changed(
        &mut self,
        content: impl Into<String>,
    ) -> Result<Option<DocumentRecord>, SaveError> {
        self.apply(Mutation::Content(content.into()))
    }

    /// Shorthand for `apply(Mutation::Title(..))`.
    pub fn title_changed(
        &mut self,
        title: impl Into<String>,
    ) -> Result<Option<DocumentRecord>, SaveError> {
        self.apply(Mutation::Title(title.into()))
    }

    fn has_abandoned_cycle(&self) -> bool {
        self.in_flight.as_ref().is_some_and(|cycle| {
            Arc::strong_count(cycle) == 1 && cycle.abandoned().is_some()
        })
    }

    /// Ends a cycle whose `PendingSave` was dropped, re-arming its fields.
    fn reclaim_abandoned_cycle(&mut self) {
        if self.state() == SaveState::Saving {
            return;
        }
        let Some(cycle) = self.in_flight.take() else {
            return;
        };
        let abandoned = cycle.abandoned().take();
        if let Some(fields) = abandoned {
            self.rearm(&fields);
        }
        warn!(
            "event=autosave_cycle module=autosave status=abandoned doc_id={}",
            self.document_id
        );
    }

    fn rearm(&mut self, fields: &ChangedFields) {
        self.title_dirty |= fields.title.is_some();
        self.content_dirty |= fields.content.is_some();
    }

    fn merge_and_write(&self, fields: &ChangedFields) -> Result<DocumentRecord, SaveError> {
        let mut records = self.store.read_all()?;
        let Some(record) = records
            .iter_mut()
            .find(|record| record.id == self.document_id)
        else {
            return Err(SaveError::DocumentMissing(self.document_id.clone()));
        };

        if let Some(title) = &fields.title {
            record.title.clone_from(title);
        }
        if let Some(content) = &fields.content {
            record.content.clone_from(content);
        }
        record.touch(self.clock.now());
        let committed = record.clone();

        self.store.write_all(&records)?;
        Ok(committed)
    }
}

#[cfg(test)]
mod tests {
    use super::{AutosaveSession, Mutation, SaveError, SaveState};
    use crate::clock::ManualClock;
    use crate::model::document::DocumentRecord;
    use crate::store::memory::MemoryRecordStore;
    use crate::store::RecordStore;
    use chrono::{Duration, TimeZone, Utc};

    fn seeded_store() -> (MemoryRecordStore, DocumentRecord, ManualClock) {
        let start = Utc.with_ymd_and_hms(2024, 5, 1, 12, 0, 0).unwrap();
        let store = MemoryRecordStore::new();
        let record = DocumentRecord::with_id("x", start);
        store.write_all(&[record.clone()]).unwrap();
        (store, record, ManualClock::new(start))
    }

    #[test]
    fn begin_moves_to_saving_and_commit_returns_to_idle() {
        let (store, record, clock) = seeded_store();
        let mut session = AutosaveSession::open_with_clock(&store, &clock, &record);
        assert_eq!(session.state(), SaveState::Idle);

        let pending = session.begin(Mutation::Content("<p>a</p>".to_string())).unwrap();
        assert_eq!(session.state(), SaveState::Saving);
        assert_eq!(pending.document_id(), "x");

        session.commit(pending).unwrap();
        assert_eq!(session.state(), SaveState::Idle);
        assert!(!session.has_unsaved_changes());
    }

    #[test]
    fn events_during_saving_refresh_mirror_and_are_picked_up_next_cycle() {
        let (store, record, clock) = seeded_store();
        let mut session = AutosaveSession::open_with_clock(&store, &clock, &record);

        let pending = session.begin(Mutation::Content("<p>a</p>".to_string())).unwrap();
        assert!(session.begin(Mutation::Title("Renamed".to_string())).is_none());
        assert!(session.has_unsaved_changes());
        assert_eq!(session.dropped_events(), 1);

        let first = session.commit(pending).unwrap();
        assert_eq!(first.title, "Untitled Document");
        assert!(session.has_unsaved_changes());

        clock.advance(Duration::milliseconds(10));
        let second = session
            .content_changed("<p>ab</p>")
            .unwrap()
            .expect("idle session commits");
        assert_eq!(second.title, "Renamed");
        assert_eq!(second.content, "<p>ab</p>");
        assert!(!session.has_unsaved_changes());
    }

    #[test]
    fn failed_commit_keeps_fields_dirty_and_reports_error() {
        let (store, record, clock) = seeded_store();
        let mut session = AutosaveSession::open_with_clock(&store, &clock, &record);

        store.set_write_failure(Some("quota"));
        assert!(session.content_changed("<p>lost?</p>").is_err());
        assert_eq!(session.state(), SaveState::Idle);
        assert!(session.has_unsaved_changes());
        assert!(session.last_error().is_some());

        store.set_write_failure(None);
        let saved = session.title_changed("Kept").unwrap().unwrap();
        assert_eq!(saved.content, "<p>lost?</p>");
        assert_eq!(saved.title, "Kept");
        assert!(session.last_error().is_none());
    }

    #[test]
    fn dropped_pending_save_releases_session_and_keeps_fields() {
        let (store, record, clock) = seeded_store();
        let mut session = AutosaveSession::open_with_clock(&store, &clock, &record);

        drop(session.begin(Mutation::Content("<p>c1</p>".to_string())));
        assert_eq!(session.state(), SaveState::Idle);
        assert!(session.has_unsaved_changes());
        assert_eq!(store.write_count(), 1);

        clock.advance(Duration::milliseconds(5));
        let saved = session
            .title_changed("After abort")
            .unwrap()
            .expect("released session commits");
        assert_eq!(saved.content, "<p>c1</p>");
        assert_eq!(saved.title, "After abort");
        assert_eq!(session.state(), SaveState::Idle);
        assert!(!session.has_unsaved_changes());
        assert_eq!(session.dropped_events(), 0);
    }

    #[test]
    fn pending_save_from_another_session_is_rejected() {
        let (store, record, clock) = seeded_store();
        let other = DocumentRecord::with_id("y", record.updated_at);
        store.write_all(&[record.clone(), other.clone()]).unwrap();
        let mut a = AutosaveSession::open_with_clock(&store, &clock, &record);
        let mut b = AutosaveSession::open_with_clock(&store, &clock, &other);

        let pending = a.begin(Mutation::Content("typed in x".to_string())).unwrap();
        let err = b.commit(pending).unwrap_err();
        assert!(matches!(err, SaveError::ForeignPendingSave(ref id) if id == "x"));
        assert_eq!(b.state(), SaveState::Idle);
        assert!(b.last_error().is_none());
        assert_eq!(store.write_count(), 2);

        assert_eq!(a.state(), SaveState::Idle);
        let saved = a.title_changed("X").unwrap().expect("owner recovers");
        assert_eq!(saved.content, "typed in x");
        let records = store.read_all().unwrap();
        let untouched = records.iter().find(|r| r.id == "y").unwrap();
        assert_eq!(untouched.content, "");
    }

    #[test]
    fn commit_against_vanished_document_is_reported() {
        let (store, record, clock) = seeded_store();
        let mut session = AutosaveSession::open_with_clock(&store, &clock, &record);
        store.write_all(&[]).unwrap();

        let err = session.content_changed("<p>x</p>").unwrap_err();
        assert!(matches!(err, SaveError::DocumentMissing(ref id) if id == "x"));
        assert_eq!(session.state(), SaveState::Idle);
        assert!(store.read_all().unwrap().is_empty());
    }
}
