//! Document lifecycle use-cases.
//!
//! # Responsibility
//! - Resolve a requested document id into a record, seeding a new record when
//!   no id is requested.
//! - Create documents explicitly and list them for the home screen.
//!
//! # Invariants
//! - A dangling id is never recreated: resolution reports `NavigateAway`.
//! - New records are visible only after the store write succeeds.
//! - Listing order is `updated_at DESC, id ASC`.

use crate::clock::{Clock, SystemClock};
use crate::model::document::{DocumentId, DocumentRecord};
use crate::service::preview::derive_preview_text;
use crate::store::{RecordStore, StoreError};
use chrono::{DateTime, Utc};
use log::{error, info, warn};
use std::error::Error;
use std::fmt::{Display, Formatter};

/// Lifecycle failure. Dangling ids are not errors; see `Resolution`.
#[derive(Debug)]
pub enum LifecycleError {
    Store(StoreError),
}

impl Display for LifecycleError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Store(err) => write!(f, "{err}"),
        }
    }
}

impl Error for LifecycleError {
    fn source(&self) -> Option<&(dyn Error + 'static)> {
        match self {
            Self::Store(err) => Some(err),
        }
    }
}

impl From<StoreError> for LifecycleError {
    fn from(value: StoreError) -> Self {
        Self::Store(value)
    }
}

/// Record handed to the editing surface on load.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ResolvedDocument {
    pub record: DocumentRecord,
    /// `true` when the record was seeded by this resolution.
    pub is_new: bool,
}

/// Outcome of resolving a navigation-context id.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Resolution {
    Ready(ResolvedDocument),
    /// The requested id has no record; the host must leave this editing
    /// context instead of recreating the id.
    NavigateAway { requested_id: DocumentId },
}

/// Home-screen summary of one document.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DocumentSummary {
    pub id: DocumentId,
    pub title: String,
    pub updated_at: DateTime<Utc>,
    /// Tag-stripped content excerpt; `None` renders as "No content".
    pub preview_text: Option<String>,
}

/// Lifecycle facade over a record store.
pub struct DocumentLifecycle<S: RecordStore, C: Clock = SystemClock> {
    store: S,
    clock: C,
}

impl<S: RecordStore> DocumentLifecycle<S> {
    /// Creates a lifecycle manager using the system clock.
    pub fn new(store: S) -> Self {
        Self::with_clock(store, SystemClock)
    }
}

impl<S: RecordStore, C: Clock> DocumentLifecycle<S, C> {
    pub fn with_clock(store: S, clock: C) -> Self {
        Self { store, clock }
    }

    /// Resolves an optional id from the navigation context.
    ///
    /// - `None` (or a blank id): seeds a new record, `is_new = true`.
    /// - Known id: returns the stored record, `is_new = false`.
    /// - Unknown id: `Resolution::NavigateAway`, nothing is written.
    ///
    /// # Errors
    /// - Store read failures, and write failures while seeding.
    pub fn resolve(&self, id: Option<&str>) -> Result<Resolution, LifecycleError> {
        let Some(requested_id) = id.filter(|value| !value.trim().is_empty()) else {
            let record = self.create_document()?;
            return Ok(Resolution::Ready(ResolvedDocument {
                record,
                is_new: true,
            }));
        };

        let records = self.read_records("resolve")?;
        match records.into_iter().find(|record| record.id == requested_id) {
            Some(record) => {
                info!(
                    "event=doc_resolve module=lifecycle status=ok doc_id={} is_new=false",
                    record.id
                );
                Ok(Resolution::Ready(ResolvedDocument {
                    record,
                    is_new: false,
                }))
            }
            None => {
                warn!(
                    "event=doc_resolve module=lifecycle status=navigate_away doc_id={}",
                    requested_id
                );
                Ok(Resolution::NavigateAway {
                    requested_id: requested_id.to_string(),
                })
            }
        }
    }

    /// Creates and persists a new document with default title and content.
    pub fn create_document(&self) -> Result<DocumentRecord, LifecycleError> {
        let mut records = self.read_records("create")?;
        let record = DocumentRecord::new(self.clock.now());
        records.push(record.clone());

        if let Err(err) = self.store.write_all(&records) {
            error!(
                "event=doc_create module=lifecycle status=error error_code={} error={}",
                err.code(),
                err
            );
            return Err(err.into());
        }

        info!(
            "event=doc_create module=lifecycle status=ok doc_id={} total_docs={}",
            record.id,
            records.len()
        );
        Ok(record)
    }

    /// Gets one record by id.
    pub fn get_document(&self, id: &str) -> Result<Option<DocumentRecord>, LifecycleError> {
        let records = self.read_records("get")?;
        Ok(records.into_iter().find(|record| record.id == id))
    }

    /// Lists summaries sorted by `updated_at DESC, id ASC`.
    pub fn list_documents(&self) -> Result<Vec<DocumentSummary>, LifecycleError> {
        let mut records = self.read_records("list")?;
        records.sort_by(|left, right| {
            right
                .updated_at
                .cmp(&left.updated_at)
                .then_with(|| left.id.cmp(&right.id))
        });

        Ok(records
            .into_iter()
            .map(|record| DocumentSummary {
                preview_text: derive_preview_text(&record.content),
                id: record.id,
                title: record.title,
                updated_at: record.updated_at,
            })
            .collect())
    }

    fn read_records(
        &self,
        operation: &'static str,
    ) -> Result<Vec<DocumentRecord>, LifecycleError> {
        self.store.read_all().map_err(|err| {
            error!(
                "event=doc_{} module=lifecycle status=error error_code={} error={}",
                operation,
                err.code(),
                err
            );
            LifecycleError::from(err)
        })
    }
}
