//! Core persistence and autosave logic for Drafts.
//! This crate is the single source of truth for document invariants.

pub mod clock;
pub mod config;
pub mod db;
pub mod logging;
pub mod model;
pub mod service;
pub mod store;

pub use clock::{Clock, ManualClock, SystemClock};
pub use config::CoreConfig;
pub use logging::{default_log_level, init_logging, logging_status, LogLevel};
pub use model::document::{new_document_id, DocumentId, DocumentRecord, DEFAULT_TITLE};
pub use service::autosave::{AutosaveSession, Mutation, PendingSave, SaveError, SaveState};
pub use service::export::{
    export_document, export_filename, ExportError, ExportRequest, ExporterFailure, PdfExporter,
};
pub use service::lifecycle::{
    DocumentLifecycle, DocumentSummary, LifecycleError, Resolution, ResolvedDocument,
};
pub use store::memory::MemoryRecordStore;
pub use store::sqlite::SqliteRecordStore;
pub use store::{RecordStore, StoreError, StoreResult, DEFAULT_SLOT_KEY};

/// Returns the core crate version.
pub fn core_version() -> &'static str {
    env!("CARGO_PKG_VERSION")
}
