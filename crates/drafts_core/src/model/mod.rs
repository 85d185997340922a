//! Domain model for locally persisted documents.
//!
//! # Responsibility
//! - Define the canonical document record stored in the record slot.
//! - Own defaulting rules applied when persisted records are incomplete.
//!
//! # Invariants
//! - Every document is identified by an immutable `DocumentId`.
//! - Documents are never hard-deleted by core.

pub mod document;
