//! Core use-case services.
//!
//! # Responsibility
//! - Orchestrate record store calls into lifecycle, autosave and export
//!   use-cases.
//! - Keep hosts decoupled from storage details.

pub mod autosave;
pub mod export;
pub mod lifecycle;
pub mod preview;
