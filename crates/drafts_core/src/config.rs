//! Host configuration resolved from the environment.
//!
//! # Responsibility
//! - Resolve database path, slot key and logging settings with defaults.
//!
//! # Invariants
//! - Blank values fall back to defaults.
//! - An invalid log level falls back to the build default and is reported
//!   through `warnings`.

use crate::logging::{default_log_level, LogLevel};
use crate::store::DEFAULT_SLOT_KEY;
use std::path::PathBuf;

pub const ENV_DB_PATH: &str = "DRAFTS_DB_PATH";
pub const ENV_SLOT_KEY: &str = "DRAFTS_SLOT_KEY";
pub const ENV_LOG_LEVEL: &str = "DRAFTS_LOG_LEVEL";
pub const ENV_LOG_DIR: &str = "DRAFTS_LOG_DIR";

const DEFAULT_DB_FILE_NAME: &str = "drafts.sqlite3";

/// Effective core configuration.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CoreConfig {
    pub db_path: PathBuf,
    pub slot_key: String,
    pub log_level: LogLevel,
    /// File logging is disabled when unset.
    pub log_dir: Option<PathBuf>,
    /// Non-fatal problems found while resolving values.
    pub warnings: Vec<String>,
}

impl Default for CoreConfig {
    fn default() -> Self {
        Self {
            db_path: std::env::temp_dir().join(DEFAULT_DB_FILE_NAME),
            slot_key: DEFAULT_SLOT_KEY.to_string(),
            log_level: default_log_level(),
            log_dir: None,
            warnings: Vec::new(),
        }
    }
}

impl CoreConfig {
    /// Resolves configuration from process environment variables.
    pub fn from_env() -> Self {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Resolves configuration from an arbitrary key lookup.
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Self {
        let value = |key: &str| {
            lookup(key)
                .map(|raw| raw.trim().to_string())
                .filter(|raw| !raw.is_empty())
        };

        let mut config = Self::default();
        if let Some(path) = value(ENV_DB_PATH) {
            config.db_path = PathBuf::from(path);
        }
        if let Some(slot_key) = value(ENV_SLOT_KEY) {
            config.slot_key = slot_key;
        }
        if let Some(level) = value(ENV_LOG_LEVEL) {
            match level.parse::<LogLevel>() {
                Ok(level) => config.log_level = level,
                Err(err) => config.warnings.push(format!("{ENV_LOG_LEVEL}: {err}")),
            }
        }
        config.log_dir = value(ENV_LOG_DIR).map(PathBuf::from);
        config
    }
}
