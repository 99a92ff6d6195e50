//! Error types
//!
//! Recoverable data problems (malformed storage, out-of-range values,
//! unknown properties) are never errors: they are sanitized and logged.
//! What remains is configuration that cannot be given a meaning, store I/O,
//! and use-before-init.

use std::path::PathBuf;

/// The configuration could not be read or compiled
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("Failed to read config file {}", path.display())]
    Read {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Failed to parse config: {0}")]
    Parse(#[source] serde_json::Error),

    #[error("More than one mode property: '{first}' and '{second}'")]
    MultipleModeProps { first: String, second: String },

    #[error("Base value '{base}' of property '{prop}' is not an allowed value")]
    BaseNotAllowed { prop: String, base: String },

    #[error("System fallback '{fallback}' of property '{prop}' does not resolve to an appearance")]
    InvalidSystemFallback { prop: String, fallback: String },

    #[error("Mode property '{prop}' has no appearance for value '{value}'")]
    MissingAppearance { prop: String, value: String },
}

/// A key-value store could not be read or written
#[derive(Debug, thiserror::Error)]
pub enum StoreError {
    #[error("Store I/O failed for {}", path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Failed to serialize store contents: {0}")]
    Serialize(#[from] serde_json::Error),
}

/// Precondition violations in the synchronization core
#[derive(Debug, thiserror::Error, PartialEq, Eq)]
pub enum SyncError {
    #[error("{0} read before its first write")]
    NotInitialized(&'static str),
}
