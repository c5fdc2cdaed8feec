//! Error types for the recent history store

use std::path::PathBuf;

use thiserror::Error;

/// Failures raised while reading or writing the backing file.
///
/// None of these are fatal: the store keeps working in memory and the
/// service only logs them. They are returned so callers and tests can see
/// when persistence degraded.
#[derive(Debug, Error)]
pub enum StoreError {
    /// Backing file missing or unreadable
    #[error("couldn't read recent history file {path}: {source}")]
    Read {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// Backing file (or its directory) could not be written
    #[error("couldn't write recent history file {path}: {source}")]
    Write {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// Backing file is not a JSON document at all
    #[error("recent history file {path} is not valid JSON: {source}")]
    Parse {
        path: PathBuf,
        #[source]
        source: serde_json::Error,
    },

    /// Serialization error
    #[error("serialization error: {0}")]
    Serialize(#[from] serde_json::Error),

    /// No config directory could be determined
    #[error("could not determine a config path for '{0}'")]
    NoConfigPath(String),
}
