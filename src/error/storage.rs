//! Durable storage errors.

use std::path::PathBuf;
use thiserror::Error;

/// Errors raised by [`KeyValueStore`](crate::storage::KeyValueStore) implementations.
#[derive(Debug, Error)]
pub enum StorageError {
    /// Key contains characters that cannot be mapped to a file name.
    #[error("Invalid storage key: {0:?}")]
    InvalidKey(String),

    /// Reading or writing the backing file failed.
    #[error("Failed to access {path:?}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// A cookie lifetime that puts the expiry out of range.
    #[error("Cookie lifetime of {days} days is out of range")]
    InvalidExpiry { days: i64 },

    /// A value could not be encoded to or decoded from JSON.
    #[error("Failed to encode value: {0}")]
    Json(#[from] serde_json::Error),
}

impl StorageError {
    pub(crate) fn io(path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        StorageError::Io {
            path: path.into(),
            source,
        }
    }
}
