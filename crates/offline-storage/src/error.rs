//! Storage error types for offline-storage.
//!
//! [`StorageError`] separates the three conditions callers must treat
//! differently: the medium could not be read or written (`Io`, `Sqlite`),
//! the content could not be understood (`Corrupt`), and another writer
//! changed the store since it was loaded (`StaleRevision`).

use thiserror::Error;

use crate::types::Revision;

/// Errors produced by storage operations.
#[derive(Debug, Error)]
pub enum StorageError {
    /// Reading or writing the underlying file failed.
    #[error("I/O error on {location}: {source}")]
    Io {
        location: String,
        #[source]
        source: std::io::Error,
    },

    /// The stored content could not be parsed.
    #[error("corrupt store {location}: {reason}")]
    Corrupt { location: String, reason: String },

    /// The durable revision moved on since the caller loaded it.
    #[error("stale revision: loaded {expected}, store is at {found}")]
    StaleRevision { expected: Revision, found: Revision },

    /// A SQLite operation failed.
    #[error("sqlite error: {0}")]
    Sqlite(#[from] rusqlite::Error),

    /// Applying schema migrations failed.
    #[error("migration error: {0}")]
    Migration(String),

    /// JSON serialization failed.
    #[error("serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
}

impl StorageError {
    pub(crate) fn io(location: impl Into<String>, source: std::io::Error) -> Self {
        StorageError::Io {
            location: location.into(),
            source,
        }
    }

    pub(crate) fn corrupt(location: impl Into<String>, reason: impl Into<String>) -> Self {
        StorageError::Corrupt {
            location: location.into(),
            reason: reason.into(),
        }
    }
}
