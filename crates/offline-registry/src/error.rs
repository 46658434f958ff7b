//! Registry error types.

use std::path::PathBuf;

use thiserror::Error;

use offline_core::{CoreError, ProgramStatus, Transition};
use offline_enforce::EnforcementError;
use offline_storage::StorageError;

/// Errors returned by [`ProgramRegistry`](crate::ProgramRegistry) operations.
///
/// Validation failures (`Duplicate`, `NotFound`, `InvalidPath`,
/// `IndexOutOfRange`, `InvalidTransition`) never change any state.
#[derive(Debug, Error)]
pub enum RegistryError {
    #[error("{} is already in the list", .path.display())]
    Duplicate { path: PathBuf },

    #[error("program not found: {}", .path.display())]
    NotFound { path: PathBuf },

    /// The path cannot be written to the store as text.
    #[error("path is not valid Unicode: {}", .path.display())]
    InvalidPath { path: PathBuf },

    #[error("index {index} is out of range (list has {len} entries)")]
    IndexOutOfRange { index: usize, len: usize },

    #[error("cannot {transition} a program that is {from}")]
    InvalidTransition {
        from: ProgramStatus,
        transition: Transition,
    },

    /// The store could not be read or written.
    #[error("program store unavailable: {0}")]
    Io(#[source] StorageError),

    /// The store held content that could not be parsed.
    #[error("program store is corrupt: {0}")]
    CorruptStore(#[source] StorageError),

    /// Another process saved the store since it was loaded; reload first.
    #[error("program store changed on disk: {0}")]
    StaleStore(#[source] StorageError),

    #[error(transparent)]
    Enforcement(#[from] EnforcementError),

    #[error("failed to start {}: {source}", .path.display())]
    Launch {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
}

impl RegistryError {
    /// True when retrying with elevated privileges may succeed.
    pub fn is_permission_denied(&self) -> bool {
        matches!(self, RegistryError::Enforcement(err) if err.is_permission_denied())
    }
}

impl From<StorageError> for RegistryError {
    fn from(err: StorageError) -> Self {
        match err {
            StorageError::Corrupt { .. } => RegistryError::CorruptStore(err),
            StorageError::StaleRevision { .. } => RegistryError::StaleStore(err),
            StorageError::Io { .. }
            | StorageError::Sqlite(_)
            | StorageError::Migration(_)
            | StorageError::Serialization(_) => RegistryError::Io(err),
        }
    }
}

impl From<CoreError> for RegistryError {
    fn from(err: CoreError) -> Self {
        match err {
            CoreError::EmptyPath => RegistryError::NotFound {
                path: PathBuf::new(),
            },
            CoreError::InvalidTransition { from, transition } => {
                RegistryError::InvalidTransition { from, transition }
            }
            CoreError::UnknownStatus { value } => RegistryError::CorruptStore(StorageError::Corrupt {
                location: "status".to_string(),
                reason: format!("unknown program status '{value}'"),
            }),
        }
    }
}
