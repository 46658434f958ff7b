//! The [`ProgramRecord`] entity: one tracked executable.

use std::path::{Path, PathBuf};

use crate::error::CoreError;
use crate::icon::IconHandle;
use crate::status::{ProgramStatus, Transition};

/// One tracked executable and its network-access status.
///
/// The path never changes after construction. Status only moves through
/// [`ProgramRecord::apply`], which enforces the state machine; the owning
/// registry calls it after the enforcement backend has confirmed the change.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ProgramRecord {
    path: PathBuf,
    status: ProgramStatus,
    icon: IconHandle,
    stale: bool,
}

impl ProgramRecord {
    /// Creates a freshly added record in the initial `SessionActive` state.
    pub fn new(path: PathBuf) -> Result<Self, CoreError> {
        Self::restore(path, ProgramStatus::default())
    }

    /// Rebuilds a record from persisted `(path, status)`.
    ///
    /// The icon is re-derived and the stale flag reflects whether the
    /// executable currently exists.
    pub fn restore(path: PathBuf, status: ProgramStatus) -> Result<Self, CoreError> {
        if path.as_os_str().is_empty() {
            return Err(CoreError::EmptyPath);
        }
        let icon = IconHandle::derive(&path);
        let stale = !path.is_file();
        Ok(ProgramRecord {
            path,
            status,
            icon,
            stale,
        })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn status(&self) -> ProgramStatus {
        self.status
    }

    pub fn icon(&self) -> &IconHandle {
        &self.icon
    }

    /// True when the executable was missing the last time it was checked.
    pub fn is_stale(&self) -> bool {
        self.stale
    }

    /// File name shown in lists; falls back to the full path.
    pub fn display_name(&self) -> String {
        self.path
            .file_name()
            .unwrap_or(self.path.as_os_str())
            .to_string_lossy()
            .into_owned()
    }

    /// Applies a transition and returns the previous status.
    pub fn apply(&mut self, transition: Transition) -> Result<ProgramStatus, CoreError> {
        let next = self.status.apply(transition)?;
        Ok(std::mem::replace(&mut self.status, next))
    }

    /// Re-checks whether the executable exists. Returns the new stale flag.
    pub fn refresh_stale(&mut self) -> bool {
        self.stale = !self.path.is_file();
        self.stale
    }
}
