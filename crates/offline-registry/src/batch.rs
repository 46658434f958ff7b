//! Outcome of adding several paths at once.

use std::fmt;
use std::path::PathBuf;

/// Why a path in a batch was not added.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SkipReason {
    Directory,
    Duplicate,
    NotFound,
    InvalidPath,
}

impl fmt::Display for SkipReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            SkipReason::Directory => "is a directory",
            SkipReason::Duplicate => "is already in the list",
            SkipReason::NotFound => "does not exist",
            SkipReason::InvalidPath => "is not valid Unicode",
        })
    }
}

/// Per-path result of [`ProgramRegistry::add_programs`](crate::ProgramRegistry::add_programs).
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct BatchReport {
    /// Normalized paths that were appended, in order.
    pub added: Vec<PathBuf>,
    /// Paths as given, with the reason they were skipped.
    pub skipped: Vec<(PathBuf, SkipReason)>,
}

impl BatchReport {
    pub fn is_empty(&self) -> bool {
        self.added.is_empty() && self.skipped.is_empty()
    }
}
