//! Storage-layer types: the persisted shape of a record and the revision
//! stamp.

use std::fmt;
use std::path::PathBuf;

use serde::{Deserialize, Serialize};

use offline_core::{ProgramRecord, ProgramStatus};

/// Monotonic write stamp of a store. A fresh store is at revision 0.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Revision(pub u64);

impl Revision {
    pub fn next(self) -> Revision {
        Revision(self.0 + 1)
    }
}

impl fmt::Display for Revision {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "r{}", self.0)
    }
}

/// The durable part of a program record.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StoredProgram {
    pub path: PathBuf,
    pub status: ProgramStatus,
}

impl StoredProgram {
    pub fn new(path: impl Into<PathBuf>, status: ProgramStatus) -> Self {
        StoredProgram {
            path: path.into(),
            status,
        }
    }
}

impl From<&ProgramRecord> for StoredProgram {
    fn from(record: &ProgramRecord) -> Self {
        StoredProgram {
            path: record.path().to_path_buf(),
            status: record.status(),
        }
    }
}

/// Everything a load returns: the programs in order and the revision they
/// were read at.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct StoreSnapshot {
    pub revision: Revision,
    pub programs: Vec<StoredProgram>,
}
