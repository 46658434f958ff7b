//! In-memory implementation of [`ProgramStore`].
//!
//! [`InMemoryStore`] is a first-class backend for tests and ephemeral
//! sessions. Clones share the same state, so a test can hand one clone to
//! the registry and inspect or sabotage the store through another.

use std::io;
use std::sync::Arc;

use parking_lot::Mutex;

use crate::error::StorageError;
use crate::traits::ProgramStore;
use crate::types::{Revision, StoreSnapshot, StoredProgram};

#[derive(Debug, Default)]
struct State {
    snapshot: StoreSnapshot,
    fail_loads: bool,
    fail_saves: bool,
    corrupt: bool,
    saves: usize,
}

/// Shared in-process store.
#[derive(Debug, Clone, Default)]
pub struct InMemoryStore {
    state: Arc<Mutex<State>>,
}

impl InMemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Creates a store that already holds `programs` at `revision`.
    pub fn with_programs(programs: Vec<StoredProgram>, revision: Revision) -> Self {
        let store = Self::new();
        store.state.lock().snapshot = StoreSnapshot { revision, programs };
        store
    }

    /// Current durable content.
    pub fn snapshot(&self) -> StoreSnapshot {
        self.state.lock().snapshot.clone()
    }

    /// Number of successful saves so far.
    pub fn save_count(&self) -> usize {
        self.state.lock().saves
    }

    /// Makes subsequent loads fail with an I/O error.
    pub fn set_fail_loads(&self, fail: bool) {
        self.state.lock().fail_loads = fail;
    }

    /// Makes subsequent saves fail with an I/O error.
    pub fn set_fail_saves(&self, fail: bool) {
        self.state.lock().fail_saves = fail;
    }

    /// Makes subsequent loads report corrupt content until quarantined.
    pub fn set_corrupt(&self, corrupt: bool) {
        self.state.lock().corrupt = corrupt;
    }

    /// Simulates another process writing the store.
    pub fn bump_revision(&self) {
        let mut state = self.state.lock();
        state.snapshot.revision = state.snapshot.revision.next();
    }
}

impl ProgramStore for InMemoryStore {
    fn location(&self) -> String {
        "memory".to_string()
    }

    fn load(&mut self) -> Result<StoreSnapshot, StorageError> {
        let state = self.state.lock();
        if state.fail_loads {
            return Err(StorageError::io(
                self.location(),
                io::Error::new(io::ErrorKind::PermissionDenied, "load disabled"),
            ));
        }
        if state.corrupt {
            return Err(StorageError::corrupt(self.location(), "marked corrupt"));
        }
        Ok(state.snapshot.clone())
    }

    fn save(
        &mut self,
        programs: &[StoredProgram],
        expected: Option<Revision>,
    ) -> Result<Revision, StorageError> {
        let mut state = self.state.lock();
        if state.fail_saves {
            return Err(StorageError::io(
                self.location(),
                io::Error::new(io::ErrorKind::PermissionDenied, "save disabled"),
            ));
        }
        let found = state.snapshot.revision;
        if let Some(expected) = expected {
            if expected != found {
                return Err(StorageError::StaleRevision { expected, found });
            }
        }
        let revision = found.next();
        state.snapshot = StoreSnapshot {
            revision,
            programs: programs.to_vec(),
        };
        state.corrupt = false;
        state.saves += 1;
        Ok(revision)
    }

    fn quarantine(&mut self) -> Result<Option<std::path::PathBuf>, StorageError> {
        let mut state = self.state.lock();
        if state.corrupt {
            state.corrupt = false;
            state.snapshot = StoreSnapshot::default();
        }
        Ok(None)
    }
}
