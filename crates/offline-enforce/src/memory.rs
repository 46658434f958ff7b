//! In-process enforcement backend.
//!
//! [`InMemoryBackend`] records blocks in shared state instead of touching
//! the OS. Clones share that state, so a test can hand one clone to the
//! registry and use another to inspect calls, inject failures, or change
//! the "OS" behind the registry's back.

use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;

use parking_lot::Mutex;

use offline_core::path::identity_key;

use crate::error::EnforcementError;
use crate::traits::EnforcementBackend;

/// Failure injected into apply/remove calls.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FailMode {
    PermissionDenied,
    Timeout,
}

#[derive(Debug)]
struct State {
    blocked: BTreeMap<String, PathBuf>,
    fail: Option<FailMode>,
    available: bool,
    applies: usize,
    removes: usize,
}

impl Default for State {
    fn default() -> Self {
        State {
            blocked: BTreeMap::new(),
            fail: None,
            available: true,
            applies: 0,
            removes: 0,
        }
    }
}

/// Shared-state test double for [`EnforcementBackend`].
#[derive(Debug, Clone, Default)]
pub struct InMemoryBackend {
    state: Arc<Mutex<State>>,
}

impl InMemoryBackend {
    pub fn new() -> Self {
        Self::default()
    }

    /// Makes every subsequent apply/remove fail with `mode`; `None` heals.
    pub fn set_failure(&self, mode: Option<FailMode>) {
        self.state.lock().fail = mode;
    }

    /// Reports the backend as unavailable, as on an unsupported host.
    pub fn set_available(&self, available: bool) {
        self.state.lock().available = available;
    }

    /// Adds a block without going through the trait, like a user editing
    /// the firewall by hand.
    pub fn block_externally(&self, path: &Path) {
        self.state
            .lock()
            .blocked
            .insert(identity_key(path), path.to_path_buf());
    }

    /// Drops a block without going through the trait.
    pub fn clear_externally(&self, path: &Path) {
        self.state.lock().blocked.remove(&identity_key(path));
    }

    /// Currently blocked paths, in key order.
    pub fn blocked_paths(&self) -> Vec<PathBuf> {
        self.state.lock().blocked.values().cloned().collect()
    }

    /// Number of apply_block calls, failed ones included.
    pub fn apply_count(&self) -> usize {
        self.state.lock().applies
    }

    /// Number of remove_block calls, failed ones included.
    pub fn remove_count(&self) -> usize {
        self.state.lock().removes
    }

    fn check(state: &State, path: &Path) -> Result<(), EnforcementError> {
        if !state.available {
            return Err(EnforcementError::Unavailable {
                reason: "in-memory backend disabled".to_string(),
            });
        }
        match state.fail {
            None => Ok(()),
            Some(FailMode::PermissionDenied) => Err(EnforcementError::PermissionDenied {
                path: path.to_path_buf(),
                detail: "injected: requires elevation".to_string(),
            }),
            Some(FailMode::Timeout) => Err(EnforcementError::Timeout {
                command: format!("in-memory {}", path.display()),
                timeout: Duration::from_secs(15),
            }),
        }
    }
}

impl EnforcementBackend for InMemoryBackend {
    fn name(&self) -> &'static str {
        "memory"
    }

    fn is_available(&self) -> bool {
        self.state.lock().available
    }

    fn apply_block(&mut self, path: &Path) -> Result<(), EnforcementError> {
        let mut state = self.state.lock();
        state.applies += 1;
        Self::check(&state, path)?;
        state
            .blocked
            .insert(identity_key(path), path.to_path_buf());
        Ok(())
    }

    fn remove_block(&mut self, path: &Path) -> Result<(), EnforcementError> {
        let mut state = self.state.lock();
        state.removes += 1;
        Self::check(&state, path)?;
        state.blocked.remove(&identity_key(path));
        Ok(())
    }

    fn is_blocked(&self, path: &Path) -> bool {
        self.state.lock().blocked.contains_key(&identity_key(path))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn apply_and_remove_are_idempotent() {
        let mut backend = InMemoryBackend::new();
        let path = Path::new("/apps/game");
        backend.apply_block(path).unwrap();
        backend.apply_block(path).unwrap();
        assert!(backend.is_blocked(path));
        assert_eq!(backend.blocked_paths(), vec![path.to_path_buf()]);

        backend.remove_block(path).unwrap();
        backend.remove_block(path).unwrap();
        assert!(!backend.is_blocked(path));
        assert_eq!(backend.apply_count(), 2);
        assert_eq!(backend.remove_count(), 2);
    }

    #[test]
    fn injected_failure_changes_nothing() {
        let observer = InMemoryBackend::new();
        let mut backend = observer.clone();
        observer.set_failure(Some(FailMode::PermissionDenied));

        let err = backend.apply_block(Path::new("/apps/game")).unwrap_err();
        assert!(err.is_permission_denied());
        assert!(observer.blocked_paths().is_empty());

        observer.set_failure(Some(FailMode::Timeout));
        assert!(matches!(
            backend.apply_block(Path::new("/apps/game")),
            Err(EnforcementError::Timeout { .. })
        ));
    }

    #[test]
    fn external_changes_are_visible() {
        let observer = InMemoryBackend::new();
        let backend = observer.clone();
        observer.block_externally(Path::new("/apps/editor"));
        assert!(backend.is_blocked(Path::new("/apps/editor")));
        observer.clear_externally(Path::new("/apps/editor"));
        assert!(!backend.is_blocked(Path::new("/apps/editor")));
    }
}
