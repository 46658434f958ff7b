//! [`ProgramRegistry`]: the ordered, uniquely-keyed list of tracked programs.
//!
//! Every mutating operation validates first, then talks to the enforcement
//! backend, then updates memory, then saves. A failed backend call leaves
//! the record untouched; a failed save leaves memory ahead of the store and
//! marks the registry dirty until the next successful save.

use std::collections::HashSet;
use std::path::{Path, PathBuf};

use tracing::{debug, info, warn};

use offline_core::path::{identity_key, normalize, same_path};
use offline_core::{ProgramRecord, ProgramStatus, Transition};
use offline_enforce::EnforcementBackend;
use offline_storage::{ProgramStore, Revision, StorageError, StoredProgram};

use crate::batch::{BatchReport, SkipReason};
use crate::drift::{Drift, DriftKind};
use crate::error::RegistryError;
use crate::launcher;

/// Summary of a successful [`ProgramRegistry::load`].
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct LoadReport {
    /// Records now in the registry.
    pub loaded: usize,
    /// Loaded records whose executable is missing.
    pub stale: usize,
    /// Stored entries dropped because their path was empty or repeated.
    pub skipped: usize,
    /// Disagreements with the firewall found right after loading.
    pub drift: Vec<Drift>,
}

/// Owns the tracked programs and keeps store and firewall in step with them.
pub struct ProgramRegistry {
    programs: Vec<ProgramRecord>,
    store: Box<dyn ProgramStore>,
    backend: Box<dyn EnforcementBackend>,
    /// Store revision memory is based on; `None` writes unconditionally.
    revision: Option<Revision>,
    dirty: bool,
}

impl ProgramRegistry {
    /// Creates an empty registry. Call [`load`](Self::load) to read the store.
    pub fn new(store: Box<dyn ProgramStore>, backend: Box<dyn EnforcementBackend>) -> Self {
        ProgramRegistry {
            programs: Vec::new(),
            store,
            backend,
            revision: None,
            dirty: false,
        }
    }

    // -----------------------------------------------------------------------
    // Persistence
    // -----------------------------------------------------------------------

    /// Replaces the in-memory list with the store's content.
    ///
    /// On failure the list is reset to empty, corrupt content is moved aside,
    /// and the error is returned; the registry remains usable and the next
    /// save writes a fresh store.
    pub fn load(&mut self) -> Result<LoadReport, RegistryError> {
        let snapshot = match self.store.load() {
            Ok(snapshot) => snapshot,
            Err(err) => return Err(self.recover_from_failed_load(err)),
        };

        let mut seen = HashSet::new();
        let mut programs = Vec::with_capacity(snapshot.programs.len());
        let mut skipped = 0;
        for StoredProgram { path, status } in snapshot.programs {
            if !seen.insert(identity_key(&path)) {
                warn!(path = %path.display(), "skipping repeated store entry");
                skipped += 1;
                continue;
            }
            match ProgramRecord::restore(path, status) {
                Ok(record) => programs.push(record),
                Err(err) => {
                    warn!(error = %err, "skipping unusable store entry");
                    skipped += 1;
                }
            }
        }

        self.programs = programs;
        self.revision = Some(snapshot.revision);
        self.dirty = false;

        let stale = self.programs.iter().filter(|r| r.is_stale()).count();
        for record in self.programs.iter().filter(|r| r.is_stale()) {
            warn!(path = %record.path().display(), "tracked executable is missing");
        }
        let drift = self.reconcile();
        info!(
            store = %self.store.location(),
            revision = %snapshot.revision,
            loaded = self.programs.len(),
            stale,
            skipped,
            drift = drift.len(),
            "loaded programs"
        );

        Ok(LoadReport {
            loaded: self.programs.len(),
            stale,
            skipped,
            drift,
        })
    }

    fn recover_from_failed_load(&mut self, err: StorageError) -> RegistryError {
        warn!(store = %self.store.location(), error = %err, "failed to load programs, starting empty");
        self.programs.clear();
        self.revision = None;
        self.dirty = false;

        if matches!(err, StorageError::Corrupt { .. }) {
            match self.store.quarantine() {
                Ok(Some(moved)) => warn!(to = %moved.display(), "kept unreadable store for inspection"),
                Ok(None) => {}
                Err(quarantine_err) => {
                    warn!(error = %quarantine_err, "failed to move unreadable store aside")
                }
            }
        }
        err.into()
    }

    /// Writes the full list to the store.
    pub fn save(&mut self) -> Result<(), RegistryError> {
        let stored: Vec<StoredProgram> = self.programs.iter().map(StoredProgram::from).collect();
        match self.store.save(&stored, self.revision) {
            Ok(revision) => {
                debug!(%revision, count = stored.len(), "programs saved");
                self.revision = Some(revision);
                self.dirty = false;
                Ok(())
            }
            Err(err) => {
                warn!(store = %self.store.location(), error = %err, "failed to save programs");
                self.dirty = true;
                Err(err.into())
            }
        }
    }

    /// True when memory holds changes the store does not have.
    pub fn is_dirty(&self) -> bool {
        self.dirty
    }

    /// Name of the enforcement backend in use.
    pub fn backend_name(&self) -> &'static str {
        self.backend.name()
    }

    // -----------------------------------------------------------------------
    // Queries
    // -----------------------------------------------------------------------

    /// All records, in insertion order.
    pub fn get_programs(&self) -> &[ProgramRecord] {
        &self.programs
    }

    /// The record tracking `path`, compared after normalization.
    pub fn get_program(&self, path: &Path) -> Option<&ProgramRecord> {
        self.position(path).map(|index| &self.programs[index])
    }

    pub fn len(&self) -> usize {
        self.programs.len()
    }

    pub fn is_empty(&self) -> bool {
        self.programs.is_empty()
    }

    fn position(&self, path: &Path) -> Option<usize> {
        let wanted = normalize(path).unwrap_or_else(|_| path.to_path_buf());
        self.programs
            .iter()
            .position(|record| same_path(record.path(), &wanted))
    }

    fn require(&self, path: &Path) -> Result<usize, RegistryError> {
        self.position(path).ok_or_else(|| RegistryError::NotFound {
            path: path.to_path_buf(),
        })
    }

    // -----------------------------------------------------------------------
    // Mutations
    // -----------------------------------------------------------------------

    /// Starts tracking the executable at `path` as session-active.
    pub fn add_program(&mut self, path: &Path) -> Result<(), RegistryError> {
        let path = normalize(path).map_err(|_| RegistryError::NotFound {
            path: path.to_path_buf(),
        })?;
        if self.position(&path).is_some() {
            return Err(RegistryError::Duplicate { path });
        }
        if !path.is_file() {
            return Err(RegistryError::NotFound { path });
        }
        if path.to_str().is_none() {
            return Err(RegistryError::InvalidPath { path });
        }

        let record = ProgramRecord::new(path)?;
        info!(path = %record.path().display(), "added program");
        self.programs.push(record);
        self.save()
    }

    /// Adds every usable path, reporting the rest. Saves once at the end.
    pub fn add_programs<I, P>(&mut self, paths: I) -> Result<BatchReport, RegistryError>
    where
        I: IntoIterator<Item = P>,
        P: AsRef<Path>,
    {
        let mut report = BatchReport::default();
        for given in paths {
            let given = given.as_ref();
            let Ok(path) = normalize(given) else {
                report.skipped.push((given.to_path_buf(), SkipReason::NotFound));
                continue;
            };
            let reason = if path.is_dir() {
                Some(SkipReason::Directory)
            } else if self.position(&path).is_some() {
                Some(SkipReason::Duplicate)
            } else if !path.is_file() {
                Some(SkipReason::NotFound)
            } else if path.to_str().is_none() {
                Some(SkipReason::InvalidPath)
            } else {
                None
            };
            if let Some(reason) = reason {
                debug!(path = %given.display(), %reason, "skipping path");
                report.skipped.push((given.to_path_buf(), reason));
                continue;
            }

            self.programs.push(ProgramRecord::new(path.clone())?);
            report.added.push(path);
        }

        if !report.added.is_empty() {
            info!(added = report.added.len(), skipped = report.skipped.len(), "added programs");
            self.save()?;
        }
        Ok(report)
    }

    /// Stops tracking the record at `index`, lifting its block first.
    ///
    /// If the block cannot be lifted the record is kept. When the host has
    /// no enforcement backend there is nothing to lift.
    pub fn delete_program(&mut self, index: usize) -> Result<(), RegistryError> {
        let len = self.programs.len();
        let record = self
            .programs
            .get(index)
            .ok_or(RegistryError::IndexOutOfRange { index, len })?;

        if record.status().is_blocked() {
            if self.backend.is_available() {
                self.backend.remove_block(record.path())?;
            } else {
                warn!(
                    path = %record.path().display(),
                    backend = self.backend.name(),
                    "no enforcement backend, deleting blocked program without lifting its block"
                );
            }
        }

        let removed = self.programs.remove(index);
        info!(path = %removed.path().display(), "deleted program");
        self.save()
    }

    /// Launches a tracked program detached from the launcher.
    pub fn start(&self, path: &Path) -> Result<u32, RegistryError> {
        let index = self.require(path)?;
        let record = &self.programs[index];
        let pid = launcher::spawn_detached(record.path()).map_err(|source| {
            RegistryError::Launch {
                path: record.path().to_path_buf(),
                source,
            }
        })?;
        info!(path = %record.path().display(), pid, "started program");
        Ok(pid)
    }

    /// Blocks network access for a tracked program.
    pub fn block(&mut self, path: &Path) -> Result<ProgramStatus, RegistryError> {
        self.transition(path, Transition::Block)
    }

    /// Lifts the block. A deactivated record becomes session-active; active
    /// records keep their status.
    pub fn unblock(&mut self, path: &Path) -> Result<ProgramStatus, RegistryError> {
        self.transition(path, Transition::Unblock)
    }

    /// Moves a deactivated record to always-active.
    pub fn allow_always(&mut self, path: &Path) -> Result<ProgramStatus, RegistryError> {
        self.transition(path, Transition::AllowAlways)
    }

    fn transition(
        &mut self,
        path: &Path,
        transition: Transition,
    ) -> Result<ProgramStatus, RegistryError> {
        let index = self.require(path)?;
        let current = self.programs[index].status();
        let next = current.apply(transition)?;

        let target = self.programs[index].path();
        if next.is_blocked() {
            self.backend.apply_block(target)?;
        } else {
            self.backend.remove_block(target)?;
        }

        self.programs[index].apply(transition)?;
        if next != current {
            info!(path = %self.programs[index].path().display(), from = %current, to = %next, "status changed");
        }
        if next != current || self.dirty {
            self.save()?;
        }
        Ok(next)
    }

    // -----------------------------------------------------------------------
    // Reconciliation
    // -----------------------------------------------------------------------

    /// Compares every record with the firewall. Empty when no backend is
    /// available on this host.
    pub fn reconcile(&self) -> Vec<Drift> {
        if !self.backend.is_available() {
            debug!(backend = self.backend.name(), "enforcement unavailable, skipping reconciliation");
            return Vec::new();
        }
        let drift: Vec<Drift> = self
            .programs
            .iter()
            .filter_map(|record| {
                Drift::detect(
                    record.path().to_path_buf(),
                    record.status(),
                    self.backend.is_blocked(record.path()),
                )
            })
            .collect();
        for entry in &drift {
            warn!(path = %entry.path.display(), kind = ?entry.kind, "firewall drift");
        }
        drift
    }

    /// Re-applies or re-removes enforcement for every drifted record and
    /// returns what was repaired. Stops at the first backend failure.
    pub fn repair_drift(&mut self) -> Result<Vec<Drift>, RegistryError> {
        let mut repaired = Vec::new();
        for entry in self.reconcile() {
            match entry.kind {
                DriftKind::MissingBlock => self.backend.apply_block(&entry.path)?,
                DriftKind::UnexpectedBlock => self.backend.remove_block(&entry.path)?,
            }
            info!(path = %entry.path.display(), kind = ?entry.kind, "repaired firewall drift");
            repaired.push(entry);
        }
        Ok(repaired)
    }

    /// Re-checks which executables are missing. Returns the stale paths.
    pub fn refresh_stale(&mut self) -> Vec<PathBuf> {
        self.programs
            .iter_mut()
            .filter_map(|record| record.refresh_stale().then(|| record.path().to_path_buf()))
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use offline_enforce::InMemoryBackend;
    use offline_storage::InMemoryStore;

    fn registry() -> (ProgramRegistry, InMemoryStore, InMemoryBackend) {
        let store = InMemoryStore::new();
        let backend = InMemoryBackend::new();
        let registry = ProgramRegistry::new(Box::new(store.clone()), Box::new(backend.clone()));
        (registry, store, backend)
    }

    fn executable(dir: &tempfile::TempDir, name: &str) -> PathBuf {
        let path = dir.path().join(name);
        std::fs::write(&path, b"").unwrap();
        normalize(&path).unwrap()
    }

    #[test]
    fn first_load_is_empty() {
        let (mut registry, _, _) = registry();
        let report = registry.load().unwrap();
        assert_eq!(report, LoadReport::default());
        assert!(registry.is_empty());
    }

    #[test]
    fn add_rejects_duplicates_without_saving() {
        let dir = tempfile::tempdir().unwrap();
        let (mut registry, store, _) = registry();
        registry.load().unwrap();
        let app = executable(&dir, "app.exe");

        registry.add_program(&app).unwrap();
        let err = registry.add_program(&app).unwrap_err();
        assert!(matches!(err, RegistryError::Duplicate { .. }));
        assert_eq!(registry.len(), 1);
        assert_eq!(store.save_count(), 1);
    }

    #[test]
    fn lookup_normalizes_the_query() {
        let dir = tempfile::tempdir().unwrap();
        let (mut registry, _, _) = registry();
        let app = executable(&dir, "app.exe");
        registry.add_program(&app).unwrap();

        let dotted = dir.path().join(".").join("app.exe");
        assert_eq!(registry.get_program(&dotted).map(|r| r.path()), Some(app.as_path()));
    }

    #[test]
    fn invalid_transition_does_not_touch_backend() {
        let dir = tempfile::tempdir().unwrap();
        let (mut registry, _, backend) = registry();
        let app = executable(&dir, "app.exe");
        registry.add_program(&app).unwrap();

        let err = registry.allow_always(&app).unwrap_err();
        assert!(matches!(err, RegistryError::InvalidTransition { .. }));
        assert_eq!(backend.remove_count(), 0);
        assert_eq!(registry.get_program(&app).unwrap().status(), ProgramStatus::SessionActive);
    }

    #[test]
    fn allow_always_from_deactivated() {
        let dir = tempfile::tempdir().unwrap();
        let (mut registry, store, backend) = registry();
        let app = executable(&dir, "app.exe");
        registry.add_program(&app).unwrap();
        registry.block(&app).unwrap();

        assert_eq!(registry.allow_always(&app).unwrap(), ProgramStatus::AlwaysActive);
        assert!(!backend.is_blocked(&app));
        assert_eq!(store.snapshot().programs[0].status, ProgramStatus::AlwaysActive);

        // Unblocking keeps the always-active flavour.
        assert_eq!(registry.unblock(&app).unwrap(), ProgramStatus::AlwaysActive);
    }

    #[test]
    fn failed_save_marks_dirty_until_next_save() {
        let dir = tempfile::tempdir().unwrap();
        let (mut registry, store, _) = registry();
        registry.load().unwrap();
        let app = executable(&dir, "app.exe");

        store.set_fail_saves(true);
        assert!(matches!(registry.add_program(&app), Err(RegistryError::Io(_))));
        assert!(registry.is_dirty());
        assert_eq!(registry.len(), 1);

        store.set_fail_saves(false);
        // A no-op transition still flushes pending changes.
        registry.unblock(&app).unwrap();
        assert!(!registry.is_dirty());
        assert_eq!(store.snapshot().programs.len(), 1);
    }

    #[test]
    fn concurrent_write_is_reported_as_stale() {
        let dir = tempfile::tempdir().unwrap();
        let (mut registry, store, _) = registry();
        registry.load().unwrap();
        store.bump_revision();

        let err = registry.add_program(&executable(&dir, "app.exe")).unwrap_err();
        assert!(matches!(err, RegistryError::StaleStore(_)));
        assert!(registry.is_dirty());
    }

    #[test]
    fn repeated_store_entries_are_skipped() {
        let store = InMemoryStore::with_programs(
            vec![
                StoredProgram::new("/apps/a.exe", ProgramStatus::SessionActive),
                StoredProgram::new("/apps/a.exe", ProgramStatus::Deactivated),
                StoredProgram::new("", ProgramStatus::SessionActive),
            ],
            Revision(5),
        );
        let mut registry =
            ProgramRegistry::new(Box::new(store), Box::new(InMemoryBackend::new()));
        let report = registry.load().unwrap();
        assert_eq!(report.loaded, 1);
        assert_eq!(report.skipped, 2);
        assert_eq!(registry.get_programs()[0].status(), ProgramStatus::SessionActive);
    }

    #[test]
    fn refresh_stale_tracks_deleted_executables() {
        let dir = tempfile::tempdir().unwrap();
        let (mut registry, _, _) = registry();
        let app = executable(&dir, "app.exe");
        registry.add_program(&app).unwrap();
        assert!(registry.refresh_stale().is_empty());

        std::fs::remove_file(&app).unwrap();
        assert_eq!(registry.refresh_stale(), vec![app.clone()]);
        assert!(registry.get_program(&app).unwrap().is_stale());
    }
}
