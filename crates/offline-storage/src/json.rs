//! JSON-file implementation of [`ProgramStore`].
//!
//! The whole registry lives in one pretty-printed document:
//!
//! ```json
//! {
//!   "format": 1,
//!   "revision": 3,
//!   "programs": [
//!     { "path": "C:\\apps\\a.exe", "status": "deactivated" }
//!   ]
//! }
//! ```
//!
//! Saves write a temp file next to the target, fsync it, then rename it over
//! the target, so a crash mid-write leaves either the old or the new document.

use std::fs;
use std::io::{self, Write};
use std::path::{Path, PathBuf};
use std::time::{SystemTime, UNIX_EPOCH};

use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

use crate::error::StorageError;
use crate::traits::ProgramStore;
use crate::types::{Revision, StoreSnapshot, StoredProgram};

/// Current document format. Bumped on incompatible layout changes.
pub const FORMAT_VERSION: u32 = 1;

#[derive(Debug, Deserialize)]
struct StoreDocument {
    format: u32,
    revision: Revision,
    programs: Vec<StoredProgram>,
}

#[derive(Debug, Serialize)]
struct StoreDocumentRef<'a> {
    format: u32,
    revision: Revision,
    programs: &'a [StoredProgram],
}

/// File-backed store holding a single JSON document.
#[derive(Debug, Clone)]
pub struct JsonFileStore {
    path: PathBuf,
}

impl JsonFileStore {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        JsonFileStore { path: path.into() }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Reads and parses the document. `Ok(None)` when the file is absent.
    fn read_document(&self) -> Result<Option<StoreDocument>, StorageError> {
        let bytes = match fs::read(&self.path) {
            Ok(bytes) => bytes,
            Err(err) if err.kind() == io::ErrorKind::NotFound => return Ok(None),
            Err(err) => return Err(StorageError::io(self.location(), err)),
        };
        let document: StoreDocument = serde_json::from_slice(&bytes)
            .map_err(|err| StorageError::corrupt(self.location(), err.to_string()))?;
        if document.format != FORMAT_VERSION {
            return Err(StorageError::corrupt(
                self.location(),
                format!(
                    "unsupported format {} (expected {})",
                    document.format, FORMAT_VERSION
                ),
            ));
        }
        Ok(Some(document))
    }

    /// Revision currently on disk. Unparsable content counts as revision 0,
    /// since it can only be overwritten, never merged.
    fn durable_revision(&self) -> Result<Revision, StorageError> {
        match self.read_document() {
            Ok(document) => Ok(document.map(|d| d.revision).unwrap_or_default()),
            Err(StorageError::Corrupt { .. }) => Ok(Revision::default()),
            Err(err) => Err(err),
        }
    }

    fn write_atomic(&self, bytes: &[u8]) -> Result<(), StorageError> {
        let dir = match self.path.parent() {
            Some(parent) if !parent.as_os_str().is_empty() => parent,
            _ => Path::new("."),
        };
        let io_err = |err: io::Error| StorageError::io(self.location(), err);

        fs::create_dir_all(dir).map_err(io_err)?;
        let mut temp = tempfile::Builder::new()
            .prefix(".programs-")
            .suffix(".tmp")
            .tempfile_in(dir)
            .map_err(io_err)?;
        temp.write_all(bytes).map_err(io_err)?;
        temp.as_file().sync_all().map_err(io_err)?;
        temp.persist(&self.path).map_err(|err| io_err(err.error))?;

        debug!(path = %self.path.display(), "atomic write completed");
        Ok(())
    }
}

impl ProgramStore for JsonFileStore {
    fn location(&self) -> String {
        self.path.display().to_string()
    }

    fn load(&mut self) -> Result<StoreSnapshot, StorageError> {
        Ok(match self.read_document()? {
            Some(document) => StoreSnapshot {
                revision: document.revision,
                programs: document.programs,
            },
            None => StoreSnapshot::default(),
        })
    }

    fn save(
        &mut self,
        programs: &[StoredProgram],
        expected: Option<Revision>,
    ) -> Result<Revision, StorageError> {
        let found = self.durable_revision()?;
        if let Some(expected) = expected {
            if expected != found {
                return Err(StorageError::StaleRevision { expected, found });
            }
        }

        let revision = found.next();
        let document = StoreDocumentRef {
            format: FORMAT_VERSION,
            revision,
            programs,
        };
        let mut bytes = serde_json::to_vec_pretty(&document)?;
        bytes.push(b'\n');
        self.write_atomic(&bytes)?;
        Ok(revision)
    }

    fn quarantine(&mut self) -> Result<Option<PathBuf>, StorageError> {
        if !self.path.exists() {
            return Ok(None);
        }
        let stamp = SystemTime::now()
            .duration_since(UNIX_EPOCH)
            .map(|d| d.as_secs())
            .unwrap_or_default();
        let mut name = self.path.file_name().unwrap_or_default().to_os_string();
        name.push(format!(".corrupt-{stamp}"));
        let target = self.path.with_file_name(name);

        fs::rename(&self.path, &target).map_err(|err| StorageError::io(self.location(), err))?;
        warn!(from = %self.path.display(), to = %target.display(), "moved unreadable program store aside");
        Ok(Some(target))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use offline_core::ProgramStatus;

    fn store_in(dir: &tempfile::TempDir) -> JsonFileStore {
        JsonFileStore::new(dir.path().join("programs.json"))
    }

    #[test]
    fn missing_file_loads_empty_at_revision_zero() {
        let dir = tempfile::tempdir().unwrap();
        let snapshot = store_in(&dir).load().unwrap();
        assert_eq!(snapshot, StoreSnapshot::default());
    }

    #[test]
    fn document_format_is_stable() {
        let dir = tempfile::tempdir().unwrap();
        let mut store = store_in(&dir);
        store
            .save(
                &[
                    StoredProgram::new("/apps/a.exe", ProgramStatus::Deactivated),
                    StoredProgram::new("/apps/b.exe", ProgramStatus::AlwaysActive),
                ],
                Some(Revision(0)),
            )
            .unwrap();

        let text = fs::read_to_string(store.path()).unwrap();
        insta::assert_snapshot!(text.trim_end(), @r###"
        {
          "format": 1,
          "revision": 1,
          "programs": [
            {
              "path": "/apps/a.exe",
              "status": "deactivated"
            },
            {
              "path": "/apps/b.exe",
              "status": "always_active"
            }
          ]
        }
        "###);
    }

    #[test]
    fn save_bumps_revision_and_checks_expected() {
        let dir = tempfile::tempdir().unwrap();
        let mut store = store_in(&dir);
        let first = store.save(&[], Some(Revision(0))).unwrap();
        assert_eq!(first, Revision(1));

        let err = store.save(&[], Some(Revision(0))).unwrap_err();
        assert!(matches!(
            err,
            StorageError::StaleRevision {
                expected: Revision(0),
                found: Revision(1)
            }
        ));

        let forced = store.save(&[], None).unwrap();
        assert_eq!(forced, Revision(2));
    }

    #[test]
    fn garbage_is_reported_as_corrupt() {
        let dir = tempfile::tempdir().unwrap();
        let mut store = store_in(&dir);
        fs::write(store.path(), b"{ not json").unwrap();
        assert!(matches!(store.load(), Err(StorageError::Corrupt { .. })));
    }

    #[test]
    fn unknown_status_is_reported_as_corrupt() {
        let dir = tempfile::tempdir().unwrap();
        let mut store = store_in(&dir);
        fs::write(
            store.path(),
            br#"{"format":1,"revision":4,"programs":[{"path":"/a","status":"paused"}]}"#,
        )
        .unwrap();
        assert!(matches!(store.load(), Err(StorageError::Corrupt { .. })));
    }

    #[test]
    fn future_format_is_rejected() {
        let dir = tempfile::tempdir().unwrap();
        let mut store = store_in(&dir);
        fs::write(store.path(), br#"{"format":2,"revision":1,"programs":[]}"#).unwrap();
        let err = store.load().unwrap_err();
        assert!(err.to_string().contains("unsupported format 2"));
    }

    #[test]
    fn quarantine_moves_file_aside() {
        let dir = tempfile::tempdir().unwrap();
        let mut store = store_in(&dir);
        fs::write(store.path(), b"garbage").unwrap();

        let moved = store.quarantine().unwrap().unwrap();
        assert!(!store.path().exists());
        assert_eq!(fs::read(&moved).unwrap(), b"garbage");
        assert!(moved
            .file_name()
            .unwrap()
            .to_string_lossy()
            .starts_with("programs.json.corrupt-"));
        assert_eq!(store.quarantine().unwrap(), None);
    }

    #[test]
    fn corrupt_file_can_be_overwritten_unconditionally() {
        let dir = tempfile::tempdir().unwrap();
        let mut store = store_in(&dir);
        fs::write(store.path(), b"garbage").unwrap();
        let revision = store
            .save(&[StoredProgram::new("/a", ProgramStatus::SessionActive)], None)
            .unwrap();
        assert_eq!(revision, Revision(1));
        assert_eq!(store.load().unwrap().programs.len(), 1);
    }

    #[test]
    fn no_temp_files_left_behind() {
        let dir = tempfile::tempdir().unwrap();
        let mut store = store_in(&dir);
        store.save(&[], None).unwrap();
        store.save(&[], None).unwrap();
        let names: Vec<_> = fs::read_dir(dir.path())
            .unwrap()
            .map(|entry| entry.unwrap().file_name())
            .collect();
        assert_eq!(names, vec![std::ffi::OsString::from("programs.json")]);
    }
}
