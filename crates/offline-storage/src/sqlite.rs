//! SQLite implementation of [`ProgramStore`].
//!
//! [`SqliteStore`] keeps one row per program (ordered by `position`) and a
//! single-row `store_meta` table holding the revision. Every save is one
//! IMMEDIATE transaction: it takes the write lock, checks the revision,
//! rewrites all rows and bumps the revision, so concurrent writers in other
//! processes are detected rather than interleaved.
//!
//! The connection is opened lazily so a damaged database file surfaces as
//! [`StorageError::Corrupt`] from `load`, like the JSON backend does.

use std::fs;
use std::io;
use std::path::{Path, PathBuf};
use std::time::{SystemTime, UNIX_EPOCH};

use rusqlite::{params, Connection, ErrorCode, TransactionBehavior};
use tracing::{debug, warn};

use offline_core::ProgramStatus;

use crate::error::StorageError;
use crate::traits::ProgramStore;
use crate::types::{Revision, StoreSnapshot, StoredProgram};

/// SQLite-backed implementation of [`ProgramStore`].
pub struct SqliteStore {
    /// Database file; `None` for in-memory databases.
    path: Option<PathBuf>,
    conn: Option<Connection>,
}

impl SqliteStore {
    /// Uses the database at `path`, creating it on first access.
    pub fn open(path: impl Into<PathBuf>) -> Self {
        SqliteStore {
            path: Some(path.into()),
            conn: None,
        }
    }

    /// Opens an in-memory SQLite database (for testing).
    pub fn in_memory() -> Result<Self, StorageError> {
        Ok(SqliteStore {
            path: None,
            conn: Some(crate::schema::open_in_memory()?),
        })
    }

    // -----------------------------------------------------------------------
    // Internal helpers
    // -----------------------------------------------------------------------

    fn connection(&mut self) -> Result<&mut Connection, StorageError> {
        let conn = match self.conn.take() {
            Some(conn) => conn,
            None => match &self.path {
                Some(path) => crate::schema::open_database(path)?,
                None => crate::schema::open_in_memory()?,
            },
        };
        Ok(self.conn.insert(conn))
    }

    /// Reclassifies "this is not a database" failures as corrupt content.
    fn classify(&self, err: StorageError) -> StorageError {
        match &err {
            StorageError::Sqlite(inner)
                if matches!(
                    inner.sqlite_error_code(),
                    Some(ErrorCode::NotADatabase | ErrorCode::DatabaseCorrupt)
                ) =>
            {
                StorageError::corrupt(self.location(), inner.to_string())
            }
            _ => err,
        }
    }

    fn load_inner(&mut self) -> Result<StoreSnapshot, StorageError> {
        let location = self.location();
        let conn = self.connection()?;
        let revision = read_revision(conn, &location)?;

        let mut stmt = conn.prepare_cached("SELECT path, status FROM programs ORDER BY position")?;
        let rows = stmt.query_map([], |row| {
            let path: String = row.get(0)?;
            let status: String = row.get(1)?;
            Ok((path, status))
        })?;

        let mut programs = Vec::new();
        for row in rows {
            let (path, status) = row?;
            let status: ProgramStatus = status
                .parse()
                .map_err(|err: offline_core::CoreError| {
                    StorageError::corrupt(location.as_str(), err.to_string())
                })?;
            programs.push(StoredProgram::new(PathBuf::from(path), status));
        }
        Ok(StoreSnapshot { revision, programs })
    }

    fn save_inner(
        &mut self,
        programs: &[StoredProgram],
        expected: Option<Revision>,
    ) -> Result<Revision, StorageError> {
        let location = self.location();
        let rows = programs
            .iter()
            .map(|program| Ok((path_text(&program.path, &location)?, program.status.as_str())))
            .collect::<Result<Vec<_>, StorageError>>()?;

        let conn = self.connection()?;
        let tx = conn.transaction_with_behavior(TransactionBehavior::Immediate)?;

        let found = read_revision(&tx, &location)?;
        if let Some(expected) = expected {
            if expected != found {
                return Err(StorageError::StaleRevision { expected, found });
            }
        }
        let revision = found.next();

        tx.execute("DELETE FROM programs", [])?;
        {
            let mut stmt = tx.prepare_cached(
                "INSERT INTO programs (position, path, status) VALUES (?1, ?2, ?3)",
            )?;
            for (position, (path, status)) in rows.iter().enumerate() {
                stmt.execute(params![position as i64, path, status])?;
            }
        }
        tx.execute(
            "UPDATE store_meta SET revision = ?1 WHERE id = 0",
            params![revision.0 as i64],
        )?;
        tx.commit()?;

        debug!(store = %location, %revision, count = rows.len(), "saved programs");
        Ok(revision)
    }
}

fn read_revision(conn: &Connection, location: &str) -> Result<Revision, StorageError> {
    let raw: i64 = conn.query_row("SELECT revision FROM store_meta WHERE id = 0", [], |row| {
        row.get(0)
    })?;
    u64::try_from(raw)
        .map(Revision)
        .map_err(|_| StorageError::corrupt(location, format!("negative revision {raw}")))
}

fn path_text<'a>(path: &'a Path, location: &str) -> Result<&'a str, StorageError> {
    path.to_str().ok_or_else(|| {
        StorageError::io(
            location,
            io::Error::new(
                io::ErrorKind::InvalidData,
                format!("path is not valid UTF-8: {}", path.display()),
            ),
        )
    })
}

impl ProgramStore for SqliteStore {
    fn location(&self) -> String {
        match &self.path {
            Some(path) => path.display().to_string(),
            None => ":memory:".to_string(),
        }
    }

    fn load(&mut self) -> Result<StoreSnapshot, StorageError> {
        self.load_inner().map_err(|err| self.classify(err))
    }

    fn save(
        &mut self,
        programs: &[StoredProgram],
        expected: Option<Revision>,
    ) -> Result<Revision, StorageError> {
        self.save_inner(programs, expected)
            .map_err(|err| self.classify(err))
    }

    fn quarantine(&mut self) -> Result<Option<PathBuf>, StorageError> {
        let Some(path) = self.path.clone() else {
            return Ok(None);
        };
        self.conn = None;
        if !path.exists() {
            return Ok(None);
        }

        let stamp = SystemTime::now()
            .duration_since(UNIX_EPOCH)
            .map(|d| d.as_secs())
            .unwrap_or_default();
        let mut name = path.file_name().unwrap_or_default().to_os_string();
        name.push(format!(".corrupt-{stamp}"));
        let target = path.with_file_name(name);

        fs::rename(&path, &target).map_err(|err| StorageError::io(self.location(), err))?;
        // Journal files belong to the quarantined database, not the next one.
        for suffix in ["-wal", "-shm"] {
            let mut sidecar = path.clone().into_os_string();
            sidecar.push(suffix);
            let _ = fs::remove_file(PathBuf::from(sidecar));
        }
        warn!(from = %path.display(), to = %target.display(), "moved unreadable program database aside");
        Ok(Some(target))
    }
}
