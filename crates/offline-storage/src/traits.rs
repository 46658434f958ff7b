//! The [`ProgramStore`] trait defining the persistence contract.
//!
//! The registry always writes its whole ordered sequence; stores never see
//! partial updates. All backends (JsonFileStore, SqliteStore,
//! InMemoryStore) implement this trait and are fully swappable.

use std::path::PathBuf;

use crate::error::StorageError;
use crate::types::{Revision, StoreSnapshot, StoredProgram};

/// The storage contract for the program registry.
///
/// The trait is synchronous: the registry is single-threaded and every
/// save completes before the next operation is accepted. Implementations
/// must not be shared between concurrent writers within one process.
pub trait ProgramStore: Send {
    /// Human-readable location used in log and error messages.
    fn location(&self) -> String;

    /// Reads the full store.
    ///
    /// A store that does not exist yet is not an error: it loads as an empty
    /// snapshot at revision 0.
    fn load(&mut self) -> Result<StoreSnapshot, StorageError>;

    /// Replaces the stored sequence with `programs`, atomically.
    ///
    /// With `expected = Some(r)` the write only happens if the durable
    /// revision is still `r`; otherwise [`StorageError::StaleRevision`] is
    /// returned and nothing is written. `None` writes unconditionally.
    /// Returns the new revision.
    fn save(
        &mut self,
        programs: &[StoredProgram],
        expected: Option<Revision>,
    ) -> Result<Revision, StorageError>;

    /// Moves unparsable content aside so the next save starts clean.
    ///
    /// Returns where the content went, if anywhere.
    fn quarantine(&mut self) -> Result<Option<PathBuf>, StorageError> {
        Ok(None)
    }
}
