//! Persistence for the offline launcher's program registry.
//!
//! Provides the [`ProgramStore`] trait defining the storage contract, plus
//! three first-class backends:
//! - [`JsonFileStore`]: a single JSON document replaced atomically on save
//! - [`SqliteStore`]: a SQLite database with migrations, one transaction per save
//! - [`InMemoryStore`]: shared in-process state for tests and ephemeral use
//!
//! Every backend stores the full ordered list of `(path, status)` pairs and
//! a [`Revision`] stamp. A save that names the revision it loaded fails with
//! [`StorageError::StaleRevision`] if another writer got there first.
//!
//! # Modules
//!
//! - [`error`]: StorageError enum with all failure modes
//! - [`types`]: Revision, StoredProgram, StoreSnapshot
//! - [`traits`]: ProgramStore trait definition
//! - [`json`]: JsonFileStore implementation
//! - [`memory`]: InMemoryStore implementation
//! - [`schema`]: SQL migrations and connection setup
//! - [`sqlite`]: SqliteStore implementation

pub mod error;
pub mod json;
pub mod memory;
pub mod schema;
pub mod sqlite;
pub mod traits;
pub mod types;

// Re-export key types for ergonomic use.
pub use error::StorageError;
pub use json::JsonFileStore;
pub use memory::InMemoryStore;
pub use sqlite::SqliteStore;
pub use traits::ProgramStore;
pub use types::{Revision, StoreSnapshot, StoredProgram};
