//! The program registry of the offline launcher.
//!
//! [`ProgramRegistry`] owns the ordered list of tracked executables and keeps
//! three things in step: the in-memory records, the durable store
//! (write-through after every mutation), and the OS firewall reached through
//! an enforcement backend. A status only changes after the backend has
//! confirmed the matching block or unblock.

pub mod batch;
pub mod config;
pub mod drift;
pub mod error;
pub mod launcher;
pub mod registry;

pub use batch::{BatchReport, SkipReason};
pub use config::{ConfigError, LauncherConfig, StoreKind};
pub use drift::{Drift, DriftKind};
pub use error::RegistryError;
pub use registry::{LoadReport, ProgramRegistry};
