//! OS-level network enforcement for tracked programs.
//!
//! The [`EnforcementBackend`] trait is the only place where firewall
//! privileges come into play. Backends are pluggable strategies:
//!
//! - [`NetshBackend`]: Windows Defender Firewall rules via `netsh advfirewall`
//! - [`SocketFilterBackend`]: the macOS application firewall via `socketfilterfw`
//! - [`InMemoryBackend`]: shared in-process state for tests
//! - [`UnavailableBackend`]: fails every change cleanly on platforms without
//!   a supported firewall
//!
//! External commands run through [`CommandRunner`], which bounds every call
//! with a timeout instead of letting a stuck firewall tool hang the caller.

pub mod command;
pub mod error;
pub mod memory;
pub mod netsh;
pub mod select;
pub mod socketfilter;
pub mod traits;
pub mod unavailable;

pub use command::{CommandOutput, CommandRunner};
pub use error::EnforcementError;
pub use memory::{FailMode, InMemoryBackend};
pub use netsh::NetshBackend;
pub use select::{backend_for, BackendKind, ParseBackendKindError};
pub use socketfilter::SocketFilterBackend;
pub use traits::EnforcementBackend;
pub use unavailable::UnavailableBackend;
