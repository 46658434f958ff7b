//! Choosing a backend for the current host.

use std::fmt;
use std::str::FromStr;
use std::time::Duration;

use thiserror::Error;

use crate::netsh::NetshBackend;
use crate::socketfilter::SocketFilterBackend;
use crate::traits::EnforcementBackend;
use crate::unavailable::UnavailableBackend;

/// Which enforcement backend to construct.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum BackendKind {
    /// The platform's native firewall, or none where unsupported.
    #[default]
    Auto,
    Netsh,
    SocketFilter,
    None,
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("unknown backend '{0}' (expected auto, netsh, socketfilterfw or none)")]
pub struct ParseBackendKindError(pub String);

impl FromStr for BackendKind {
    type Err = ParseBackendKindError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "auto" => Ok(BackendKind::Auto),
            "netsh" => Ok(BackendKind::Netsh),
            "socketfilterfw" | "socketfilter" => Ok(BackendKind::SocketFilter),
            "none" => Ok(BackendKind::None),
            _ => Err(ParseBackendKindError(s.to_string())),
        }
    }
}

impl fmt::Display for BackendKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            BackendKind::Auto => "auto",
            BackendKind::Netsh => "netsh",
            BackendKind::SocketFilter => "socketfilterfw",
            BackendKind::None => "none",
        })
    }
}

/// Builds the backend for `kind`, resolving `Auto` against the host OS.
pub fn backend_for(kind: BackendKind, timeout: Duration) -> Box<dyn EnforcementBackend> {
    match kind {
        BackendKind::Auto if cfg!(windows) => Box::new(NetshBackend::new(timeout)),
        BackendKind::Auto if cfg!(target_os = "macos") => {
            Box::new(SocketFilterBackend::new(timeout))
        }
        BackendKind::Auto => Box::new(UnavailableBackend::default()),
        BackendKind::Netsh => Box::new(NetshBackend::new(timeout)),
        BackendKind::SocketFilter => Box::new(SocketFilterBackend::new(timeout)),
        BackendKind::None => Box::new(UnavailableBackend::new("enforcement disabled")),
    }
}
