//! Enforcement error types for offline-enforce.

use std::path::PathBuf;
use std::time::Duration;

use thiserror::Error;

/// Errors produced when changing or querying OS-level enforcement.
#[derive(Debug, Error)]
pub enum EnforcementError {
    /// The OS refused the change; retrying with elevated privileges may work.
    #[error("permission denied changing firewall rule for {}: {detail}", .path.display())]
    PermissionDenied { path: PathBuf, detail: String },

    /// No enforcement mechanism exists on this host.
    #[error("no firewall backend available ({reason})")]
    Unavailable { reason: String },

    /// The firewall tool did not finish in time and was killed.
    #[error("`{command}` did not finish within {}s", .timeout.as_secs_f32())]
    Timeout { command: String, timeout: Duration },

    /// The firewall tool ran but reported failure.
    #[error("`{command}` failed with {}: {output}", exit_description(.exit_code))]
    CommandFailed {
        command: String,
        exit_code: Option<i32>,
        output: String,
    },

    /// The firewall tool could not be started.
    #[error("failed to run `{command}`: {source}")]
    Io {
        command: String,
        #[source]
        source: std::io::Error,
    },
}

fn exit_description(code: &Option<i32>) -> String {
    match code {
        Some(code) => format!("exit code {code}"),
        None => "no exit code".to_string(),
    }
}

impl EnforcementError {
    /// True when elevating privileges is the likely fix.
    pub fn is_permission_denied(&self) -> bool {
        matches!(self, EnforcementError::PermissionDenied { .. })
    }
}
