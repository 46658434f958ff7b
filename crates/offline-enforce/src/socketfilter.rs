//! macOS application firewall backend.
//!
//! `socketfilterfw` governs incoming connections only; outbound traffic of a
//! blocked app is not filtered by the OS firewall. The tool needs root and
//! tends to exit 0 even when it refuses, so output is always inspected.

use std::path::{Path, PathBuf};
use std::process::Command;
use std::time::Duration;

use tracing::{info, warn};

use crate::command::CommandRunner;
use crate::error::EnforcementError;
use crate::traits::EnforcementBackend;

/// Default location of the firewall tool.
pub const SOCKETFILTERFW: &str = "/usr/libexec/ApplicationFirewall/socketfilterfw";

/// Reads `--getappblocked` output. Unrecognized text counts as not blocked.
pub fn parse_blocked_output(output: &str) -> bool {
    let lowered = output.to_lowercase();
    if lowered.contains("permitted") || lowered.contains("not blocked") {
        return false;
    }
    lowered.contains("blocked")
}

/// Blocks programs through the macOS application firewall.
#[derive(Debug, Clone)]
pub struct SocketFilterBackend {
    tool: PathBuf,
    runner: CommandRunner,
}

impl SocketFilterBackend {
    pub fn new(timeout: Duration) -> Self {
        Self::with_tool(SOCKETFILTERFW, timeout)
    }

    /// Uses a different `socketfilterfw` binary.
    pub fn with_tool(tool: impl Into<PathBuf>, timeout: Duration) -> Self {
        SocketFilterBackend {
            tool: tool.into(),
            runner: CommandRunner::new(timeout),
        }
    }

    fn command(&self, flag: &str, path: &Path) -> Command {
        let mut command = Command::new(&self.tool);
        command.arg(flag).arg(path);
        command
    }
}

impl EnforcementBackend for SocketFilterBackend {
    fn name(&self) -> &'static str {
        "socketfilterfw"
    }

    fn is_available(&self) -> bool {
        cfg!(target_os = "macos") && self.tool.is_file()
    }

    fn apply_block(&mut self, path: &Path) -> Result<(), EnforcementError> {
        // The app must be known to the firewall before it can be blocked.
        self.runner.run_checked(path, self.command("--add", path))?;
        self.runner
            .run_checked(path, self.command("--blockapp", path))?;
        info!(path = %path.display(), "blocked incoming connections");
        Ok(())
    }

    fn remove_block(&mut self, path: &Path) -> Result<(), EnforcementError> {
        self.runner
            .run_checked(path, self.command("--unblockapp", path))?;
        info!(path = %path.display(), "unblocked incoming connections");
        Ok(())
    }

    fn is_blocked(&self, path: &Path) -> bool {
        match self
            .runner
            .run_checked(path, self.command("--getappblocked", path))
        {
            Ok(output) => parse_blocked_output(&output.combined()),
            Err(err) => {
                warn!(path = %path.display(), error = %err, "firewall query failed");
                false
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn blocked_output_is_parsed() {
        assert!(parse_blocked_output(
            "The application /Applications/Game.app is blocked"
        ));
        assert!(!parse_blocked_output(
            "The application /Applications/Game.app is permitted"
        ));
        assert!(!parse_blocked_output("Game.app is not blocked"));
        assert!(!parse_blocked_output(""));
    }

    #[cfg(unix)]
    #[test]
    fn tool_failures_are_typed() {
        let dir = tempfile::tempdir().unwrap();
        let tool = dir.path().join("socketfilterfw");
        std::fs::write(&tool, "#!/bin/sh\necho 'Must be root to change settings.'\n").unwrap();
        {
            use std::os::unix::fs::PermissionsExt;
            std::fs::set_permissions(&tool, std::fs::Permissions::from_mode(0o755)).unwrap();
        }

        let mut backend = SocketFilterBackend::with_tool(&tool, Duration::from_secs(5));
        let err = backend.apply_block(Path::new("/Applications/Game.app")).unwrap_err();
        assert!(err.is_permission_denied(), "{err:?}");
        assert!(!backend.is_blocked(Path::new("/Applications/Game.app")));
    }
}
