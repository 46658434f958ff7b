//! Windows Defender Firewall backend.
//!
//! Each blocked program gets two rules (outbound and inbound) sharing the
//! name `OfflineLauncher: <path>`, so a single `delete rule name=...` lifts
//! both. A block counts only while both rules exist; a missing one is
//! re-added on the next block. Argument strings are passed verbatim on Windows because netsh
//! expects `name="..."` with the quotes inside the token, which the
//! standard argument quoting would mangle.

use std::path::Path;
use std::process::Command;
use std::time::Duration;

use tracing::{debug, info, warn};

use crate::command::CommandRunner;
use crate::error::EnforcementError;
use crate::traits::EnforcementBackend;

/// Prefix of every rule this backend creates.
pub const RULE_PREFIX: &str = "OfflineLauncher: ";

const NETSH: &str = "netsh";

/// Traffic direction of a firewall rule.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Direction {
    Out,
    In,
}

/// Both directions, in the order rules are added.
const DIRECTIONS: [Direction; 2] = [Direction::Out, Direction::In];

impl Direction {
    fn as_str(self) -> &'static str {
        match self {
            Direction::Out => "out",
            Direction::In => "in",
        }
    }
}

/// Rule name for `path`.
pub fn rule_name(path: &Path) -> String {
    format!("{RULE_PREFIX}{}", path.display())
}

/// Arguments adding a block rule for `path` in `direction`.
pub fn add_rule_args(path: &Path, direction: Direction) -> Vec<String> {
    vec![
        "advfirewall".into(),
        "firewall".into(),
        "add".into(),
        "rule".into(),
        format!("name=\"{}\"", rule_name(path)),
        format!("dir={}", direction.as_str()),
        "action=block".into(),
        format!("program=\"{}\"", path.display()),
        "enable=yes".into(),
    ]
}

/// Arguments deleting the rules for `path`, optionally only one direction.
pub fn delete_rule_args(path: &Path, direction: Option<Direction>) -> Vec<String> {
    let mut args = vec![
        "advfirewall".into(),
        "firewall".into(),
        "delete".into(),
        "rule".into(),
        format!("name=\"{}\"", rule_name(path)),
    ];
    if let Some(direction) = direction {
        args.push(format!("dir={}", direction.as_str()));
    }
    args
}

/// Arguments listing the rule for `path` in `direction`.
pub fn show_rule_args(path: &Path, direction: Direction) -> Vec<String> {
    vec![
        "advfirewall".into(),
        "firewall".into(),
        "show".into(),
        "rule".into(),
        format!("name=\"{}\"", rule_name(path)),
        format!("dir={}", direction.as_str()),
    ]
}

/// netsh reports a missing rule as a failure; for deletes that is success.
fn is_no_match(output: &str) -> bool {
    output.to_lowercase().contains("no rules match")
}

/// Blocks programs with `netsh advfirewall firewall` rules.
#[derive(Debug, Clone, Default)]
pub struct NetshBackend {
    runner: CommandRunner,
}

impl NetshBackend {
    pub fn new(timeout: Duration) -> Self {
        NetshBackend {
            runner: CommandRunner::new(timeout),
        }
    }

    fn command(args: &[String]) -> Command {
        let mut command = Command::new(NETSH);
        #[cfg(windows)]
        {
            use std::os::windows::process::CommandExt;
            for arg in args {
                command.raw_arg(arg);
            }
        }
        #[cfg(not(windows))]
        {
            command.args(args);
        }
        command
    }

    fn rule_exists(&self, path: &Path, direction: Direction) -> Result<bool, EnforcementError> {
        let output = self
            .runner
            .run(Self::command(&show_rule_args(path, direction)))?;
        Ok(output.success() && !is_no_match(&output.combined()))
    }

    fn missing_directions(&self, path: &Path) -> Result<Vec<Direction>, EnforcementError> {
        let mut missing = Vec::new();
        for direction in DIRECTIONS {
            if !self.rule_exists(path, direction)? {
                missing.push(direction);
            }
        }
        Ok(missing)
    }

    fn delete(&self, path: &Path, direction: Option<Direction>) -> Result<(), EnforcementError> {
        match self
            .runner
            .run_checked(path, Self::command(&delete_rule_args(path, direction)))
        {
            Ok(_) => Ok(()),
            Err(EnforcementError::CommandFailed { output, .. }) if is_no_match(&output) => {
                debug!(path = %path.display(), "no firewall rule to delete");
                Ok(())
            }
            Err(err) => Err(err),
        }
    }
}

impl EnforcementBackend for NetshBackend {
    fn name(&self) -> &'static str {
        "netsh"
    }

    fn is_available(&self) -> bool {
        cfg!(windows)
    }

    fn apply_block(&mut self, path: &Path) -> Result<(), EnforcementError> {
        let missing = self.missing_directions(path)?;
        if missing.is_empty() {
            debug!(path = %path.display(), "firewall rules already present");
            return Ok(());
        }

        let mut added = Vec::new();
        for direction in missing {
            if let Err(err) = self
                .runner
                .run_checked(path, Self::command(&add_rule_args(path, direction)))
            {
                for done in added {
                    if let Err(rollback) = self.delete(path, Some(done)) {
                        warn!(path = %path.display(), direction = done.as_str(), error = %rollback, "failed to roll back firewall rule");
                    }
                }
                return Err(err);
            }
            added.push(direction);
        }

        info!(path = %path.display(), rules = added.len(), "added firewall block rules");
        Ok(())
    }

    fn remove_block(&mut self, path: &Path) -> Result<(), EnforcementError> {
        self.delete(path, None)?;
        info!(path = %path.display(), "removed firewall block rules");
        Ok(())
    }

    fn is_blocked(&self, path: &Path) -> bool {
        match self.missing_directions(path) {
            Ok(missing) => missing.is_empty(),
            Err(err) => {
                warn!(path = %path.display(), error = %err, "firewall rule query failed");
                false
            }
        }
    }
}
