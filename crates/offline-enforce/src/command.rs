//! Timed execution of firewall tools.
//!
//! Firewall utilities can stall (UAC prompts, a wedged firewall service), so
//! every call is bounded. stdout and stderr are drained on their own threads
//! while the parent waits, otherwise a chatty child could fill a pipe and
//! never exit. A helper the tool leaves behind can keep those pipes open, so
//! reading them is bounded too and the drain threads are never joined.

use std::io::{ErrorKind, Read};
use std::path::Path;
use std::process::{Command, ExitStatus, Stdio};
use std::sync::mpsc::{self, Receiver, RecvTimeoutError};
use std::thread;
use std::time::{Duration, Instant};

use tracing::debug;
use wait_timeout::ChildExt;

use crate::error::EnforcementError;

/// Default bound on a single firewall command.
pub const DEFAULT_TIMEOUT: Duration = Duration::from_secs(15);

/// Extra time to collect output after a command exits near its deadline.
const OUTPUT_GRACE: Duration = Duration::from_millis(250);

/// Output markers that mean the OS refused the change for lack of privileges.
const PERMISSION_MARKERS: &[&str] = &[
    "requires elevation",
    "run as administrator",
    "access is denied",
    "must be root",
    "must be run as root",
    "permission denied",
    "operation not permitted",
];

/// Captured result of a finished command.
#[derive(Debug, Clone)]
pub struct CommandOutput {
    pub status: ExitStatus,
    pub stdout: String,
    pub stderr: String,
}

impl CommandOutput {
    pub fn success(&self) -> bool {
        self.status.success()
    }

    /// stdout and stderr joined, trimmed, for diagnostics.
    pub fn combined(&self) -> String {
        let stdout = self.stdout.trim();
        let stderr = self.stderr.trim();
        match (stdout.is_empty(), stderr.is_empty()) {
            (_, true) => stdout.to_string(),
            (true, false) => stderr.to_string(),
            (false, false) => format!("{stdout}\n{stderr}"),
        }
    }
}

/// Runs commands with captured output and a timeout.
#[derive(Debug, Clone, Copy)]
pub struct CommandRunner {
    timeout: Duration,
}

impl Default for CommandRunner {
    fn default() -> Self {
        CommandRunner::new(DEFAULT_TIMEOUT)
    }
}

impl CommandRunner {
    pub fn new(timeout: Duration) -> Self {
        CommandRunner { timeout }
    }

    pub fn timeout(&self) -> Duration {
        self.timeout
    }

    /// Runs `command` to completion. A non-zero exit is not an error here.
    pub fn run(&self, mut command: Command) -> Result<CommandOutput, EnforcementError> {
        let described = describe(&command);
        debug!(command = %described, timeout_ms = self.timeout.as_millis() as u64, "running firewall command");

        let started = Instant::now();
        let mut child = command
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .spawn()
            .map_err(|source| EnforcementError::Io {
                command: described.clone(),
                source,
            })?;

        let stdout = drain(child.stdout.take());
        let stderr = drain(child.stderr.take());

        let status = match child.wait_timeout(self.timeout) {
            Ok(Some(status)) => status,
            Ok(None) => {
                let _ = child.kill();
                let _ = child.wait();
                return Err(EnforcementError::Timeout {
                    command: described,
                    timeout: self.timeout,
                });
            }
            Err(source) => {
                let _ = child.kill();
                let _ = child.wait();
                return Err(EnforcementError::Io {
                    command: described,
                    source,
                });
            }
        };

        let deadline = (started + self.timeout).max(Instant::now() + OUTPUT_GRACE);
        let output = CommandOutput {
            status,
            stdout: collect(stdout, deadline),
            stderr: collect(stderr, deadline),
        };
        debug!(command = %described, code = ?output.status.code(), "firewall command finished");
        Ok(output)
    }

    /// Runs `command` on behalf of `path` and turns every kind of failure
    /// into a typed error.
    ///
    /// Some tools report privilege problems on stdout with a zero exit code,
    /// so the output is checked for permission markers even on success.
    pub fn run_checked(
        &self,
        path: &Path,
        command: Command,
    ) -> Result<CommandOutput, EnforcementError> {
        let described = describe(&command);
        let output = match self.run(command) {
            Ok(output) => output,
            Err(EnforcementError::Io { source, .. })
                if source.kind() == std::io::ErrorKind::PermissionDenied =>
            {
                return Err(EnforcementError::PermissionDenied {
                    path: path.to_path_buf(),
                    detail: source.to_string(),
                });
            }
            Err(err) => return Err(err),
        };

        let combined = output.combined();
        if mentions_permission(&combined) {
            return Err(EnforcementError::PermissionDenied {
                path: path.to_path_buf(),
                detail: combined,
            });
        }
        if !output.success() {
            return Err(EnforcementError::CommandFailed {
                command: described,
                exit_code: output.status.code(),
                output: combined,
            });
        }
        Ok(output)
    }
}

/// Whether tool output reads like a refused privilege check.
pub fn mentions_permission(output: &str) -> bool {
    let lowered = output.to_lowercase();
    PERMISSION_MARKERS
        .iter()
        .any(|marker| lowered.contains(marker))
}

/// Human-readable rendering of a command line for logs and errors.
pub fn describe(command: &Command) -> String {
    let mut text = command.get_program().to_string_lossy().into_owned();
    for arg in command.get_args() {
        text.push(' ');
        text.push_str(&arg.to_string_lossy());
    }
    text
}

/// Forwards everything read from `pipe` in chunks until EOF.
fn drain<R: Read + Send + 'static>(pipe: Option<R>) -> Option<Receiver<Vec<u8>>> {
    pipe.map(|mut pipe| {
        let (tx, rx) = mpsc::channel();
        thread::spawn(move || {
            let mut buf = [0u8; 4096];
            loop {
                match pipe.read(&mut buf) {
                    Ok(0) => break,
                    Ok(n) => {
                        if tx.send(buf[..n].to_vec()).is_err() {
                            break;
                        }
                    }
                    Err(err) if err.kind() == ErrorKind::Interrupted => {}
                    Err(_) => break,
                }
            }
        });
        rx
    })
}

/// Collects drained output until EOF or `deadline`, whichever comes first.
fn collect(pipe: Option<Receiver<Vec<u8>>>, deadline: Instant) -> String {
    let Some(rx) = pipe else {
        return String::new();
    };
    let mut bytes = Vec::new();
    loop {
        let remaining = deadline.saturating_duration_since(Instant::now());
        match rx.recv_timeout(remaining) {
            Ok(chunk) => bytes.extend_from_slice(&chunk),
            Err(RecvTimeoutError::Disconnected) => break,
            Err(RecvTimeoutError::Timeout) => {
                debug!("output pipe still open after the command exited");
                break;
            }
        }
    }
    String::from_utf8_lossy(&bytes).into_owned()
}
