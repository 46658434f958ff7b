//! Disagreement between stored status and the OS firewall.

use std::fmt;
use std::path::PathBuf;

use offline_core::ProgramStatus;

/// How a record and the firewall disagree.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DriftKind {
    /// The record is deactivated but the OS does not block it.
    MissingBlock,
    /// The record is active but the OS blocks it.
    UnexpectedBlock,
}

/// One drifted record.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Drift {
    pub path: PathBuf,
    pub status: ProgramStatus,
    pub kind: DriftKind,
}

impl Drift {
    /// Compares a stored status with what the OS reports.
    pub fn detect(path: PathBuf, status: ProgramStatus, os_blocked: bool) -> Option<Drift> {
        let kind = match (status.is_blocked(), os_blocked) {
            (true, false) => DriftKind::MissingBlock,
            (false, true) => DriftKind::UnexpectedBlock,
            _ => return None,
        };
        Some(Drift { path, status, kind })
    }
}

impl fmt::Display for Drift {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.kind {
            DriftKind::MissingBlock => write!(
                f,
                "{} is {} but the firewall does not block it",
                self.path.display(),
                self.status
            ),
            DriftKind::UnexpectedBlock => write!(
                f,
                "{} is {} but the firewall blocks it",
                self.path.display(),
                self.status
            ),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn agreement_is_not_drift() {
        let path = PathBuf::from("/apps/game");
        assert_eq!(Drift::detect(path.clone(), ProgramStatus::Deactivated, true), None);
        assert_eq!(Drift::detect(path.clone(), ProgramStatus::AlwaysActive, false), None);

        let missing = Drift::detect(path.clone(), ProgramStatus::Deactivated, false).unwrap();
        assert_eq!(missing.kind, DriftKind::MissingBlock);
        assert_eq!(missing.to_string(), "/apps/game is blocked but the firewall does not block it");

        let unexpected = Drift::detect(path, ProgramStatus::SessionActive, true).unwrap();
        assert_eq!(unexpected.kind, DriftKind::UnexpectedBlock);
    }
}
