//! Network-access status of a tracked program and its state machine.
//!
//! ```text
//!   AlwaysActive  --block-->       Deactivated
//!   Deactivated   --allow_always-> AlwaysActive
//!   SessionActive --block-->       Deactivated
//!   Deactivated   --unblock-->     SessionActive
//! ```
//!
//! There is no edge between `AlwaysActive` and `SessionActive`. Repeating a
//! transition that lands in the current state is allowed: callers use it to
//! re-confirm enforcement.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::error::CoreError;

/// Network-access status of a tracked program.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ProgramStatus {
    /// Unblocked, and meant to stay that way across restarts.
    AlwaysActive,
    /// Unblocked for the current run. Initial state of a new record.
    #[default]
    SessionActive,
    /// Network access blocked; enforcement is expected to be active.
    Deactivated,
}

/// A status-changing intent.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Transition {
    Block,
    Unblock,
    AllowAlways,
}

impl ProgramStatus {
    /// All statuses, in display order.
    pub const ALL: [ProgramStatus; 3] = [
        ProgramStatus::AlwaysActive,
        ProgramStatus::SessionActive,
        ProgramStatus::Deactivated,
    ];

    /// Returns the status reached by applying `transition` to `self`.
    ///
    /// `Unblock` on an already active record keeps its flavour of "active";
    /// only a deactivated record falls back to `SessionActive`.
    pub fn apply(self, transition: Transition) -> Result<ProgramStatus, CoreError> {
        use ProgramStatus::*;
        match (self, transition) {
            (_, Transition::Block) => Ok(Deactivated),
            (Deactivated, Transition::Unblock) => Ok(SessionActive),
            (active, Transition::Unblock) => Ok(active),
            (Deactivated | AlwaysActive, Transition::AllowAlways) => Ok(AlwaysActive),
            (SessionActive, Transition::AllowAlways) => Err(CoreError::InvalidTransition {
                from: self,
                transition,
            }),
        }
    }

    /// True when the OS should be blocking this program.
    pub fn is_blocked(self) -> bool {
        self == ProgramStatus::Deactivated
    }

    /// Stable identifier used in stores and on the command line.
    pub fn as_str(self) -> &'static str {
        match self {
            ProgramStatus::AlwaysActive => "always_active",
            ProgramStatus::SessionActive => "session_active",
            ProgramStatus::Deactivated => "deactivated",
        }
    }
}

impl fmt::Display for ProgramStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(display_attribute(*self).label)
    }
}

impl FromStr for ProgramStatus {
    type Err = CoreError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        ProgramStatus::ALL
            .into_iter()
            .find(|status| status.as_str() == s)
            .ok_or_else(|| CoreError::UnknownStatus {
                value: s.to_string(),
            })
    }
}

impl fmt::Display for Transition {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Transition::Block => "block",
            Transition::Unblock => "unblock",
            Transition::AllowAlways => "always allow",
        })
    }
}

/// Color a presentation layer should use for a status.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum StatusColor {
    Green,
    Default,
    Red,
}

/// How a status is shown to the user, independent of any widget toolkit.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct DisplayAttribute {
    pub color: StatusColor,
    pub label: &'static str,
}

/// Maps a status to its display attribute.
pub fn display_attribute(status: ProgramStatus) -> DisplayAttribute {
    match status {
        ProgramStatus::AlwaysActive => DisplayAttribute {
            color: StatusColor::Green,
            label: "always active",
        },
        ProgramStatus::SessionActive => DisplayAttribute {
            color: StatusColor::Default,
            label: "session active",
        },
        ProgramStatus::Deactivated => DisplayAttribute {
            color: StatusColor::Red,
            label: "blocked",
        },
    }
}
