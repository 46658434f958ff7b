//! Core error types for offline-core.
//!
//! Uses `thiserror` for structured, matchable error variants covering the
//! failure modes of the record model and the status state machine.

use thiserror::Error;

use crate::status::{ProgramStatus, Transition};

/// Core errors produced by the offline-core crate.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum CoreError {
    /// A record was constructed with an empty path.
    #[error("program path must not be empty")]
    EmptyPath,

    /// The requested transition does not exist in the status state machine.
    #[error("cannot {transition} a program that is {from}")]
    InvalidTransition {
        from: ProgramStatus,
        transition: Transition,
    },

    /// A status string did not name one of the three statuses.
    #[error("unknown program status: '{value}'")]
    UnknownStatus { value: String },
}
