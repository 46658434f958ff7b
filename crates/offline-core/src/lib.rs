//! Core data model for the offline launcher.
//!
//! A tracked executable is a [`ProgramRecord`]: its absolute path (the
//! identity), its network-access [`ProgramStatus`], and a derived
//! [`IconHandle`]. Status changes go through the pure state machine in
//! [`status`], so every layer above agrees on which transitions exist.

pub mod error;
pub mod icon;
pub mod path;
pub mod record;
pub mod status;

// Re-export commonly used types
pub use error::CoreError;
pub use icon::{IconHandle, IconKind};
pub use record::ProgramRecord;
pub use status::{display_attribute, DisplayAttribute, ProgramStatus, StatusColor, Transition};
