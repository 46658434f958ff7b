//! The [`EnforcementBackend`] trait.

use std::path::Path;

use crate::error::EnforcementError;

/// Applies and removes the OS-level network block for an executable.
///
/// Calls are synchronous and may need elevated privileges. Implementations
/// must either complete the change or return an error; a failed call must
/// not leave a half-applied block behind.
pub trait EnforcementBackend: Send {
    /// Short name for logs and diagnostics.
    fn name(&self) -> &'static str;

    /// Whether this backend can enforce anything on the current host.
    fn is_available(&self) -> bool {
        true
    }

    /// Blocks network access for `path`. Succeeds if it was already blocked.
    fn apply_block(&mut self, path: &Path) -> Result<(), EnforcementError>;

    /// Lifts the block for `path`. Succeeds if it was not blocked.
    fn remove_block(&mut self, path: &Path) -> Result<(), EnforcementError>;

    /// Whether the OS currently blocks `path`. Query failures read as `false`.
    fn is_blocked(&self, path: &Path) -> bool;
}
