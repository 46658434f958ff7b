//! Backend for hosts without a supported firewall.

use std::path::Path;

use crate::error::EnforcementError;
use crate::traits::EnforcementBackend;

/// Refuses every change with [`EnforcementError::Unavailable`] so the rest
/// of the launcher keeps working without enforcement.
#[derive(Debug, Clone)]
pub struct UnavailableBackend {
    reason: String,
}

impl Default for UnavailableBackend {
    fn default() -> Self {
        UnavailableBackend::new("no supported firewall on this platform")
    }
}

impl UnavailableBackend {
    pub fn new(reason: impl Into<String>) -> Self {
        UnavailableBackend {
            reason: reason.into(),
        }
    }

    fn error(&self) -> EnforcementError {
        EnforcementError::Unavailable {
            reason: self.reason.clone(),
        }
    }
}

impl EnforcementBackend for UnavailableBackend {
    fn name(&self) -> &'static str {
        "none"
    }

    fn is_available(&self) -> bool {
        false
    }

    fn apply_block(&mut self, _path: &Path) -> Result<(), EnforcementError> {
        Err(self.error())
    }

    fn remove_block(&mut self, _path: &Path) -> Result<(), EnforcementError> {
        Err(self.error())
    }

    fn is_blocked(&self, _path: &Path) -> bool {
        false
    }
}
