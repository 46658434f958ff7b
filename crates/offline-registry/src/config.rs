//! Launcher configuration.
//!
//! Read from environment variables with defaults:
//! - `OFFLINE_LAUNCHER_STORE`: store file path (default:
//!   `<data dir>/offline-launcher/programs.json`, or `programs.db` for SQLite)
//! - `OFFLINE_LAUNCHER_STORE_KIND`: `json` (default) or `sqlite`
//! - `OFFLINE_LAUNCHER_BACKEND`: `auto` (default), `netsh`, `socketfilterfw`, `none`
//! - `OFFLINE_LAUNCHER_ENFORCE_TIMEOUT_SECS`: firewall command timeout (default: 15)
//!
//! Command-line flags override individual fields after loading.

use std::fmt;
use std::path::PathBuf;
use std::str::FromStr;
use std::time::Duration;

use thiserror::Error;

use offline_enforce::{backend_for, BackendKind};
use offline_storage::{JsonFileStore, ProgramStore, SqliteStore};

use crate::registry::ProgramRegistry;

pub const ENV_STORE: &str = "OFFLINE_LAUNCHER_STORE";
pub const ENV_STORE_KIND: &str = "OFFLINE_LAUNCHER_STORE_KIND";
pub const ENV_BACKEND: &str = "OFFLINE_LAUNCHER_BACKEND";
pub const ENV_ENFORCE_TIMEOUT: &str = "OFFLINE_LAUNCHER_ENFORCE_TIMEOUT_SECS";

const APP_DIR: &str = "offline-launcher";
const DEFAULT_TIMEOUT_SECS: u64 = 15;

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("invalid value '{value}' for {key}: {reason}")]
    InvalidValue {
        key: String,
        value: String,
        reason: String,
    },

    #[error("no data directory on this system; set OFFLINE_LAUNCHER_STORE")]
    NoDataDir,
}

/// Durable store format.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum StoreKind {
    #[default]
    Json,
    Sqlite,
}

impl StoreKind {
    fn default_file_name(self) -> &'static str {
        match self {
            StoreKind::Json => "programs.json",
            StoreKind::Sqlite => "programs.db",
        }
    }
}

impl FromStr for StoreKind {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "json" => Ok(StoreKind::Json),
            "sqlite" => Ok(StoreKind::Sqlite),
            _ => Err("expected json or sqlite".to_string()),
        }
    }
}

impl fmt::Display for StoreKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            StoreKind::Json => "json",
            StoreKind::Sqlite => "sqlite",
        })
    }
}

/// Where programs are stored and how they are enforced.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LauncherConfig {
    /// Explicit store path; `None` uses the per-user data directory.
    pub store_path: Option<PathBuf>,
    pub store_kind: StoreKind,
    pub backend: BackendKind,
    pub enforce_timeout: Duration,
}

impl Default for LauncherConfig {
    fn default() -> Self {
        LauncherConfig {
            store_path: None,
            store_kind: StoreKind::default(),
            backend: BackendKind::default(),
            enforce_timeout: Duration::from_secs(DEFAULT_TIMEOUT_SECS),
        }
    }
}

impl LauncherConfig {
    /// Reads the configuration from the process environment.
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Reads the configuration through `lookup`, which maps a variable name
    /// to its value. Empty values count as unset.
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self, ConfigError> {
        let get = |key: &str| lookup(key).filter(|value| !value.trim().is_empty());
        let mut config = LauncherConfig::default();

        if let Some(path) = get(ENV_STORE) {
            config.store_path = Some(PathBuf::from(path));
        }
        if let Some(value) = get(ENV_STORE_KIND) {
            config.store_kind = value
                .parse()
                .map_err(|reason| invalid(ENV_STORE_KIND, &value, reason))?;
        }
        if let Some(value) = get(ENV_BACKEND) {
            config.backend = value
                .parse()
                .map_err(|err: offline_enforce::ParseBackendKindError| {
                    invalid(ENV_BACKEND, &value, err.to_string())
                })?;
        }
        if let Some(value) = get(ENV_ENFORCE_TIMEOUT) {
            config.enforce_timeout = parse_timeout(&value)
                .map_err(|reason| invalid(ENV_ENFORCE_TIMEOUT, &value, reason))?;
        }
        Ok(config)
    }

    /// The store path in effect: the explicit one, or the default for the
    /// configured store kind.
    pub fn resolve_store_path(&self) -> Result<PathBuf, ConfigError> {
        if let Some(path) = &self.store_path {
            return Ok(path.clone());
        }
        let data_dir = dirs::data_dir().ok_or(ConfigError::NoDataDir)?;
        Ok(data_dir
            .join(APP_DIR)
            .join(self.store_kind.default_file_name()))
    }

    /// Builds a registry over the configured store and backend. The registry
    /// is not loaded yet.
    pub fn open_registry(&self) -> Result<ProgramRegistry, ConfigError> {
        let path = self.resolve_store_path()?;
        let store: Box<dyn ProgramStore> = match self.store_kind {
            StoreKind::Json => Box::new(JsonFileStore::new(path)),
            StoreKind::Sqlite => Box::new(SqliteStore::open(path)),
        };
        let backend = backend_for(self.backend, self.enforce_timeout);
        Ok(ProgramRegistry::new(store, backend))
    }
}

/// Parses a whole number of seconds, at least 1.
pub fn parse_timeout(value: &str) -> Result<Duration, String> {
    match value.trim().parse::<u64>() {
        Ok(0) => Err("timeout must be at least 1 second".to_string()),
        Ok(secs) => Ok(Duration::from_secs(secs)),
        Err(err) => Err(err.to_string()),
    }
}

fn invalid(key: &str, value: &str, reason: String) -> ConfigError {
    ConfigError::InvalidValue {
        key: key.to_string(),
        value: value.to_string(),
        reason,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn lookup(vars: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let vars: HashMap<String, String> = vars
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        move |key| vars.get(key).cloned()
    }

    #[test]
    fn defaults_when_unset() {
        let config = LauncherConfig::from_lookup(lookup(&[])).unwrap();
        assert_eq!(config, LauncherConfig::default());
        assert_eq!(config.enforce_timeout, Duration::from_secs(15));
    }

    #[test]
    fn reads_every_variable() {
        let config = LauncherConfig::from_lookup(lookup(&[
            (ENV_STORE, "/tmp/launcher/programs.db"),
            (ENV_STORE_KIND, "SQLite"),
            (ENV_BACKEND, "none"),
            (ENV_ENFORCE_TIMEOUT, "3"),
        ]))
        .unwrap();
        assert_eq!(config.store_path, Some(PathBuf::from("/tmp/launcher/programs.db")));
        assert_eq!(config.store_kind, StoreKind::Sqlite);
        assert_eq!(config.backend, BackendKind::None);
        assert_eq!(config.enforce_timeout, Duration::from_secs(3));
    }

    #[test]
    fn empty_values_count_as_unset() {
        let config = LauncherConfig::from_lookup(lookup(&[(ENV_STORE, "  ")])).unwrap();
        assert_eq!(config.store_path, None);
    }

    #[test]
    fn bad_values_name_the_variable() {
        let err = LauncherConfig::from_lookup(lookup(&[(ENV_ENFORCE_TIMEOUT, "0")])).unwrap_err();
        assert!(err.to_string().contains(ENV_ENFORCE_TIMEOUT));

        let err = LauncherConfig::from_lookup(lookup(&[(ENV_BACKEND, "iptables")])).unwrap_err();
        assert!(matches!(err, ConfigError::InvalidValue { ref key, .. } if key == ENV_BACKEND));
    }

    #[test]
    fn explicit_store_path_wins() {
        let config = LauncherConfig {
            store_path: Some(PathBuf::from("/data/mine.json")),
            ..LauncherConfig::default()
        };
        assert_eq!(config.resolve_store_path().unwrap(), PathBuf::from("/data/mine.json"));
    }

    #[test]
    fn default_store_file_follows_kind() {
        let config = LauncherConfig {
            store_kind: StoreKind::Sqlite,
            ..LauncherConfig::default()
        };
        if let Ok(path) = config.resolve_store_path() {
            assert!(path.ends_with("offline-launcher/programs.db"));
        }
    }

    #[test]
    fn open_registry_uses_configured_store() {
        let dir = tempfile::tempdir().unwrap();
        let config = LauncherConfig {
            store_path: Some(dir.path().join("programs.db")),
            store_kind: StoreKind::Sqlite,
            backend: BackendKind::None,
            ..LauncherConfig::default()
        };
        let mut registry = config.open_registry().unwrap();
        assert_eq!(registry.backend_name(), "none");
        registry.load().unwrap();
        registry.save().unwrap();
        assert!(dir.path().join("programs.db").exists());
    }
}
