//! Application configuration.
//!
//! # Responsibility
//! - Resolve the database target and logging settings from the process
//!   environment (`MONOMODULAR_*` variables).
//!
//! # Invariants
//! - An unset or `:memory:` database resolves to a private in-memory store.
//! - Log level and log directory are validated with the same rules as
//!   `init_logging`.

use crate::logging::{default_log_level, normalize_level, normalize_log_dir};
use std::error::Error;
use std::fmt::{Display, Formatter};
use std::path::PathBuf;

pub const DATABASE_ENV: &str = "MONOMODULAR_DB";
pub const LOG_LEVEL_ENV: &str = "MONOMODULAR_LOG_LEVEL";
pub const LOG_DIR_ENV: &str = "MONOMODULAR_LOG_DIR";

const IN_MEMORY_MARKER: &str = ":memory:";

/// Where a storage scope opens its connection.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DatabaseTarget {
    Memory,
    File(PathBuf),
}

impl DatabaseTarget {
    pub fn parse(value: &str) -> Self {
        let trimmed = value.trim();
        if trimmed.is_empty() || trimmed == IN_MEMORY_MARKER {
            Self::Memory
        } else {
            Self::File(PathBuf::from(trimmed))
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AppConfig {
    pub database: DatabaseTarget,
    pub log_level: &'static str,
    /// File logging stays off when `None`.
    pub log_dir: Option<PathBuf>,
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            database: DatabaseTarget::Memory,
            log_level: default_log_level(),
            log_dir: None,
        }
    }
}

impl AppConfig {
    /// Builds configuration from an arbitrary variable lookup.
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self, ConfigError> {
        let database = lookup(DATABASE_ENV)
            .map(|value| DatabaseTarget::parse(&value))
            .unwrap_or(DatabaseTarget::Memory);

        let log_level = match lookup(LOG_LEVEL_ENV) {
            Some(value) => normalize_level(&value).map_err(ConfigError::InvalidLogLevel)?,
            None => default_log_level(),
        };

        let log_dir = match lookup(LOG_DIR_ENV) {
            Some(value) if !value.trim().is_empty() => {
                Some(normalize_log_dir(&value).map_err(ConfigError::InvalidLogDir)?)
            }
            _ => None,
        };

        Ok(Self {
            database,
            log_level,
            log_dir,
        })
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ConfigError {
    InvalidLogLevel(String),
    InvalidLogDir(String),
}

impl Display for ConfigError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::InvalidLogLevel(message) => write!(f, "{LOG_LEVEL_ENV}: {message}"),
            Self::InvalidLogDir(message) => write!(f, "{LOG_DIR_ENV}: {message}"),
        }
    }
}

impl Error for ConfigError {}

#[cfg(test)]
mod tests {
    use super::{AppConfig, ConfigError, DatabaseTarget, DATABASE_ENV, LOG_LEVEL_ENV};
    use std::collections::HashMap;
    use std::path::PathBuf;

    fn lookup_from(pairs: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let vars: HashMap<String, String> = pairs
            .iter()
            .map(|(name, value)| (name.to_string(), value.to_string()))
            .collect();
        move |name| vars.get(name).cloned()
    }

    #[test]
    fn empty_environment_uses_memory_database() {
        let config = AppConfig::from_lookup(lookup_from(&[])).unwrap();
        assert_eq!(config, AppConfig::default());
    }

    #[test]
    fn database_path_and_level_are_read() {
        let config = AppConfig::from_lookup(lookup_from(&[
            (DATABASE_ENV, "/var/lib/app/store.sqlite3"),
            (LOG_LEVEL_ENV, "WARNING"),
        ]))
        .unwrap();

        assert_eq!(
            config.database,
            DatabaseTarget::File(PathBuf::from("/var/lib/app/store.sqlite3"))
        );
        assert_eq!(config.log_level, "warn");
    }

    #[test]
    fn memory_marker_is_recognized() {
        assert_eq!(DatabaseTarget::parse(" :memory: "), DatabaseTarget::Memory);
    }

    #[test]
    fn invalid_level_is_rejected() {
        let err = AppConfig::from_lookup(lookup_from(&[(LOG_LEVEL_ENV, "loud")])).unwrap_err();
        assert!(matches!(err, ConfigError::InvalidLogLevel(_)));
    }
}
