//! Shell configuration from environment variables or JSON.
//!
//! # Responsibility
//! - Resolve log level, log directory and state database location.
//! - Validate values before any subsystem is initialized.
//!
//! # Invariants
//! - `log_level` is one of `trace|debug|info|warn|error`.
//! - `log_dir`, when set, is absolute.

use crate::logging::{default_log_level, normalize_level};
use crate::statedb::{SqliteStateBackend, StateDb, StateDbResult};
use serde::Deserialize;
use std::error::Error;
use std::fmt::{Display, Formatter};
use std::path::PathBuf;

/// Env var selecting the log level.
pub const ENV_LOG_LEVEL: &str = "APPSHELL_LOG_LEVEL";
/// Env var selecting the absolute log directory.
pub const ENV_LOG_DIR: &str = "APPSHELL_LOG_DIR";
/// Env var selecting the state database (`:memory:` or a file path).
pub const ENV_STATE_DB: &str = "APPSHELL_STATE_DB";

const MEMORY_STATE_DB: &str = ":memory:";

/// Where restoration state is persisted.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub enum StateDbLocation {
    #[default]
    Memory,
    File(PathBuf),
}

impl StateDbLocation {
    fn parse(value: &str) -> Result<Self, ConfigError> {
        match value.trim() {
            "" => Err(ConfigError::InvalidStateDb(value.to_string())),
            MEMORY_STATE_DB => Ok(Self::Memory),
            path => Ok(Self::File(PathBuf::from(path))),
        }
    }

    /// Opens the configured database.
    pub fn open(&self) -> StateDbResult<StateDb> {
        match self {
            Self::Memory => Ok(StateDb::in_memory()),
            Self::File(path) => Ok(StateDb::new(SqliteStateBackend::open(path)?)),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ShellConfig {
    pub log_level: String,
    /// File logging is disabled when `None`.
    pub log_dir: Option<PathBuf>,
    pub state_db: StateDbLocation,
}

impl Default for ShellConfig {
    fn default() -> Self {
        Self {
            log_level: default_log_level().to_string(),
            log_dir: None,
            state_db: StateDbLocation::Memory,
        }
    }
}

#[derive(Debug, Default, Deserialize)]
#[serde(deny_unknown_fields)]
struct RawConfig {
    log_level: Option<String>,
    log_dir: Option<String>,
    state_db: Option<String>,
}

impl ShellConfig {
    /// Reads `APPSHELL_*` variables from the process environment.
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Reads `APPSHELL_*` variables through `lookup`.
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self, ConfigError> {
        Self::from_raw(RawConfig {
            log_level: lookup(ENV_LOG_LEVEL),
            log_dir: lookup(ENV_LOG_DIR),
            state_db: lookup(ENV_STATE_DB),
        })
    }

    /// Parses a JSON object with optional `log_level`, `log_dir`, `state_db`.
    pub fn from_json_str(json: &str) -> Result<Self, ConfigError> {
        let raw: RawConfig =
            serde_json::from_str(json).map_err(|err| ConfigError::Parse(err.to_string()))?;
        Self::from_raw(raw)
    }

    fn from_raw(raw: RawConfig) -> Result<Self, ConfigError> {
        let mut config = Self::default();
        if let Some(level) = raw.log_level {
            config.log_level = normalize_level(&level)
                .map_err(|_| ConfigError::InvalidLogLevel(level.clone()))?
                .to_string();
        }
        if let Some(dir) = raw.log_dir.filter(|dir| !dir.trim().is_empty()) {
            let path = PathBuf::from(dir.trim());
            if !path.is_absolute() {
                return Err(ConfigError::InvalidLogDir(dir));
            }
            config.log_dir = Some(path);
        }
        if let Some(location) = raw.state_db {
            config.state_db = StateDbLocation::parse(&location)?;
        }
        Ok(config)
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ConfigError {
    Parse(String),
    InvalidLogLevel(String),
    InvalidLogDir(String),
    InvalidStateDb(String),
}

impl Display for ConfigError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Parse(message) => write!(f, "config is malformed: {message}"),
            Self::InvalidLogLevel(value) => write!(
                f,
                "unsupported log level `{value}`; expected trace|debug|info|warn|error"
            ),
            Self::InvalidLogDir(value) => {
                write!(f, "log_dir must be an absolute path, got `{value}`")
            }
            Self::InvalidStateDb(value) => write!(f, "state_db location is invalid: `{value}`"),
        }
    }
}

impl Error for ConfigError {}

#[cfg(test)]
mod tests {
    use super::{ConfigError, ShellConfig, StateDbLocation, ENV_LOG_LEVEL, ENV_STATE_DB};
    use crate::logging::default_log_level;
    use std::collections::HashMap;
    use std::path::PathBuf;

    #[test]
    fn defaults_to_memory_state_and_build_level() {
        let config = ShellConfig::from_lookup(|_| None).expect("empty env config");
        assert_eq!(config, ShellConfig::default());
        assert_eq!(config.log_level, default_log_level());
        assert_eq!(config.state_db, StateDbLocation::Memory);
    }

    #[test]
    fn reads_lookup_values() {
        let env: HashMap<&str, &str> = [(ENV_LOG_LEVEL, "WARNING"), (ENV_STATE_DB, "/tmp/state.db")]
            .into_iter()
            .collect();
        let config = ShellConfig::from_lookup(|key| env.get(key).map(|value| value.to_string()))
            .expect("env config");
        assert_eq!(config.log_level, "warn");
        assert_eq!(
            config.state_db,
            StateDbLocation::File(PathBuf::from("/tmp/state.db"))
        );
    }

    #[test]
    fn parses_json_and_rejects_bad_values() {
        let config = ShellConfig::from_json_str(r#"{"log_level": "debug", "state_db": ":memory:"}"#)
            .expect("json config");
        assert_eq!(config.log_level, "debug");

        assert!(matches!(
            ShellConfig::from_json_str(r#"{"log_level": "loud"}"#),
            Err(ConfigError::InvalidLogLevel(_))
        ));
        assert!(matches!(
            ShellConfig::from_json_str(r#"{"log_dir": "relative/logs"}"#),
            Err(ConfigError::InvalidLogDir(_))
        ));
        assert!(matches!(
            ShellConfig::from_json_str(r#"{"state_db": "  "}"#),
            Err(ConfigError::InvalidStateDb(_))
        ));
        assert!(matches!(
            ShellConfig::from_json_str(r#"{"colour": "blue"}"#),
            Err(ConfigError::Parse(_))
        ));
    }
}
