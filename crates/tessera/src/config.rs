//! # Configuration and logging setup
//!
//! [`Config`] carries the few knobs the core exposes. Every field has a
//! default, so an empty JSON object is a valid config:
//!
//! ```text
//! {
//!   "scheduler": { "batch_capacity": 500 },
//!   "lifecycle": { "enable_semantics": "set" }
//! }
//! ```
//!
//! Logging goes through the `log` facade; [`init_logger`] installs
//! `env_logger` so `RUST_LOG=tessera=debug` shows lifecycle transitions.

use std::path::Path;

use serde::{Deserialize, Serialize};

use crate::entity::EnableSemantics;
use crate::error::ConfigurationError;

/// Default number of callbacks a single batch may hold.
pub const DEFAULT_BATCH_CAPACITY: usize = 500;

/// Top-level configuration.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    pub scheduler: SchedulerConfig,
    pub lifecycle: LifecycleConfig,
}

/// Scheduler settings. Doubles as the singleton template the scheduler is
/// instantiated from.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct SchedulerConfig {
    /// Maximum subscribers per batch.
    pub batch_capacity: usize,
}

impl Default for SchedulerConfig {
    fn default() -> Self {
        Self {
            batch_capacity: DEFAULT_BATCH_CAPACITY,
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct LifecycleConfig {
    pub enable_semantics: EnableSemantics,
}

impl Config {
    /// Parse and validate a JSON config.
    pub fn from_json_str(json: &str) -> Result<Self, ConfigurationError> {
        let config: Config = serde_json::from_str(json)?;
        config.validate()?;
        Ok(config)
    }

    /// Read, parse and validate a JSON config file.
    pub fn load(path: impl AsRef<Path>) -> Result<Self, ConfigurationError> {
        let path = path.as_ref();
        let json = std::fs::read_to_string(path).map_err(|source| ConfigurationError::Read {
            path: path.to_path_buf(),
            source,
        })?;
        let config = Self::from_json_str(&json)?;
        log::debug!("loaded config from {}", path.display());
        Ok(config)
    }

    pub fn validate(&self) -> Result<(), ConfigurationError> {
        if self.scheduler.batch_capacity == 0 {
            return Err(ConfigurationError::ZeroBatchCapacity);
        }
        Ok(())
    }
}

/// Install `env_logger` as the global logger, reading `RUST_LOG`.
///
/// Safe to call more than once; later calls leave the existing logger alone.
pub fn init_logger() {
    let result = env_logger::Builder::new()
        .filter_level(log::LevelFilter::Warn)
        .parse_default_env()
        .try_init();

    if result.is_err() {
        log::debug!("a logger is already installed; keeping it");
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn empty_object_uses_defaults() {
        let config = Config::from_json_str("{}").unwrap();
        assert_eq!(config, Config::default());
        assert_eq!(config.scheduler.batch_capacity, 500);
        assert_eq!(config.lifecycle.enable_semantics, EnableSemantics::Set);
    }

    #[test]
    fn parses_every_field() {
        let config = Config::from_json_str(
            r#"{ "scheduler": { "batch_capacity": 2 },
                 "lifecycle": { "enable_semantics": "toggle" } }"#,
        )
        .unwrap();
        assert_eq!(config.scheduler.batch_capacity, 2);
        assert_eq!(config.lifecycle.enable_semantics, EnableSemantics::Toggle);
    }

    #[test]
    fn zero_capacity_is_rejected() {
        let err = Config::from_json_str(r#"{ "scheduler": { "batch_capacity": 0 } }"#).unwrap_err();
        assert!(matches!(err, ConfigurationError::ZeroBatchCapacity));
    }

    #[test]
    fn garbage_is_a_parse_error() {
        let err = Config::from_json_str("not json").unwrap_err();
        assert!(matches!(err, ConfigurationError::Parse(_)));
    }

    #[test]
    fn missing_file_reports_path() {
        let err = Config::load("/definitely/not/here.json").unwrap_err();
        assert!(err.to_string().contains("/definitely/not/here.json"));
    }

    #[test]
    fn init_logger_twice_is_harmless() {
        init_logger();
        init_logger();
    }
}
