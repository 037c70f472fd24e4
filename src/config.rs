//! Layered configuration: built-in defaults, an optional YAML file, an
//! optional local-override YAML file, then `SYNAPSE_`-prefixed environment
//! variables, in ascending priority.

use std::path::Path;

use figment::providers::{Env, Format, Serialized, Yaml};
use figment::Figment;
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::logging::LogConfig;

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("invalid worker_pool_size: {0}, must be at least 1")]
    InvalidWorkerPoolSize(usize),
    #[error("invalid logging level: {0}, must be one of: trace, debug, info, warn, error")]
    InvalidLogLevel(String),
    #[error("failed to extract configuration: {0}")]
    Extract(#[from] figment::Error),
}

/// Top-level application configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub struct Config {
    /// Permits available to the shared event-bus dispatch pool.
    #[serde(default = "default_worker_pool_size")]
    pub worker_pool_size: usize,

    #[serde(default)]
    pub logging: LogConfig,
}

const fn default_worker_pool_size() -> usize {
    16
}

impl Default for Config {
    fn default() -> Self {
        Self {
            worker_pool_size: default_worker_pool_size(),
            logging: LogConfig::default(),
        }
    }
}

pub struct ConfigLoader;

impl ConfigLoader {
    /// Loads configuration from, in ascending priority: built-in defaults,
    /// `synapse.yaml`, `synapse.local.yaml`, then `SYNAPSE_`-prefixed
    /// environment variables (`__` as the nesting separator).
    pub fn load() -> Result<Config, ConfigError> {
        let config: Config = Figment::new()
            .merge(Serialized::defaults(Config::default()))
            .merge(Yaml::file("synapse.yaml"))
            .merge(Yaml::file("synapse.local.yaml"))
            .merge(Env::prefixed("SYNAPSE_").split("__"))
            .extract()?;
        Self::validate(&config)?;
        Ok(config)
    }

    /// Loads configuration from a specific YAML file, bypassing the
    /// default search path.
    pub fn load_from_file(path: impl AsRef<Path>) -> Result<Config, ConfigError> {
        let config: Config = Figment::new()
            .merge(Serialized::defaults(Config::default()))
            .merge(Yaml::file(path.as_ref()))
            .extract()?;
        Self::validate(&config)?;
        Ok(config)
    }

    fn validate(config: &Config) -> Result<(), ConfigError> {
        if config.worker_pool_size == 0 {
            return Err(ConfigError::InvalidWorkerPoolSize(config.worker_pool_size));
        }
        let valid_levels = ["trace", "debug", "info", "warn", "error"];
        if !valid_levels.contains(&config.logging.level.as_str()) {
            return Err(ConfigError::InvalidLogLevel(config.logging.level.clone()));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_validate() {
        let config = Config::default();
        assert!(ConfigLoader::validate(&config).is_ok());
    }

    #[test]
    fn zero_worker_pool_size_is_rejected() {
        let mut config = Config::default();
        config.worker_pool_size = 0;
        assert!(matches!(ConfigLoader::validate(&config), Err(ConfigError::InvalidWorkerPoolSize(0))));
    }

    #[test]
    fn unknown_log_level_is_rejected() {
        let mut config = Config::default();
        config.logging.level = "verbose".into();
        assert!(matches!(ConfigLoader::validate(&config), Err(ConfigError::InvalidLogLevel(_))));
    }
}
