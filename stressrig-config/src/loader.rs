//! Configuration loading and environment variable handling

use crate::domains::StressConfig;
use crate::error::{ConfigError, ConfigResult};
use crate::jsonc;
use std::path::Path;
use std::str::FromStr;
use tracing::debug;

/// Configuration loader with environment variable support
pub struct ConfigLoader {
    /// Environment variable prefix
    prefix: String,
}

impl ConfigLoader {
    /// Create a new config loader with default prefix
    pub fn new() -> Self {
        Self {
            prefix: "STRESSRIG".to_string(),
        }
    }

    /// Create a new config loader with custom prefix
    pub fn with_prefix(prefix: impl Into<String>) -> Self {
        Self {
            prefix: prefix.into(),
        }
    }

    /// Load configuration from a JSON file (comments allowed) with environment overrides
    pub fn from_file(&self, path: impl AsRef<Path>) -> ConfigResult<StressConfig> {
        let path = path.as_ref();
        debug!("Loading configuration from {}", path.display());
        let content = std::fs::read_to_string(path)?;
        self.from_document(&content)
    }

    /// Load configuration from document text with environment overrides
    pub fn from_document(&self, content: &str) -> ConfigResult<StressConfig> {
        let mut config: StressConfig = jsonc::from_str(content)?;

        // Apply environment variable overrides
        self.apply_env_overrides(&mut config)?;

        // Validate all domains
        config.validate_all()?;

        Ok(config)
    }

    /// Apply environment variable overrides to configuration
    fn apply_env_overrides(&self, config: &mut StressConfig) -> ConfigResult<()> {
        self.apply_options_overrides(&mut config.options)?;
        self.apply_cluster_overrides(&mut config.cluster);
        self.apply_logging_overrides(&mut config.logging)?;
        Ok(())
    }

    /// Apply run option overrides
    fn apply_options_overrides(
        &self,
        config: &mut crate::domains::run::RunOptions,
    ) -> ConfigResult<()> {
        if let Ok(batch) = self.get_env_var("BATCH_SIZE") {
            config.batch_size = batch
                .parse()
                .map_err(|e| ConfigError::EnvError(format!("Invalid BATCH_SIZE: {}", e)))?;
        }

        if let Ok(interval) = self.get_env_var("POLL_INTERVAL") {
            config.poll_interval = humantime::parse_duration(&interval)
                .map_err(|e| ConfigError::EnvError(format!("Invalid POLL_INTERVAL: {}", e)))?;
        }

        Ok(())
    }

    /// Apply cluster overrides
    fn apply_cluster_overrides(&self, config: &mut crate::domains::cluster::ClusterConfig) {
        if let Ok(binary) = self.get_env_var("CLUSTER_BINARY") {
            config.binary = binary;
        }
    }

    /// Apply logging config overrides
    fn apply_logging_overrides(
        &self,
        config: &mut crate::domains::logging::LoggingConfig,
    ) -> ConfigResult<()> {
        if let Ok(log_level) = self.get_env_var("LOG_LEVEL") {
            config.level = crate::domains::logging::LogLevel::from_str(&log_level)
                .map_err(|_| ConfigError::EnvError(format!("Invalid LOG_LEVEL: {}", log_level)))?;
        }

        if let Ok(format) = self.get_env_var("LOG_FORMAT") {
            config.format = crate::domains::logging::LogFormat::from_str(&format)
                .map_err(|_| ConfigError::EnvError(format!("Invalid LOG_FORMAT: {}", format)))?;
        }

        Ok(())
    }

    /// Get environment variable with prefix
    fn get_env_var(&self, name: &str) -> Result<String, std::env::VarError> {
        std::env::var(format!("{}_{}", self.prefix, name))
    }
}

impl Default for ConfigLoader {
    fn default() -> Self {
        Self::new()
    }
}
