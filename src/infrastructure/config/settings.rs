//! Application configuration loading and validation.
//!
//! Provides the main [`Config`] struct that aggregates all orchestrator
//! settings. Configuration is loaded from a TOML file; secrets and the
//! datastore URL come from the process environment (optionally seeded from a
//! `.env` file), never from the TOML file.
//!
//! # Example
//!
//! ```no_run
//! use stagehand::infrastructure::config::settings::Config;
//!
//! fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let config = Config::load("stagehand.toml")?;
//!     config.init_logging();
//!     Ok(())
//! }
//! ```

use std::path::Path;

use serde::Deserialize;

use super::certificates::CertificatesConfig;
use super::environment::{DatastoreConfig, EnvironmentConfig};
use super::logging::LoggingConfig;
use super::monitor::MonitorConfig;
use super::retry::{DependencyRetryConfig, HealthConfig};
use super::service::ServiceConfig;
use crate::error::{ConfigError, Result};

/// Main orchestrator configuration.
///
/// Every section is optional in the TOML file; missing sections take their
/// defaults.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct Config {
    /// How to launch the managed service.
    #[serde(default)]
    pub service: ServiceConfig,

    /// Required configuration values read from the environment.
    #[serde(default)]
    pub environment: EnvironmentConfig,

    /// Datastore probe and pool settings.
    #[serde(default)]
    pub datastore: DatastoreConfig,

    /// Certificate locations and generation parameters.
    #[serde(default)]
    pub certificates: CertificatesConfig,

    /// Retry budget for the dependency stage.
    #[serde(default)]
    pub dependencies: DependencyRetryConfig,

    /// Health verification settings.
    #[serde(default)]
    pub health: HealthConfig,

    /// Post-deployment monitoring.
    #[serde(default)]
    pub monitor: MonitorConfig,

    /// Logging and tracing configuration.
    #[serde(default)]
    pub logging: LoggingConfig,
}

impl Config {
    /// Parse configuration from TOML content.
    ///
    /// # Errors
    ///
    /// Returns an error if the TOML content is malformed or validation fails.
    pub fn parse_toml(content: &str) -> Result<Self> {
        let config: Self = toml::from_str(content).map_err(ConfigError::Parse)?;
        config.validate()?;
        Ok(config)
    }

    /// Load configuration from a TOML file.
    ///
    /// # Errors
    ///
    /// Returns an error if the file cannot be read, the TOML content is
    /// malformed, or validation fails.
    pub fn load<P: AsRef<Path>>(path: P) -> Result<Self> {
        let content = std::fs::read_to_string(path).map_err(ConfigError::ReadFile)?;
        Self::parse_toml(&content)
    }

    /// Initialize logging based on configuration.
    pub fn init_logging(&self) {
        self.logging.init();
    }

    /// Validate configuration values.
    fn validate(&self) -> Result<()> {
        if self.service.command.trim().is_empty() {
            return Err(ConfigError::MissingField {
                field: "service.command",
            }
            .into());
        }
        if self.service.port == 0 {
            return Err(ConfigError::InvalidValue {
                field: "service.port",
                reason: "must be greater than 0".to_string(),
            }
            .into());
        }
        if self.service.port_search_span == 0 {
            return Err(ConfigError::InvalidValue {
                field: "service.port_search_span",
                reason: "must try at least one port".to_string(),
            }
            .into());
        }
        if u32::from(self.service.port) + u32::from(self.service.port_search_span) > 65_536 {
            return Err(ConfigError::InvalidValue {
                field: "service.port_search_span",
                reason: "port range exceeds 65535".to_string(),
            }
            .into());
        }
        if self.dependencies.max_attempts == 0 {
            return Err(ConfigError::InvalidValue {
                field: "dependencies.max_attempts",
                reason: "must be at least 1".to_string(),
            }
            .into());
        }
        if self.health.max_attempts == 0 {
            return Err(ConfigError::InvalidValue {
                field: "health.max_attempts",
                reason: "must be at least 1".to_string(),
            }
            .into());
        }
        if !self.health.health_path.starts_with('/') {
            return Err(ConfigError::InvalidValue {
                field: "health.health_path",
                reason: "must start with '/'".to_string(),
            }
            .into());
        }
        if self.monitor.interval_secs == 0 {
            return Err(ConfigError::InvalidValue {
                field: "monitor.interval_secs",
                reason: "must be greater than 0".to_string(),
            }
            .into());
        }
        if !matches!(self.logging.format.as_str(), "pretty" | "json") {
            return Err(ConfigError::InvalidValue {
                field: "logging.format",
                reason: format!("unknown format '{}'", self.logging.format),
            }
            .into());
        }
        Ok(())
    }
}
