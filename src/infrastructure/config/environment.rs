//! Required configuration values and datastore settings.

use serde::Deserialize;

/// Names of configuration values the service cannot start without.
///
/// Values are read from the process environment (after `.env` is loaded),
/// never from the TOML file.
#[derive(Debug, Clone, Deserialize)]
pub struct EnvironmentConfig {
    /// Values that must be non-empty.
    #[serde(default = "default_required")]
    pub required: Vec<String>,
    /// Session-signing secret; generated at runtime when missing.
    #[serde(default = "default_secret")]
    pub secret: String,
    /// Variable holding the datastore URL.
    #[serde(default = "default_datastore")]
    pub datastore: String,
}

fn default_required() -> Vec<String> {
    vec!["DATABASE_URL".to_string(), "FLASK_SECRET_KEY".to_string()]
}

fn default_secret() -> String {
    "FLASK_SECRET_KEY".to_string()
}

fn default_datastore() -> String {
    "DATABASE_URL".to_string()
}

impl Default for EnvironmentConfig {
    fn default() -> Self {
        Self {
            required: default_required(),
            secret: default_secret(),
            datastore: default_datastore(),
        }
    }
}

/// Datastore probe and pool settings.
#[derive(Debug, Clone, Deserialize)]
pub struct DatastoreConfig {
    /// Connect timeout for reachability probes.
    #[serde(default = "default_connect_timeout_secs")]
    pub connect_timeout_secs: u64,
    /// Size of the orchestrator's own connection pool.
    #[serde(default = "default_pool_size")]
    pub pool_size: u32,
}

const fn default_connect_timeout_secs() -> u64 {
    5
}

const fn default_pool_size() -> u32 {
    2
}

impl Default for DatastoreConfig {
    fn default() -> Self {
        Self {
            connect_timeout_secs: default_connect_timeout_secs(),
            pool_size: default_pool_size(),
        }
    }
}
