//! Certificate locations and generation parameters.

use std::path::PathBuf;

use serde::Deserialize;

/// Where trusted material is looked up and where generated material goes.
#[derive(Debug, Clone, Deserialize)]
pub struct CertificatesConfig {
    #[serde(default = "default_system_cert")]
    pub system_cert: PathBuf,
    #[serde(default = "default_system_key")]
    pub system_key: PathBuf,
    #[serde(default = "default_system_root")]
    pub system_root: PathBuf,
    /// Directory for generated material; defaults to `~/.postgresql`.
    #[serde(default = "default_dir")]
    pub dir: PathBuf,
    #[serde(default = "default_common_name")]
    pub common_name: String,
    #[serde(default = "default_validity_days")]
    pub validity_days: u32,
    #[serde(default = "default_key_bits")]
    pub key_bits: u32,
    /// Upper bound on each generator invocation.
    #[serde(default = "default_command_timeout_secs")]
    pub command_timeout_secs: u64,
}

fn default_system_cert() -> PathBuf {
    PathBuf::from("/etc/ssl/certs/postgresql.crt")
}

fn default_system_key() -> PathBuf {
    PathBuf::from("/etc/ssl/private/postgresql.key")
}

fn default_system_root() -> PathBuf {
    PathBuf::from("/etc/ssl/certs/root.crt")
}

fn default_dir() -> PathBuf {
    dirs::home_dir()
        .unwrap_or_else(|| PathBuf::from("."))
        .join(".postgresql")
}

fn default_common_name() -> String {
    "localhost".to_string()
}

const fn default_validity_days() -> u32 {
    365
}

const fn default_key_bits() -> u32 {
    2048
}

const fn default_command_timeout_secs() -> u64 {
    30
}

impl Default for CertificatesConfig {
    fn default() -> Self {
        Self {
            system_cert: default_system_cert(),
            system_key: default_system_key(),
            system_root: default_system_root(),
            dir: default_dir(),
            common_name: default_common_name(),
            validity_days: default_validity_days(),
            key_bits: default_key_bits(),
            command_timeout_secs: default_command_timeout_secs(),
        }
    }
}
