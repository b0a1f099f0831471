//! Required configuration values resolved from the process environment.

use std::collections::BTreeMap;

use rand::RngCore;
use tracing::{info, warn};

use crate::infrastructure::config::environment::EnvironmentConfig;

/// Random bytes in a generated session secret.
const GENERATED_SECRET_BYTES: usize = 24;

/// Values handed to the managed process, plus what was missing or generated.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ResolvedEnvironment {
    values: BTreeMap<String, String>,
    missing: Vec<String>,
    generated: Vec<String>,
    datastore_var: String,
}

impl ResolvedEnvironment {
    /// Resolve every required name through `lookup`.
    ///
    /// Empty values count as missing. A missing session secret is replaced by
    /// a random one and recorded as generated; any other missing name is
    /// recorded as missing. Nothing is written back to the process environment.
    pub fn resolve(config: &EnvironmentConfig, lookup: impl Fn(&str) -> Option<String>) -> Self {
        let mut resolved = Self {
            datastore_var: config.datastore.clone(),
            ..Self::default()
        };

        let mut names: Vec<&str> = config.required.iter().map(String::as_str).collect();
        for extra in [config.datastore.as_str(), config.secret.as_str()] {
            if !names.contains(&extra) {
                names.push(extra);
            }
        }

        for name in names {
            match lookup(name).filter(|v| !v.trim().is_empty()) {
                Some(value) => {
                    resolved.values.insert(name.to_string(), value);
                }
                None if name == config.secret => {
                    warn!(name, "Session secret not configured, generating one for this run");
                    resolved.values.insert(name.to_string(), generate_secret());
                    resolved.generated.push(name.to_string());
                }
                None => resolved.missing.push(name.to_string()),
            }
        }

        if resolved.missing.is_empty() {
            info!(count = resolved.values.len(), "Required configuration resolved");
        }
        resolved
    }

    /// Resolve from the real process environment.
    #[must_use]
    pub fn from_process(config: &EnvironmentConfig) -> Self {
        Self::resolve(config, |name| std::env::var(name).ok())
    }

    #[must_use]
    pub fn get(&self, name: &str) -> Option<&str> {
        self.values.get(name).map(String::as_str)
    }

    /// The datastore URL, if configured.
    #[must_use]
    pub fn datastore_url(&self) -> Option<&str> {
        self.get(&self.datastore_var)
    }

    /// Names with no value and no safe default.
    #[must_use]
    pub fn missing(&self) -> &[String] {
        &self.missing
    }

    /// Names whose values were generated for this run.
    #[must_use]
    pub fn generated(&self) -> &[String] {
        &self.generated
    }

    /// Overlay entries for the managed process.
    #[must_use]
    pub fn to_env(&self) -> Vec<(String, String)> {
        self.values
            .iter()
            .map(|(k, v)| (k.clone(), v.clone()))
            .collect()
    }
}

fn generate_secret() -> String {
    let mut bytes = [0u8; GENERATED_SECRET_BYTES];
    rand::thread_rng().fill_bytes(&mut bytes);
    bytes.iter().map(|b| format!("{b:02x}")).collect()
}
