//! Retry budgets for dependency checks and health verification.

use std::time::Duration;

use serde::Deserialize;

use crate::application::retry::{Backoff, RetryPolicy};

/// Retry budget for the dependency stage.
#[derive(Debug, Clone, Deserialize)]
pub struct DependencyRetryConfig {
    #[serde(default = "default_dependency_attempts")]
    pub max_attempts: u32,
    /// Sleep `backoff_step_secs * attempt` between attempts.
    #[serde(default = "default_dependency_backoff_step_secs")]
    pub backoff_step_secs: u64,
}

const fn default_dependency_attempts() -> u32 {
    3
}

const fn default_dependency_backoff_step_secs() -> u64 {
    5
}

impl Default for DependencyRetryConfig {
    fn default() -> Self {
        Self {
            max_attempts: default_dependency_attempts(),
            backoff_step_secs: default_dependency_backoff_step_secs(),
        }
    }
}

impl DependencyRetryConfig {
    #[must_use]
    pub fn policy(&self) -> RetryPolicy {
        RetryPolicy::new(
            self.max_attempts,
            Backoff::Linear(Duration::from_secs(self.backoff_step_secs)),
        )
    }
}

/// Health verification settings.
#[derive(Debug, Clone, Deserialize)]
pub struct HealthConfig {
    #[serde(default = "default_health_attempts")]
    pub max_attempts: u32,
    /// Sleep `backoff_step_secs * attempt` between attempts.
    #[serde(default = "default_health_backoff_step_secs")]
    pub backoff_step_secs: u64,
    #[serde(default = "default_request_timeout_secs")]
    pub request_timeout_secs: u64,
    #[serde(default = "default_health_path")]
    pub health_path: String,
}

const fn default_health_attempts() -> u32 {
    5
}

const fn default_health_backoff_step_secs() -> u64 {
    2
}

const fn default_request_timeout_secs() -> u64 {
    10
}

fn default_health_path() -> String {
    "/health".to_string()
}

impl Default for HealthConfig {
    fn default() -> Self {
        Self {
            max_attempts: default_health_attempts(),
            backoff_step_secs: default_health_backoff_step_secs(),
            request_timeout_secs: default_request_timeout_secs(),
            health_path: default_health_path(),
        }
    }
}

impl HealthConfig {
    #[must_use]
    pub fn policy(&self) -> RetryPolicy {
        RetryPolicy::new(
            self.max_attempts,
            Backoff::Linear(Duration::from_secs(self.backoff_step_secs)),
        )
    }
}
