//! Per-process orchestration context.
//!
//! Built once at startup and passed by reference to every component: the
//! configuration, the deployment id, the managed-process handle and the
//! shutdown controller all live here rather than in globals.

use std::sync::Arc;
use std::time::Duration;

use tracing::Span;
use uuid::Uuid;

use super::config::settings::Config;
use crate::application::launcher::{ManagedProcess, SharedProcess};
use crate::application::shutdown::{ShutdownController, ShutdownSignal};

pub struct OrchestratorContext {
    config: Arc<Config>,
    deployment_id: String,
    process: SharedProcess,
    shutdown: Arc<ShutdownController>,
}

impl OrchestratorContext {
    /// Create a context with a fresh deployment id and no managed process.
    #[must_use]
    pub fn new(config: Config) -> Self {
        let process = ManagedProcess::shared();
        let shutdown = Arc::new(ShutdownController::new(
            Arc::clone(&process),
            Duration::from_secs(config.service.stop_timeout_secs),
        ));
        Self {
            config: Arc::new(config),
            deployment_id: Uuid::new_v4().to_string(),
            process,
            shutdown,
        }
    }

    #[must_use]
    pub fn config(&self) -> &Config {
        &self.config
    }

    #[must_use]
    pub fn deployment_id(&self) -> &str {
        &self.deployment_id
    }

    #[must_use]
    pub fn process(&self) -> &SharedProcess {
        &self.process
    }

    #[must_use]
    pub fn shutdown(&self) -> &Arc<ShutdownController> {
        &self.shutdown
    }

    /// Observer for blocking points.
    #[must_use]
    pub fn signal(&self) -> ShutdownSignal {
        self.shutdown.signal()
    }

    /// Span wrapping one deployment run.
    #[must_use]
    pub fn span(&self) -> Span {
        tracing::info_span!("deployment", id = %self.deployment_id)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn each_context_gets_a_distinct_id() {
        let a = OrchestratorContext::new(Config::default());
        let b = OrchestratorContext::new(Config::default());
        assert_ne!(a.deployment_id(), b.deployment_id());
        assert!(Uuid::parse_str(a.deployment_id()).is_ok());
        assert!(!a.signal().is_triggered());
    }
}
