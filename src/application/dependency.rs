//! Dependency checks run before launch.
//!
//! Every check is independent: a failure is recorded in the returned
//! [`DependencyStatus`] and the remaining checks still run. Retrying the
//! whole check is the pipeline's job.

use std::net::TcpListener;
use std::sync::Arc;
use std::time::Duration;

use tracing::{info, warn};

use super::environment::ResolvedEnvironment;
use super::retry::{retry_with_backoff, Backoff, RetryError, RetryPolicy};
use super::shutdown::ShutdownSignal;
use crate::adapter::outbound::sqlite::{probe_reachability, DatastoreUrl};
use crate::domain::{Dependency, DependencyStatus};
use crate::infrastructure::config::environment::DatastoreConfig;
use crate::infrastructure::config::service::ServiceConfig;
use crate::port::{ProcessInfo, ProcessInspector};

/// Sentinel written and removed to prove the working directory is writable.
const SENTINEL_FILE: &str = ".stagehand-write-test";

/// Runs the datastore, filesystem, port and configuration checks.
pub struct DependencyChecker {
    service: ServiceConfig,
    connect_timeout: Duration,
    inspector: Arc<dyn ProcessInspector>,
}

impl DependencyChecker {
    #[must_use]
    pub fn new(
        service: ServiceConfig,
        datastore: &DatastoreConfig,
        inspector: Arc<dyn ProcessInspector>,
    ) -> Self {
        Self {
            service,
            connect_timeout: Duration::from_secs(datastore.connect_timeout_secs),
            inspector,
        }
    }

    /// Probe every dependency once.
    pub async fn check(
        &self,
        environment: &ResolvedEnvironment,
        shutdown: &ShutdownSignal,
    ) -> DependencyStatus {
        let mut status = DependencyStatus::new();
        self.check_datastore(environment, &mut status).await;
        self.check_filesystem(&mut status).await;
        self.check_port(shutdown, &mut status).await;
        check_configuration(environment, &mut status);

        for (dependency, check) in status.iter() {
            match (check.ok, check.detail.as_deref()) {
                (true, None) => info!(%dependency, "Dependency available"),
                (true, Some(note)) => info!(%dependency, note, "Dependency available"),
                (false, detail) => warn!(
                    %dependency,
                    diagnostic = detail.unwrap_or("failed"),
                    "Dependency unavailable"
                ),
            }
        }
        status
    }

    async fn check_datastore(&self, environment: &ResolvedEnvironment, status: &mut DependencyStatus) {
        let Some(raw) = environment.datastore_url() else {
            status.fail(Dependency::Datastore, "datastore URL not configured");
            return;
        };
        let url = match DatastoreUrl::parse(raw) {
            Ok(url) => url,
            Err(e) => {
                status.fail(Dependency::Datastore, e.to_string());
                return;
            }
        };
        match probe_reachability(&url, self.connect_timeout).await {
            Ok(()) => status.pass(Dependency::Datastore),
            Err(e) => status.fail(Dependency::Datastore, format!("{url}: {e}")),
        }
    }

    async fn check_filesystem(&self, status: &mut DependencyStatus) {
        let sentinel = self.service.working_dir.join(SENTINEL_FILE);
        let result = async {
            tokio::fs::write(&sentinel, b"ok").await?;
            tokio::fs::remove_file(&sentinel).await
        }
        .await;
        match result {
            Ok(()) => status.pass(Dependency::Filesystem),
            Err(e) => status.fail(
                Dependency::Filesystem,
                format!("{} is not writable: {e}", self.service.working_dir.display()),
            ),
        }
    }

    async fn check_port(&self, shutdown: &ShutdownSignal, status: &mut DependencyStatus) {
        let preferred = self.service.port;
        let span = u32::from(self.service.port_search_span.max(1));
        let policy = RetryPolicy::new(span, Backoff::None);

        let result = retry_with_backoff("port search", policy, shutdown, |attempt| {
            let port = u16::try_from(u32::from(preferred) + attempt - 1).unwrap_or(u16::MAX);
            async move { try_bind(port).map(|()| port) }
        })
        .await;

        match result {
            Ok(port) if port == preferred => {
                status.set_secured_port(port);
                status.pass(Dependency::Port);
            }
            Ok(port) => {
                status.set_secured_port(port);
                status.pass_with_note(
                    Dependency::Port,
                    format!(
                        "port {preferred} in use{}, secured {port}",
                        self.describe_owner(preferred)
                    ),
                );
            }
            Err(RetryError::Exhausted { last, .. }) => {
                let last_port = u32::from(preferred) + span - 1;
                status.fail(
                    Dependency::Port,
                    format!(
                        "ports {preferred}-{last_port} unavailable{}: {last}",
                        self.describe_owner(preferred)
                    ),
                );
            }
            Err(RetryError::Cancelled) => {
                status.fail(Dependency::Port, "port search cancelled by shutdown");
            }
        }
    }

    /// `" (held by pid N: cmd)"` when the holder can be identified.
    fn describe_owner(&self, port: u16) -> String {
        match self.inspector.port_owner(port) {
            Some(owner) => format!(" (held by pid {}: {})", owner.pid, owner.command_line),
            None => String::new(),
        }
    }

    /// Stop a stray instance of the managed service holding the preferred port.
    ///
    /// Only holders whose command line runs the configured service command
    /// are stopped, and never `managed_pid`. Returns true if a stop signal
    /// was sent.
    pub fn release_conflicting_port(&self, managed_pid: Option<u32>) -> bool {
        let port = self.service.port;
        let Some(owner) = self.inspector.port_owner(port) else {
            return false;
        };
        if !is_stray(&owner, &self.service.command, managed_pid) {
            info!(
                port,
                pid = owner.pid,
                command = %owner.command_line,
                "Port held by an unrelated process, leaving it alone"
            );
            return false;
        }
        warn!(port, pid = owner.pid, "Stopping stray service instance holding the port");
        self.inspector.terminate(owner.pid)
    }
}

fn is_stray(owner: &ProcessInfo, command: &str, managed_pid: Option<u32>) -> bool {
    Some(owner.pid) != managed_pid && owner.pid != std::process::id() && owner.runs(command)
}

fn try_bind(port: u16) -> std::result::Result<(), String> {
    TcpListener::bind(("0.0.0.0", port))
        .map(drop)
        .map_err(|e| format!("port {port}: {e}"))
}

fn check_configuration(environment: &ResolvedEnvironment, status: &mut DependencyStatus) {
    if !environment.missing().is_empty() {
        status.fail(
            Dependency::Configuration,
            format!("missing {}", environment.missing().join(", ")),
        );
    } else if !environment.generated().is_empty() {
        status.pass_with_note(
            Dependency::Configuration,
            format!(
                "{} not configured, generated for this run",
                environment.generated().join(", ")
            ),
        );
    } else {
        status.pass(Dependency::Configuration);
    }
}
