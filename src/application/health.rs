//! Post-launch health verification.
//!
//! The root endpoint is the success signal; the health endpoint is polled
//! alongside it for diagnostics only.

use std::sync::Arc;
use std::time::Instant;

use serde::Deserialize;
use tracing::{error, info, warn};
use url::Url;

use super::retry::{retry_with_backoff, RetryError, RetryPolicy};
use super::shutdown::ShutdownSignal;
use crate::domain::{is_alive_status, HealthCheckResult};
use crate::error::{Error, Result};
use crate::port::{HttpProbe, ProcessInspector};

/// The part of the health payload worth logging.
#[derive(Debug, Deserialize)]
struct HealthPayload {
    status: Option<String>,
}

/// Polls the managed service until it answers or the budget is spent.
pub struct HealthVerifier {
    probe: Arc<dyn HttpProbe>,
    inspector: Arc<dyn ProcessInspector>,
    policy: RetryPolicy,
    health_path: String,
}

impl HealthVerifier {
    #[must_use]
    pub fn new(
        probe: Arc<dyn HttpProbe>,
        inspector: Arc<dyn ProcessInspector>,
        policy: RetryPolicy,
        health_path: impl Into<String>,
    ) -> Self {
        Self {
            probe,
            inspector,
            policy,
            health_path: health_path.into(),
        }
    }

    /// Poll `base_url` until the root endpoint answers with an accepted status.
    ///
    /// Returns `Ok(false)` once every attempt has failed, after logging who
    /// holds the service port.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Interrupted`] if shutdown preempts verification.
    pub async fn verify(&self, base_url: &str, shutdown: &ShutdownSignal) -> Result<bool> {
        let base = base_url.trim_end_matches('/');
        let root_url = format!("{base}/");
        let health_url = format!("{base}{}", self.health_path);

        let outcome = retry_with_backoff("health verification", self.policy, shutdown, |attempt| {
            let root_url = root_url.as_str();
            let health_url = health_url.as_str();
            async move { self.attempt(attempt, root_url, health_url).await }
        })
        .await;

        match outcome {
            Ok(()) => Ok(true),
            Err(RetryError::Cancelled) => Err(Error::Interrupted),
            Err(RetryError::Exhausted { attempts, last }) => {
                error!(attempts, last_error = %last, "Service failed health verification");
                self.recovery_probe(base_url);
                Ok(false)
            }
        }
    }

    async fn attempt(&self, attempt: u32, root_url: &str, health_url: &str) -> std::result::Result<(), String> {
        let (root, _) = self.probe_endpoint(root_url, is_alive_status).await;
        if !root.succeeded {
            let cause = root
                .error
                .unwrap_or_else(|| format!("unexpected status {}", root.http_status.unwrap_or_default()));
            return Err(format!("{root_url}: {cause}"));
        }
        info!(
            attempt,
            status = root.http_status,
            latency_ms = root.latency.as_millis() as u64,
            "Root endpoint is serving"
        );

        let (health, reported) = self.probe_endpoint(health_url, |status| status == 200).await;
        let reported = reported.as_deref().unwrap_or("absent");
        if health.succeeded && reported != "unhealthy" {
            info!(
                latency_ms = health.latency.as_millis() as u64,
                reported,
                "Health endpoint reports healthy"
            );
        } else {
            warn!(
                status = health.http_status,
                reported,
                error = health.error.as_deref().unwrap_or("unhealthy"),
                "Health endpoint check failed, root endpoint is serving"
            );
        }
        Ok(())
    }

    /// GET `url`; success is decided by `accept` on the status code alone.
    ///
    /// Also returns the `status` field of a JSON body, when there is one.
    async fn probe_endpoint(
        &self,
        url: &str,
        accept: fn(u16) -> bool,
    ) -> (HealthCheckResult, Option<String>) {
        let started = Instant::now();
        let response = self.probe.get(url).await;
        let latency = started.elapsed();

        match response {
            Ok(response) => {
                let reported = serde_json::from_str::<HealthPayload>(&response.body)
                    .ok()
                    .and_then(|payload| payload.status);
                let result = HealthCheckResult {
                    endpoint: url.to_string(),
                    succeeded: accept(response.status),
                    http_status: Some(response.status),
                    latency,
                    error: None,
                };
                (result, reported)
            }
            Err(e) => {
                let result = HealthCheckResult {
                    endpoint: url.to_string(),
                    succeeded: false,
                    http_status: None,
                    latency,
                    error: Some(e.to_string()),
                };
                (result, None)
            }
        }
    }

    /// Log who, if anyone, is listening on the service port.
    fn recovery_probe(&self, base_url: &str) {
        let Some(port) = Url::parse(base_url).ok().and_then(|u| u.port_or_known_default()) else {
            return;
        };
        match self.inspector.port_owner(port) {
            Some(owner) => warn!(
                port,
                pid = owner.pid,
                command = %owner.command_line,
                "Port is held but the service did not answer"
            ),
            None => warn!(port, "Nothing is listening on the service port"),
        }
    }
}
