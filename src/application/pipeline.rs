//! Deployment pipeline driver.
//!
//! Steps run strictly in declaration order on the caller's task. The first
//! failing step halts the run; its successors are listed as not attempted.
//! Shutdown is checked before each step and preempts the step in flight.

use async_trait::async_trait;
use chrono::Utc;
use parking_lot::Mutex;
use tracing::{debug, error, info, warn, Instrument};

use super::environment::ResolvedEnvironment;
use super::retry::{retry_with_backoff, RetryError, RetryPolicy};
use crate::domain::{
    CertificateMaterial, DependencyStatus, PipelineReport, ResourceLimits, RunState,
    StepOutcome, StepRecord, TelemetrySnapshot,
};
use crate::error::{Error, Result};
use crate::infrastructure::context::OrchestratorContext;

/// Values produced by earlier steps and consumed by later ones.
#[derive(Debug, Clone, Default)]
pub struct DeploymentArtifacts {
    pub environment: Option<ResolvedEnvironment>,
    pub certificates: Option<CertificateMaterial>,
    pub dependencies: Option<DependencyStatus>,
    pub port: Option<u16>,
    pub tables: Vec<String>,
    pub snapshot: Option<TelemetrySnapshot>,
    pub limits: Option<ResourceLimits>,
    pub pid: Option<u32>,
}

/// Shared scratch space for one run.
#[derive(Debug, Default)]
pub struct RunScope {
    artifacts: Mutex<DeploymentArtifacts>,
}

impl RunScope {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Mutate the artifacts.
    pub fn update(&self, f: impl FnOnce(&mut DeploymentArtifacts)) {
        f(&mut self.artifacts.lock());
    }

    /// Copy of the artifacts as they stand.
    #[must_use]
    pub fn artifacts(&self) -> DeploymentArtifacts {
        self.artifacts.lock().clone()
    }
}

/// Work performed by one step.
#[async_trait]
pub trait StepAction: Send + Sync {
    async fn execute(&self, ctx: &OrchestratorContext, scope: &RunScope) -> Result<()>;

    /// Best-effort cleanup between attempts of a retryable step.
    async fn recover(&self, _ctx: &OrchestratorContext, _scope: &RunScope) {}
}

/// A named unit of work in the pipeline.
pub struct DeploymentStep {
    pub name: String,
    pub action: Box<dyn StepAction>,
    pub is_retryable: bool,
}

/// Ordered list of steps plus the retry budget for retryable ones.
pub struct Pipeline {
    steps: Vec<DeploymentStep>,
    retry: RetryPolicy,
    state: RunState,
}

impl Pipeline {
    #[must_use]
    pub fn new(retry: RetryPolicy) -> Self {
        Self {
            steps: Vec::new(),
            retry,
            state: RunState::NotStarted,
        }
    }

    /// Append a step that runs once.
    #[must_use]
    pub fn step(mut self, name: impl Into<String>, action: impl StepAction + 'static) -> Self {
        self.steps.push(DeploymentStep {
            name: name.into(),
            action: Box::new(action),
            is_retryable: false,
        });
        self
    }

    /// Append a step retried under the pipeline's retry policy.
    #[must_use]
    pub fn retryable_step(
        mut self,
        name: impl Into<String>,
        action: impl StepAction + 'static,
    ) -> Self {
        self.steps.push(DeploymentStep {
            name: name.into(),
            action: Box::new(action),
            is_retryable: true,
        });
        self
    }

    #[must_use]
    pub fn state(&self) -> RunState {
        self.state
    }

    /// Step names in execution order.
    pub fn step_names(&self) -> impl Iterator<Item = &str> {
        self.steps.iter().map(|s| s.name.as_str())
    }

    /// Execute every step in order and return the report.
    pub async fn run(&mut self, ctx: &OrchestratorContext, scope: &RunScope) -> PipelineReport {
        let span = ctx.span();
        self.run_steps(ctx, scope).instrument(span).await
    }

    async fn run_steps(&mut self, ctx: &OrchestratorContext, scope: &RunScope) -> PipelineReport {
        let mut report = PipelineReport::new(ctx.deployment_id());
        info!(steps = self.steps.len(), "Deployment started");
        let signal = ctx.signal();

        for index in 0..self.steps.len() {
            self.state = RunState::Running(index);
            report.set_state(self.state);
            let step = &self.steps[index];
            let started_at = Utc::now();

            let (outcome, attempts) = if signal.is_triggered() {
                (StepOutcome::Interrupted, 0)
            } else {
                info!(step = %step.name, index, "Step started");
                tokio::select! {
                    result = execute_step(step, self.retry, ctx, scope) => result,
                    () = signal.triggered() => (StepOutcome::Interrupted, 1),
                }
            };

            let succeeded = outcome.is_success();
            match &outcome {
                StepOutcome::Succeeded => info!(step = %step.name, attempts, "Step succeeded"),
                StepOutcome::Failed(cause) => {
                    error!(step = %step.name, attempts, cause = %cause, "Step failed");
                }
                StepOutcome::Interrupted => warn!(step = %step.name, "Step interrupted by shutdown"),
            }
            report.push(StepRecord {
                step_name: step.name.clone(),
                outcome,
                attempts,
                started_at,
                finished_at: Utc::now(),
            });

            if !succeeded {
                self.state = RunState::Failed(index);
                report.set_state(self.state);
                report.mark_not_attempted(self.steps[index + 1..].iter().map(|s| s.name.clone()));
                return report;
            }
        }

        self.state = RunState::Completed;
        report.set_state(self.state);
        info!("Deployment completed");
        report
    }
}

/// Run one step, retrying it when it is retryable. Returns the outcome and attempts made.
async fn execute_step(
    step: &DeploymentStep,
    policy: RetryPolicy,
    ctx: &OrchestratorContext,
    scope: &RunScope,
) -> (StepOutcome, u32) {
    if !step.is_retryable {
        return match step.action.execute(ctx, scope).await {
            Ok(()) => (StepOutcome::Succeeded, 1),
            Err(Error::Interrupted) => (StepOutcome::Interrupted, 1),
            Err(e) => {
                debug!(step = %step.name, class = ?e.class(), "Step error");
                (StepOutcome::Failed(e.to_string()), 1)
            }
        };
    }

    let signal = ctx.signal();
    let mut made = 0;
    let result = retry_with_backoff(&step.name, policy, &signal, |attempt| {
        made = attempt;
        async move {
            if attempt > 1 {
                step.action.recover(ctx, scope).await;
            }
            step.action.execute(ctx, scope).await
        }
    })
    .await;

    match result {
        Ok(()) => (StepOutcome::Succeeded, made),
        Err(RetryError::Cancelled) | Err(RetryError::Exhausted { last: Error::Interrupted, .. }) => {
            (StepOutcome::Interrupted, made)
        }
        Err(RetryError::Exhausted { attempts, last }) => {
            debug!(step = %step.name, class = ?last.class(), "Step error");
            (
                StepOutcome::Failed(format!("{last} (after {attempts} attempts)")),
                attempts,
            )
        }
    }
}

#[cfg(test)]
mod tests {
    use std::sync::atomic::{AtomicU32, Ordering};
    use std::sync::Arc;
    use std::time::Duration;

    use super::*;
    use crate::application::retry::Backoff;
    use crate::infrastructure::config::settings::Config;

    struct Succeeds(Arc<AtomicU32>);

    #[async_trait]
    impl StepAction for Succeeds {
        async fn execute(&self, _ctx: &OrchestratorContext, _scope: &RunScope) -> Result<()> {
            self.0.fetch_add(1, Ordering::SeqCst);
            Ok(())
        }
    }

    /// Fails until it has been called `after` times.
    struct Flaky {
        calls: Arc<AtomicU32>,
        recoveries: Arc<AtomicU32>,
        after: u32,
    }

    #[async_trait]
    impl StepAction for Flaky {
        async fn execute(&self, _ctx: &OrchestratorContext, _scope: &RunScope) -> Result<()> {
            let call = self.calls.fetch_add(1, Ordering::SeqCst) + 1;
            if call < self.after {
                Err(Error::DependenciesUnmet {
                    failed: vec!["datastore: refused".into()],
                })
            } else {
                Ok(())
            }
        }

        async fn recover(&self, _ctx: &OrchestratorContext, _scope: &RunScope) {
            self.recoveries.fetch_add(1, Ordering::SeqCst);
        }
    }

    fn policy() -> RetryPolicy {
        RetryPolicy::new(3, Backoff::Linear(Duration::from_secs(5)))
    }

    #[tokio::test(start_paused = true)]
    async fn retryable_step_recovers_between_attempts() {
        let ctx = OrchestratorContext::new(Config::default());
        let calls = Arc::new(AtomicU32::new(0));
        let recoveries = Arc::new(AtomicU32::new(0));
        let mut pipeline = Pipeline::new(policy()).retryable_step(
            "verify dependencies",
            Flaky {
                calls: calls.clone(),
                recoveries: recoveries.clone(),
                after: 3,
            },
        );

        let report = pipeline.run(&ctx, &RunScope::new()).await;
        assert!(report.is_success());
        assert_eq!(report.steps()[0].attempts, 3);
        assert_eq!(calls.load(Ordering::SeqCst), 3);
        assert_eq!(recoveries.load(Ordering::SeqCst), 2);
    }

    #[tokio::test(start_paused = true)]
    async fn exhausted_retryable_step_fails_the_run() {
        let ctx = OrchestratorContext::new(Config::default());
        let mut pipeline = Pipeline::new(policy()).retryable_step(
            "verify dependencies",
            Flaky {
                calls: Arc::new(AtomicU32::new(0)),
                recoveries: Arc::new(AtomicU32::new(0)),
                after: u32::MAX,
            },
        );

        let report = pipeline.run(&ctx, &RunScope::new()).await;
        assert_eq!(pipeline.state(), RunState::Failed(0));
        let (step, cause) = report.failure().unwrap();
        assert_eq!(step, "verify dependencies");
        assert!(cause.contains("after 3 attempts"), "cause: {cause}");
    }

    #[tokio::test]
    async fn shutdown_before_start_interrupts_first_step() {
        let ctx = OrchestratorContext::new(Config::default());
        ctx.shutdown().teardown("test").await;
        let counter = Arc::new(AtomicU32::new(0));
        let mut pipeline = Pipeline::new(policy())
            .step("a", Succeeds(counter.clone()))
            .step("b", Succeeds(counter.clone()));

        let report = pipeline.run(&ctx, &RunScope::new()).await;
        assert_eq!(report.state(), RunState::Failed(0));
        assert_eq!(report.steps()[0].outcome, StepOutcome::Interrupted);
        assert_eq!(report.not_attempted(), ["b".to_string()]);
        assert_eq!(counter.load(Ordering::SeqCst), 0);
    }

    #[test]
    fn scope_updates_are_visible() {
        let scope = RunScope::new();
        scope.update(|a| a.port = Some(3001));
        assert_eq!(scope.artifacts().port, Some(3001));
    }
}
