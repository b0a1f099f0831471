//! Pipeline ordering and halting.

use std::sync::Arc;

use async_trait::async_trait;
use parking_lot::Mutex;

use stagehand::application::pipeline::{Pipeline, RunScope, StepAction};
use stagehand::application::retry::{Backoff, RetryPolicy};
use stagehand::domain::{RunState, StepOutcome};
use stagehand::error::{Error, Result};
use stagehand::infrastructure::context::OrchestratorContext;
use stagehand::testkit::config::config_in;

/// Appends its name to a shared log, then succeeds or fails.
struct Recorded {
    name: &'static str,
    log: Arc<Mutex<Vec<&'static str>>>,
    fail: bool,
}

#[async_trait]
impl StepAction for Recorded {
    async fn execute(&self, _ctx: &OrchestratorContext, _scope: &RunScope) -> Result<()> {
        self.log.lock().push(self.name);
        if self.fail {
            Err(Error::Schema(format!("{} broke", self.name)))
        } else {
            Ok(())
        }
    }
}

fn pipeline(log: &Arc<Mutex<Vec<&'static str>>>, failing: &[&'static str]) -> Pipeline {
    let step = |name: &'static str| Recorded {
        name,
        log: log.clone(),
        fail: failing.contains(&name),
    };
    Pipeline::new(RetryPolicy::new(1, Backoff::None))
        .step("A", step("A"))
        .step("B", step("B"))
        .step("C", step("C"))
}

#[tokio::test]
async fn failing_step_halts_the_run() {
    let dir = tempfile::tempdir().unwrap();
    let ctx = OrchestratorContext::new(config_in(dir.path()));
    let log = Arc::new(Mutex::new(Vec::new()));

    let mut pipeline = pipeline(&log, &["B"]);
    let report = pipeline.run(&ctx, &RunScope::new()).await;

    assert_eq!(*log.lock(), vec!["A", "B"]);
    assert_eq!(report.state(), RunState::Failed(1));
    assert_eq!(report.steps().len(), 2);
    assert_eq!(report.steps()[0].outcome, StepOutcome::Succeeded);
    assert!(matches!(report.steps()[1].outcome, StepOutcome::Failed(_)));
    assert_eq!(report.not_attempted(), ["C".to_string()]);

    let (step, cause) = report.failure().unwrap();
    assert_eq!(step, "B");
    assert!(cause.contains("B broke"), "cause: {cause}");
    assert_eq!(report.deployment_id(), ctx.deployment_id());
}

#[tokio::test]
async fn all_steps_run_in_declared_order() {
    let dir = tempfile::tempdir().unwrap();
    let ctx = OrchestratorContext::new(config_in(dir.path()));
    let log = Arc::new(Mutex::new(Vec::new()));

    let mut pipeline = pipeline(&log, &[]);
    let report = pipeline.run(&ctx, &RunScope::new()).await;

    assert!(report.is_success());
    assert_eq!(pipeline.state(), RunState::Completed);
    assert_eq!(*log.lock(), vec!["A", "B", "C"]);
    assert!(report.not_attempted().is_empty());
    for record in report.steps() {
        assert!(record.finished_at >= record.started_at);
        assert_eq!(record.attempts, 1);
    }
}
