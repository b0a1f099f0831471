//! Pipeline run report.
//!
//! The report is the single source of truth for a run's outcome. It is
//! appended to while the run is in progress and handed out read-only once the
//! run ends.

use chrono::{DateTime, Utc};
use serde::Serialize;

/// Position of a run in its lifecycle; indices refer to the declared step order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(tag = "state", content = "step", rename_all = "snake_case")]
pub enum RunState {
    NotStarted,
    Running(usize),
    Completed,
    Failed(usize),
}

/// Outcome of one attempted step.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "outcome", content = "cause", rename_all = "snake_case")]
pub enum StepOutcome {
    Succeeded,
    Failed(String),
    Interrupted,
}

impl StepOutcome {
    #[must_use]
    pub const fn is_success(&self) -> bool {
        matches!(self, Self::Succeeded)
    }
}

/// A single attempted step.
#[derive(Debug, Clone, Serialize)]
pub struct StepRecord {
    pub step_name: String,
    pub outcome: StepOutcome,
    pub attempts: u32,
    pub started_at: DateTime<Utc>,
    pub finished_at: DateTime<Utc>,
}

/// Ordered record of a pipeline run.
#[derive(Debug, Clone, Serialize)]
pub struct PipelineReport {
    deployment_id: String,
    state: RunState,
    steps: Vec<StepRecord>,
    not_attempted: Vec<String>,
}

impl PipelineReport {
    pub(crate) fn new(deployment_id: impl Into<String>) -> Self {
        Self {
            deployment_id: deployment_id.into(),
            state: RunState::NotStarted,
            steps: Vec::new(),
            not_attempted: Vec::new(),
        }
    }

    pub(crate) fn set_state(&mut self, state: RunState) {
        self.state = state;
    }

    pub(crate) fn push(&mut self, record: StepRecord) {
        self.steps.push(record);
    }

    pub(crate) fn mark_not_attempted(&mut self, names: impl IntoIterator<Item = String>) {
        self.not_attempted.extend(names);
    }

    #[must_use]
    pub fn deployment_id(&self) -> &str {
        &self.deployment_id
    }

    #[must_use]
    pub fn state(&self) -> RunState {
        self.state
    }

    /// Attempted steps in execution order.
    #[must_use]
    pub fn steps(&self) -> &[StepRecord] {
        &self.steps
    }

    /// Steps that never ran because an earlier step failed.
    #[must_use]
    pub fn not_attempted(&self) -> &[String] {
        &self.not_attempted
    }

    #[must_use]
    pub fn is_success(&self) -> bool {
        self.state == RunState::Completed
    }

    /// The step that halted the run and its cause.
    #[must_use]
    pub fn failure(&self) -> Option<(&str, String)> {
        self.steps.iter().find_map(|record| match &record.outcome {
            StepOutcome::Succeeded => None,
            StepOutcome::Failed(cause) => Some((record.step_name.as_str(), cause.clone())),
            StepOutcome::Interrupted => Some((
                record.step_name.as_str(),
                "interrupted by shutdown signal".to_string(),
            )),
        })
    }
}
