//! Handler for the `deploy` command.

use std::process::ExitStatus;
use std::time::Duration;

use serde_json::json;
use tracing::{info, warn};

use super::{EXIT_FAILURE, EXIT_INTERRUPTED, EXIT_OK};
use crate::adapter::inbound::cli::command::DeployArgs;
use crate::adapter::inbound::cli::output;
use crate::application::launcher::SharedProcess;
use crate::application::pipeline::RunScope;
use crate::application::steps::CheckConfiguration;
use crate::domain::{PipelineReport, StepOutcome};
use crate::error::Result;
use crate::infrastructure::bootstrap::{build_pipeline, resource_monitor, HostAdapters};
use crate::infrastructure::config::settings::Config;
use crate::infrastructure::context::OrchestratorContext;

/// How often supervision checks whether the service is still running.
const EXIT_POLL_INTERVAL: Duration = Duration::from_secs(1);

/// Run the pipeline, then supervise the service until it stops or a signal arrives.
///
/// Returns the process exit code.
pub async fn execute(config: Config, args: &DeployArgs) -> Result<i32> {
    let ctx = OrchestratorContext::new(config);
    let adapters = HostAdapters::real(ctx.config())?;
    let _signals = ctx.shutdown().arm()?;

    info!(deployment_id = ctx.deployment_id(), "stagehand deploying");
    let mut pipeline = build_pipeline(&ctx, &adapters, CheckConfiguration::from_process());
    let scope = RunScope::new();
    let report = pipeline.run(&ctx, &scope).await;
    print_report(&report);

    if ctx.shutdown().is_shutting_down() {
        ctx.shutdown().finished().await;
        return Ok(EXIT_INTERRUPTED);
    }
    if !report.is_success() {
        ctx.shutdown().teardown("deployment failed").await;
        return Ok(EXIT_FAILURE);
    }

    let monitor = match scope.artifacts().limits {
        Some(limits) if ctx.config().monitor.enabled && !args.no_monitor => {
            let monitor = resource_monitor(ctx.config(), &adapters, limits);
            Some(tokio::spawn(monitor.run(ctx.process().clone(), ctx.signal())))
        }
        _ => None,
    };

    let code = tokio::select! {
        () = ctx.shutdown().finished() => EXIT_INTERRUPTED,
        status = service_exit(ctx.process()) => {
            warn!(%status, "Service stopped on its own");
            output::warning(&format!("Service exited ({status})"));
            ctx.shutdown().teardown("service exited").await;
            if status.success() { EXIT_OK } else { EXIT_FAILURE }
        }
    };

    if let Some(monitor) = monitor {
        if let Err(e) = monitor.await {
            warn!(error = %e, "Resource monitor task failed");
        }
    }
    Ok(code)
}

/// Resolve once the managed service has exited.
async fn service_exit(process: &SharedProcess) -> ExitStatus {
    let mut ticker = tokio::time::interval(EXIT_POLL_INTERVAL);
    loop {
        ticker.tick().await;
        if let Some(status) = process.lock().await.try_exited() {
            return status;
        }
    }
}

fn print_report(report: &PipelineReport) {
    if output::is_json() {
        output::document("report", json!(report));
        return;
    }

    output::header(env!("CARGO_PKG_VERSION"));
    output::field("Deployment", output::muted(report.deployment_id()));
    output::section("Steps");
    for record in report.steps() {
        let elapsed = (record.finished_at - record.started_at)
            .to_std()
            .unwrap_or_default();
        let timing = format!("{:.1}s, {} attempt(s)", elapsed.as_secs_f64(), record.attempts);
        match &record.outcome {
            StepOutcome::Succeeded => {
                output::success(&format!("{} {}", record.step_name, output::muted(timing)));
            }
            StepOutcome::Failed(cause) => {
                output::error(&format!("{}: {cause} ({timing})", record.step_name));
            }
            StepOutcome::Interrupted => {
                output::warning(&format!("{} interrupted by shutdown", record.step_name));
            }
        }
    }
    for name in report.not_attempted() {
        output::note(&format!("{name} not attempted"));
    }

    match report.failure() {
        None => output::success("Deployment completed"),
        Some((step, cause)) => output::error(&format!("Deployment failed at {step}: {cause}")),
    }
}
