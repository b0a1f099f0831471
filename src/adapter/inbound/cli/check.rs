//! Handler for the `check` command.

use std::sync::Arc;

use serde_json::json;

use crate::adapter::inbound::cli::output;
use crate::adapter::outbound::host::ProcfsInspector;
use crate::application::environment::ResolvedEnvironment;
use crate::application::shutdown::shutdown_channel;
use crate::domain::DependencyStatus;
use crate::infrastructure::bootstrap::dependency_checker;
use crate::infrastructure::config::settings::Config;

/// Run every dependency check once. Returns true when all passed.
pub async fn execute(config: &Config) -> bool {
    let environment = ResolvedEnvironment::from_process(&config.environment);
    let checker = dependency_checker(config, Arc::new(ProcfsInspector::new()));
    let (_trigger, signal) = shutdown_channel();
    let status = checker.check(&environment, &signal).await;

    if output::is_json() {
        output::document("dependencies", to_json(&status));
    } else {
        print_status(&status);
    }
    status.all_ok()
}

fn to_json(status: &DependencyStatus) -> serde_json::Value {
    let checks: Vec<_> = status
        .iter()
        .map(|(dependency, check)| {
            json!({
                "dependency": dependency.to_string(),
                "ok": check.ok,
                "detail": check.detail,
            })
        })
        .collect();
    json!({
        "ok": status.all_ok(),
        "secured_port": status.secured_port(),
        "checks": checks,
    })
}

fn print_status(status: &DependencyStatus) {
    output::header(env!("CARGO_PKG_VERSION"));
    output::section("Dependencies");
    for (dependency, check) in status.iter() {
        let line = match &check.detail {
            Some(detail) => format!("{dependency}: {detail}"),
            None => dependency.to_string(),
        };
        if check.ok {
            output::success(&line);
        } else {
            output::error(&line);
        }
    }
    if let Some(port) = status.secured_port() {
        output::field("Port", output::highlight(port));
    }
}
