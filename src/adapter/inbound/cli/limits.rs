//! Handler for the `limits` command.

use std::sync::Arc;

use serde_json::json;

use crate::adapter::inbound::cli::output;
use crate::application::policy::{assess, evaluate};
use crate::domain::{ResourceLimits, TelemetrySnapshot};
use crate::error::{Error, Result};
use crate::infrastructure::bootstrap::telemetry_for;
use crate::infrastructure::config::settings::Config;
use crate::port::TelemetrySource;

/// Sample the local host and print the snapshot and derived limits.
pub async fn execute(config: &Config) -> Result<()> {
    let telemetry: Arc<dyn TelemetrySource> = Arc::new(telemetry_for(config));
    let snapshot = tokio::task::spawn_blocking(move || telemetry.sample())
        .await
        .map_err(|e| Error::Connection(format!("telemetry task failed: {e}")))?;
    let assessment = assess(&snapshot);
    let limits = evaluate(&snapshot);

    if output::is_json() {
        output::document(
            "limits",
            json!({
                "snapshot": snapshot,
                "assessment": assessment,
                "limits": limits,
            }),
        );
        return Ok(());
    }

    output::header(env!("CARGO_PKG_VERSION"));
    print_snapshot(&snapshot);

    output::section("Assessment");
    output::field("Host class", format!("{:?}", assessment.host_class));
    output::field("Overall", format!("{:?}", assessment.overall()));
    for reading in assessment.breaches() {
        output::warning(&format!(
            "{} at {:.1} is {:?}",
            reading.signal, reading.value, reading.level
        ));
    }

    print_limits(&limits);
    Ok(())
}

fn print_snapshot(snapshot: &TelemetrySnapshot) {
    output::section("Telemetry");
    output::field("CPU", output::metric(snapshot.cpu_usage_percent, "%"));
    output::field("Memory", output::metric(snapshot.memory_pressure_percent, "%"));
    output::field(
        "Available",
        snapshot
            .available_memory_mb
            .map_or_else(|| "n/a".to_string(), |mb| format!("{mb} MiB")),
    );
    output::field("Disk", output::metric(snapshot.disk_usage_percent, "%"));
    output::field("Temperature", output::metric(snapshot.temperature_celsius, "°C"));
    output::field("Swap", output::metric(snapshot.swap_percent, "%"));
    output::field("I/O wait", output::metric(snapshot.io_wait_percent, "%"));
    output::field(
        "Processes",
        snapshot
            .process_count
            .map_or_else(|| "n/a".to_string(), |n| n.to_string()),
    );
    let missing = snapshot.missing_metrics();
    if !missing.is_empty() {
        output::note(&format!("unavailable: {}", missing.join(", ")));
    }
}

fn print_limits(limits: &ResourceLimits) {
    output::section("Limits");
    output::field("Workers", output::highlight(limits.max_workers));
    output::field("Pool size", limits.connection_pool_size);
    output::field("Overflow", limits.max_overflow_connections);
    output::field("Pool timeout", format!("{}s", limits.pool_timeout_seconds));
    output::field("Pool recycle", format!("{}s", limits.pool_recycle_seconds));
}
