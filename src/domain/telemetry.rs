//! Host telemetry snapshot.
//!
//! A [`TelemetrySnapshot`] is a single immutable read of host metrics at one
//! instant. Every metric is optional: a source that cannot be read leaves its
//! field `None` rather than inventing a value.

use std::collections::BTreeMap;

use chrono::{DateTime, Utc};
use serde::Serialize;

/// Per-interface network counters.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct NetworkCounters {
    pub bytes_received: u64,
    pub packets_received: u64,
    pub bytes_sent: u64,
    pub packets_sent: u64,
}

/// Immutable read of host telemetry.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct TelemetrySnapshot {
    /// When the sample was taken.
    pub sampled_at: DateTime<Utc>,
    /// Busy CPU share across all cores (0-100).
    pub cpu_usage_percent: Option<f64>,
    /// Share of physical memory not available for new allocations (0-100).
    pub memory_pressure_percent: Option<f64>,
    /// Memory available for new allocations, in MiB.
    pub available_memory_mb: Option<u64>,
    /// Used share of the filesystem holding the service working directory.
    pub disk_usage_percent: Option<f64>,
    /// Hottest thermal zone, absent on hosts without a sensor.
    pub temperature_celsius: Option<f64>,
    /// Used share of swap; `Some(0.0)` when no swap is configured.
    pub swap_percent: Option<f64>,
    /// Share of CPU time spent waiting on I/O (0-100).
    pub io_wait_percent: Option<f64>,
    /// Counters keyed by interface name.
    pub network: Option<BTreeMap<String, NetworkCounters>>,
    /// Number of processes visible on the host.
    pub process_count: Option<u32>,
}

impl TelemetrySnapshot {
    /// A snapshot with every metric absent.
    #[must_use]
    pub fn empty() -> Self {
        Self {
            sampled_at: Utc::now(),
            cpu_usage_percent: None,
            memory_pressure_percent: None,
            available_memory_mb: None,
            disk_usage_percent: None,
            temperature_celsius: None,
            swap_percent: None,
            io_wait_percent: None,
            network: None,
            process_count: None,
        }
    }

    /// Names of the metrics that could not be read.
    #[must_use]
    pub fn missing_metrics(&self) -> Vec<&'static str> {
        let mut missing = Vec::new();
        if self.cpu_usage_percent.is_none() {
            missing.push("cpu_usage");
        }
        if self.memory_pressure_percent.is_none() {
            missing.push("memory_pressure");
        }
        if self.available_memory_mb.is_none() {
            missing.push("available_memory");
        }
        if self.disk_usage_percent.is_none() {
            missing.push("disk_usage");
        }
        if self.temperature_celsius.is_none() {
            missing.push("temperature");
        }
        if self.swap_percent.is_none() {
            missing.push("swap");
        }
        if self.io_wait_percent.is_none() {
            missing.push("io_wait");
        }
        if self.network.is_none() {
            missing.push("network");
        }
        if self.process_count.is_none() {
            missing.push("process_count");
        }
        missing
    }
}
