//! Background resource monitor settings.

use serde::Deserialize;

/// Post-deployment monitoring loop.
#[derive(Debug, Clone, Deserialize)]
pub struct MonitorConfig {
    #[serde(default = "default_monitor_enabled")]
    pub enabled: bool,
    #[serde(default = "default_interval_secs")]
    pub interval_secs: u64,
    /// Same-command processes older than this are terminated.
    #[serde(default = "default_stray_max_age_secs")]
    pub stray_max_age_secs: u64,
    /// Window over which CPU usage and I/O wait are measured.
    #[serde(default = "default_telemetry_interval_ms")]
    pub telemetry_interval_ms: u64,
}

const fn default_monitor_enabled() -> bool {
    true
}

const fn default_interval_secs() -> u64 {
    300
}

const fn default_stray_max_age_secs() -> u64 {
    86_400
}

const fn default_telemetry_interval_ms() -> u64 {
    250
}

impl Default for MonitorConfig {
    fn default() -> Self {
        Self {
            enabled: default_monitor_enabled(),
            interval_secs: default_interval_secs(),
            stray_max_age_secs: default_stray_max_age_secs(),
            telemetry_interval_ms: default_telemetry_interval_ms(),
        }
    }
}
