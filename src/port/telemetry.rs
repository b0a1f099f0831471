//! Telemetry source port.

use crate::domain::TelemetrySnapshot;

/// Capability to read current host metrics.
///
/// Implementations probe each metric independently and must never fail the
/// whole sample because one metric is unreadable: the field is left `None`
/// and a warning is logged instead. Sampling may block briefly (CPU usage is
/// measured over a short window), so async callers should use
/// `spawn_blocking`.
pub trait TelemetrySource: Send + Sync {
    /// Take one snapshot of host metrics.
    fn sample(&self) -> TelemetrySnapshot;
}
