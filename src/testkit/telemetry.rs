//! Fake telemetry source and snapshot builders.

use std::sync::atomic::{AtomicUsize, Ordering};

use parking_lot::Mutex;

use crate::domain::TelemetrySnapshot;
use crate::port::TelemetrySource;

/// A snapshot with every metric well inside nominal ranges.
#[must_use]
pub fn nominal_snapshot(available_memory_mb: u64) -> TelemetrySnapshot {
    TelemetrySnapshot {
        cpu_usage_percent: Some(12.0),
        memory_pressure_percent: Some(35.0),
        available_memory_mb: Some(available_memory_mb),
        disk_usage_percent: Some(40.0),
        temperature_celsius: Some(48.0),
        swap_percent: Some(0.0),
        io_wait_percent: Some(1.5),
        process_count: Some(150),
        ..TelemetrySnapshot::empty()
    }
}

/// Returns a fixed snapshot and counts samples.
#[derive(Debug)]
pub struct FakeTelemetry {
    snapshot: Mutex<TelemetrySnapshot>,
    samples: AtomicUsize,
}

impl FakeTelemetry {
    #[must_use]
    pub fn new(snapshot: TelemetrySnapshot) -> Self {
        Self {
            snapshot: Mutex::new(snapshot),
            samples: AtomicUsize::new(0),
        }
    }

    /// Replace the snapshot returned by later samples.
    pub fn set(&self, snapshot: TelemetrySnapshot) {
        *self.snapshot.lock() = snapshot;
    }

    #[must_use]
    pub fn samples(&self) -> usize {
        self.samples.load(Ordering::SeqCst)
    }
}

impl TelemetrySource for FakeTelemetry {
    fn sample(&self) -> TelemetrySnapshot {
        self.samples.fetch_add(1, Ordering::SeqCst);
        self.snapshot.lock().clone()
    }
}
