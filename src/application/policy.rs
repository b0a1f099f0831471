//! Resource policy: telemetry in, resource limits out.
//!
//! Evaluation is pure. A host-class baseline is picked from available memory,
//! then every breached threshold contributes a set of caps, and the caps are
//! folded onto the baseline in one pass. Caps only ever tighten (minimum for
//! counts, maximum for the pool timeout) so breaching more thresholds can
//! never loosen a limit.

use std::fmt;

use serde::Serialize;

use crate::domain::{ResourceLimits, TelemetrySnapshot};

const BASE_POOL_TIMEOUT_SECS: u32 = 30;
const BASE_POOL_RECYCLE_SECS: u32 = 3600;

/// Host size class, from available memory.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum HostClass {
    /// Under 512 MiB available.
    Low,
    /// Under 1024 MiB available, or unknown.
    Mid,
    High,
}

impl HostClass {
    /// Classify by available memory. Unknown memory falls back to [`HostClass::Mid`].
    #[must_use]
    pub fn from_available_mb(available_mb: Option<u64>) -> Self {
        match available_mb {
            Some(mb) if mb < 512 => Self::Low,
            Some(mb) if mb < 1024 => Self::Mid,
            Some(_) => Self::High,
            None => Self::Mid,
        }
    }

    /// Limits when no threshold is breached.
    #[must_use]
    pub const fn baseline(self) -> ResourceLimits {
        let (max_workers, pool, overflow) = match self {
            Self::Low => (1, 3, 2),
            Self::Mid => (2, 5, 5),
            Self::High => (4, 10, 10),
        };
        ResourceLimits {
            max_workers,
            connection_pool_size: pool,
            max_overflow_connections: overflow,
            pool_timeout_seconds: BASE_POOL_TIMEOUT_SECS,
            pool_recycle_seconds: BASE_POOL_RECYCLE_SECS,
        }
    }
}

/// A telemetry dimension the policy reacts to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Signal {
    Temperature,
    MemoryPressure,
    CpuUsage,
    IoWait,
    Swap,
}

impl Signal {
    pub const ALL: [Signal; 5] = [
        Signal::Temperature,
        Signal::MemoryPressure,
        Signal::CpuUsage,
        Signal::IoWait,
        Signal::Swap,
    ];

    const fn thresholds(self) -> (Option<f64>, f64) {
        match self {
            Self::Temperature => (Some(70.0), 85.0),
            Self::MemoryPressure => (Some(80.0), 95.0),
            Self::CpuUsage => (Some(80.0), 95.0),
            Self::IoWait => (Some(20.0), 40.0),
            Self::Swap => (None, 80.0),
        }
    }

    fn reading(self, snapshot: &TelemetrySnapshot) -> Option<f64> {
        match self {
            Self::Temperature => snapshot.temperature_celsius,
            Self::MemoryPressure => snapshot.memory_pressure_percent,
            Self::CpuUsage => snapshot.cpu_usage_percent,
            Self::IoWait => snapshot.io_wait_percent,
            Self::Swap => snapshot.swap_percent,
        }
    }

    /// Level for one reading. Thresholds are strict: equal is not a breach.
    #[must_use]
    pub fn level(self, value: f64) -> ThreatLevel {
        let (warning, critical) = self.thresholds();
        if value > critical {
            ThreatLevel::Critical
        } else if warning.is_some_and(|w| value > w) {
            ThreatLevel::Warning
        } else {
            ThreatLevel::Nominal
        }
    }

    fn caps(self, level: ThreatLevel) -> Caps {
        match (self, level) {
            (_, ThreatLevel::Nominal) => Caps::NONE,
            (Self::Temperature, ThreatLevel::Warning) => Caps {
                max_workers: Some(2),
                ..Caps::NONE
            },
            (Self::Temperature, ThreatLevel::Critical) => Caps {
                max_workers: Some(1),
                ..Caps::NONE
            },
            (Self::MemoryPressure, ThreatLevel::Warning) => Caps {
                max_workers: Some(2),
                pool: Some(5),
                overflow: Some(2),
                ..Caps::NONE
            },
            (Self::MemoryPressure, ThreatLevel::Critical) => Caps {
                max_workers: Some(1),
                pool: Some(2),
                overflow: Some(1),
                ..Caps::NONE
            },
            (Self::CpuUsage, ThreatLevel::Warning) => Caps {
                max_workers: Some(2),
                ..Caps::NONE
            },
            (Self::CpuUsage, ThreatLevel::Critical) => Caps {
                max_workers: Some(1),
                recycle: Some(1800),
                ..Caps::NONE
            },
            (Self::IoWait, ThreatLevel::Warning) => Caps {
                timeout_floor: Some(90),
                ..Caps::NONE
            },
            (Self::IoWait, ThreatLevel::Critical) => Caps {
                timeout_floor: Some(120),
                overflow: Some(1),
                ..Caps::NONE
            },
            // Swap has no warning band.
            (Self::Swap, ThreatLevel::Warning) => Caps::NONE,
            (Self::Swap, ThreatLevel::Critical) => Caps {
                max_workers: Some(1),
                pool: Some(2),
                ..Caps::NONE
            },
        }
    }
}

impl fmt::Display for Signal {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Self::Temperature => "temperature",
            Self::MemoryPressure => "memory_pressure",
            Self::CpuUsage => "cpu_usage",
            Self::IoWait => "io_wait",
            Self::Swap => "swap",
        };
        f.write_str(name)
    }
}

/// Severity of one reading.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum ThreatLevel {
    Nominal,
    Warning,
    Critical,
}

/// One evaluated reading.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct Reading {
    pub signal: Signal,
    pub value: f64,
    pub level: ThreatLevel,
}

/// Per-signal levels for one snapshot. Absent metrics are omitted.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ThreatAssessment {
    pub host_class: HostClass,
    pub readings: Vec<Reading>,
}

impl ThreatAssessment {
    /// Worst level across readings.
    #[must_use]
    pub fn overall(&self) -> ThreatLevel {
        self.readings
            .iter()
            .map(|r| r.level)
            .max()
            .unwrap_or(ThreatLevel::Nominal)
    }

    /// Readings above nominal.
    pub fn breaches(&self) -> impl Iterator<Item = &Reading> {
        self.readings
            .iter()
            .filter(|r| r.level > ThreatLevel::Nominal)
    }
}

/// Upper bounds contributed by one breach. `timeout_floor` is a lower bound.
#[derive(Debug, Clone, Copy, Default)]
struct Caps {
    max_workers: Option<u32>,
    pool: Option<u32>,
    overflow: Option<u32>,
    timeout_floor: Option<u32>,
    recycle: Option<u32>,
}

impl Caps {
    const NONE: Self = Self {
        max_workers: None,
        pool: None,
        overflow: None,
        timeout_floor: None,
        recycle: None,
    };

    fn apply(self, limits: ResourceLimits) -> ResourceLimits {
        fn cap(current: u32, bound: Option<u32>) -> u32 {
            bound.map_or(current, |b| current.min(b))
        }
        ResourceLimits {
            max_workers: cap(limits.max_workers, self.max_workers),
            connection_pool_size: cap(limits.connection_pool_size, self.pool),
            max_overflow_connections: cap(limits.max_overflow_connections, self.overflow),
            pool_timeout_seconds: self
                .timeout_floor
                .map_or(limits.pool_timeout_seconds, |f| limits.pool_timeout_seconds.max(f)),
            pool_recycle_seconds: cap(limits.pool_recycle_seconds, self.recycle),
        }
    }
}

/// Classify every present signal in `snapshot`.
#[must_use]
pub fn assess(snapshot: &TelemetrySnapshot) -> ThreatAssessment {
    let readings = Signal::ALL
        .iter()
        .filter_map(|&signal| {
            signal.reading(snapshot).map(|value| Reading {
                signal,
                value,
                level: signal.level(value),
            })
        })
        .collect();
    ThreatAssessment {
        host_class: HostClass::from_available_mb(snapshot.available_memory_mb),
        readings,
    }
}

/// Derive resource limits from one snapshot.
///
/// Absent metrics never count as breaches.
#[must_use]
pub fn evaluate(snapshot: &TelemetrySnapshot) -> ResourceLimits {
    let assessment = assess(snapshot);
    assessment
        .readings
        .iter()
        .map(|r| r.signal.caps(r.level))
        .fold(assessment.host_class.baseline(), |limits, caps| {
            caps.apply(limits)
        })
}
