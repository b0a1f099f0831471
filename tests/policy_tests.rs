//! Resource policy properties over grids of snapshots.

use stagehand::application::policy::{evaluate, HostClass};
use stagehand::domain::TelemetrySnapshot;
use stagehand::testkit::telemetry::nominal_snapshot;

const MEMORY_MB: [u64; 5] = [128, 511, 512, 1024, 16_384];

/// Snapshots varying every field except temperature.
fn grid() -> Vec<TelemetrySnapshot> {
    let mut snapshots = Vec::new();
    for &available in &MEMORY_MB {
        for cpu in [None, Some(5.0), Some(85.0), Some(99.0)] {
            for memory in [None, Some(20.0), Some(90.0), Some(99.0)] {
                for io_wait in [None, Some(0.5), Some(30.0), Some(60.0)] {
                    for swap in [None, Some(0.0), Some(95.0)] {
                        snapshots.push(TelemetrySnapshot {
                            cpu_usage_percent: cpu,
                            memory_pressure_percent: memory,
                            io_wait_percent: io_wait,
                            swap_percent: swap,
                            ..nominal_snapshot(available)
                        });
                    }
                }
            }
        }
    }
    snapshots
}

#[test]
fn overheating_always_yields_single_worker() {
    for temperature in [85.01, 90.0, 120.0] {
        for snapshot in grid() {
            let hot = TelemetrySnapshot {
                temperature_celsius: Some(temperature),
                ..snapshot
            };
            assert_eq!(evaluate(&hot).max_workers, 1, "{hot:?}");
        }
    }
}

#[test]
fn nominal_host_with_enough_memory_gets_full_baseline() {
    for available in [1024, 2048, 65_536] {
        let limits = evaluate(&nominal_snapshot(available));
        assert_eq!(limits, HostClass::High.baseline());
        assert_eq!(limits.max_workers, 4);
        assert_eq!(limits.connection_pool_size, 10);
    }
}

#[test]
fn two_breaches_are_never_looser_than_either_alone() {
    type Breach = fn(TelemetrySnapshot) -> TelemetrySnapshot;
    let breaches: [Breach; 5] = [
        |s| TelemetrySnapshot {
            temperature_celsius: Some(90.0),
            ..s
        },
        |s| TelemetrySnapshot {
            memory_pressure_percent: Some(97.0),
            ..s
        },
        |s| TelemetrySnapshot {
            cpu_usage_percent: Some(97.0),
            ..s
        },
        |s| TelemetrySnapshot {
            io_wait_percent: Some(45.0),
            ..s
        },
        |s| TelemetrySnapshot {
            swap_percent: Some(85.0),
            ..s
        },
    ];

    for &available in &MEMORY_MB {
        let base = nominal_snapshot(available);
        for (i, first) in breaches.iter().enumerate() {
            for second in &breaches[i + 1..] {
                let alone_a = evaluate(&first(base.clone()));
                let alone_b = evaluate(&second(base.clone()));
                let both = evaluate(&second(first(base.clone())));
                assert!(both.at_least_as_tight_as(&alone_a), "{both:?} vs {alone_a:?}");
                assert!(both.at_least_as_tight_as(&alone_b), "{both:?} vs {alone_b:?}");
            }
        }
    }
}

#[test]
fn limits_never_drop_below_one_worker_or_exceed_baseline() {
    for snapshot in grid() {
        let limits = evaluate(&snapshot);
        let baseline = HostClass::from_available_mb(snapshot.available_memory_mb).baseline();
        assert!(limits.max_workers >= 1);
        assert!(limits.connection_pool_size >= 1);
        assert!(limits.at_least_as_tight_as(&baseline), "{limits:?}");
    }
}
