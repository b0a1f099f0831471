//! Background resource monitor.
//!
//! Runs after a completed deployment. It re-samples telemetry on a fixed
//! interval and logs what the policy would decide now; limits already handed
//! to the running service are never changed. Stray same-command processes
//! past the age threshold are stopped.

use std::collections::HashSet;
use std::sync::Arc;
use std::time::Duration;

use tokio::time::{interval_at, Instant, MissedTickBehavior};
use tracing::{debug, info, warn};

use super::launcher::SharedProcess;
use super::policy::{assess, evaluate};
use super::shutdown::ShutdownSignal;
use crate::domain::ResourceLimits;
use crate::infrastructure::config::monitor::MonitorConfig;
use crate::port::{ProcessInfo, ProcessInspector, TelemetrySource};

/// Pids of processes running `command` that are older than `max_age`.
///
/// Never includes `own_pid`, `managed_pid` or any descendant of the managed
/// process (its workers). Processes of unknown age are left alone.
#[must_use]
pub fn select_strays(
    processes: &[ProcessInfo],
    command: &str,
    managed_pid: Option<u32>,
    own_pid: u32,
    max_age: Duration,
) -> Vec<u32> {
    let managed_tree = managed_pid.map_or_else(HashSet::new, |pid| descendants(processes, pid));
    processes
        .iter()
        .filter(|p| p.runs(command))
        .filter(|p| p.pid != own_pid && !managed_tree.contains(&p.pid))
        .filter(|p| p.age.is_some_and(|age| age > max_age))
        .map(|p| p.pid)
        .collect()
}

/// `root` and every process descended from it.
fn descendants(processes: &[ProcessInfo], root: u32) -> HashSet<u32> {
    let mut tree = HashSet::from([root]);
    loop {
        let before = tree.len();
        for p in processes {
            if p.parent_pid.is_some_and(|parent| tree.contains(&parent)) {
                tree.insert(p.pid);
            }
        }
        if tree.len() == before {
            return tree;
        }
    }
}

/// Periodic telemetry and stray-process sweep.
pub struct ResourceMonitor {
    telemetry: Arc<dyn TelemetrySource>,
    inspector: Arc<dyn ProcessInspector>,
    config: MonitorConfig,
    command: String,
    applied: ResourceLimits,
}

impl ResourceMonitor {
    /// `applied` are the limits the running service was launched with.
    #[must_use]
    pub fn new(
        telemetry: Arc<dyn TelemetrySource>,
        inspector: Arc<dyn ProcessInspector>,
        config: MonitorConfig,
        command: impl Into<String>,
        applied: ResourceLimits,
    ) -> Self {
        Self {
            telemetry,
            inspector,
            config,
            command: command.into(),
            applied,
        }
    }

    /// Tick every `interval_secs` until shutdown is signalled.
    ///
    /// The first tick fires one full interval after the call.
    pub async fn run(self, process: SharedProcess, shutdown: ShutdownSignal) {
        let period = Duration::from_secs(self.config.interval_secs.max(1));
        let mut ticker = interval_at(Instant::now() + period, period);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
        info!(interval_secs = period.as_secs(), "Resource monitor started");

        let mut exit_reported = false;
        loop {
            tokio::select! {
                _ = ticker.tick() => {}
                () = shutdown.triggered() => break,
            }
            self.sample().await;

            let (exited, managed_pid) = {
                let mut guard = process.lock().await;
                (guard.try_exited(), guard.pid())
            };
            if let Some(status) = exited {
                warn!(%status, "Managed process has exited");
                exit_reported = true;
            } else if managed_pid.is_none() && !exit_reported {
                warn!("No managed process is running");
                exit_reported = true;
            }

            self.sweep(managed_pid);
        }
        info!("Resource monitor stopped");
    }

    async fn sample(&self) {
        let telemetry = Arc::clone(&self.telemetry);
        let snapshot = match tokio::task::spawn_blocking(move || telemetry.sample()).await {
            Ok(snapshot) => snapshot,
            Err(e) => {
                warn!(error = %e, "Telemetry sample failed");
                return;
            }
        };

        let assessment = assess(&snapshot);
        for reading in assessment.breaches() {
            warn!(
                signal = %reading.signal,
                value = reading.value,
                level = ?reading.level,
                "Host signal above threshold"
            );
        }
        let next = evaluate(&snapshot);
        if next == self.applied {
            debug!(overall = ?assessment.overall(), "Host within applied limits");
        } else {
            info!(
                overall = ?assessment.overall(),
                applied_workers = self.applied.max_workers,
                next_workers = next.max_workers,
                applied_pool = self.applied.connection_pool_size,
                next_pool = next.connection_pool_size,
                "Next deployment would use different limits"
            );
        }
    }

    fn sweep(&self, managed_pid: Option<u32>) {
        let max_age = Duration::from_secs(self.config.stray_max_age_secs);
        let strays = select_strays(
            &self.inspector.processes(),
            &self.command,
            managed_pid,
            std::process::id(),
            max_age,
        );
        for pid in strays {
            if self.inspector.terminate(pid) {
                warn!(pid, max_age_secs = max_age.as_secs(), "Stopped stray service process");
            } else {
                warn!(pid, "Could not stop stray service process");
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::application::launcher::ManagedProcess;
    use crate::application::policy::evaluate;
    use crate::application::shutdown::shutdown_channel;
    use crate::testkit::process::{child_process, process, FakeInspector};
    use crate::testkit::telemetry::{nominal_snapshot, FakeTelemetry};

    const DAY: Duration = Duration::from_secs(86_400);

    #[test]
    fn strays_exclude_managed_and_young_processes() {
        let processes = vec![
            process(10, "gunicorn --bind 0.0.0.0:3000", Some(90_000)),
            process(11, "gunicorn --bind 0.0.0.0:3001", Some(60)),
            process(12, "gunicorn --bind 0.0.0.0:3002", Some(200_000)),
            process(13, "postgres: checkpointer", Some(500_000)),
            process(14, "gunicorn worker", None),
        ];
        assert_eq!(
            select_strays(&processes, "gunicorn", Some(12), 1, DAY),
            vec![10]
        );
        assert_eq!(
            select_strays(&processes, "gunicorn", None, 10, DAY),
            vec![12]
        );
    }

    #[test]
    fn workers_of_the_managed_process_are_not_strays() {
        let processes = vec![
            process(100, "gunicorn --bind 0.0.0.0:3000 app:app", Some(200_000)),
            child_process(101, 100, "gunicorn --bind 0.0.0.0:3000 app:app", Some(199_990)),
            child_process(102, 101, "gunicorn --bind 0.0.0.0:3000 app:app", Some(199_000)),
            process(200, "gunicorn --bind 0.0.0.0:3005 app:app", Some(300_000)),
            child_process(201, 200, "gunicorn --bind 0.0.0.0:3005 app:app", Some(300_000)),
        ];
        assert_eq!(
            select_strays(&processes, "gunicorn", Some(100), 1, DAY),
            vec![200, 201]
        );
    }

    #[tokio::test(start_paused = true)]
    async fn ticks_sweep_until_shutdown() {
        let telemetry = Arc::new(FakeTelemetry::new(nominal_snapshot(4096)));
        let inspector = Arc::new(
            FakeInspector::new().with_processes(vec![process(77, "gunicorn app", Some(100_000))]),
        );
        let config = MonitorConfig {
            interval_secs: 60,
            ..MonitorConfig::default()
        };
        let monitor = ResourceMonitor::new(
            telemetry.clone(),
            inspector.clone(),
            config,
            "gunicorn",
            evaluate(&nominal_snapshot(4096)),
        );
        let (tx, signal) = shutdown_channel();
        let task = tokio::spawn(monitor.run(ManagedProcess::shared(), signal));

        tokio::time::sleep(Duration::from_secs(150)).await;
        tx.send_replace(true);
        task.await.unwrap();

        assert_eq!(telemetry.samples(), 2);
        assert!(inspector.terminated().contains(&77));
    }
}
