//! Managed service launch and lifecycle.
//!
//! The [`ManagedProcess`] handle is shared between the launcher (creation) and
//! the shutdown controller (termination) behind one async mutex, so a stop in
//! progress can never race a fresh launch.

use std::fmt;
use std::fs::File;
use std::path::Path;
use std::process::{ExitStatus, Stdio};
use std::sync::Arc;
use std::time::Duration;

use serde::Serialize;
use tokio::process::{Child, Command};
use tracing::{debug, info, warn};

use super::shutdown::ShutdownSignal;
use crate::domain::ResourceLimits;
use crate::error::{Error, LaunchError, Result};
use crate::infrastructure::config::service::ServiceConfig;

/// Environment variable carrying the secured port.
pub const ENV_PORT: &str = "PORT";

/// Bytes of captured output surfaced when the service dies during its grace period.
const OUTPUT_TAIL_BYTES: u64 = 4096;

/// Upper bound on waiting for a force-stopped process to be reaped.
const KILL_REAP_TIMEOUT: Duration = Duration::from_secs(5);

/// Shared handle to the managed process.
pub type SharedProcess = Arc<tokio::sync::Mutex<ManagedProcess>>;

/// Lifecycle of the managed process.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum ProcessState {
    Absent,
    Launching,
    Running,
    Terminated,
}

impl fmt::Display for ProcessState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Self::Absent => "absent",
            Self::Launching => "launching",
            Self::Running => "running",
            Self::Terminated => "terminated",
        };
        f.write_str(name)
    }
}

/// The service child process, owned exclusively by the orchestrator.
#[derive(Debug)]
pub struct ManagedProcess {
    state: ProcessState,
    child: Option<Child>,
    pid: Option<u32>,
}

impl Default for ManagedProcess {
    fn default() -> Self {
        Self::new()
    }
}

impl ManagedProcess {
    #[must_use]
    pub const fn new() -> Self {
        Self {
            state: ProcessState::Absent,
            child: None,
            pid: None,
        }
    }

    /// A fresh, absent process behind the shared lock.
    #[must_use]
    pub fn shared() -> SharedProcess {
        Arc::new(tokio::sync::Mutex::new(Self::new()))
    }

    #[must_use]
    pub const fn state(&self) -> ProcessState {
        self.state
    }

    /// OS process id while a child is held.
    #[must_use]
    pub const fn pid(&self) -> Option<u32> {
        self.pid
    }

    /// Exit status if the child has exited since the last check.
    ///
    /// Marks the process terminated when it has.
    pub fn try_exited(&mut self) -> Option<ExitStatus> {
        let child = self.child.as_mut()?;
        match child.try_wait() {
            Ok(Some(status)) => {
                self.child = None;
                self.pid = None;
                self.state = ProcessState::Terminated;
                Some(status)
            }
            Ok(None) => None,
            Err(e) => {
                warn!(error = %e, "Failed to poll managed process");
                None
            }
        }
    }

    /// Stop the child: graceful signal first, force-stop after `timeout`.
    ///
    /// Returns the exit status when it could be collected. A no-op when no
    /// child is held.
    pub async fn terminate(&mut self, timeout: Duration) -> Option<ExitStatus> {
        let mut child = self.child.take()?;
        let pid = self.pid.take();
        self.state = ProcessState::Terminated;

        if let Some(pid) = pid {
            if !request_graceful_stop(pid) {
                debug!(pid, "Graceful stop signal not delivered");
            }
        }

        match tokio::time::timeout(timeout, child.wait()).await {
            Ok(Ok(status)) => return Some(status),
            Ok(Err(e)) => {
                warn!(error = %e, "Failed waiting for managed process");
                return None;
            }
            Err(_) => {
                warn!(
                    timeout_secs = timeout.as_secs(),
                    "Managed process ignored graceful stop, force-stopping"
                );
            }
        }

        if let Err(e) = child.start_kill() {
            warn!(error = %e, "Force-stop failed");
            return None;
        }
        match tokio::time::timeout(KILL_REAP_TIMEOUT, child.wait()).await {
            Ok(Ok(status)) => Some(status),
            Ok(Err(e)) => {
                warn!(error = %e, "Failed reaping force-stopped process");
                None
            }
            Err(_) => {
                warn!("Force-stopped process was not reaped in time");
                None
            }
        }
    }
}

/// Send SIGTERM to `pid`. Returns false if the signal was not delivered.
#[cfg(unix)]
pub(crate) fn request_graceful_stop(pid: u32) -> bool {
    let Ok(pid) = libc::pid_t::try_from(pid) else {
        return false;
    };
    // SAFETY: kill(2) has no memory-safety preconditions.
    unsafe { libc::kill(pid, libc::SIGTERM) == 0 }
}

#[cfg(not(unix))]
pub(crate) fn request_graceful_stop(_pid: u32) -> bool {
    false
}

/// Environment overlay for the managed process.
///
/// Resource limits, the secured port, then `extra` (resolved configuration
/// and certificate paths). Later entries win on duplicate names.
#[must_use]
pub fn launch_environment(
    limits: &ResourceLimits,
    port: u16,
    extra: &[(String, String)],
) -> Vec<(String, String)> {
    let mut env: Vec<(String, String)> = limits
        .to_env()
        .into_iter()
        .map(|(name, value)| (name.to_string(), value))
        .collect();
    env.push((ENV_PORT.to_string(), port.to_string()));
    env.extend(extra.iter().cloned());
    env
}

/// What to launch with.
#[derive(Debug, Clone, Copy)]
pub struct LaunchRequest<'a> {
    pub limits: &'a ResourceLimits,
    pub port: u16,
    pub extra_env: &'a [(String, String)],
}

/// Starts the managed service and samples its liveness once.
#[derive(Debug, Clone)]
pub struct ProcessLauncher {
    config: ServiceConfig,
}

impl ProcessLauncher {
    #[must_use]
    pub fn new(config: ServiceConfig) -> Self {
        Self { config }
    }

    fn grace_period(&self, limits: &ResourceLimits) -> Duration {
        if limits.is_constrained() {
            Duration::from_secs(self.config.constrained_grace_period_secs)
        } else {
            Duration::from_secs(self.config.grace_period_secs)
        }
    }

    /// Start the service and confirm it survives the grace period.
    ///
    /// Returns the child's pid. The child inherits no stdin; stdout and
    /// stderr go to the configured log file.
    ///
    /// # Errors
    ///
    /// Fails if shutdown has started, a process is already managed, the
    /// command cannot be spawned, or the child exits during the grace period
    /// (its captured output is included). Returns [`Error::Interrupted`] if
    /// shutdown preempts the grace wait.
    pub async fn launch(
        &self,
        process: &SharedProcess,
        shutdown: &ShutdownSignal,
        request: LaunchRequest<'_>,
    ) -> Result<u32> {
        let log_path = self.config.log_path();
        let pid = {
            let mut guard = process.lock().await;
            if shutdown.is_triggered() {
                return Err(LaunchError::ShuttingDown.into());
            }
            if matches!(
                guard.state,
                ProcessState::Launching | ProcessState::Running
            ) {
                return Err(LaunchError::AlreadyManaged {
                    state: guard.state.to_string(),
                }
                .into());
            }

            let (stdout, stderr) = open_output(&log_path)?;
            let args = self.config.args_for_port(request.port);
            let env = launch_environment(request.limits, request.port, request.extra_env);

            info!(
                command = %self.config.command,
                args = ?args,
                port = request.port,
                max_workers = request.limits.max_workers,
                "Launching service"
            );

            let child = Command::new(&self.config.command)
                .args(&args)
                .current_dir(&self.config.working_dir)
                .envs(env)
                .stdin(Stdio::null())
                .stdout(stdout)
                .stderr(stderr)
                .spawn()
                .map_err(|source| LaunchError::Spawn {
                    command: self.config.command.clone(),
                    source,
                })?;

            let pid = child.id().unwrap_or_default();
            guard.child = Some(child);
            guard.pid = Some(pid);
            guard.state = ProcessState::Launching;
            pid
        };

        let grace = self.grace_period(request.limits);
        debug!(pid, grace_secs = grace.as_secs(), "Waiting for grace period");
        shutdown.sleep(grace).await?;

        let mut guard = process.lock().await;
        if guard.state != ProcessState::Launching {
            // Teardown took the child while we were waiting.
            return Err(Error::Interrupted);
        }
        if let Some(status) = guard.try_exited() {
            let output = read_output_tail(&log_path);
            return Err(LaunchError::ExitedEarly {
                status: status.to_string(),
                output,
            }
            .into());
        }

        guard.state = ProcessState::Running;
        info!(pid, "Service is running");
        Ok(pid)
    }
}

fn open_output(path: &Path) -> Result<(Stdio, Stdio)> {
    if let Some(parent) = path.parent() {
        std::fs::create_dir_all(parent)?;
    }
    let stdout = File::create(path)?;
    let stderr = stdout.try_clone()?;
    Ok((Stdio::from(stdout), Stdio::from(stderr)))
}

/// Last few KiB of captured output, for diagnostics.
fn read_output_tail(path: &Path) -> String {
    use std::io::{Read, Seek, SeekFrom};

    let Ok(mut file) = File::open(path) else {
        return String::new();
    };
    let len = file.metadata().map(|m| m.len()).unwrap_or(0);
    if len > OUTPUT_TAIL_BYTES && file.seek(SeekFrom::Start(len - OUTPUT_TAIL_BYTES)).is_err() {
        return String::new();
    }
    let mut buf = Vec::new();
    if file.read_to_end(&mut buf).is_err() {
        return String::new();
    }
    String::from_utf8_lossy(&buf).trim_end().to_string()
}
