//! Signal-driven teardown.
//!
//! [`ShutdownController`] owns the one-shot shutdown flag. Blocking points in
//! the pipeline observe it through a cloned [`ShutdownSignal`] and bail out
//! with [`Error::Interrupted`] as soon as it flips. Teardown itself runs
//! exactly once no matter how many signals arrive.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;

use parking_lot::Mutex;
use tokio::sync::watch;
use tokio::task::JoinHandle;
use tracing::{info, warn};

use super::launcher::SharedProcess;
use crate::error::{Error, Result};
use crate::port::ResourceRelease;

/// Create a shutdown flag and an observer of it.
///
/// Sending `true` on the returned sender triggers every clone of the signal.
#[must_use]
pub fn shutdown_channel() -> (watch::Sender<bool>, ShutdownSignal) {
    let (tx, rx) = watch::channel(false);
    (tx, ShutdownSignal { rx })
}

/// Read side of the shutdown flag.
#[derive(Debug, Clone)]
pub struct ShutdownSignal {
    rx: watch::Receiver<bool>,
}

impl ShutdownSignal {
    /// True once shutdown has been requested.
    #[must_use]
    pub fn is_triggered(&self) -> bool {
        *self.rx.borrow()
    }

    /// Resolve when shutdown is requested. Never resolves if the controller is gone.
    pub async fn triggered(&self) {
        let mut rx = self.rx.clone();
        let closed = rx.wait_for(|triggered| *triggered).await.is_err();
        if closed {
            std::future::pending::<()>().await;
        }
    }

    /// Sleep for `duration` unless shutdown is requested first.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Interrupted`] if shutdown preempts the sleep.
    pub async fn sleep(&self, duration: Duration) -> Result<()> {
        if self.is_triggered() {
            return Err(Error::Interrupted);
        }
        tokio::select! {
            () = tokio::time::sleep(duration) => Ok(()),
            () = self.triggered() => Err(Error::Interrupted),
        }
    }
}

/// Whether a teardown request did any work.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TeardownOutcome {
    /// This call ran the teardown sequence.
    Performed,
    /// Teardown had already started; nothing was done.
    AlreadyStarted,
}

/// Stops the managed process and releases pooled resources exactly once.
pub struct ShutdownController {
    trigger: watch::Sender<bool>,
    finished: watch::Sender<bool>,
    started: AtomicBool,
    process: SharedProcess,
    releases: Mutex<Vec<Arc<dyn ResourceRelease>>>,
    stop_timeout: Duration,
}

impl ShutdownController {
    #[must_use]
    pub fn new(process: SharedProcess, stop_timeout: Duration) -> Self {
        let (trigger, _) = watch::channel(false);
        let (finished, _) = watch::channel(false);
        Self {
            trigger,
            finished,
            started: AtomicBool::new(false),
            process,
            releases: Mutex::new(Vec::new()),
            stop_timeout,
        }
    }

    /// Observer for blocking points that must yield to shutdown.
    #[must_use]
    pub fn signal(&self) -> ShutdownSignal {
        ShutdownSignal {
            rx: self.trigger.subscribe(),
        }
    }

    /// Register a pooled resource to release during teardown.
    pub fn register_release(&self, resource: Arc<dyn ResourceRelease>) {
        self.releases.lock().push(resource);
    }

    /// True once teardown has started.
    #[must_use]
    pub fn is_shutting_down(&self) -> bool {
        self.started.load(Ordering::SeqCst)
    }

    /// Run the teardown sequence if it has not started yet.
    ///
    /// Flags shutdown (no further pipeline steps start), stops the managed
    /// process gracefully with a force-stop fallback, then releases every
    /// registered resource.
    pub async fn teardown(&self, reason: &str) -> TeardownOutcome {
        if self.started.swap(true, Ordering::SeqCst) {
            info!(reason, "Teardown already in progress, ignoring");
            return TeardownOutcome::AlreadyStarted;
        }

        info!(reason, "Shutting down");
        self.trigger.send_replace(true);

        {
            let mut process = self.process.lock().await;
            if let Some(pid) = process.pid() {
                info!(pid, "Stopping managed process");
            }
            if let Some(status) = process.terminate(self.stop_timeout).await {
                info!(%status, "Managed process stopped");
            }
        }

        let releases = std::mem::take(&mut *self.releases.lock());
        for resource in releases {
            resource.release();
            info!(resource = resource.name(), "Released resource");
        }

        self.finished.send_replace(true);
        info!("Teardown complete");
        TeardownOutcome::Performed
    }

    /// Resolve once a teardown sequence has completed.
    pub async fn finished(&self) {
        let mut rx = self.finished.subscribe();
        // The sender lives in `self`, so the channel cannot close here.
        let _ = rx.wait_for(|done| *done).await;
    }

    /// Install interrupt and termination handlers that trigger teardown.
    ///
    /// Each received signal spawns a teardown request; only the first does
    /// any work.
    ///
    /// # Errors
    ///
    /// Returns an error if the signal handlers cannot be registered.
    pub fn arm(self: &Arc<Self>) -> Result<JoinHandle<()>> {
        #[cfg(unix)]
        {
            use tokio::signal::unix::{signal, SignalKind};

            let mut interrupt = signal(SignalKind::interrupt())?;
            let mut terminate = signal(SignalKind::terminate())?;
            let controller = Arc::clone(self);

            Ok(tokio::spawn(async move {
                loop {
                    let name = tokio::select! {
                        Some(()) = interrupt.recv() => "SIGINT",
                        Some(()) = terminate.recv() => "SIGTERM",
                        else => break,
                    };
                    let controller = Arc::clone(&controller);
                    tokio::spawn(async move {
                        controller.teardown(name).await;
                    });
                }
                warn!("Signal streams closed");
            }))
        }
        #[cfg(not(unix))]
        {
            let controller = Arc::clone(self);
            Ok(tokio::spawn(async move {
                while tokio::signal::ctrl_c().await.is_ok() {
                    let controller = Arc::clone(&controller);
                    tokio::spawn(async move {
                        controller.teardown("ctrl-c").await;
                    });
                }
            }))
        }
    }
}
