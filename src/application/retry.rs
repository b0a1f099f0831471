//! Bounded retry with backoff.
//!
//! One loop serves every retrying call site (dependency stage, port search,
//! health verification); each supplies its own [`RetryPolicy`]. Sleeps
//! between attempts are preempted by the shutdown signal.

use std::fmt::Display;
use std::future::Future;
use std::time::Duration;

use thiserror::Error;
use tracing::{debug, warn};

use super::shutdown::ShutdownSignal;

/// Delay inserted after a failed attempt.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Backoff {
    /// Retry immediately.
    None,
    /// Sleep `step * attempt` after attempt number `attempt` (1-based).
    Linear(Duration),
}

impl Backoff {
    /// Delay after the given failed attempt (1-based).
    #[must_use]
    pub fn delay_after(&self, attempt: u32) -> Duration {
        match self {
            Self::None => Duration::ZERO,
            Self::Linear(step) => step.saturating_mul(attempt),
        }
    }
}

/// Attempt budget and backoff for one call site.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RetryPolicy {
    pub max_attempts: u32,
    pub backoff: Backoff,
}

impl RetryPolicy {
    #[must_use]
    pub const fn new(max_attempts: u32, backoff: Backoff) -> Self {
        Self {
            max_attempts,
            backoff,
        }
    }
}

/// Why a retried operation gave up.
#[derive(Error, Debug)]
pub enum RetryError<E> {
    #[error("gave up after {attempts} attempts: {last}")]
    Exhausted { attempts: u32, last: E },

    #[error("cancelled by shutdown signal")]
    Cancelled,
}

/// Run `operation` until it succeeds, the budget is spent, or shutdown is signalled.
///
/// `operation` receives the 1-based attempt number. At least one attempt is
/// made even when `max_attempts` is zero.
///
/// # Errors
///
/// Returns [`RetryError::Exhausted`] carrying the last error once every
/// attempt failed, or [`RetryError::Cancelled`] when shutdown preempts an
/// attempt or a backoff sleep.
pub async fn retry_with_backoff<T, E, Op, Fut>(
    label: &str,
    policy: RetryPolicy,
    shutdown: &ShutdownSignal,
    mut operation: Op,
) -> Result<T, RetryError<E>>
where
    Op: FnMut(u32) -> Fut,
    Fut: Future<Output = Result<T, E>>,
    E: Display,
{
    let max_attempts = policy.max_attempts.max(1);
    let mut attempt = 1;

    loop {
        if shutdown.is_triggered() {
            return Err(RetryError::Cancelled);
        }

        let result = tokio::select! {
            result = operation(attempt) => result,
            () = shutdown.triggered() => return Err(RetryError::Cancelled),
        };

        let error = match result {
            Ok(value) => {
                if attempt > 1 {
                    debug!(label, attempt, "Succeeded after retry");
                }
                return Ok(value);
            }
            Err(error) => error,
        };

        if attempt >= max_attempts {
            warn!(label, attempts = attempt, error = %error, "Retry budget exhausted");
            return Err(RetryError::Exhausted {
                attempts: attempt,
                last: error,
            });
        }

        let delay = policy.backoff.delay_after(attempt);
        warn!(
            label,
            attempt,
            max_attempts,
            delay_secs = delay.as_secs_f64(),
            error = %error,
            "Attempt failed, retrying"
        );
        if shutdown.sleep(delay).await.is_err() {
            return Err(RetryError::Cancelled);
        }
        attempt += 1;
    }
}
