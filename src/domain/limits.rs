//! Resource limits handed to the managed process.

use serde::Serialize;

/// Environment variable for worker concurrency.
pub const ENV_MAX_WORKERS: &str = "MAX_WORKERS";
/// Environment variable for the connection pool size.
pub const ENV_POOL_SIZE: &str = "DB_POOL_SIZE";
/// Environment variable for pool overflow connections.
pub const ENV_MAX_OVERFLOW: &str = "DB_MAX_OVERFLOW";
/// Environment variable for the pool checkout timeout in seconds.
pub const ENV_POOL_TIMEOUT: &str = "DB_POOL_TIMEOUT";
/// Environment variable for the pool recycle interval in seconds.
pub const ENV_POOL_RECYCLE: &str = "DB_POOL_RECYCLE";
/// Environment variable selecting threaded or single-process mode.
pub const ENV_THREADED: &str = "THREADED";

/// Concurrency and connection configuration derived from one telemetry snapshot.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct ResourceLimits {
    pub max_workers: u32,
    pub connection_pool_size: u32,
    pub max_overflow_connections: u32,
    pub pool_timeout_seconds: u32,
    pub pool_recycle_seconds: u32,
}

impl ResourceLimits {
    /// True when the service should run as a single worker.
    #[must_use]
    pub const fn is_constrained(&self) -> bool {
        self.max_workers <= 1
    }

    /// True when `self` is at least as restrictive as `other` on every field.
    ///
    /// A longer pool timeout counts as more restrictive: it is raised under
    /// I/O pressure so checkouts wait instead of failing.
    #[must_use]
    pub fn at_least_as_tight_as(&self, other: &Self) -> bool {
        self.max_workers <= other.max_workers
            && self.connection_pool_size <= other.connection_pool_size
            && self.max_overflow_connections <= other.max_overflow_connections
            && self.pool_timeout_seconds >= other.pool_timeout_seconds
            && self.pool_recycle_seconds <= other.pool_recycle_seconds
    }

    /// Environment overlay read by the managed process.
    #[must_use]
    pub fn to_env(&self) -> Vec<(&'static str, String)> {
        vec![
            (ENV_MAX_WORKERS, self.max_workers.to_string()),
            (ENV_POOL_SIZE, self.connection_pool_size.to_string()),
            (ENV_MAX_OVERFLOW, self.max_overflow_connections.to_string()),
            (ENV_POOL_TIMEOUT, self.pool_timeout_seconds.to_string()),
            (ENV_POOL_RECYCLE, self.pool_recycle_seconds.to_string()),
            (ENV_THREADED, (self.max_workers > 1).to_string()),
        ]
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn limits(workers: u32) -> ResourceLimits {
        ResourceLimits {
            max_workers: workers,
            connection_pool_size: 5,
            max_overflow_connections: 5,
            pool_timeout_seconds: 30,
            pool_recycle_seconds: 3600,
        }
    }

    #[test]
    fn env_overlay_exposes_every_knob() {
        let env = limits(2).to_env();
        let names: Vec<_> = env.iter().map(|(name, _)| *name).collect();
        assert_eq!(
            names,
            vec![
                ENV_MAX_WORKERS,
                ENV_POOL_SIZE,
                ENV_MAX_OVERFLOW,
                ENV_POOL_TIMEOUT,
                ENV_POOL_RECYCLE,
                ENV_THREADED
            ]
        );
        assert!(env.contains(&(ENV_THREADED, "true".to_string())));
    }

    #[test]
    fn single_worker_runs_unthreaded() {
        let env = limits(1).to_env();
        assert!(env.contains(&(ENV_THREADED, "false".to_string())));
        assert!(limits(1).is_constrained());
    }

    #[test]
    fn tightness_treats_longer_timeout_as_tighter() {
        let base = limits(2);
        let patient = ResourceLimits {
            pool_timeout_seconds: 120,
            ..base
        };
        assert!(patient.at_least_as_tight_as(&base));
        assert!(!base.at_least_as_tight_as(&patient));
    }
}
