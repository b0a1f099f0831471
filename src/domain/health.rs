//! Health probe results.

use std::time::Duration;

/// Status codes that prove the service is serving requests.
///
/// 401 and 403 count as alive: an auth rejection still means the process
/// answered. This conflates auth failure with liveness and is kept as-is.
pub const ACCEPTED_STATUS_CODES: [u16; 4] = [200, 302, 401, 403];

/// True when `status` is in [`ACCEPTED_STATUS_CODES`].
#[must_use]
pub fn is_alive_status(status: u16) -> bool {
    ACCEPTED_STATUS_CODES.contains(&status)
}

/// Outcome of a single probe against one endpoint.
#[derive(Debug, Clone)]
pub struct HealthCheckResult {
    pub endpoint: String,
    pub succeeded: bool,
    pub http_status: Option<u16>,
    pub latency: Duration,
    pub error: Option<String>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn accepted_set_is_literal() {
        for status in [200, 302, 401, 403] {
            assert!(is_alive_status(status), "{status} should be alive");
        }
        for status in [201, 301, 404, 500, 502, 503] {
            assert!(!is_alive_status(status), "{status} should not be alive");
        }
    }
}
