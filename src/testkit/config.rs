//! Canonical test configurations.

use std::path::Path;

use crate::infrastructure::config::settings::Config;

/// A configuration rooted in `dir` that never touches real system paths.
///
/// Grace periods are zero, system certificate paths point at files that do
/// not exist, and generated certificates go under `dir/certs`.
#[must_use]
pub fn config_in(dir: &Path) -> Config {
    let mut config = Config::default();
    config.service.working_dir = dir.to_path_buf();
    config.service.grace_period_secs = 0;
    config.service.constrained_grace_period_secs = 0;
    config.service.stop_timeout_secs = 2;
    config.certificates.system_cert = dir.join("system/postgresql.crt");
    config.certificates.system_key = dir.join("system/postgresql.key");
    config.certificates.system_root = dir.join("system/root.crt");
    config.certificates.dir = dir.join("certs");
    config.monitor.enabled = false;
    config.monitor.telemetry_interval_ms = 0;
    config
}

/// Create system certificate material under `dir/system` for [`config_in`].
///
/// # Panics
///
/// Panics if the files cannot be written.
pub fn install_system_certificates(dir: &Path) {
    let system = dir.join("system");
    std::fs::create_dir_all(&system).expect("create system cert dir");
    for name in ["postgresql.crt", "postgresql.key", "root.crt"] {
        std::fs::write(system.join(name), "trusted\n").expect("write system cert");
    }
}
