//! Managed service configuration.

use std::path::PathBuf;

use serde::Deserialize;

/// How to start the managed service and where it lives.
#[derive(Debug, Clone, Deserialize)]
pub struct ServiceConfig {
    /// Executable to launch.
    #[serde(default = "default_command")]
    pub command: String,
    /// Arguments; `{port}` is replaced with the secured port.
    #[serde(default = "default_args")]
    pub args: Vec<String>,
    /// Working directory of the service (sentinel write-test, upload dirs).
    #[serde(default = "default_working_dir")]
    pub working_dir: PathBuf,
    /// Host the health probes connect to.
    #[serde(default = "default_host")]
    pub host: String,
    /// Preferred port.
    #[serde(default = "default_port")]
    pub port: u16,
    /// Number of successive ports tried when the preferred one is taken.
    #[serde(default = "default_port_search_span")]
    pub port_search_span: u16,
    /// Directories created (if absent) under the working directory.
    #[serde(default = "default_upload_dirs")]
    pub upload_dirs: Vec<PathBuf>,
    /// File capturing the service's stdout and stderr, relative to the working directory.
    #[serde(default = "default_log_file")]
    pub log_file: PathBuf,
    /// Wait before the first liveness sample.
    #[serde(default = "default_grace_period_secs")]
    pub grace_period_secs: u64,
    /// Wait before the first liveness sample on resource-constrained hosts.
    #[serde(default = "default_constrained_grace_period_secs")]
    pub constrained_grace_period_secs: u64,
    /// Wait for a graceful stop before force-killing.
    #[serde(default = "default_stop_timeout_secs")]
    pub stop_timeout_secs: u64,
}

fn default_command() -> String {
    "gunicorn".to_string()
}

fn default_args() -> Vec<String> {
    vec![
        "--bind".to_string(),
        "0.0.0.0:{port}".to_string(),
        "app:create_app()".to_string(),
    ]
}

fn default_working_dir() -> PathBuf {
    PathBuf::from(".")
}

fn default_host() -> String {
    "127.0.0.1".to_string()
}

const fn default_port() -> u16 {
    3000
}

const fn default_port_search_span() -> u16 {
    5
}

fn default_upload_dirs() -> Vec<PathBuf> {
    vec![
        PathBuf::from("static/uploads"),
        PathBuf::from("static/uploads/prescriptions"),
    ]
}

fn default_log_file() -> PathBuf {
    PathBuf::from("logs/service.log")
}

const fn default_grace_period_secs() -> u64 {
    3
}

const fn default_constrained_grace_period_secs() -> u64 {
    8
}

const fn default_stop_timeout_secs() -> u64 {
    10
}

impl Default for ServiceConfig {
    fn default() -> Self {
        Self {
            command: default_command(),
            args: default_args(),
            working_dir: default_working_dir(),
            host: default_host(),
            port: default_port(),
            port_search_span: default_port_search_span(),
            upload_dirs: default_upload_dirs(),
            log_file: default_log_file(),
            grace_period_secs: default_grace_period_secs(),
            constrained_grace_period_secs: default_constrained_grace_period_secs(),
            stop_timeout_secs: default_stop_timeout_secs(),
        }
    }
}

impl ServiceConfig {
    /// Arguments with `{port}` substituted.
    #[must_use]
    pub fn args_for_port(&self, port: u16) -> Vec<String> {
        let port = port.to_string();
        self.args
            .iter()
            .map(|arg| arg.replace("{port}", &port))
            .collect()
    }

    /// Absolute-or-relative path of the captured output file.
    #[must_use]
    pub fn log_path(&self) -> PathBuf {
        self.working_dir.join(&self.log_file)
    }

    /// Base URL for health probes against `port`.
    #[must_use]
    pub fn base_url(&self, port: u16) -> String {
        format!("http://{}:{port}", self.host)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn args_substitute_port_placeholder() {
        let config = ServiceConfig::default();
        assert_eq!(
            config.args_for_port(3002),
            vec!["--bind", "0.0.0.0:3002", "app:create_app()"]
        );
    }

    #[test]
    fn base_url_uses_host_and_port() {
        let config = ServiceConfig::default();
        assert_eq!(config.base_url(3000), "http://127.0.0.1:3000");
    }
}
