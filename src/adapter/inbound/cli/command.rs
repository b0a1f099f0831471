//! Command-line interface definitions.

use std::path::PathBuf;

use clap::{Args, Parser, Subcommand};

/// Default configuration file, read from the current directory when present.
pub const DEFAULT_CONFIG_PATH: &str = "stagehand.toml";

/// Bring a long-running service to a verified-healthy state
#[derive(Parser, Debug)]
#[command(name = "stagehand")]
#[command(version)]
pub struct Cli {
    /// Configuration file [default: stagehand.toml if present]
    #[arg(long, global = true, value_name = "PATH")]
    pub config: Option<PathBuf>,

    /// JSON output for scripting
    #[arg(long, global = true)]
    pub json: bool,

    /// Only print warnings and errors
    #[arg(short, long, global = true)]
    pub quiet: bool,

    #[command(subcommand)]
    pub command: Commands,
}

/// Top-level subcommands.
#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Run the deployment pipeline and supervise the service until stopped
    Deploy(DeployArgs),

    /// Check dependencies once and print the result
    Check,

    /// Sample host telemetry and print the derived resource limits
    Limits,

    /// Ensure certificate material exists and print its paths
    Certs,
}

/// Arguments for `stagehand deploy`.
#[derive(Args, Debug, Default)]
pub struct DeployArgs {
    /// Do not start the background resource monitor after a completed run
    #[arg(long)]
    pub no_monitor: bool,
}
