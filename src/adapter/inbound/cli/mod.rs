//! CLI module graph and command dispatch.

pub mod certs;
pub mod check;
pub mod command;
pub mod config;
pub mod deploy;
pub mod limits;
pub mod output;

use command::{Cli, Commands};
use output::OutputConfig;

/// Completed run, or the service stopped cleanly on its own.
pub const EXIT_OK: i32 = 0;
/// Failed run or failed command.
pub const EXIT_FAILURE: i32 = 1;
/// Teardown driven by an interrupt or termination signal.
pub const EXIT_INTERRUPTED: i32 = 130;

/// Execute a parsed command line and return the process exit code.
pub async fn run(cli: Cli) -> i32 {
    output::configure(OutputConfig::new(cli.json, cli.quiet));

    let config = match config::load(cli.config.as_deref()) {
        Ok(config) => config,
        Err(e) => {
            output::error(&format!("Failed to load config: {e}"));
            return EXIT_FAILURE;
        }
    };
    config.init_logging();

    let result = match &cli.command {
        Commands::Deploy(args) => deploy::execute(config, args).await,
        Commands::Check => Ok(if check::execute(&config).await {
            EXIT_OK
        } else {
            EXIT_FAILURE
        }),
        Commands::Limits => limits::execute(&config).await.map(|()| EXIT_OK),
        Commands::Certs => certs::execute(&config).await.map(|()| EXIT_OK),
    };

    match result {
        Ok(code) => code,
        Err(e) => {
            output::error(&e.to_string());
            EXIT_FAILURE
        }
    }
}
