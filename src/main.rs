use clap::Parser;

use stagehand::adapter::inbound::cli::{self, command::Cli};

#[tokio::main]
async fn main() {
    let _ = dotenvy::dotenv();

    let cli = Cli::parse();
    let code = cli::run(cli).await;
    std::process::exit(code);
}
