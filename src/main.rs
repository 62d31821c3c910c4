use std::process::ExitCode;

use clap::Parser;
use memstats::cli::{self, Cli};
use memstats::config::AppConfig;
use memstats::logging;

#[tokio::main]
async fn main() -> ExitCode {
    let cli = Cli::parse();
    logging::init();

    match run(cli).await {
        Ok(code) => code,
        Err(e) => {
            tracing::error!(error = %format!("{:#}", e), "memstats failed");
            ExitCode::FAILURE
        }
    }
}

async fn run(cli: Cli) -> anyhow::Result<ExitCode> {
    let config = AppConfig::load()?;
    cli::run(cli, config).await
}
