// One-shot collector invoked by the installed cron job: sample once, post once, exit.

use std::process::ExitCode;

use clap::Parser;
use memstats::cli::{CollectArgs, collect_once};
use memstats::config::AppConfig;
use memstats::logging;

#[tokio::main]
async fn main() -> ExitCode {
    let args = CollectArgs::parse();
    logging::init();

    match run(args).await {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            tracing::error!(error = %format!("{:#}", e), "collectstats failed");
            ExitCode::FAILURE
        }
    }
}

async fn run(args: CollectArgs) -> anyhow::Result<()> {
    let config = AppConfig::load()?;
    collect_once(args.url, &config).await?;
    Ok(())
}
