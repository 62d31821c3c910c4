// Command-line entry points: `memstats stats:*` and the one-shot `collectstats` collector

use std::path::PathBuf;
use std::process::ExitCode;

use anyhow::Context;
use clap::{Parser, Subcommand};
use tokio::sync::oneshot;

use crate::config::AppConfig;
use crate::crontab::{CrontabManager, SystemCrontab};
use crate::endpoint_file::{read_endpoint_file, write_endpoint_file};
use crate::models::{CronJobSpec, ReportTarget};
use crate::reporter::StatsReporter;
use crate::sampler::MemorySampler;
use crate::scheduler::{CollectionScheduler, interval_ticker};

/// Exit code for unknown subcommands when the environment does not provide one.
pub const DEFAULT_NOT_IMPLEMENTED_EXIT: u8 = 10;
pub const NOT_IMPLEMENTED_EXIT_ENV: &str = "DOKKU_NOT_IMPLEMENTED_EXIT";

/// Binary name of the one-shot collector the cron job invokes.
pub const COLLECTOR_BIN: &str = "collectstats";

const HELP_HEADER: &str = "Usage: memstats stats[:COMMAND]

Collects host memory usage and posts it to an HTTP endpoint

Additional commands:";

const HELP_COMMANDS: &[(&str, &str)] = &[
    (
        "stats:start <url> [--foreground]",
        "start collecting memory data (cron job, or in-process loop with --foreground)",
    ),
    ("stats:stop <url>", "remove the collector cron job for <url>"),
    ("stats:help", "show this help"),
];

#[derive(Parser, Debug)]
#[command(name = "memstats", version, about, disable_help_subcommand = true)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Option<Command>,
}

#[derive(Subcommand, Debug)]
pub enum Command {
    /// Print usage
    #[command(name = "stats")]
    Stats,
    /// Print usage
    #[command(name = "stats:help")]
    Help,
    /// Register the collector cron job, or run the collector loop in the foreground
    #[command(name = "stats:start")]
    Start(StartArgs),
    /// Remove the collector cron job for a URL
    #[command(name = "stats:stop")]
    Stop(StopArgs),
    #[command(external_subcommand)]
    External(Vec<String>),
}

#[derive(clap::Args, Debug)]
pub struct StartArgs {
    /// Endpoint the samples are posted to
    pub url: String,
    /// Sample in-process every tick instead of installing a cron job
    #[arg(long)]
    pub foreground: bool,
}

#[derive(clap::Args, Debug)]
pub struct StopArgs {
    /// Endpoint the job was registered with
    pub url: String,
}

/// Arguments of the `collectstats` binary.
#[derive(Parser, Debug)]
#[command(name = "collectstats", version, about = "Sample host memory once and post it")]
pub struct CollectArgs {
    /// Endpoint the sample is posted to; falls back to the endpoint file
    #[arg(long)]
    pub url: Option<String>,
}

pub async fn run(cli: Cli, config: AppConfig) -> anyhow::Result<ExitCode> {
    match cli.command {
        None | Some(Command::Stats) | Some(Command::Help) => {
            println!("{}", usage());
        }
        Some(Command::External(args)) if args.first().is_some_and(|c| c == "stats:") => {
            println!("{}", usage());
        }
        Some(Command::Start(args)) if args.foreground => {
            run_foreground(&args.url, &config).await?;
        }
        Some(Command::Start(args)) => {
            tokio::task::spawn_blocking(move || register_job(&args.url, &config))
                .await
                .context("crontab task join")??;
        }
        Some(Command::Stop(args)) => {
            tokio::task::spawn_blocking(move || unregister_job(&args.url, &config))
                .await
                .context("crontab task join")??;
        }
        Some(Command::External(args)) => {
            let code = not_implemented_exit_code();
            tracing::debug!(command = ?args.first(), code, "command not implemented");
            return Ok(ExitCode::from(code));
        }
    }
    Ok(ExitCode::SUCCESS)
}

/// Header plus the aligned command table.
pub fn usage() -> String {
    format!("{}\n{}", HELP_HEADER, format_columns(HELP_COMMANDS, "    "))
}

/// Two columns, the first padded to its widest entry.
pub fn format_columns(rows: &[(&str, &str)], prefix: &str) -> String {
    let width = rows.iter().map(|(c, _)| c.len()).max().unwrap_or(0);
    rows.iter()
        .map(|(cmd, desc)| format!("{prefix}{cmd:<width$}  {desc}"))
        .collect::<Vec<_>>()
        .join("\n")
}

pub fn not_implemented_exit_code() -> u8 {
    parse_exit_code(std::env::var(NOT_IMPLEMENTED_EXIT_ENV).ok().as_deref())
}

/// Parsed exit code, or the default when missing or not a valid code.
pub fn parse_exit_code(raw: Option<&str>) -> u8 {
    match raw.map(|s| s.trim().parse::<u8>()) {
        Some(Ok(code)) => code,
        Some(Err(_)) | None => {
            tracing::debug!(
                env = NOT_IMPLEMENTED_EXIT_ENV,
                default = DEFAULT_NOT_IMPLEMENTED_EXIT,
                "exit code unset or invalid; using default"
            );
            DEFAULT_NOT_IMPLEMENTED_EXIT
        }
    }
}

fn resolve_collector_path(config: &AppConfig) -> anyhow::Result<PathBuf> {
    if let Some(path) = &config.cron.collector_path {
        return Ok(path.clone());
    }
    let exe = std::env::current_exe().context("could not resolve current executable")?;
    let dir = exe
        .parent()
        .context("current executable has no parent directory")?;
    Ok(dir.join(COLLECTOR_BIN))
}

fn collector_job(url: &str, config: &AppConfig) -> anyhow::Result<(ReportTarget, CronJobSpec)> {
    let target = ReportTarget::parse(url)?;
    let collector = resolve_collector_path(config)?;
    let job = CronJobSpec::collector(&config.cron.schedule, &collector, &target)?;
    Ok((target, job))
}

fn register_job(url: &str, config: &AppConfig) -> anyhow::Result<()> {
    let (target, job) = collector_job(url, config)?;
    let line = job.line();
    let manager = CrontabManager::new(SystemCrontab::new(&config.cron.crontab_bin));

    if manager.contains(&line)? {
        tracing::warn!(job = %line, "collector job already installed; adding another entry");
    }
    manager
        .add_cron_job(&line)
        .context("failed to add cron command")?;

    if let Err(e) = write_endpoint_file(&config.endpoint.file, target.as_str()) {
        tracing::warn!(error = %format!("{:#}", e), "stats url not persisted");
    }
    tracing::info!(job = %line, "collector job installed");
    Ok(())
}

fn unregister_job(url: &str, config: &AppConfig) -> anyhow::Result<()> {
    let (_, job) = collector_job(url, config)?;
    let line = job.line();
    let manager = CrontabManager::new(SystemCrontab::new(&config.cron.crontab_bin));

    if !manager.contains(&line)? {
        tracing::info!(job = %line, "no collector job to remove");
        return Ok(());
    }
    manager
        .remove_cron_job(&line)
        .context("failed to remove cron command")?;
    tracing::info!(job = %line, "collector job removed");
    Ok(())
}

async fn run_foreground(url: &str, config: &AppConfig) -> anyhow::Result<()> {
    let target = ReportTarget::parse(url)?;
    let reporter = StatsReporter::with_timeout(config.collector.request_timeout())?;
    let scheduler = CollectionScheduler::new(MemorySampler::new(), reporter, target);

    let (shutdown_tx, shutdown_rx) = oneshot::channel();
    tokio::spawn(async move {
        wait_for_shutdown_signal().await;
        tracing::info!("Received shutdown signal");
        let _ = shutdown_tx.send(());
    });

    scheduler
        .run(interval_ticker(config.collector.interval()), shutdown_rx)
        .await;
    Ok(())
}

/// One sample, one report. `url` falls back to the endpoint file.
pub async fn collect_once(url: Option<String>, config: &AppConfig) -> anyhow::Result<String> {
    let url = match url {
        Some(u) if !u.trim().is_empty() => u,
        _ => read_endpoint_file(&config.endpoint.file)
            .context("url is needed; pass --url=<url>")?,
    };
    let target = ReportTarget::parse(&url)?;
    let reporter = StatsReporter::with_timeout(config.collector.request_timeout())?;
    let scheduler = CollectionScheduler::new(MemorySampler::new(), reporter, target);
    let body = scheduler
        .run_once()
        .await
        .context("failed to post stats")?;
    Ok(body)
}

async fn wait_for_shutdown_signal() {
    #[cfg(unix)]
    {
        let mut sigterm = match tokio::signal::unix::signal(
            tokio::signal::unix::SignalKind::terminate(),
        ) {
            Ok(s) => s,
            Err(_) => {
                let _ = tokio::signal::ctrl_c().await;
                return;
            }
        };
        tokio::select! {
            _ = tokio::signal::ctrl_c() => {}
            _ = sigterm.recv() => {}
        }
    }
    #[cfg(not(unix))]
    {
        let _ = tokio::signal::ctrl_c().await;
    }
}
