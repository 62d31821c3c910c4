use std::path::PathBuf;
use std::time::Duration;

use serde::Deserialize;

use crate::models::validate_schedule;

const DEFAULT_CONFIG_FILE: &str = "memstats.toml";

#[derive(Debug, Clone, Default, Deserialize)]
pub struct AppConfig {
    #[serde(default)]
    pub collector: CollectorConfig,
    #[serde(default)]
    pub cron: CronConfig,
    #[serde(default)]
    pub endpoint: EndpointConfig,
}

#[derive(Debug, Clone, Deserialize)]
pub struct CollectorConfig {
    /// Tick period of the foreground loop.
    #[serde(default = "default_interval_ms")]
    pub interval_ms: u64,
    /// Total timeout of one report request.
    #[serde(default = "default_request_timeout_secs")]
    pub request_timeout_secs: u64,
}

fn default_interval_ms() -> u64 {
    1000
}

fn default_request_timeout_secs() -> u64 {
    30
}

impl Default for CollectorConfig {
    fn default() -> Self {
        Self {
            interval_ms: default_interval_ms(),
            request_timeout_secs: default_request_timeout_secs(),
        }
    }
}

impl CollectorConfig {
    pub fn interval(&self) -> Duration {
        Duration::from_millis(self.interval_ms)
    }

    pub fn request_timeout(&self) -> Duration {
        Duration::from_secs(self.request_timeout_secs)
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct CronConfig {
    /// 5-field cron expression for the installed collector job.
    #[serde(default = "default_schedule")]
    pub schedule: String,
    #[serde(default = "default_crontab_bin")]
    pub crontab_bin: String,
    /// Collector binary the job runs. Defaults to `collectstats` next to the running executable.
    #[serde(default)]
    pub collector_path: Option<PathBuf>,
}

fn default_schedule() -> String {
    "*/1 * * * *".into()
}

fn default_crontab_bin() -> String {
    "crontab".into()
}

impl Default for CronConfig {
    fn default() -> Self {
        Self {
            schedule: default_schedule(),
            crontab_bin: default_crontab_bin(),
            collector_path: None,
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct EndpointConfig {
    /// Side file remembering the last target URL.
    #[serde(default = "default_endpoint_file")]
    pub file: PathBuf,
}

fn default_endpoint_file() -> PathBuf {
    PathBuf::from("stats_url.txt")
}

impl Default for EndpointConfig {
    fn default() -> Self {
        Self {
            file: default_endpoint_file(),
        }
    }
}

impl AppConfig {
    /// Loads `CONFIG_FILE`, or `memstats.toml` when set. A missing default file means defaults;
    /// a missing explicit file is an error.
    pub fn load() -> anyhow::Result<Self> {
        match std::env::var("CONFIG_FILE") {
            Ok(path) => {
                let s = std::fs::read_to_string(&path)
                    .map_err(|e| anyhow::anyhow!("config file {}: {}", path, e))?;
                Self::load_from_str(&s)
            }
            Err(_) => match std::fs::read_to_string(DEFAULT_CONFIG_FILE) {
                Ok(s) => Self::load_from_str(&s),
                Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                    tracing::debug!("no {}; using defaults", DEFAULT_CONFIG_FILE);
                    Ok(Self::default())
                }
                Err(e) => Err(anyhow::anyhow!("config file {}: {}", DEFAULT_CONFIG_FILE, e)),
            },
        }
    }

    /// Parse and validate config from a string (e.g. for tests).
    pub fn load_from_str(s: &str) -> anyhow::Result<Self> {
        let config: AppConfig = toml::from_str(s)?;
        config.validate()?;
        Ok(config)
    }

    fn validate(&self) -> anyhow::Result<()> {
        anyhow::ensure!(
            self.collector.interval_ms > 0,
            "collector.interval_ms must be > 0, got {}",
            self.collector.interval_ms
        );
        anyhow::ensure!(
            self.collector.request_timeout_secs > 0,
            "collector.request_timeout_secs must be > 0, got {}",
            self.collector.request_timeout_secs
        );
        validate_schedule(&self.cron.schedule)
            .map_err(|e| anyhow::anyhow!("cron.schedule: {}", e))?;
        anyhow::ensure!(
            !self.cron.crontab_bin.is_empty(),
            "cron.crontab_bin must be non-empty"
        );
        if let Some(path) = &self.cron.collector_path {
            anyhow::ensure!(
                path.is_absolute(),
                "cron.collector_path must be absolute, got {}",
                path.display()
            );
        }
        anyhow::ensure!(
            !self.endpoint.file.as_os_str().is_empty(),
            "endpoint.file must be non-empty"
        );
        Ok(())
    }
}
