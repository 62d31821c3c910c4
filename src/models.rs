// Domain models: memory samples, report target and the cron job line

use std::path::Path;
use std::str::FromStr;

use serde::{Deserialize, Serialize};
use url::Url;

use crate::error::ValidationError;

/// Decimal megabyte (10^6 bytes), not the binary 2^20.
pub const BYTES_PER_MEGABYTE: u64 = 1_000_000;

/// Truncating byte -> decimal megabyte conversion.
pub fn to_megabytes(bytes: u64) -> u64 {
    bytes / BYTES_PER_MEGABYTE
}

/// Raw byte counts as returned by a memory provider.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct RawMemory {
    pub total: u64,
    pub used: u64,
    pub cached: u64,
    pub free: u64,
}

/// One point-in-time memory reading in decimal megabytes. Wire field names are PascalCase.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct MemorySample {
    pub total: u64,
    pub used: u64,
    pub cached: u64,
    pub free: u64,
}

impl From<RawMemory> for MemorySample {
    fn from(raw: RawMemory) -> Self {
        Self {
            total: to_megabytes(raw.total),
            used: to_megabytes(raw.used),
            cached: to_megabytes(raw.cached),
            free: to_megabytes(raw.free),
        }
    }
}

/// Absolute URL the samples are posted to. Scheme and host are both guaranteed non-empty.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ReportTarget {
    url: Url,
}

impl ReportTarget {
    pub fn parse(raw: &str) -> Result<Self, ValidationError> {
        let raw = raw.trim();
        if raw.is_empty() {
            return Err(ValidationError::MissingUrl);
        }
        let url = Url::parse(raw).map_err(|e| ValidationError::InvalidUrl {
            url: raw.to_string(),
            reason: e.to_string(),
        })?;
        if url.scheme().is_empty() {
            return Err(ValidationError::InvalidUrl {
                url: raw.to_string(),
                reason: "missing scheme".into(),
            });
        }
        // `url` repairs `http:/host` and `http:host`; require a literal `//` authority.
        let has_authority = raw
            .split_once(':')
            .is_some_and(|(_, rest)| rest.starts_with("//"));
        if !has_authority || url.host_str().is_none_or(str::is_empty) {
            return Err(ValidationError::InvalidUrl {
                url: raw.to_string(),
                reason: "missing host".into(),
            });
        }
        Ok(Self { url })
    }

    pub fn as_str(&self) -> &str {
        self.url.as_str()
    }

    pub fn url(&self) -> &Url {
        &self.url
    }
}

impl FromStr for ReportTarget {
    type Err = ValidationError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::parse(s)
    }
}

impl std::fmt::Display for ReportTarget {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.url.as_str())
    }
}

/// A job table entry: `<schedule> <command>`. The rendered line identifies the entry for removal.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CronJobSpec {
    pub schedule: String,
    pub command: String,
}

impl CronJobSpec {
    pub fn new(schedule: &str, command: impl Into<String>) -> Result<Self, ValidationError> {
        validate_schedule(schedule)?;
        Ok(Self {
            schedule: schedule.trim().to_string(),
            command: command.into(),
        })
    }

    /// Job that runs the one-shot collector against `target`. The URL is always single-quoted
    /// for the shell; the path only when it needs it.
    pub fn collector(
        schedule: &str,
        collector: &Path,
        target: &ReportTarget,
    ) -> Result<Self, ValidationError> {
        let path = collector.display().to_string();
        let path = if is_shell_safe(&path) {
            path
        } else {
            cron_quote(&path)
        };
        Self::new(
            schedule,
            format!("{} --url={}", path, cron_quote(target.as_str())),
        )
    }

    pub fn line(&self) -> String {
        format!("{} {}", self.schedule, self.command)
    }
}

fn is_shell_safe(s: &str) -> bool {
    !s.is_empty()
        && s.bytes()
            .all(|b| b.is_ascii_alphanumeric() || b"/._-+,:=@".contains(&b))
}

/// Single-quotes `s` for `sh` and escapes `%`, which crontab(5) would turn into a newline.
fn cron_quote(s: &str) -> String {
    let mut out = String::with_capacity(s.len() + 2);
    out.push('\'');
    for c in s.chars() {
        match c {
            '\'' => out.push_str("'\\''"),
            '%' => out.push_str("\\%"),
            c => out.push(c),
        }
    }
    out.push('\'');
    out
}

/// Accepts standard 5-field cron expressions (minute hour day-of-month month day-of-week).
pub fn validate_schedule(schedule: &str) -> Result<(), ValidationError> {
    let fields = schedule.split_whitespace().count();
    if fields != 5 {
        return Err(ValidationError::InvalidSchedule {
            schedule: schedule.to_string(),
            reason: format!("expected 5 fields, got {}", fields),
        });
    }
    // The cron crate wants a leading seconds field.
    cron::Schedule::from_str(&format!("0 {}", schedule.trim())).map_err(|e| {
        ValidationError::InvalidSchedule {
            schedule: schedule.to_string(),
            reason: e.to_string(),
        }
    })?;
    Ok(())
}
