// Error types for the sampler, reporter, crontab manager and target validation

use thiserror::Error;

/// Rejected input; nothing has been touched when one of these is returned.
#[derive(Debug, Error)]
pub enum ValidationError {
    #[error("url is required")]
    MissingUrl,

    #[error("invalid url {url}: {reason}")]
    InvalidUrl { url: String, reason: String },

    #[error("invalid cron schedule {schedule:?}: {reason}")]
    InvalidSchedule { schedule: String, reason: String },
}

#[derive(Debug, Error)]
pub enum SampleError {
    #[error("memory provider failed: {0}")]
    Provider(String),

    #[error("memory sampling task join: {0}")]
    Join(String),
}

/// Delivery failures, one variant per phase of the request.
#[derive(Debug, Error)]
pub enum ReportError {
    #[error("failed to build http client")]
    Client(#[source] reqwest::Error),

    #[error("failed to serialize sample")]
    Serialize(#[from] serde_json::Error),

    #[error("request to [{url}] timed out")]
    Timeout { url: String },

    #[error("failed to connect to [{url}]")]
    Connect {
        url: String,
        #[source]
        source: reqwest::Error,
    },

    #[error("failed to complete request to [{url}]")]
    Request {
        url: String,
        #[source]
        source: reqwest::Error,
    },

    #[error("failed to read response body of [{url}]")]
    ReadBody {
        url: String,
        #[source]
        source: reqwest::Error,
    },

    #[error("request status code [{status}] [{url}]: {body}")]
    Status { status: u16, url: String, body: String },
}

impl ReportError {
    /// Numeric HTTP status for non-2xx responses.
    pub fn status(&self) -> Option<u16> {
        match self {
            ReportError::Status { status, .. } => Some(*status),
            _ => None,
        }
    }
}

/// Failure of one sample-and-report cycle. Messages omit the cause; walk `source()` for it.
#[derive(Debug, Error)]
pub enum CollectError {
    #[error(transparent)]
    Sample(#[from] SampleError),

    #[error(transparent)]
    Report(#[from] ReportError),
}

/// Job table failures. `step` names the crontab invocation that failed (e.g. "list", "install").
#[derive(Debug, Error)]
pub enum CrontabError {
    #[error("failed to start crontab {step}")]
    Spawn {
        step: &'static str,
        #[source]
        source: std::io::Error,
    },

    #[error("crontab {step} exited with {status}: {stderr}")]
    Failed {
        step: &'static str,
        status: String,
        stderr: String,
    },

    #[error("failed to write cron file")]
    TempFile(#[source] std::io::Error),

    #[error("cron line must be a single non-empty line, got {0:?}")]
    InvalidLine(String),

    #[error("job table unavailable: {0}")]
    Unavailable(String),
}
