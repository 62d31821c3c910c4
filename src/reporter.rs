// HTTP delivery of memory samples

use std::time::Duration;

use reqwest::header::{ACCEPT, CONTENT_TYPE, HeaderMap, HeaderValue};
use tracing::instrument;

use crate::error::ReportError;
use crate::models::{MemorySample, ReportTarget};

pub const DEFAULT_REQUEST_TIMEOUT: Duration = Duration::from_secs(30);

const APPLICATION_JSON: &str = "application/json";

/// Posts samples as JSON. One attempt per call; retries are the caller's business.
#[derive(Clone)]
pub struct StatsReporter {
    client: reqwest::Client,
}

impl StatsReporter {
    pub fn new() -> Result<Self, ReportError> {
        Self::with_timeout(DEFAULT_REQUEST_TIMEOUT)
    }

    /// `timeout` bounds the whole request, from connect to the end of the body.
    pub fn with_timeout(timeout: Duration) -> Result<Self, ReportError> {
        let mut headers = HeaderMap::new();
        headers.insert(CONTENT_TYPE, HeaderValue::from_static(APPLICATION_JSON));
        headers.insert(ACCEPT, HeaderValue::from_static(APPLICATION_JSON));
        let client = reqwest::Client::builder()
            .default_headers(headers)
            .timeout(timeout)
            .build()
            .map_err(ReportError::Client)?;
        Ok(Self { client })
    }

    /// Sends `sample` to `target` and returns the response body on a 2xx status.
    #[instrument(skip(self, target, sample), fields(component = "reporter", operation = "send", url = %target))]
    pub async fn send(
        &self,
        target: &ReportTarget,
        sample: &MemorySample,
    ) -> Result<String, ReportError> {
        let url = target.as_str();
        let body = serde_json::to_vec(sample)?;

        let resp = self
            .client
            .post(target.url().clone())
            .body(body)
            .send()
            .await
            .map_err(|e| classify_send_error(url, e))?;

        let status = resp.status();
        let text = resp.text().await.map_err(|e| {
            if e.is_timeout() {
                ReportError::Timeout {
                    url: url.to_string(),
                }
            } else {
                ReportError::ReadBody {
                    url: url.to_string(),
                    source: e,
                }
            }
        })?;

        if !status.is_success() {
            return Err(ReportError::Status {
                status: status.as_u16(),
                url: url.to_string(),
                body: text,
            });
        }
        if status != reqwest::StatusCode::OK {
            tracing::debug!(status = status.as_u16(), "endpoint answered with non-200 success");
        }
        Ok(text)
    }
}

fn classify_send_error(url: &str, e: reqwest::Error) -> ReportError {
    let url = url.to_string();
    if e.is_timeout() {
        ReportError::Timeout { url }
    } else if e.is_connect() {
        ReportError::Connect { url, source: e }
    } else {
        ReportError::Request { url, source: e }
    }
}
