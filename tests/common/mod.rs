// Shared test helpers: scripted sampler/sink, mock HTTP endpoint, fake crontab binary
#![allow(dead_code)]

use std::collections::VecDeque;
use std::future::Future;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};

use axum::Router;
use axum::extract::State;
use axum::http::{HeaderMap, StatusCode};
use axum::routing::post;
use memstats::error::{ReportError, SampleError};
use memstats::models::{MemorySample, ReportTarget};
use memstats::scheduler::{SampleSink, SampleSource};
use tokio::sync::mpsc;

pub fn sample(total: u64) -> MemorySample {
    MemorySample {
        total,
        used: total / 2,
        cached: total / 4,
        free: total / 4,
    }
}

pub fn target() -> ReportTarget {
    ReportTarget::parse("http://collector.test/stats").unwrap()
}

/// Sampler returning a fixed sample, or failing every call.
pub struct FakeSampler {
    pub calls: Arc<AtomicUsize>,
    fail: bool,
}

impl FakeSampler {
    pub fn ok() -> Self {
        Self {
            calls: Arc::new(AtomicUsize::new(0)),
            fail: false,
        }
    }

    pub fn failing() -> Self {
        Self {
            calls: Arc::new(AtomicUsize::new(0)),
            fail: true,
        }
    }
}

impl SampleSource for FakeSampler {
    fn sample(&self) -> impl Future<Output = Result<MemorySample, SampleError>> + Send {
        let n = self.calls.fetch_add(1, Ordering::SeqCst) as u64;
        let fail = self.fail;
        async move {
            if fail {
                Err(SampleError::Provider("meminfo unreadable".into()))
            } else {
                Ok(sample(8_000 + n))
            }
        }
    }
}

pub enum Reply {
    Ok(&'static str),
    Status(u16, &'static str),
    Hang,
}

/// Sink answering from a script (then `Ok("{}")` once exhausted). Every call is announced on
/// `events` with its 1-based index before the reply is produced.
pub struct ScriptedSink {
    replies: Mutex<VecDeque<Reply>>,
    pub sent: Arc<Mutex<Vec<MemorySample>>>,
    events: mpsc::UnboundedSender<usize>,
}

impl ScriptedSink {
    pub fn new(replies: Vec<Reply>) -> (Self, mpsc::UnboundedReceiver<usize>) {
        let (events, rx) = mpsc::unbounded_channel();
        (
            Self {
                replies: Mutex::new(replies.into()),
                sent: Arc::new(Mutex::new(Vec::new())),
                events,
            },
            rx,
        )
    }
}

impl SampleSink for ScriptedSink {
    fn send(
        &self,
        target: &ReportTarget,
        sample: &MemorySample,
    ) -> impl Future<Output = Result<String, ReportError>> + Send {
        let index = {
            let mut sent = self.sent.lock().unwrap();
            sent.push(*sample);
            sent.len()
        };
        let reply = self
            .replies
            .lock()
            .unwrap()
            .pop_front()
            .unwrap_or(Reply::Ok("{}"));
        let _ = self.events.send(index);
        let url = target.as_str().to_string();
        async move {
            match reply {
                Reply::Ok(body) => Ok(body.to_string()),
                Reply::Status(status, body) => Err(ReportError::Status {
                    status,
                    url,
                    body: body.to_string(),
                }),
                Reply::Hang => std::future::pending().await,
            }
        }
    }
}

/// Sink whose first send takes `first_delay`; later sends answer at once. Records when each
/// send started and how many ever ran at once.
pub struct SlowSink {
    first_delay: std::time::Duration,
    in_flight: Arc<AtomicUsize>,
    pub max_in_flight: Arc<AtomicUsize>,
    pub starts: Arc<Mutex<Vec<tokio::time::Instant>>>,
}

impl SlowSink {
    pub fn new(first_delay: std::time::Duration) -> Self {
        Self {
            first_delay,
            in_flight: Arc::new(AtomicUsize::new(0)),
            max_in_flight: Arc::new(AtomicUsize::new(0)),
            starts: Arc::new(Mutex::new(Vec::new())),
        }
    }
}

impl SampleSink for SlowSink {
    fn send(
        &self,
        _target: &ReportTarget,
        _sample: &MemorySample,
    ) -> impl Future<Output = Result<String, ReportError>> + Send {
        let first = {
            let mut starts = self.starts.lock().unwrap();
            starts.push(tokio::time::Instant::now());
            starts.len() == 1
        };
        let delay = if first {
            self.first_delay
        } else {
            std::time::Duration::ZERO
        };
        let in_flight = self.in_flight.clone();
        let max_in_flight = self.max_in_flight.clone();
        async move {
            let now = in_flight.fetch_add(1, Ordering::SeqCst) + 1;
            max_in_flight.fetch_max(now, Ordering::SeqCst);
            tokio::time::sleep(delay).await;
            in_flight.fetch_sub(1, Ordering::SeqCst);
            Ok("{}".to_string())
        }
    }
}

/// Request as seen by the mock endpoint.
#[derive(Debug, Clone)]
pub struct CapturedRequest {
    pub headers: HeaderMap,
    pub body: String,
}

#[derive(Clone)]
struct EndpointState {
    status: StatusCode,
    body: &'static str,
    delay: std::time::Duration,
    captured: Arc<Mutex<Vec<CapturedRequest>>>,
}

async fn record(
    State(state): State<EndpointState>,
    headers: HeaderMap,
    body: String,
) -> (StatusCode, &'static str) {
    state
        .captured
        .lock()
        .unwrap()
        .push(CapturedRequest { headers, body });
    if !state.delay.is_zero() {
        tokio::time::sleep(state.delay).await;
    }
    (state.status, state.body)
}

/// Serves `POST /stats` on an ephemeral port. Returns the URL and the captured requests.
pub async fn spawn_endpoint(
    status: u16,
    body: &'static str,
    delay: std::time::Duration,
) -> (String, Arc<Mutex<Vec<CapturedRequest>>>) {
    let captured = Arc::new(Mutex::new(Vec::new()));
    let state = EndpointState {
        status: StatusCode::from_u16(status).unwrap(),
        body,
        delay,
        captured: captured.clone(),
    };
    let app = Router::new()
        .route("/stats", post(record))
        .with_state(state);
    let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    tokio::spawn(async move {
        let _ = axum::serve(listener, app).await;
    });
    (format!("http://{}/stats", addr), captured)
}

/// Serializes tests that write and then exec scripts (avoids ETXTBSY from concurrent forks).
pub static SCRIPT_LOCK: Mutex<()> = Mutex::new(());

/// Stand-in for the `crontab` binary keeping its table in `<dir>/crontab.state`.
/// `-l` prints the table or "no crontab for tester"; `<file>` installs it and records the path
/// in `<dir>/installed_paths`. With `reject_install`, installs fail like a bad crontab file.
#[cfg(unix)]
pub fn write_fake_crontab(dir: &Path, reject_install: bool) -> PathBuf {
    use std::os::unix::fs::PermissionsExt;

    let state = dir.join("crontab.state");
    let installed = dir.join("installed_paths");
    let install = if reject_install {
        "echo \"$1\" >> \"$INSTALLED\"\necho \"errors in crontab file, can't install\" >&2\nexit 1"
            .to_string()
    } else {
        "echo \"$1\" >> \"$INSTALLED\"\ncat \"$1\" > \"$STATE\" || exit 1\nexit 0".to_string()
    };
    let script = format!(
        "#!/bin/sh\n\
         STATE=\"{}\"\n\
         INSTALLED=\"{}\"\n\
         if [ \"$1\" = \"-l\" ]; then\n\
         if [ -f \"$STATE\" ]; then cat \"$STATE\"; exit 0; fi\n\
         echo \"no crontab for tester\" >&2\n\
         exit 1\n\
         fi\n\
         {}\n",
        state.display(),
        installed.display(),
        install
    );
    let path = dir.join("crontab");
    std::fs::write(&path, script).unwrap();
    std::fs::set_permissions(&path, std::fs::Permissions::from_mode(0o755)).unwrap();
    path
}

/// Temp file paths the fake crontab was asked to install.
pub fn installed_paths(dir: &Path) -> Vec<PathBuf> {
    std::fs::read_to_string(dir.join("installed_paths"))
        .unwrap_or_default()
        .lines()
        .map(PathBuf::from)
        .collect()
}
