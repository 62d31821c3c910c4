// Collection scheduler: one-shot (cron-invoked) or continuous (ticked loop).
// A tick runs sample then send, sequentially; at most one cycle and one request are in flight.

use std::future::Future;
use std::time::Duration;

use tokio::sync::{mpsc, oneshot, watch};
use tokio::time::{Interval, MissedTickBehavior};

use crate::error::{CollectError, ReportError, SampleError};
use crate::models::{MemorySample, ReportTarget};
use crate::reporter::StatsReporter;
use crate::sampler::MemorySampler;

pub trait SampleSource: Send + Sync {
    fn sample(&self) -> impl Future<Output = Result<MemorySample, SampleError>> + Send;
}

pub trait SampleSink: Send + Sync {
    fn send(
        &self,
        target: &ReportTarget,
        sample: &MemorySample,
    ) -> impl Future<Output = Result<String, ReportError>> + Send;
}

impl SampleSource for MemorySampler {
    fn sample(&self) -> impl Future<Output = Result<MemorySample, SampleError>> + Send {
        MemorySampler::sample(self)
    }
}

impl SampleSink for StatsReporter {
    fn send(
        &self,
        target: &ReportTarget,
        sample: &MemorySample,
    ) -> impl Future<Output = Result<String, ReportError>> + Send {
        StatsReporter::send(self, target, sample)
    }
}

/// Timer driving continuous mode.
pub trait Ticker: Send {
    fn tick(&mut self) -> impl Future<Output = ()> + Send;
}

impl Ticker for Interval {
    fn tick(&mut self) -> impl Future<Output = ()> + Send {
        async move {
            Interval::tick(self).await;
        }
    }
}

/// Interval ticker that drops firings missed while a tick was being processed.
pub fn interval_ticker(period: Duration) -> Interval {
    let mut tick = tokio::time::interval(period);
    tick.set_missed_tick_behavior(MissedTickBehavior::Skip);
    tick
}

/// Ticks once per message received. A closed channel never ticks again.
pub struct ChannelTicker {
    rx: mpsc::Receiver<()>,
}

impl ChannelTicker {
    pub fn new(rx: mpsc::Receiver<()>) -> Self {
        Self { rx }
    }
}

impl Ticker for ChannelTicker {
    fn tick(&mut self) -> impl Future<Output = ()> + Send {
        async move {
            if self.rx.recv().await.is_none() {
                std::future::pending::<()>().await;
            }
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SchedulerState {
    Idle,
    Running,
    Sampling,
    Reporting,
    Stopped,
}

/// Counters for one continuous run.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct RunSummary {
    pub ticks: u64,
    pub reported: u64,
    pub failed: u64,
}

pub struct CollectionScheduler<S, R> {
    sampler: S,
    reporter: R,
    target: ReportTarget,
    state: watch::Sender<SchedulerState>,
}

impl<S: SampleSource, R: SampleSink> CollectionScheduler<S, R> {
    pub fn new(sampler: S, reporter: R, target: ReportTarget) -> Self {
        let (state, _) = watch::channel(SchedulerState::Idle);
        Self {
            sampler,
            reporter,
            target,
            state,
        }
    }

    pub fn state(&self) -> SchedulerState {
        *self.state.borrow()
    }

    pub fn subscribe(&self) -> watch::Receiver<SchedulerState> {
        self.state.subscribe()
    }

    fn set_state(&self, next: SchedulerState) {
        self.state.send_replace(next);
    }

    async fn cycle(&self) -> Result<String, CollectError> {
        self.set_state(SchedulerState::Sampling);
        let sample = self.sampler.sample().await?;
        tracing::info!(
            total_mb = sample.total,
            used_mb = sample.used,
            cached_mb = sample.cached,
            free_mb = sample.free,
            "memory"
        );
        self.set_state(SchedulerState::Reporting);
        let body = self.reporter.send(&self.target, &sample).await?;
        Ok(body)
    }

    /// Single sample-and-report, for cron-invoked runs. Returns the endpoint's response body.
    pub async fn run_once(&self) -> Result<String, CollectError> {
        let result = self.cycle().await;
        self.set_state(SchedulerState::Stopped);
        match &result {
            Ok(body) => tracing::info!(url = %self.target, body = %body, "stats delivered"),
            Err(e) => tracing::warn!(
                url = %self.target,
                error = e as &dyn std::error::Error,
                "stats collection failed"
            ),
        }
        result
    }

    /// Samples and reports on every tick until `shutdown` fires (or its sender is dropped).
    /// Tick errors are logged and never stop the loop. Shutdown during a tick abandons the
    /// in-flight cycle, cancelling any pending request.
    #[tracing::instrument(name = "collector", skip_all, fields(url = %self.target))]
    pub async fn run<T: Ticker>(
        &self,
        mut ticker: T,
        mut shutdown: oneshot::Receiver<()>,
    ) -> RunSummary {
        self.set_state(SchedulerState::Running);
        tracing::info!(url = %self.target, "start collecting data");
        let mut summary = RunSummary::default();

        loop {
            tokio::select! {
                biased;
                _ = &mut shutdown => {
                    tracing::debug!("Collector shutting down");
                    break;
                }
                _ = ticker.tick() => {
                    summary.ticks += 1;
                    tokio::select! {
                        biased;
                        _ = &mut shutdown => {
                            tracing::debug!("Collector shutting down mid-tick; in-flight cycle dropped");
                            break;
                        }
                        result = self.cycle() => {
                            match result {
                                Ok(body) => {
                                    summary.reported += 1;
                                    tracing::info!(tick = summary.ticks, body = %body, "stats delivered");
                                }
                                Err(e) => {
                                    summary.failed += 1;
                                    tracing::warn!(
                                        tick = summary.ticks,
                                        error = &e as &dyn std::error::Error,
                                        operation = "collect",
                                        "collection tick failed"
                                    );
                                }
                            }
                        }
                    }
                    self.set_state(SchedulerState::Running);
                }
            }
        }

        self.set_state(SchedulerState::Stopped);
        tracing::info!(
            ticks = summary.ticks,
            reported = summary.reported,
            failed = summary.failed,
            "collector stopped"
        );
        summary
    }
}
