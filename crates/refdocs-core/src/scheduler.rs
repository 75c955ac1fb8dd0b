//! Periodic refresh driver.
//!
//! The scheduler task owns the [`Pipeline`] and is therefore the only writer
//! to the store. It alternates between two states:
//!
//! ```text
//!   Idle --(start / tick)--> Refreshing --(cycle settled)--> Idle
//! ```
//!
//! The next tick is armed only once a cycle has settled, so cycles never
//! overlap. While idle it also serves on-demand [`FetchRequest`]s queued by
//! the read path. Shutdown stops future cycles; a running cycle finishes
//! first.

use crate::pipeline::{CycleReport, Pipeline};
use crate::read::{FetchRequest, REQUEST_QUEUE_CAPACITY};
use async_trait::async_trait;
use std::time::Duration;
use tokio::sync::{mpsc, watch};
use tokio::task::JoinHandle;
use tracing::{debug, error, info, warn};

/// Source of "start the next cycle" signals.
#[async_trait]
pub trait Ticker: Send {
    /// Resolve when the next cycle is due.
    async fn tick(&mut self);
}

/// Fires once per period, measured from the moment the tick is awaited.
#[derive(Debug, Clone, Copy)]
pub struct IntervalTicker {
    period: Duration,
}

impl IntervalTicker {
    /// Ticker with the given period.
    pub const fn new(period: Duration) -> Self {
        Self { period }
    }

    /// Configured period.
    pub const fn period(&self) -> Duration {
        self.period
    }
}

#[async_trait]
impl Ticker for IntervalTicker {
    async fn tick(&mut self) {
        tokio::time::sleep(self.period).await;
    }
}

/// Scheduler state.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SchedulerState {
    /// Waiting for the next tick.
    Idle,
    /// A cycle is running.
    Refreshing,
}

/// Not yet started scheduler.
pub struct RefreshScheduler {
    pipeline: Pipeline,
    ticker: Box<dyn Ticker>,
    requests_tx: mpsc::Sender<FetchRequest>,
    requests_rx: mpsc::Receiver<FetchRequest>,
}

impl RefreshScheduler {
    /// Create a scheduler around a pipeline and a ticker.
    pub fn new(pipeline: Pipeline, ticker: impl Ticker + 'static) -> Self {
        let (requests_tx, requests_rx) = mpsc::channel(REQUEST_QUEUE_CAPACITY);
        Self {
            pipeline,
            ticker: Box::new(ticker),
            requests_tx,
            requests_rx,
        }
    }

    /// Sender for on-demand ingestion requests.
    pub fn requests(&self) -> mpsc::Sender<FetchRequest> {
        self.requests_tx.clone()
    }

    /// Start the scheduler task. The first cycle begins immediately.
    pub fn spawn(self) -> SchedulerHandle {
        let (shutdown_tx, shutdown_rx) = watch::channel(false);
        let (state_tx, state_rx) = watch::channel(SchedulerState::Idle);
        let (report_tx, report_rx) = watch::channel(None);

        let Self {
            pipeline,
            ticker,
            requests_rx,
            ..
        } = self;

        let task = tokio::spawn(run(
            pipeline,
            ticker,
            requests_rx,
            shutdown_rx,
            state_tx,
            report_tx,
        ));

        SchedulerHandle {
            shutdown: shutdown_tx,
            state: state_rx,
            reports: report_rx,
            task,
        }
    }
}

/// Control handle for a running scheduler.
pub struct SchedulerHandle {
    shutdown: watch::Sender<bool>,
    state: watch::Receiver<SchedulerState>,
    reports: watch::Receiver<Option<CycleReport>>,
    task: JoinHandle<()>,
}

impl SchedulerHandle {
    /// Current state.
    pub fn state(&self) -> SchedulerState {
        *self.state.borrow()
    }

    /// Watch state transitions.
    pub fn subscribe_state(&self) -> watch::Receiver<SchedulerState> {
        self.state.clone()
    }

    /// Report of the most recent successful cycle.
    pub fn last_report(&self) -> Option<CycleReport> {
        self.reports.borrow().clone()
    }

    /// Wait until cycle `cycle` (or a later one) has reported.
    ///
    /// Returns `None` if the scheduler stops first. A cycle that fails to
    /// build its index publishes no report.
    pub async fn wait_for_cycle(&self, cycle: u64) -> Option<CycleReport> {
        let mut reports = self.reports.clone();
        reports
            .wait_for(|r| r.as_ref().is_some_and(|r| r.cycle >= cycle))
            .await
            .ok()
            .and_then(|r| r.clone())
    }

    /// Stop scheduling and wait for the task to exit.
    pub async fn shutdown(self) {
        self.shutdown.send_replace(true);
        if let Err(e) = self.task.await {
            error!(error = %e, "Scheduler task ended abnormally");
        }
    }
}

async fn run(
    mut pipeline: Pipeline,
    mut ticker: Box<dyn Ticker>,
    mut requests: mpsc::Receiver<FetchRequest>,
    mut shutdown: watch::Receiver<bool>,
    state: watch::Sender<SchedulerState>,
    reports: watch::Sender<Option<CycleReport>>,
) {
    loop {
        if *shutdown.borrow_and_update() {
            break;
        }

        state.send_replace(SchedulerState::Refreshing);
        match pipeline.run_cycle().await {
            Ok(report) => {
                reports.send_replace(Some(report));
            },
            Err(e) => {
                error!(error = %e, "Refresh cycle failed; retrying on next tick");
            },
        }
        state.send_replace(SchedulerState::Idle);

        let tick = ticker.tick();
        tokio::pin!(tick);
        loop {
            tokio::select! {
                biased;
                changed = shutdown.changed() => {
                    if changed.is_err() || *shutdown.borrow() {
                        info!("Scheduler shutting down");
                        return;
                    }
                },
                () = &mut tick => break,
                Some(request) = requests.recv() => handle_request(&pipeline, request).await,
            }
        }
    }
    info!("Scheduler shutting down");
}

async fn handle_request(pipeline: &Pipeline, request: FetchRequest) {
    if pipeline.store().contains(&request.key) {
        debug!(key = %request.key, "Already cached; skipping on-demand ingestion");
        return;
    }
    if let Err(e) = pipeline.ingest_key(&request.key).await {
        warn!(key = %request.key, error = %e, "On-demand ingestion failed");
    }
}
