//! 定时调度
//!
//! Runs the tracker in delta mode on a fixed interval until its cancellation
//! token fires. Ticks missed while a run was in progress are dropped.

use std::sync::Arc;
use std::time::Duration;
use tokio::task::JoinHandle;
use tokio::time::{interval, MissedTickBehavior};
use tracing::{debug, error, info};

use super::{ChangeTracker, TrackingMode};
use crate::error::TrackerError;

pub struct TrackerScheduler {
    tracker: Arc<ChangeTracker>,
    period: Duration,
    full_run_on_start: bool,
}

impl TrackerScheduler {
    pub fn new(tracker: Arc<ChangeTracker>, period: Duration) -> Self {
        Self {
            tracker,
            period,
            full_run_on_start: false,
        }
    }

    /// Interval and start-up behaviour taken from the tracker configuration.
    pub fn from_config(tracker: Arc<ChangeTracker>) -> Self {
        let period = Duration::from_secs(tracker.config().interval_seconds);
        let full_run_on_start = tracker.config().full_run_on_start;
        Self {
            tracker,
            period,
            full_run_on_start,
        }
    }

    pub fn with_full_run_on_start(mut self, enabled: bool) -> Self {
        self.full_run_on_start = enabled;
        self
    }

    pub fn spawn(self) -> JoinHandle<()> {
        tokio::spawn(self.run())
    }

    pub async fn run(self) {
        let cancel = self.tracker.cancellation_token();
        info!(
            repository_id = %self.tracker.repository_id(),
            period_ms = self.period.as_millis() as u64,
            "Tracker scheduler started"
        );

        if self.full_run_on_start {
            self.tick(TrackingMode::Full).await;
        }

        let mut ticker = interval(self.period);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Skip);

        loop {
            tokio::select! {
                _ = cancel.cancelled() => break,
                _ = ticker.tick() => self.tick(TrackingMode::Delta).await,
            }
        }

        info!(repository_id = %self.tracker.repository_id(), "Tracker scheduler stopped");
    }

    async fn tick(&self, mode: TrackingMode) {
        match self.tracker.run(mode).await {
            Ok(report) => debug!(?mode, applied = report.events_applied, "Scheduled run completed"),
            Err(TrackerError::AlreadyRunning(_)) => debug!(?mode, "Scheduled run skipped"),
            // logged by the tracker; the next tick retries from the stored token
            Err(e) => error!(?mode, error = %e, "Scheduled run failed"),
        }
    }
}
