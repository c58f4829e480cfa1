//! 变更追踪任务
//!
//! 每次运行按以下顺序推进：
//!
//! 1. 读取持久化的 continuation token
//! 2. 拉取一页变更事件（delta 模式小页，full 模式大页或不限）
//! 3. 有 token 时丢弃页首重复事件
//! 4. 去重后按 worker 数切成连续分片并行应用，等待全部 worker 结束
//! 5. 提交索引，再持久化新 token
//! 6. full 模式回到第 2 步，直到拉到空页
//!
//! 同一索引同一时刻只允许一个运行；重叠触发按 [`OverlapPolicy`] 等待或跳过。

pub mod scheduler;

pub use scheduler::TrackerScheduler;

use parking_lot::RwLock;
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tokio::sync::Mutex;
use tokio::task::JoinSet;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, instrument, warn};

use crate::error::TrackerError;
use crate::infrastructure::config::{FulltextConfig, OverlapPolicy, TrackerConfig};
use crate::models::ChangeEvent;
use crate::repository::{ChangeLog, ObjectStore, TypeCatalog};
use crate::search_engine::{SearchIndex, TokenStore};
use crate::services::change_extractor::extract_latest;
use crate::services::indexing_worker::{IndexingWorker, SliceReport};

/// 运行模式
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TrackingMode {
    /// 单页增量
    Delta,
    /// 拉取直到变更日志耗尽
    Full,
}

/// 任务状态
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum JobStatus {
    Idle,
    Running,
    Done,
    Failed,
}

/// 单次运行结果
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RunReport {
    pub mode: TrackingMode,
    /// Non-empty pages applied.
    pub pages: usize,
    /// Change log fetch calls, including the final empty one.
    pub fetches: usize,
    /// Events after dropping the repeated resume event, before dedup.
    pub events_fetched: usize,
    pub events_applied: usize,
    pub skipped: usize,
    pub failures: usize,
    /// Token persisted at the end of the run.
    pub final_token: Option<String>,
}

impl RunReport {
    fn new(mode: TrackingMode, token: Option<String>) -> Self {
        Self {
            mode,
            pages: 0,
            fetches: 0,
            events_fetched: 0,
            events_applied: 0,
            skipped: 0,
            failures: 0,
            final_token: token,
        }
    }

    fn absorb(&mut self, slice: SliceReport) {
        self.events_applied += slice.applied;
        self.skipped += slice.skipped;
        self.failures += slice.failures;
    }
}

/// Splits `events` into `min(workers, len)` contiguous slices.
///
/// Slice sizes differ by at most one; the first `len % n` slices get the extra event.
pub fn partition_slices<T>(events: Vec<T>, workers: usize) -> Vec<Vec<T>> {
    let len = events.len();
    let n = workers.max(1).min(len);
    if n == 0 {
        return Vec::new();
    }
    let base = len / n;
    let remainder = len % n;

    let mut slices = Vec::with_capacity(n);
    let mut events = events.into_iter();
    for i in 0..n {
        let size = base + usize::from(i < remainder);
        slices.push(events.by_ref().take(size).collect());
    }
    slices
}

pub struct ChangeTracker {
    repository_id: String,
    change_log: Arc<dyn ChangeLog>,
    index: Arc<dyn SearchIndex>,
    tokens: Arc<dyn TokenStore>,
    worker: Arc<IndexingWorker>,
    config: TrackerConfig,
    // shared with every tracker of this repository on the same token store
    run_lock: Arc<Mutex<()>>,
    status: RwLock<JobStatus>,
    last_report: RwLock<Option<RunReport>>,
    cancel: CancellationToken,
}

impl ChangeTracker {
    /// `repository` supplies the change log, snapshots and types; `index`
    /// receives the documents and holds the continuation token.
    pub fn new<R, I>(
        repository_id: impl Into<String>,
        repository: Arc<R>,
        index: Arc<I>,
        config: TrackerConfig,
        fulltext: FulltextConfig,
    ) -> Self
    where
        R: ChangeLog + ObjectStore + TypeCatalog + 'static,
        I: SearchIndex + TokenStore + 'static,
    {
        Self::from_parts(
            repository_id,
            repository.clone(),
            repository.clone(),
            repository,
            index.clone(),
            index,
            config,
            fulltext,
        )
    }

    #[allow(clippy::too_many_arguments)]
    pub fn from_parts(
        repository_id: impl Into<String>,
        change_log: Arc<dyn ChangeLog>,
        objects: Arc<dyn ObjectStore>,
        types: Arc<dyn TypeCatalog>,
        index: Arc<dyn SearchIndex>,
        tokens: Arc<dyn TokenStore>,
        config: TrackerConfig,
        fulltext: FulltextConfig,
    ) -> Self {
        let repository_id = repository_id.into();
        let run_lock = tokens.run_lock(&repository_id);
        let cancel = CancellationToken::new();
        let worker = Arc::new(IndexingWorker::new(
            repository_id.clone(),
            index.clone(),
            objects,
            types,
            fulltext,
            cancel.clone(),
        ));
        Self {
            repository_id,
            change_log,
            index,
            tokens,
            worker,
            config,
            run_lock,
            status: RwLock::new(JobStatus::Idle),
            last_report: RwLock::new(None),
            cancel,
        }
    }

    pub fn repository_id(&self) -> &str {
        &self.repository_id
    }

    pub fn status(&self) -> JobStatus {
        *self.status.read()
    }

    pub fn last_report(&self) -> Option<RunReport> {
        self.last_report.read().clone()
    }

    pub fn config(&self) -> &TrackerConfig {
        &self.config
    }

    /// Cancelling stops the drain loop and the workers at the next event.
    pub fn cancellation_token(&self) -> CancellationToken {
        self.cancel.clone()
    }

    /// 执行一次追踪运行
    #[instrument(skip(self), fields(repository_id = %self.repository_id))]
    pub async fn run(&self, mode: TrackingMode) -> Result<RunReport, TrackerError> {
        let _guard = match self.config.overlap_policy {
            OverlapPolicy::Skip => self.run_lock.try_lock().map_err(|_| {
                info!("Previous run still in progress, skipping");
                TrackerError::AlreadyRunning(self.repository_id.clone())
            })?,
            OverlapPolicy::Wait => self.run_lock.lock().await,
        };

        *self.status.write() = JobStatus::Running;
        info!(?mode, "Change tracking run started");

        let result = self.run_locked(mode).await;
        match &result {
            Ok(report) => {
                *self.status.write() = JobStatus::Done;
                *self.last_report.write() = Some(report.clone());
                info!(
                    pages = report.pages,
                    applied = report.events_applied,
                    skipped = report.skipped,
                    failures = report.failures,
                    token = ?report.final_token,
                    "Change tracking run finished"
                );
            }
            Err(e) => {
                *self.status.write() = JobStatus::Failed;
                error!(error = %e, "Change tracking run failed, token not advanced");
            }
        }
        result
    }

    async fn run_locked(&self, mode: TrackingMode) -> Result<RunReport, TrackerError> {
        let page_size = match mode {
            TrackingMode::Delta => Some(self.config.delta_page_size),
            TrackingMode::Full => self.config.full_max_items(),
        };

        let mut token = self
            .tokens
            .read_token(&self.repository_id)
            .map_err(TrackerError::TokenStore)?;
        let mut report = RunReport::new(mode, token.clone());

        loop {
            if self.cancel.is_cancelled() {
                info!("Cancellation requested, stopping between pages");
                break;
            }

            // one extra slot for the repeated resume event, so a page of size 1 still advances
            let max_items = match &token {
                Some(_) => page_size.map(|n| n.saturating_add(1)),
                None => page_size,
            };
            let page = self
                .change_log
                .fetch_changes(token.as_deref(), max_items)
                .await
                .map_err(TrackerError::ChangeLog)?;
            report.fetches += 1;

            let mut events = page.events;
            if token.is_some() && !events.is_empty() {
                // the event at the resume point was applied by the previous run
                events.remove(0);
            }
            if events.is_empty() {
                debug!(fetches = report.fetches, "No new changes");
                break;
            }
            report.events_fetched += events.len();

            let latest = extract_latest(&events);
            debug!(fetched = events.len(), distinct = latest.len(), "Deduplicated change page");

            let slices = self.dispatch(latest).await?;
            report.absorb(slices);

            self.index.commit().map_err(TrackerError::Index)?;
            if slices.cancelled {
                warn!("Batch interrupted by cancellation, applied changes kept but token not advanced");
                return Err(TrackerError::Cancelled);
            }

            self.tokens
                .store_token(&self.repository_id, &page.latest_token)
                .map_err(TrackerError::TokenStore)?;
            report.pages += 1;
            report.final_token = Some(page.latest_token.clone());
            token = Some(page.latest_token);

            if mode == TrackingMode::Delta {
                break;
            }
        }

        Ok(report)
    }

    /// Fans the events out to the worker pool and waits for every worker.
    async fn dispatch(&self, events: Vec<ChangeEvent>) -> Result<SliceReport, TrackerError> {
        let slices = partition_slices(events, self.config.worker_count);
        let mut workers = JoinSet::new();
        for (worker_id, slice) in slices.into_iter().enumerate() {
            let worker = Arc::clone(&self.worker);
            workers.spawn(async move { worker.process_slice(worker_id, slice).await });
        }

        let mut total = SliceReport::default();
        let mut aborted = None;
        while let Some(joined) = workers.join_next().await {
            match joined {
                Ok(report) => total.merge(report),
                Err(e) => {
                    error!(error = %e, "Indexing worker terminated abnormally");
                    aborted = Some(e.to_string());
                }
            }
        }

        match aborted {
            Some(message) => Err(TrackerError::Worker(message)),
            None => Ok(total),
        }
    }

    /// Drops every indexed object of the repository and restarts tracking
    /// from the beginning of the change log.
    #[instrument(skip(self), fields(repository_id = %self.repository_id))]
    pub async fn reset(&self) -> Result<(), TrackerError> {
        let _guard = self.run_lock.lock().await;
        self.index
            .clear_repository(&self.repository_id)
            .map_err(TrackerError::Index)?;
        self.tokens
            .store_token(&self.repository_id, "")
            .map_err(TrackerError::TokenStore)?;
        *self.status.write() = JobStatus::Idle;
        *self.last_report.write() = None;
        info!("Repository index reset");
        Ok(())
    }
}
