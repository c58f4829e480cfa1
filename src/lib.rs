//! 内容仓库搜索核心
//!
//! Two halves share one search index:
//!
//! - **查询侧**: a parsed content query's WHERE clause is compiled into a
//!   backend-agnostic [`models::TargetQuery`], translated for Tantivy and
//!   executed by [`services::QueryProcessor`].
//! - **索引侧**: [`task_manager::ChangeTracker`] replays the repository change
//!   log into the index with a pool of [`services::IndexingWorker`]s and keeps
//!   the continuation token in the index itself.
//!
//! The primary repository is reached only through the traits in [`repository`].

pub mod error;
pub mod infrastructure;
pub mod models;
pub mod repository;
pub mod search_engine;
pub mod services;
pub mod task_manager;

pub use error::{AppError, Result};
pub use infrastructure::{init_tracing, ServiceConfiguration};
pub use repository::{AllowAll, ChangeLog, InMemoryRepository, ObjectStore, PermissionFilter, TypeCatalog};
pub use search_engine::{SearchIndex, TantivyIndex, TokenStore};
pub use services::{compile, QueryContext, QueryProcessor};
pub use task_manager::{ChangeTracker, JobStatus, RunReport, TrackerScheduler, TrackingMode};
