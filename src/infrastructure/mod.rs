//! 基础设施层 - 配置加载与日志初始化

pub mod config;
pub mod logging;

pub use config::{
    FulltextConfig, IndexConfig, LoggingConfig, OverlapPolicy, QueryConfig, ServiceConfiguration,
    TrackerConfig,
};
pub use logging::init_tracing;
