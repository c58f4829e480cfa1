//! 服务配置模块
//!
//! 提供配置驱动的服务创建，支持：
//! - TOML/JSON 配置文件加载
//! - 配置文件与 `CONTENT_SEARCH__*` 环境变量分层合并
//! - 开发和生产环境的默认配置
//! - 配置验证和错误处理

use eyre::{Context, Result};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use validator::Validate;

/// 环境变量前缀，例如 `CONTENT_SEARCH__TRACKER__WORKER_COUNT=8`
pub const ENV_PREFIX: &str = "CONTENT_SEARCH";
const ENV_SEPARATOR: &str = "__";

/// 服务配置
///
/// 定义变更追踪、全文提取、查询和索引的配置参数
#[derive(Default, Debug, Clone, PartialEq, Serialize, Deserialize, Validate)]
pub struct ServiceConfiguration {
    /// 变更追踪配置
    #[serde(default)]
    #[validate(nested)]
    pub tracker: TrackerConfig,

    /// 全文提取配置
    #[serde(default)]
    #[validate(nested)]
    pub fulltext: FulltextConfig,

    /// 查询配置
    #[serde(default)]
    #[validate(nested)]
    pub query: QueryConfig,

    /// 索引存储配置
    #[serde(default)]
    #[validate(nested)]
    pub index: IndexConfig,

    /// 日志配置
    #[serde(default)]
    pub logging: LoggingConfig,
}

/// 上一次运行尚未结束时新触发的处理方式
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum OverlapPolicy {
    /// 等待上一次运行结束
    Wait,
    /// 跳过本次触发
    #[default]
    Skip,
}

/// 变更追踪配置
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, Validate)]
pub struct TrackerConfig {
    /// 并行索引 worker 数量
    #[serde(default = "default_worker_count")]
    #[validate(range(min = 1, max = 256))]
    pub worker_count: usize,

    /// delta 模式每页事件数
    #[serde(default = "default_delta_page_size")]
    #[validate(range(min = 1))]
    pub delta_page_size: usize,

    /// full 模式每页事件数，-1 表示不限
    #[serde(default = "default_full_page_size")]
    #[validate(range(min = -1))]
    pub full_page_size: i64,

    /// 调度间隔（秒）
    #[serde(default = "default_interval_seconds")]
    #[validate(range(min = 1, max = 86400))]
    pub interval_seconds: u64,

    #[serde(default)]
    pub overlap_policy: OverlapPolicy,

    /// 调度器启动时先执行一次 full 运行
    #[serde(default)]
    pub full_run_on_start: bool,
}

fn default_worker_count() -> usize {
    4
}

fn default_delta_page_size() -> usize {
    100
}

fn default_full_page_size() -> i64 {
    -1
}

fn default_interval_seconds() -> u64 {
    30
}

impl Default for TrackerConfig {
    fn default() -> Self {
        Self {
            worker_count: default_worker_count(),
            delta_page_size: default_delta_page_size(),
            full_page_size: default_full_page_size(),
            interval_seconds: default_interval_seconds(),
            overlap_policy: OverlapPolicy::default(),
            full_run_on_start: false,
        }
    }
}

impl TrackerConfig {
    /// Page size passed to the change log in full mode, `None` when unbounded.
    pub fn full_max_items(&self) -> Option<usize> {
        usize::try_from(self.full_page_size).ok().filter(|n| *n > 0)
    }
}

/// 全文提取配置
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, Validate)]
pub struct FulltextConfig {
    #[serde(default)]
    pub enabled: bool,

    /// 只提取 `allowed_mime_types` 中的类型
    #[serde(default)]
    pub mime_filter_enabled: bool,

    #[serde(default)]
    pub allowed_mime_types: Vec<String>,

    /// 单个文档最多索引的文本字节数
    #[serde(default = "default_max_content_bytes")]
    #[validate(range(min = 1))]
    pub max_content_bytes: usize,
}

fn default_max_content_bytes() -> usize {
    10 * 1024 * 1024 // 10 MiB
}

impl Default for FulltextConfig {
    fn default() -> Self {
        Self {
            enabled: false,
            mime_filter_enabled: false,
            allowed_mime_types: Vec::new(),
            max_content_bytes: default_max_content_bytes(),
        }
    }
}

/// 查询配置
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, Validate)]
pub struct QueryConfig {
    /// 未指定 max_items 时的默认页大小
    #[serde(default = "default_max_items")]
    #[validate(range(min = 1, max = 10000))]
    pub default_max_items: usize,

    /// IN_TREE 展开的最大层数
    #[serde(default = "default_in_tree_max_depth")]
    #[validate(range(min = 1, max = 1000))]
    pub in_tree_max_depth: usize,
}

fn default_max_items() -> usize {
    50
}

fn default_in_tree_max_depth() -> usize {
    10
}

impl Default for QueryConfig {
    fn default() -> Self {
        Self {
            default_max_items: default_max_items(),
            in_tree_max_depth: default_in_tree_max_depth(),
        }
    }
}

/// 索引存储配置
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, Validate)]
pub struct IndexConfig {
    /// 索引目录，未设置时使用内存索引
    #[serde(default)]
    pub path: Option<PathBuf>,

    /// Tantivy writer 内存预算（字节）
    #[serde(default = "default_writer_heap_size")]
    #[validate(range(min = 15_000_000))]
    pub writer_heap_size: usize,
}

fn default_writer_heap_size() -> usize {
    50_000_000 // 50MB
}

impl Default for IndexConfig {
    fn default() -> Self {
        Self {
            path: None,
            writer_heap_size: default_writer_heap_size(),
        }
    }
}

/// 日志配置
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LoggingConfig {
    /// EnvFilter 指令，`RUST_LOG` 优先
    #[serde(default = "default_log_level")]
    pub level: String,

    /// 输出 JSON 格式日志
    #[serde(default)]
    pub json: bool,
}

fn default_log_level() -> String {
    "info".to_string()
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: default_log_level(),
            json: false,
        }
    }
}

impl ServiceConfiguration {
    /// 从 TOML 文件加载配置
    ///
    /// # Errors
    /// 如果文件不存在或格式错误，返回错误
    pub fn from_toml_file<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path = path.as_ref();
        let content = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read config file: {}", path.display()))?;

        let config: Self = toml::from_str(&content)
            .with_context(|| format!("Failed to parse TOML config: {}", path.display()))?;

        tracing::info!("Loaded service configuration from: {}", path.display());
        Ok(config)
    }

    /// 从 JSON 文件加载配置
    ///
    /// # Errors
    /// 如果文件不存在或格式错误，返回错误
    pub fn from_json_file<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path = path.as_ref();
        let content = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read config file: {}", path.display()))?;

        let config: Self = serde_json::from_str(&content)
            .with_context(|| format!("Failed to parse JSON config: {}", path.display()))?;

        tracing::info!("Loaded service configuration from: {}", path.display());
        Ok(config)
    }

    /// 分层加载：可选配置文件，再由 `CONTENT_SEARCH__*` 环境变量覆盖，最后验证
    ///
    /// 文件格式由扩展名决定（`.toml` / `.json`）。
    pub fn load_layered(path: Option<&Path>) -> Result<Self> {
        let mut builder = config::Config::builder();
        if let Some(path) = path {
            builder = builder.add_source(config::File::from(path).required(true));
        }
        builder = builder.add_source(
            config::Environment::with_prefix(ENV_PREFIX)
                .prefix_separator(ENV_SEPARATOR)
                .separator(ENV_SEPARATOR)
                .try_parsing(true)
                .list_separator(",")
                .with_list_parse_key("fulltext.allowed_mime_types"),
        );

        let config: Self = builder
            .build()
            .context("Failed to assemble layered configuration")?
            .try_deserialize()
            .context("Failed to deserialize layered configuration")?;

        config.validate()?;
        Ok(config)
    }

    /// 保存配置到 TOML 文件
    ///
    /// # Errors
    /// 如果写入失败，返回错误
    pub fn save_to_toml<P: AsRef<Path>>(&self, path: P) -> Result<()> {
        let path = path.as_ref();
        let content = toml::to_string_pretty(self).context("Failed to serialize config to TOML")?;

        std::fs::write(path, content)
            .with_context(|| format!("Failed to write config file: {}", path.display()))?;

        tracing::info!("Saved service configuration to: {}", path.display());
        Ok(())
    }

    /// 创建开发环境默认配置
    pub fn development() -> Self {
        Self {
            tracker: TrackerConfig {
                worker_count: 2,
                delta_page_size: 50,
                interval_seconds: 5,
                ..TrackerConfig::default()
            },
            fulltext: FulltextConfig {
                enabled: true,
                ..FulltextConfig::default()
            },
            logging: LoggingConfig {
                level: "debug".to_string(),
                json: false,
            },
            ..Self::default()
        }
    }

    /// 创建生产环境默认配置
    pub fn production() -> Self {
        Self {
            tracker: TrackerConfig {
                worker_count: 8,
                delta_page_size: 500,
                full_page_size: 5000,
                interval_seconds: 30,
                overlap_policy: OverlapPolicy::Skip,
                full_run_on_start: false,
            },
            fulltext: FulltextConfig {
                enabled: true,
                mime_filter_enabled: true,
                allowed_mime_types: vec![
                    "text/plain".to_string(),
                    "text/html".to_string(),
                    "text/markdown".to_string(),
                    "application/json".to_string(),
                    "application/xml".to_string(),
                ],
                max_content_bytes: default_max_content_bytes(),
            },
            index: IndexConfig {
                path: Some(PathBuf::from("./data/index")),
                writer_heap_size: 200_000_000,
            },
            logging: LoggingConfig {
                level: "info".to_string(),
                json: true,
            },
            ..Self::default()
        }
    }

    /// 验证配置
    ///
    /// # Errors
    /// 如果配置无效，返回错误
    pub fn validate(&self) -> Result<()> {
        Validate::validate(self).context("Configuration value out of range")?;

        if self.tracker.full_page_size == 0 {
            eyre::bail!("Full mode page size must be positive or -1 for unbounded");
        }

        if self.fulltext.mime_filter_enabled && self.fulltext.allowed_mime_types.is_empty() {
            eyre::bail!("MIME filter is enabled but no MIME types are allowed");
        }

        if self.logging.level.trim().is_empty() {
            eyre::bail!("Log level must not be empty");
        }

        Ok(())
    }
}
