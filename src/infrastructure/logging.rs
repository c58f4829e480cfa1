//! 日志初始化
//!
//! `RUST_LOG` 优先于配置中的级别；重复初始化是无害的。

use tracing_subscriber::EnvFilter;

use super::config::LoggingConfig;

/// 安装全局 tracing subscriber
///
/// Returns `false` when a global subscriber was already installed.
pub fn init_tracing(config: &LoggingConfig) -> bool {
    let filter = EnvFilter::try_from_default_env()
        .or_else(|_| EnvFilter::try_new(&config.level))
        .unwrap_or_else(|_| EnvFilter::new("info"));

    let builder = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(true);

    let installed = if config.json {
        builder.json().try_init().is_ok()
    } else {
        builder.try_init().is_ok()
    };

    if installed {
        tracing::info!(level = %config.level, json = config.json, "Tracing initialized");
    }
    installed
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_second_init_is_a_no_op() {
        let config = LoggingConfig {
            level: "content_search=debug".to_string(),
            json: false,
        };
        let _ = init_tracing(&config);
        assert!(!init_tracing(&config));
    }
}
