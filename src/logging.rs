//! 日志初始化

use tracing_subscriber::EnvFilter;

use crate::epub::error::{EpubError, Result};

/// 安装全局tracing订阅者，日志写到stderr
///
/// 设置了 `RUST_LOG` 时以它为准，否则默认 `info`，`verbose` 时为 `debug`。
pub fn init(verbose: bool) -> Result<()> {
    let default_level = if verbose { "debug" } else { "info" };
    let filter = EnvFilter::try_from_default_env()
        .or_else(|_| EnvFilter::try_new(default_level))
        .map_err(|e| EpubError::ConfigError(format!("无效的日志过滤器: {}", e)))?;

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .with_writer(std::io::stderr)
        .try_init()
        .map_err(|e| EpubError::ConfigError(format!("无法初始化日志: {}", e)))?;

    Ok(())
}
