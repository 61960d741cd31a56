//! 日志初始化

use crate::config::{LogFormat, LoggingConfig};
use anyhow::Result;
use tracing_subscriber::EnvFilter;

/// 决定最终使用的过滤指令
///
/// 优先级：命令行参数、`RUST_LOG`、配置文件。
pub fn filter_directive(config: &LoggingConfig, override_level: Option<&str>, rust_log: Option<&str>) -> String {
    override_level
        .or(rust_log)
        .map(str::trim)
        .filter(|level| !level.is_empty())
        .unwrap_or(config.level.as_str())
        .to_string()
}

/// 安装全局 tracing subscriber，每个进程只能调用一次
pub fn init_logging(config: &LoggingConfig, override_level: Option<&str>) -> Result<()> {
    let rust_log = std::env::var("RUST_LOG").ok();
    let directive = filter_directive(config, override_level, rust_log.as_deref());
    let filter = EnvFilter::try_new(&directive)
        .map_err(|e| anyhow::anyhow!("Invalid log filter '{}': {}", directive, e))?;

    let builder = tracing_subscriber::fmt().with_env_filter(filter);
    let installed = match config.format {
        LogFormat::Json => builder.json().try_init(),
        LogFormat::Pretty => builder.pretty().try_init(),
        LogFormat::Compact => builder.compact().try_init(),
    };
    installed.map_err(|e| anyhow::anyhow!("Failed to install tracing subscriber: {}", e))?;

    tracing::debug!("Logging initialised with filter '{}'", directive);
    Ok(())
}
