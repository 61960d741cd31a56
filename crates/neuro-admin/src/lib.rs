//! # NeuroPredict 运维模块
//!
//! 配置加载与验证、日志初始化

pub mod config;
pub mod logging;

pub use config::{
    ApiConfig, ConfigManager, ConfigValidator, LogFormat, LoggingConfig, NeuroConfig, PollerConfig, ReportConfig,
};
pub use logging::{filter_directive, init_logging};
