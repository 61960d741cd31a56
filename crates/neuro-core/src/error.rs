//! 错误定义模块

use thiserror::Error;

/// NeuroPredict统一错误类型
#[derive(Error, Debug)]
pub enum NeuroError {
    #[error("配置错误: {0}")]
    Config(String),

    #[error("验证错误: {0}")]
    Validation(String),

    #[error("推理服务错误: {0}")]
    Predictor(String),

    #[error("预测结果缺少必要字段: {0}")]
    MissingPredictionData(String),

    #[error("传输错误: {0}")]
    Transport(String),

    #[error("存储错误: {0}")]
    Store(String),

    #[error("文档渲染错误: {0}")]
    Render(String),

    #[error("文档输出错误: {0}")]
    Sink(String),

    #[error("资源未找到: {0}")]
    NotFound(String),

    #[error("序列化错误: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("IO错误: {0}")]
    Io(#[from] std::io::Error),

    #[error("系统内部错误: {0}")]
    Internal(String),
}

/// NeuroPredict统一结果类型
pub type Result<T> = std::result::Result<T, NeuroError>;
