//! # 推理服务集成模块
//!
//! 与外部推理服务的交互：
//! - 推理服务与激活图状态端点的 HTTP 客户端
//! - 激活图轮询状态机，可取消、有界重试
//! - 推理记录存储接口
//! - 推理提交流程编排
//! - 报告邮件投递

pub mod client;
pub mod mailer;
pub mod poller;
pub mod store;
pub mod submission;

pub use client::{ArtifactStatus, HttpPredictor, PredictionRequest, Predictor, PredictorResponse, StatusSource};
pub use mailer::HttpReportMailer;
pub use poller::{ArtifactPoller, PollOutcome, PollState, PollerHandle, PollerRegistry, RetryPolicy, SharedRecord};
pub use store::{InMemoryStore, PredictionStore};
pub use submission::{interpret_response, PollingPolicies, PredictionService, Submission};
