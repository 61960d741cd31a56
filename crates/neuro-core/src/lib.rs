//! # NeuroPredict Core
//!
//! 系统的核心模块，提供基础数据结构、错误定义、会话上下文和通用工具。

pub mod error;
pub mod models;
pub mod session;
pub mod utils;

pub use error::{NeuroError, Result};
pub use models::*;
pub use session::{Role, Session};
