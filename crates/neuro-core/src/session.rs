//! 会话上下文
//!
//! 每次调用外部协作方时显式传入，避免进程级的全局凭据

use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// 用户角色
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum Role {
    Doctor,
    Researcher,
    Admin,
}

/// 已认证的会话
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Session {
    pub user_id: Option<Uuid>,
    pub role: Option<Role>,
    token: Option<String>,
}

impl Session {
    /// 创建带令牌的会话
    pub fn new(user_id: Uuid, role: Role, token: impl Into<String>) -> Self {
        Self {
            user_id: Some(user_id),
            role: Some(role),
            token: Some(token.into()),
        }
    }

    /// 匿名会话，不携带任何凭据
    pub fn anonymous() -> Self {
        Self {
            user_id: None,
            role: None,
            token: None,
        }
    }

    pub fn bearer_token(&self) -> Option<&str> {
        self.token.as_deref()
    }

    pub fn is_authenticated(&self) -> bool {
        self.token.is_some()
    }
}
