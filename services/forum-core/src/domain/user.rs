//! 用户实体

use chrono::{DateTime, Utc};
use forum_common::UserId;
use serde::{Deserialize, Serialize};

use super::value_objects::{Email, Username};

/// 用户
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct User {
    pub id: UserId,
    pub username: Username,
    pub email: Email,
    /// 联合登录账号为空字符串
    #[serde(skip_serializing, default)]
    pub password_hash: String,
    pub created_at: DateTime<Utc>,
}

impl User {
    /// 仅通过外部身份登录，无法使用密码
    pub fn is_federated_only(&self) -> bool {
        self.password_hash.is_empty()
    }
}

/// 待插入的用户
#[derive(Debug, Clone)]
pub struct NewUser {
    pub username: Username,
    pub email: Email,
    pub password_hash: String,
    pub created_at: DateTime<Utc>,
}

impl NewUser {
    pub fn federated(username: Username, email: Email, created_at: DateTime<Utc>) -> Self {
        Self {
            username,
            email,
            password_hash: String::new(),
            created_at,
        }
    }
}
