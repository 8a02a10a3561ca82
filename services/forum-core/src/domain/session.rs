//! 会话实体

use std::fmt;

use chrono::{DateTime, Duration, Utc};
use forum_common::UserId;
use rand::RngCore;
use rand::rngs::OsRng;
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};

use super::user::User;

/// 令牌熵（字节）
const TOKEN_BYTES: usize = 32;

/// 会话类型
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum SessionKind {
    Guest,
    Authenticated,
}

impl SessionKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Guest => "guest",
            Self::Authenticated => "authenticated",
        }
    }
}

/// 会话主体：游客会话没有用户，认证会话必定绑定一个用户
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum SessionSubject {
    Guest,
    Authenticated(UserId),
}

impl SessionSubject {
    pub fn kind(&self) -> SessionKind {
        match self {
            Self::Guest => SessionKind::Guest,
            Self::Authenticated(_) => SessionKind::Authenticated,
        }
    }

    pub fn user_id(&self) -> Option<UserId> {
        match self {
            Self::Guest => None,
            Self::Authenticated(id) => Some(*id),
        }
    }
}

/// 不透明会话令牌
///
/// 只有摘要会落库；`Debug` 不输出原文。
#[derive(Clone, PartialEq, Eq)]
pub struct SessionToken(String);

impl SessionToken {
    /// 使用操作系统 CSPRNG 生成 256 位令牌
    pub fn generate() -> Self {
        let mut bytes = [0u8; TOKEN_BYTES];
        OsRng.fill_bytes(&mut bytes);
        Self(hex::encode(bytes))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// 存储查找键
    pub fn hash(&self) -> String {
        hash_token(&self.0)
    }
}

impl From<String> for SessionToken {
    fn from(value: String) -> Self {
        Self(value)
    }
}

impl fmt::Debug for SessionToken {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("SessionToken([REDACTED])")
    }
}

/// 令牌的 SHA-256 十六进制摘要
pub fn hash_token(token: &str) -> String {
    hex::encode(Sha256::digest(token.as_bytes()))
}

/// 日志中使用的摘要前缀
pub fn hash_prefix(token_hash: &str) -> &str {
    token_hash.get(..8).unwrap_or(token_hash)
}

/// 会话实体
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Session {
    pub token_hash: String,
    pub subject: SessionSubject,
    pub created_at: DateTime<Utc>,
    pub last_activity_at: DateTime<Utc>,
    pub expires_at: DateTime<Utc>,
}

impl Session {
    pub fn new(token_hash: String, subject: SessionSubject, now: DateTime<Utc>, ttl: Duration) -> Self {
        Self {
            token_hash,
            subject,
            created_at: now,
            last_activity_at: now,
            expires_at: now + ttl,
        }
    }

    pub fn kind(&self) -> SessionKind {
        self.subject.kind()
    }

    /// `now < expires_at` 时可用；与最后活动时间无关
    pub fn is_usable_at(&self, now: DateTime<Utc>) -> bool {
        now < self.expires_at
    }

    /// 创建到最后一次活动之间的时长
    pub fn duration(&self) -> Duration {
        self.last_activity_at - self.created_at
    }
}

/// 新签发的会话，令牌原文只在这里出现一次
#[derive(Debug, Clone)]
pub struct IssuedSession {
    pub token: SessionToken,
    pub kind: SessionKind,
    pub expires_at: DateTime<Utc>,
}

/// 校验通过后的请求身份
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SessionContext {
    Guest,
    Authenticated(User),
}

impl SessionContext {
    pub fn kind(&self) -> SessionKind {
        match self {
            Self::Guest => SessionKind::Guest,
            Self::Authenticated(_) => SessionKind::Authenticated,
        }
    }

    pub fn user(&self) -> Option<&User> {
        match self {
            Self::Guest => None,
            Self::Authenticated(user) => Some(user),
        }
    }

    pub fn is_authenticated(&self) -> bool {
        matches!(self, Self::Authenticated(_))
    }
}

/// 请求鉴权结果，交给令牌载体（例如 Cookie）处理
#[derive(Debug, Clone)]
pub struct RequestIdentity {
    pub context: SessionContext,
    /// 需要下发给客户端的新令牌
    pub issued: Option<IssuedSession>,
    /// 客户端持有的令牌无效，应当清除
    pub clear_token: bool,
}

impl RequestIdentity {
    pub fn guest() -> Self {
        Self {
            context: SessionContext::Guest,
            issued: None,
            clear_token: false,
        }
    }
}

/// 近期活跃会话数
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ActiveSessionCounts {
    pub authenticated: u64,
    pub guest: u64,
}

impl ActiveSessionCounts {
    pub fn total(&self) -> u64 {
        self.authenticated + self.guest
    }
}
