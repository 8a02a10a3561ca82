//! forum-errors - 统一错误处理
//!
//! 基于 RFC 7807 Problem Details 规范

use serde::{Deserialize, Serialize};
use thiserror::Error;

const PROBLEM_BASE: &str = "https://forum.local/problems";

/// 应用错误类型
#[derive(Debug, Error)]
pub enum AppError {
    #[error("Not found: {0}")]
    NotFound(String),

    #[error("Validation error: {0}")]
    Validation(String),

    #[error("Unauthorized: {0}")]
    Unauthorized(String),

    /// 唯一约束冲突；重试循环内部使用的信号
    #[error("Conflict: {0}")]
    Conflict(String),

    /// 有界重试后仍未解决冲突
    #[error("Conflict retry exhausted: {0}")]
    ConflictRetryExhausted(String),

    /// 存储不可达或超时
    #[error("Storage unavailable: {0}")]
    StorageUnavailable(String),

    #[error("Internal error: {0}")]
    Internal(String),
}

impl AppError {
    pub fn not_found(msg: impl Into<String>) -> Self {
        Self::NotFound(msg.into())
    }

    pub fn validation(msg: impl Into<String>) -> Self {
        Self::Validation(msg.into())
    }

    pub fn unauthorized(msg: impl Into<String>) -> Self {
        Self::Unauthorized(msg.into())
    }

    pub fn conflict(msg: impl Into<String>) -> Self {
        Self::Conflict(msg.into())
    }

    pub fn conflict_retry_exhausted(msg: impl Into<String>) -> Self {
        Self::ConflictRetryExhausted(msg.into())
    }

    pub fn storage_unavailable(msg: impl Into<String>) -> Self {
        Self::StorageUnavailable(msg.into())
    }

    pub fn internal(msg: impl Into<String>) -> Self {
        Self::Internal(msg.into())
    }

    pub fn is_conflict(&self) -> bool {
        matches!(self, Self::Conflict(_))
    }

    pub fn is_storage_unavailable(&self) -> bool {
        matches!(self, Self::StorageUnavailable(_))
    }

    /// 转换为 HTTP 状态码
    pub fn status_code(&self) -> u16 {
        match self {
            Self::NotFound(_) => 404,
            Self::Validation(_) => 400,
            Self::Unauthorized(_) => 401,
            Self::Conflict(_) => 409,
            Self::ConflictRetryExhausted(_) => 409,
            Self::StorageUnavailable(_) => 503,
            Self::Internal(_) => 500,
        }
    }

    /// 转换为 Problem Details
    pub fn to_problem_details(&self) -> ProblemDetails {
        ProblemDetails {
            r#type: format!("{}/{}", PROBLEM_BASE, self.problem_slug()),
            title: self.problem_title().to_string(),
            status: self.status_code(),
            detail: self.to_string(),
            instance: None,
        }
    }

    fn problem_slug(&self) -> &'static str {
        match self {
            Self::NotFound(_) => "not-found",
            Self::Validation(_) => "validation",
            Self::Unauthorized(_) => "unauthorized",
            Self::Conflict(_) => "conflict",
            Self::ConflictRetryExhausted(_) => "conflict-retry-exhausted",
            Self::StorageUnavailable(_) => "storage-unavailable",
            Self::Internal(_) => "internal",
        }
    }

    fn problem_title(&self) -> &'static str {
        match self {
            Self::NotFound(_) => "Resource Not Found",
            Self::Validation(_) => "Validation Error",
            Self::Unauthorized(_) => "Unauthorized",
            Self::Conflict(_) => "Conflict",
            Self::ConflictRetryExhausted(_) => "Conflict Not Resolved",
            Self::StorageUnavailable(_) => "Storage Unavailable",
            Self::Internal(_) => "Internal Server Error",
        }
    }
}

/// RFC 7807 Problem Details
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ProblemDetails {
    pub r#type: String,
    pub title: String,
    pub status: u16,
    pub detail: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub instance: Option<String>,
}

impl ProblemDetails {
    pub fn with_instance(mut self, instance: impl Into<String>) -> Self {
        self.instance = Some(instance.into());
        self
    }

    pub fn to_json(&self) -> serde_json::Value {
        serde_json::to_value(self).unwrap_or(serde_json::Value::Null)
    }
}

/// Result 类型别名
pub type AppResult<T> = Result<T, AppError>;
