//! 数据库错误映射工具
//!
//! 提供统一的 SQLx 错误到 AppError 的转换

use forum_errors::AppError;

/// 将 SQLx 错误转换为 AppError，区分不同错误类型
///
/// 唯一约束冲突映射为 `Conflict`，由调用方决定是否重试；
/// 连接、超时等故障一律视为存储不可用。
pub fn map_sqlx_error(e: sqlx::Error) -> AppError {
    match e {
        sqlx::Error::RowNotFound => AppError::not_found("Record not found"),
        sqlx::Error::Database(db_err) => {
            let constraint = db_err.constraint().unwrap_or("unknown").to_string();
            map_sqlstate(db_err.code().as_deref(), &constraint, &db_err.to_string())
        }
        sqlx::Error::PoolTimedOut => {
            AppError::storage_unavailable("Database connection pool timeout")
        }
        sqlx::Error::PoolClosed => {
            AppError::storage_unavailable("Database connection pool is closed")
        }
        sqlx::Error::Protocol(msg) => {
            AppError::storage_unavailable(format!("Database protocol error: {}", msg))
        }
        sqlx::Error::Io(io) => AppError::storage_unavailable(format!("Database I/O error: {}", io)),
        _ => AppError::storage_unavailable(e.to_string()),
    }
}

/// 按 SQLSTATE 分类数据库错误
fn map_sqlstate(code: Option<&str>, constraint: &str, message: &str) -> AppError {
    match code {
        // PostgreSQL 约束违规代码
        Some("23505") => AppError::conflict(format!(
            "Duplicate entry violates unique constraint {}",
            constraint
        )),
        Some("23503") => {
            AppError::validation(format!("Foreign key constraint violation: {}", constraint))
        }
        Some("23514") => AppError::validation(format!("Check constraint violation: {}", constraint)),
        Some("23502") => AppError::validation("Not null constraint violation"),
        Some("22001") => AppError::validation("String data too long"),
        Some("22P02") => AppError::validation("Invalid input syntax"),
        // statement_timeout / lock_timeout 触发
        Some("57014") => AppError::storage_unavailable(format!("Statement timed out: {}", message)),
        Some("55P03") => AppError::storage_unavailable(format!("Lock wait timed out: {}", message)),
        Some(code) => AppError::storage_unavailable(format!("Database error ({}): {}", code, message)),
        None => AppError::storage_unavailable(message.to_string()),
    }
}
