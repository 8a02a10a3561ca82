//! PostgreSQL 事务管理模块

use forum_errors::AppResult;
use sqlx::{PgPool, Postgres, Transaction};

use crate::map_sqlx_error;

/// 事务管理器
///
/// 事务在 drop 时自动回滚，所有提前返回路径都会释放行锁。
#[derive(Clone)]
pub struct TransactionManager {
    pool: PgPool,
}

impl TransactionManager {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    /// 开始事务
    pub async fn begin(&self) -> AppResult<Transaction<'static, Postgres>> {
        self.pool.begin().await.map_err(map_sqlx_error)
    }

    /// 提交事务
    pub async fn commit(tx: Transaction<'static, Postgres>) -> AppResult<()> {
        tx.commit().await.map_err(map_sqlx_error)
    }
}
