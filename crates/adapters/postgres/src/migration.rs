//! PostgreSQL 迁移管理模块

use std::collections::HashMap;

use forum_errors::{AppError, AppResult};
use sha2::{Digest, Sha256};
use sqlx::PgPool;
use tracing::{info, warn};

use crate::map_sqlx_error;

/// 迁移记录
#[derive(Debug, Clone, sqlx::FromRow)]
pub struct MigrationRecord {
    pub version: i64,
    pub name: String,
    pub applied_at: chrono::DateTime<chrono::Utc>,
    pub checksum: String,
}

/// 迁移定义
#[derive(Debug, Clone)]
pub struct Migration {
    pub version: i64,
    pub name: String,
    /// 升级 SQL，可包含多条语句
    pub up_sql: String,
    /// SHA-256 十六进制摘要
    pub checksum: String,
}

impl Migration {
    pub fn new(version: i64, name: impl Into<String>, up_sql: impl Into<String>) -> Self {
        let up_sql = up_sql.into();
        let checksum = hex::encode(Sha256::digest(up_sql.as_bytes()));
        Self {
            version,
            name: name.into(),
            up_sql,
            checksum,
        }
    }
}

/// 迁移管理器
pub struct MigrationManager {
    pool: PgPool,
    table_name: String,
}

impl MigrationManager {
    pub fn new(pool: PgPool) -> Self {
        Self {
            pool,
            table_name: "_migrations".to_string(),
        }
    }

    pub fn with_table_name(mut self, name: impl Into<String>) -> Self {
        self.table_name = name.into();
        self
    }

    /// 初始化迁移表
    pub async fn init(&self) -> AppResult<()> {
        let create_sql = format!(
            r#"
            CREATE TABLE IF NOT EXISTS {} (
                version BIGINT PRIMARY KEY,
                name VARCHAR(255) NOT NULL,
                applied_at TIMESTAMPTZ NOT NULL DEFAULT NOW(),
                checksum VARCHAR(64) NOT NULL
            )
            "#,
            self.table_name
        );

        sqlx::query(&create_sql)
            .execute(&self.pool)
            .await
            .map_err(map_sqlx_error)?;

        Ok(())
    }

    /// 获取已应用的迁移
    pub async fn applied_migrations(&self) -> AppResult<Vec<MigrationRecord>> {
        let sql = format!(
            "SELECT version, name, applied_at, checksum FROM {} ORDER BY version ASC",
            self.table_name
        );

        sqlx::query_as::<_, MigrationRecord>(&sql)
            .fetch_all(&self.pool)
            .await
            .map_err(map_sqlx_error)
    }

    /// 在单个事务中应用一个迁移
    async fn apply(&self, migration: &Migration) -> AppResult<()> {
        let mut tx = self.pool.begin().await.map_err(map_sqlx_error)?;

        sqlx::raw_sql(&migration.up_sql)
            .execute(&mut *tx)
            .await
            .map_err(|e| {
                AppError::internal(format!(
                    "Failed to apply migration {} ({}): {}",
                    migration.version, migration.name, e
                ))
            })?;

        let insert_sql = format!(
            "INSERT INTO {} (version, name, checksum) VALUES ($1, $2, $3)",
            self.table_name
        );
        sqlx::query(&insert_sql)
            .bind(migration.version)
            .bind(&migration.name)
            .bind(&migration.checksum)
            .execute(&mut *tx)
            .await
            .map_err(map_sqlx_error)?;

        tx.commit().await.map_err(map_sqlx_error)?;

        info!(
            version = migration.version,
            name = %migration.name,
            "Migration applied successfully"
        );
        Ok(())
    }

    /// 应用所有待处理的迁移
    ///
    /// 已应用迁移的校验和不一致时直接失败，不会继续执行后续版本。
    pub async fn migrate(&self, migrations: &[Migration]) -> AppResult<MigrationResult> {
        self.init().await?;

        let applied: HashMap<i64, String> = self
            .applied_migrations()
            .await?
            .into_iter()
            .map(|r| (r.version, r.checksum))
            .collect();

        let mut sorted: Vec<_> = migrations.iter().collect();
        sorted.sort_by_key(|m| m.version);

        let mut result = MigrationResult::default();
        for migration in sorted {
            match applied.get(&migration.version) {
                Some(checksum) if *checksum != migration.checksum => {
                    warn!(
                        version = migration.version,
                        name = %migration.name,
                        "Checksum mismatch"
                    );
                    return Err(AppError::internal(format!(
                        "Migration {} ({}) has been modified after it was applied",
                        migration.version, migration.name
                    )));
                }
                Some(_) => result.skipped.push(migration.version),
                None => {
                    self.apply(migration).await?;
                    result.applied.push(migration.version);
                }
            }
        }

        Ok(result)
    }
}

/// 迁移结果
#[derive(Debug, Clone, Default)]
pub struct MigrationResult {
    pub applied: Vec<i64>,
    pub skipped: Vec<i64>,
}

impl MigrationResult {
    pub fn applied_count(&self) -> usize {
        self.applied.len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_checksum_is_sha256_hex() {
        let migration = Migration::new(1, "create_users", "CREATE TABLE users (id BIGSERIAL)");
        assert_eq!(migration.checksum.len(), 64);
        assert!(migration.checksum.chars().all(|c| c.is_ascii_hexdigit()));
    }

    #[test]
    fn test_checksum_consistency() {
        let sql = "CREATE TABLE test (id INT)";
        assert_eq!(
            Migration::new(1, "a", sql).checksum,
            Migration::new(2, "b", sql).checksum
        );
    }

    #[test]
    fn test_checksum_difference() {
        let m1 = Migration::new(1, "test", "CREATE TABLE test1 (id INT)");
        let m2 = Migration::new(1, "test", "CREATE TABLE test2 (id INT)");
        assert_ne!(m1.checksum, m2.checksum);
    }
}
