//! 基础设施资源管理

use std::time::Duration;

use forum_adapter_postgres::{PostgresConfig, create_pool};
use forum_common::{RetryConfig, with_retry};
use forum_config::AppConfig;
use forum_errors::AppResult;
use secrecy::ExposeSecret;
use sqlx::PgPool;
use tracing::info;

/// 基础设施资源容器
pub struct Infrastructure {
    config: AppConfig,
    postgres_pool: PgPool,
}

impl Infrastructure {
    /// 从配置创建基础设施资源（连接带重试）
    pub async fn from_config(config: AppConfig) -> AppResult<Self> {
        let retry_config = RetryConfig::new(5, Duration::from_millis(200), Duration::from_secs(5));

        let pg_config = PostgresConfig::new(config.database.url.expose_secret())
            .with_max_connections(config.database.max_connections)
            .with_acquire_timeout(Duration::from_secs(config.database.acquire_timeout_secs))
            .with_statement_timeout(Duration::from_millis(config.database.statement_timeout_ms))
            .with_lock_timeout(Duration::from_millis(config.database.lock_timeout_ms));
        let postgres_pool = with_retry(&retry_config, "PostgreSQL connection", || {
            let cfg = pg_config.clone();
            async move { create_pool(&cfg).await }
        })
        .await?;
        info!(
            max_connections = config.database.max_connections,
            acquire_timeout_secs = config.database.acquire_timeout_secs,
            statement_timeout_ms = config.database.statement_timeout_ms,
            lock_timeout_ms = config.database.lock_timeout_ms,
            "PostgreSQL connection pool created"
        );

        Ok(Self {
            config,
            postgres_pool,
        })
    }

    pub fn config(&self) -> &AppConfig {
        &self.config
    }

    pub fn postgres_pool(&self) -> PgPool {
        self.postgres_pool.clone()
    }

    /// 连接池状态（总数, 空闲数）
    pub fn postgres_pool_status(&self) -> (u32, usize) {
        (self.postgres_pool.size(), self.postgres_pool.num_idle())
    }
}
