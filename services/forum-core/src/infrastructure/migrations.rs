//! 内嵌的数据库迁移

use forum_adapter_postgres::{Migration, MigrationManager, MigrationResult};
use forum_errors::AppResult;
use sqlx::PgPool;
use tracing::info;

/// 按版本排列的全部迁移
pub fn migrations() -> Vec<Migration> {
    vec![
        Migration::new(
            1,
            "create_users",
            include_str!("../../migrations/0001_create_users.sql"),
        ),
        Migration::new(
            2,
            "create_sessions",
            include_str!("../../migrations/0002_create_sessions.sql"),
        ),
        Migration::new(
            3,
            "create_reactions",
            include_str!("../../migrations/0003_create_reactions.sql"),
        ),
    ]
}

pub async fn run_migrations(pool: &PgPool) -> AppResult<MigrationResult> {
    let result = MigrationManager::new(pool.clone())
        .migrate(&migrations())
        .await?;

    info!(
        applied = result.applied_count(),
        skipped = result.skipped.len(),
        "Database migrations complete"
    );
    Ok(result)
}
