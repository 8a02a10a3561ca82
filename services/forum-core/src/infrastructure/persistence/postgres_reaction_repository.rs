//! PostgreSQL 投票 Repository 实现
//!
//! 一次切换在单个事务内完成：锁定当前行、按状态机写入、读取同一事务内的计数。

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use forum_adapter_postgres::{TransactionManager, map_sqlx_error};
use forum_common::{TargetId, UserId};
use forum_errors::{AppError, AppResult};
use sqlx::{PgConnection, PgPool};
use tracing::debug;

use crate::domain::reaction::{
    Polarity, ReactionCounts, ReactionKey, ReactionState, ReactionTarget, RowOperation, TargetKind,
    ToggleOutcome,
};
use crate::domain::repositories::ReactionRepository;

pub struct PostgresReactionRepository {
    pool: PgPool,
    tx_manager: TransactionManager,
}

impl PostgresReactionRepository {
    pub fn new(pool: PgPool) -> Self {
        Self {
            tx_manager: TransactionManager::new(pool.clone()),
            pool,
        }
    }
}

#[async_trait]
impl ReactionRepository for PostgresReactionRepository {
    async fn toggle(
        &self,
        key: ReactionKey,
        requested: Polarity,
        at: DateTime<Utc>,
    ) -> AppResult<ToggleOutcome> {
        let mut tx = self.tx_manager.begin().await?;

        let current = select_polarity(&mut tx, key, true).await?;
        let (state, operation) = ReactionState::from(current).apply(requested);

        match operation {
            RowOperation::Insert(polarity) => {
                // 两个事务同时看到"无"时，后提交的一方在这里得到 23505 → Conflict
                sqlx::query(
                    r#"
                    INSERT INTO reactions (actor_id, target_id, target_kind, polarity, created_at, updated_at)
                    VALUES ($1, $2, $3, $4, $5, $5)
                    "#,
                )
                .bind(key.actor.0)
                .bind(key.target.id.0)
                .bind(key.target.kind.as_str())
                .bind(polarity.as_str())
                .bind(at)
                .execute(&mut *tx)
                .await
                .map_err(map_sqlx_error)?;
            }
            RowOperation::Update(polarity) => {
                sqlx::query(
                    r#"
                    UPDATE reactions SET polarity = $4, updated_at = $5
                    WHERE actor_id = $1 AND target_id = $2 AND target_kind = $3
                    "#,
                )
                .bind(key.actor.0)
                .bind(key.target.id.0)
                .bind(key.target.kind.as_str())
                .bind(polarity.as_str())
                .bind(at)
                .execute(&mut *tx)
                .await
                .map_err(map_sqlx_error)?;
            }
            RowOperation::Delete => {
                sqlx::query(
                    "DELETE FROM reactions WHERE actor_id = $1 AND target_id = $2 AND target_kind = $3",
                )
                .bind(key.actor.0)
                .bind(key.target.id.0)
                .bind(key.target.kind.as_str())
                .execute(&mut *tx)
                .await
                .map_err(map_sqlx_error)?;
            }
        }

        let counts = count_for(&mut tx, key.target).await?;
        TransactionManager::commit(tx).await?;

        debug!(operation = operation.label(), "Reaction row written");
        Ok(ToggleOutcome {
            state,
            operation,
            counts,
        })
    }

    async fn current(&self, key: ReactionKey) -> AppResult<Option<Polarity>> {
        let mut conn = self.pool.acquire().await.map_err(map_sqlx_error)?;
        select_polarity(&mut conn, key, false).await
    }

    async fn counts(&self, target: ReactionTarget) -> AppResult<ReactionCounts> {
        let mut conn = self.pool.acquire().await.map_err(map_sqlx_error)?;
        count_for(&mut conn, target).await
    }

    async fn delete_all_for(&self, target: ReactionTarget) -> AppResult<u64> {
        let mut tx = self.tx_manager.begin().await?;
        let removed = delete_reactions_in_tx(&mut tx, target).await?;
        TransactionManager::commit(tx).await?;
        Ok(removed)
    }

    async fn liked_targets_by(&self, actor: UserId, kind: TargetKind) -> AppResult<Vec<TargetId>> {
        let rows: Vec<(i64,)> = sqlx::query_as(
            r#"
            SELECT target_id FROM reactions
            WHERE actor_id = $1 AND target_kind = $2 AND polarity = 'like'
            ORDER BY updated_at DESC, target_id DESC
            "#,
        )
        .bind(actor.0)
        .bind(kind.as_str())
        .fetch_all(&self.pool)
        .await
        .map_err(map_sqlx_error)?;

        Ok(rows.into_iter().map(|(id,)| TargetId(id)).collect())
    }
}

/// 在调用方的事务内删除某目标的全部投票
///
/// 删除帖子或评论时与目标本身的删除放在同一事务里。
pub async fn delete_reactions_in_tx(
    conn: &mut PgConnection,
    target: ReactionTarget,
) -> AppResult<u64> {
    let result = sqlx::query("DELETE FROM reactions WHERE target_id = $1 AND target_kind = $2")
        .bind(target.id.0)
        .bind(target.kind.as_str())
        .execute(&mut *conn)
        .await
        .map_err(map_sqlx_error)?;

    Ok(result.rows_affected())
}

async fn select_polarity(
    conn: &mut PgConnection,
    key: ReactionKey,
    for_update: bool,
) -> AppResult<Option<Polarity>> {
    let sql = if for_update {
        "SELECT polarity FROM reactions WHERE actor_id = $1 AND target_id = $2 AND target_kind = $3 FOR UPDATE"
    } else {
        "SELECT polarity FROM reactions WHERE actor_id = $1 AND target_id = $2 AND target_kind = $3"
    };

    let row: Option<(String,)> = sqlx::query_as(sql)
        .bind(key.actor.0)
        .bind(key.target.id.0)
        .bind(key.target.kind.as_str())
        .fetch_optional(&mut *conn)
        .await
        .map_err(map_sqlx_error)?;

    row.map(|(polarity,)| {
        polarity
            .parse::<Polarity>()
            .map_err(|e| AppError::internal(format!("Invalid polarity in database: {}", e)))
    })
    .transpose()
}

async fn count_for(conn: &mut PgConnection, target: ReactionTarget) -> AppResult<ReactionCounts> {
    let (likes, dislikes): (i64, i64) = sqlx::query_as(
        r#"
        SELECT COUNT(*) FILTER (WHERE polarity = 'like'),
               COUNT(*) FILTER (WHERE polarity = 'dislike')
        FROM reactions
        WHERE target_id = $1 AND target_kind = $2
        "#,
    )
    .bind(target.id.0)
    .bind(target.kind.as_str())
    .fetch_one(&mut *conn)
    .await
    .map_err(map_sqlx_error)?;

    Ok(ReactionCounts::new(likes, dislikes))
}
