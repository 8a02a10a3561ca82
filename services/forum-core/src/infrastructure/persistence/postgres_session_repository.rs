//! PostgreSQL 会话 Repository 实现

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use forum_adapter_postgres::{TransactionManager, map_sqlx_error};
use forum_common::UserId;
use forum_errors::{AppError, AppResult};
use sqlx::PgPool;

use crate::domain::repositories::SessionRepository;
use crate::domain::session::{ActiveSessionCounts, Session, SessionSubject};

pub struct PostgresSessionRepository {
    pool: PgPool,
    tx_manager: TransactionManager,
}

impl PostgresSessionRepository {
    pub fn new(pool: PgPool) -> Self {
        Self {
            tx_manager: TransactionManager::new(pool.clone()),
            pool,
        }
    }
}

#[async_trait]
impl SessionRepository for PostgresSessionRepository {
    async fn insert(&self, session: &Session) -> AppResult<()> {
        sqlx::query(
            r#"
            INSERT INTO sessions (token_hash, user_id, is_guest, created_at, last_activity_at, expires_at)
            VALUES ($1, $2, $3, $4, $5, $6)
            "#,
        )
        .bind(&session.token_hash)
        .bind(session.subject.user_id().map(|id| id.0))
        .bind(matches!(session.subject, SessionSubject::Guest))
        .bind(session.created_at)
        .bind(session.last_activity_at)
        .bind(session.expires_at)
        .execute(&self.pool)
        .await
        .map_err(map_sqlx_error)?;

        Ok(())
    }

    async fn replace_for_user(&self, user_id: UserId, session: &Session) -> AppResult<u64> {
        let mut tx = self.tx_manager.begin().await?;

        // 锁住用户行，同一用户的并发登录在此串行化
        let locked: Option<(i64,)> = sqlx::query_as("SELECT id FROM users WHERE id = $1 FOR UPDATE")
            .bind(user_id.0)
            .fetch_optional(&mut *tx)
            .await
            .map_err(map_sqlx_error)?;

        if locked.is_none() {
            return Err(AppError::not_found(format!("User {} not found", user_id)));
        }

        let replaced = sqlx::query("DELETE FROM sessions WHERE user_id = $1 AND is_guest = FALSE")
            .bind(user_id.0)
            .execute(&mut *tx)
            .await
            .map_err(map_sqlx_error)?
            .rows_affected();

        sqlx::query(
            r#"
            INSERT INTO sessions (token_hash, user_id, is_guest, created_at, last_activity_at, expires_at)
            VALUES ($1, $2, FALSE, $3, $4, $5)
            "#,
        )
        .bind(&session.token_hash)
        .bind(user_id.0)
        .bind(session.created_at)
        .bind(session.last_activity_at)
        .bind(session.expires_at)
        .execute(&mut *tx)
        .await
        .map_err(map_sqlx_error)?;

        TransactionManager::commit(tx).await?;
        Ok(replaced)
    }

    async fn find_by_token_hash(&self, token_hash: &str) -> AppResult<Option<Session>> {
        let row = sqlx::query_as::<_, SessionRow>(
            r#"
            SELECT token_hash, user_id, is_guest, created_at, last_activity_at, expires_at
            FROM sessions
            WHERE token_hash = $1
            "#,
        )
        .bind(token_hash)
        .fetch_optional(&self.pool)
        .await
        .map_err(map_sqlx_error)?;

        row.map(SessionRow::into_session).transpose()
    }

    async fn touch(&self, token_hash: &str, at: DateTime<Utc>) -> AppResult<bool> {
        let result = sqlx::query(
            "UPDATE sessions SET last_activity_at = GREATEST(last_activity_at, $2) WHERE token_hash = $1",
        )
        .bind(token_hash)
        .bind(at)
        .execute(&self.pool)
        .await
        .map_err(map_sqlx_error)?;

        Ok(result.rows_affected() > 0)
    }

    async fn delete_by_token_hash(&self, token_hash: &str) -> AppResult<bool> {
        let result = sqlx::query("DELETE FROM sessions WHERE token_hash = $1")
            .bind(token_hash)
            .execute(&self.pool)
            .await
            .map_err(map_sqlx_error)?;

        Ok(result.rows_affected() > 0)
    }

    async fn delete_expired(&self, now: DateTime<Utc>) -> AppResult<u64> {
        let result = sqlx::query("DELETE FROM sessions WHERE expires_at < $1")
            .bind(now)
            .execute(&self.pool)
            .await
            .map_err(map_sqlx_error)?;

        Ok(result.rows_affected())
    }

    async fn count_active_since(
        &self,
        since: DateTime<Utc>,
        now: DateTime<Utc>,
    ) -> AppResult<ActiveSessionCounts> {
        let (authenticated, guest): (i64, i64) = sqlx::query_as(
            r#"
            SELECT COUNT(*) FILTER (WHERE is_guest = FALSE),
                   COUNT(*) FILTER (WHERE is_guest = TRUE)
            FROM sessions
            WHERE last_activity_at >= $1 AND expires_at > $2
            "#,
        )
        .bind(since)
        .bind(now)
        .fetch_one(&self.pool)
        .await
        .map_err(map_sqlx_error)?;

        Ok(ActiveSessionCounts {
            authenticated: authenticated.max(0) as u64,
            guest: guest.max(0) as u64,
        })
    }
}

#[derive(sqlx::FromRow)]
struct SessionRow {
    token_hash: String,
    user_id: Option<i64>,
    is_guest: bool,
    created_at: DateTime<Utc>,
    last_activity_at: DateTime<Utc>,
    expires_at: DateTime<Utc>,
}

impl SessionRow {
    fn into_session(self) -> AppResult<Session> {
        let subject = match (self.is_guest, self.user_id) {
            (true, None) => SessionSubject::Guest,
            (false, Some(id)) => SessionSubject::Authenticated(UserId(id)),
            _ => {
                return Err(AppError::internal(format!(
                    "Inconsistent session row (is_guest = {}, user_id = {:?})",
                    self.is_guest, self.user_id
                )));
            }
        };

        Ok(Session {
            token_hash: self.token_hash,
            subject,
            created_at: self.created_at,
            last_activity_at: self.last_activity_at,
            expires_at: self.expires_at,
        })
    }
}
