//! PostgreSQL 用户 Repository 实现

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use forum_adapter_postgres::map_sqlx_error;
use forum_common::UserId;
use forum_errors::{AppError, AppResult};
use sqlx::PgPool;

use crate::domain::repositories::UserRepository;
use crate::domain::user::{NewUser, User};
use crate::domain::value_objects::{Email, Username};

const USER_COLUMNS: &str = "id, username, email, password_hash, created_at";

pub struct PostgresUserRepository {
    pool: PgPool,
}

impl PostgresUserRepository {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    async fn find_one(&self, column: &str, value: &str) -> AppResult<Option<User>> {
        let sql = format!("SELECT {} FROM users WHERE {} = $1", USER_COLUMNS, column);
        let row = sqlx::query_as::<_, UserRow>(&sql)
            .bind(value)
            .fetch_optional(&self.pool)
            .await
            .map_err(map_sqlx_error)?;

        row.map(UserRow::into_user).transpose()
    }
}

#[async_trait]
impl UserRepository for PostgresUserRepository {
    async fn find_by_id(&self, id: UserId) -> AppResult<Option<User>> {
        let sql = format!("SELECT {} FROM users WHERE id = $1", USER_COLUMNS);
        let row = sqlx::query_as::<_, UserRow>(&sql)
            .bind(id.0)
            .fetch_optional(&self.pool)
            .await
            .map_err(map_sqlx_error)?;

        row.map(UserRow::into_user).transpose()
    }

    async fn find_by_username(&self, username: &Username) -> AppResult<Option<User>> {
        self.find_one("username", username.as_str()).await
    }

    async fn find_by_email(&self, email: &Email) -> AppResult<Option<User>> {
        self.find_one("email", email.as_str()).await
    }

    async fn exists_by_username(&self, username: &Username) -> AppResult<bool> {
        let result: (bool,) = sqlx::query_as("SELECT EXISTS(SELECT 1 FROM users WHERE username = $1)")
            .bind(username.as_str())
            .fetch_one(&self.pool)
            .await
            .map_err(map_sqlx_error)?;

        Ok(result.0)
    }

    async fn exists_by_email(&self, email: &Email) -> AppResult<bool> {
        let result: (bool,) = sqlx::query_as("SELECT EXISTS(SELECT 1 FROM users WHERE email = $1)")
            .bind(email.as_str())
            .fetch_one(&self.pool)
            .await
            .map_err(map_sqlx_error)?;

        Ok(result.0)
    }

    async fn insert(&self, user: &NewUser) -> AppResult<User> {
        let sql = format!(
            "INSERT INTO users (username, email, password_hash, created_at) VALUES ($1, $2, $3, $4) RETURNING {}",
            USER_COLUMNS
        );
        let row = sqlx::query_as::<_, UserRow>(&sql)
            .bind(user.username.as_str())
            .bind(user.email.as_str())
            .bind(&user.password_hash)
            .bind(user.created_at)
            .fetch_one(&self.pool)
            .await
            .map_err(map_sqlx_error)?;

        row.into_user()
    }
}

#[derive(sqlx::FromRow)]
struct UserRow {
    id: i64,
    username: String,
    email: String,
    password_hash: String,
    created_at: DateTime<Utc>,
}

impl UserRow {
    fn into_user(self) -> AppResult<User> {
        let username = Username::new(self.username.clone()).map_err(|e| {
            AppError::internal(format!("Invalid username in database for user {}: {}", self.id, e))
        })?;
        let email = Email::new(&self.email).map_err(|e| {
            AppError::internal(format!("Invalid email in database for user {}: {}", self.id, e))
        })?;

        Ok(User {
            id: UserId(self.id),
            username,
            email,
            password_hash: self.password_hash,
            created_at: self.created_at,
        })
    }
}
