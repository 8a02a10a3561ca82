//! 用户 Repository trait

use async_trait::async_trait;
use forum_common::UserId;
use forum_errors::AppResult;

use crate::domain::user::{NewUser, User};
use crate::domain::value_objects::{Email, Username};

#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait UserRepository: Send + Sync {
    async fn find_by_id(&self, id: UserId) -> AppResult<Option<User>>;

    async fn find_by_username(&self, username: &Username) -> AppResult<Option<User>>;

    async fn find_by_email(&self, email: &Email) -> AppResult<Option<User>>;

    async fn exists_by_username(&self, username: &Username) -> AppResult<bool>;

    async fn exists_by_email(&self, email: &Email) -> AppResult<bool>;

    /// 插入用户；用户名或邮箱冲突时返回 `AppError::Conflict`
    async fn insert(&self, user: &NewUser) -> AppResult<User>;
}
