//! 会话 Repository trait

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use forum_common::UserId;
use forum_errors::AppResult;

use crate::domain::session::{ActiveSessionCounts, Session};

#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait SessionRepository: Send + Sync {
    /// 插入会话
    async fn insert(&self, session: &Session) -> AppResult<()>;

    /// 原子地删除用户所有认证会话并插入新会话，返回被替换的数量
    async fn replace_for_user(&self, user_id: UserId, session: &Session) -> AppResult<u64>;

    /// 根据令牌摘要查找会话
    async fn find_by_token_hash(&self, token_hash: &str) -> AppResult<Option<Session>>;

    /// 更新最后活动时间，返回是否命中
    async fn touch(&self, token_hash: &str, at: DateTime<Utc>) -> AppResult<bool>;

    /// 删除会话，返回是否存在
    async fn delete_by_token_hash(&self, token_hash: &str) -> AppResult<bool>;

    /// 删除 `expires_at < now` 的会话
    async fn delete_expired(&self, now: DateTime<Utc>) -> AppResult<u64>;

    /// 统计 `last_activity_at >= since` 且在 `now` 仍未过期的会话
    async fn count_active_since(
        &self,
        since: DateTime<Utc>,
        now: DateTime<Utc>,
    ) -> AppResult<ActiveSessionCounts>;
}
