//! 点赞/点踩 Repository trait

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use forum_common::{TargetId, UserId};
use forum_errors::AppResult;

use crate::domain::reaction::{
    Polarity, ReactionCounts, ReactionKey, ReactionTarget, TargetKind, ToggleOutcome,
};

#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait ReactionRepository: Send + Sync {
    /// 对同一个键串行执行 读取-决策-写入，并返回与本次写入一致的计数
    ///
    /// 并发插入撞上唯一约束时返回 `AppError::Conflict`，调用方负责重试。
    async fn toggle(
        &self,
        key: ReactionKey,
        requested: Polarity,
        at: DateTime<Utc>,
    ) -> AppResult<ToggleOutcome>;

    async fn current(&self, key: ReactionKey) -> AppResult<Option<Polarity>>;

    async fn counts(&self, target: ReactionTarget) -> AppResult<ReactionCounts>;

    /// 删除目标的所有投票
    async fn delete_all_for(&self, target: ReactionTarget) -> AppResult<u64>;

    /// actor 点赞过的目标
    async fn liked_targets_by(&self, actor: UserId, kind: TargetKind) -> AppResult<Vec<TargetId>>;
}
