//! 点赞/点踩引擎

use std::sync::Arc;

use forum_common::{Clock, TargetId, UserId, with_conditional_retry};
use forum_errors::{AppError, AppResult};
use metrics::counter;
use tracing::{debug, instrument};

use crate::config::ReactionPolicy;
use crate::domain::reaction::{
    Polarity, ReactionCounts, ReactionKey, ReactionRequest, ReactionState, ReactionTarget,
    TargetKind, ToggleOutcome,
};
use crate::domain::repositories::ReactionRepository;

pub struct ReactionEngine {
    reactions: Arc<dyn ReactionRepository>,
    clock: Arc<dyn Clock>,
    policy: ReactionPolicy,
}

impl ReactionEngine {
    pub fn new(
        reactions: Arc<dyn ReactionRepository>,
        clock: Arc<dyn Clock>,
        policy: ReactionPolicy,
    ) -> Self {
        Self {
            reactions,
            clock,
            policy,
        }
    }

    /// 切换投票并返回最新计数
    ///
    /// 唯一约束冲突在有界次数内重试，仍未解决时返回 `ConflictRetryExhausted`。
    #[instrument(skip_all, fields(actor = %actor, target = %target, polarity = %polarity))]
    pub async fn toggle(
        &self,
        actor: UserId,
        target: ReactionTarget,
        polarity: Polarity,
    ) -> AppResult<ToggleOutcome> {
        let key = ReactionKey::new(actor, target);
        let retry = self.policy.retry_config();

        let result = with_conditional_retry(
            &retry,
            "reaction toggle",
            || {
                let reactions = Arc::clone(&self.reactions);
                let at = self.clock.now();
                async move {
                    let outcome = reactions.toggle(key, polarity, at).await;
                    if matches!(outcome, Err(AppError::Conflict(_))) {
                        counter!("forum_reaction_conflicts_total").increment(1);
                    }
                    outcome
                }
            },
            AppError::is_conflict,
        )
        .await;

        match result {
            Ok(outcome) => {
                counter!(
                    "forum_reaction_toggles_total",
                    "target_kind" => target.kind.as_str(),
                    "outcome" => outcome.operation.label()
                )
                .increment(1);
                debug!(
                    state = ?outcome.state,
                    likes = outcome.counts.likes,
                    dislikes = outcome.counts.dislikes,
                    "Reaction toggled"
                );
                Ok(outcome)
            }
            Err(AppError::Conflict(reason)) => Err(AppError::conflict_retry_exhausted(format!(
                "Reaction on {} did not settle after {} attempts: {}",
                target, retry.max_attempts, reason
            ))),
            Err(e) => Err(e),
        }
    }

    /// 从原始表单输入切换；非法输入在访问存储前拒绝
    pub async fn toggle_request(
        &self,
        actor: UserId,
        target_id: i64,
        target_kind: Option<&str>,
        polarity: Option<&str>,
    ) -> AppResult<ToggleOutcome> {
        let request = ReactionRequest::parse(target_id, target_kind, polarity)?;
        self.toggle(actor, request.target, request.polarity).await
    }

    /// 聚合计数，无副作用
    pub async fn counts(&self, target: ReactionTarget) -> AppResult<ReactionCounts> {
        self.reactions.counts(target).await
    }

    /// actor 对目标的当前状态
    pub async fn state_of(&self, actor: UserId, target: ReactionTarget) -> AppResult<ReactionState> {
        let current = self.reactions.current(ReactionKey::new(actor, target)).await?;
        Ok(ReactionState::from(current))
    }

    /// actor 点赞过的目标
    pub async fn liked_targets(&self, actor: UserId, kind: TargetKind) -> AppResult<Vec<TargetId>> {
        self.reactions.liked_targets_by(actor, kind).await
    }

    /// 目标被删除时清理所有投票
    pub async fn delete_all_for(&self, target: ReactionTarget) -> AppResult<u64> {
        let removed = self.reactions.delete_all_for(target).await?;
        debug!(target = %target, removed, "Reactions deleted for target");
        Ok(removed)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::reaction::RowOperation;
    use crate::domain::repositories::MockReactionRepository;
    use forum_common::ManualClock;
    use std::time::Duration;

    fn engine(repo: MockReactionRepository, max_attempts: u32) -> ReactionEngine {
        ReactionEngine::new(
            Arc::new(repo),
            Arc::new(ManualClock::starting_now()),
            ReactionPolicy {
                max_attempts,
                initial_delay: Duration::from_millis(1),
            },
        )
    }

    fn liked_outcome() -> ToggleOutcome {
        ToggleOutcome {
            state: ReactionState::Liked,
            operation: RowOperation::Insert(Polarity::Like),
            counts: ReactionCounts::new(1, 0),
        }
    }

    #[tokio::test]
    async fn test_conflict_is_retried_then_succeeds() {
        let mut repo = MockReactionRepository::new();
        let mut calls = 0;
        repo.expect_toggle().times(3).returning(move |_, _, _| {
            calls += 1;
            if calls < 3 {
                Err(AppError::conflict("reactions_key"))
            } else {
                Ok(liked_outcome())
            }
        });

        let outcome = engine(repo, 5)
            .toggle(UserId(3), ReactionTarget::post(9), Polarity::Like)
            .await
            .unwrap();

        assert_eq!(outcome.counts, ReactionCounts::new(1, 0));
    }

    #[tokio::test]
    async fn test_conflict_exhaustion_is_reported() {
        let mut repo = MockReactionRepository::new();
        repo.expect_toggle()
            .times(2)
            .returning(|_, _, _| Err(AppError::conflict("reactions_key")));

        let result = engine(repo, 2)
            .toggle(UserId(3), ReactionTarget::post(9), Polarity::Like)
            .await;

        assert!(matches!(result, Err(AppError::ConflictRetryExhausted(_))));
    }

    #[tokio::test]
    async fn test_storage_failure_is_not_retried() {
        let mut repo = MockReactionRepository::new();
        repo.expect_toggle()
            .times(1)
            .returning(|_, _, _| Err(AppError::storage_unavailable("timeout")));

        let result = engine(repo, 5)
            .toggle(UserId(3), ReactionTarget::comment(4), Polarity::Dislike)
            .await;

        assert!(matches!(result, Err(AppError::StorageUnavailable(_))));
    }

    #[tokio::test]
    async fn test_invalid_request_never_reaches_storage() {
        let mut repo = MockReactionRepository::new();
        repo.expect_toggle().never();

        let engine = engine(repo, 5);
        let missing_kind = engine.toggle_request(UserId(3), 9, None, Some("like")).await;
        let bad_polarity = engine
            .toggle_request(UserId(3), 9, Some("post"), Some("maybe"))
            .await;

        assert!(matches!(missing_kind, Err(AppError::Validation(_))));
        assert!(matches!(bad_polarity, Err(AppError::Validation(_))));
    }
}
