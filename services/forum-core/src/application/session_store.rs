//! 会话存储服务
//!
//! 游客会话与认证会话的签发、校验、活动刷新、撤销和过期清理。
//! 缺失或过期的令牌是正常的"未登录"结果，不是错误。

use std::sync::Arc;

use chrono::Duration;
use forum_common::{Clock, UserId};
use forum_errors::{AppError, AppResult};
use metrics::counter;
use tracing::{debug, info, instrument, warn};

use crate::config::SessionPolicy;
use crate::domain::repositories::{SessionRepository, UserRepository};
use crate::domain::session::{
    ActiveSessionCounts, IssuedSession, RequestIdentity, Session, SessionContext, SessionSubject,
    SessionToken, hash_prefix, hash_token,
};

pub struct SessionStore {
    sessions: Arc<dyn SessionRepository>,
    users: Arc<dyn UserRepository>,
    clock: Arc<dyn Clock>,
    policy: SessionPolicy,
}

impl SessionStore {
    pub fn new(
        sessions: Arc<dyn SessionRepository>,
        users: Arc<dyn UserRepository>,
        clock: Arc<dyn Clock>,
        policy: SessionPolicy,
    ) -> Self {
        Self {
            sessions,
            users,
            clock,
            policy,
        }
    }

    pub fn policy(&self) -> &SessionPolicy {
        &self.policy
    }

    /// 签发游客会话
    pub async fn create_guest(&self) -> AppResult<IssuedSession> {
        let token = SessionToken::generate();
        let session = Session::new(
            token.hash(),
            SessionSubject::Guest,
            self.clock.now(),
            self.policy.guest_ttl,
        );

        self.sessions.insert(&session).await?;

        counter!("forum_sessions_created_total", "kind" => "guest").increment(1);
        debug!(token = hash_prefix(&session.token_hash), "Guest session created");

        Ok(IssuedSession {
            token,
            kind: session.kind(),
            expires_at: session.expires_at,
        })
    }

    /// 签发认证会话，同时作废该用户之前的所有认证会话
    ///
    /// 游客会话不受影响。
    #[instrument(skip(self))]
    pub async fn create_authenticated(&self, user_id: UserId, ttl: Duration) -> AppResult<IssuedSession> {
        if ttl <= Duration::zero() {
            return Err(AppError::validation("Session ttl must be positive"));
        }

        let token = SessionToken::generate();
        let session = Session::new(
            token.hash(),
            SessionSubject::Authenticated(user_id),
            self.clock.now(),
            ttl,
        );

        let replaced = self.sessions.replace_for_user(user_id, &session).await?;

        counter!("forum_sessions_created_total", "kind" => "authenticated").increment(1);
        info!(
            token = hash_prefix(&session.token_hash),
            replaced,
            "Authenticated session created"
        );

        Ok(IssuedSession {
            token,
            kind: session.kind(),
            expires_at: session.expires_at,
        })
    }

    /// 使用默认 TTL 签发认证会话
    pub async fn create_authenticated_default(&self, user_id: UserId) -> AppResult<IssuedSession> {
        self.create_authenticated(user_id, self.policy.authenticated_ttl)
            .await
    }

    /// 校验令牌
    ///
    /// `Ok(None)` 表示令牌不存在、已过期，或绑定的用户已不存在。
    /// 存储故障以 `StorageUnavailable` 返回，调用方必须按游客处理。
    pub async fn validate(&self, token: &str) -> AppResult<Option<SessionContext>> {
        let token_hash = hash_token(token);
        let Some(session) = self.sessions.find_by_token_hash(&token_hash).await? else {
            return Ok(None);
        };

        if !session.is_usable_at(self.clock.now()) {
            debug!(token = hash_prefix(&token_hash), "Session expired");
            return Ok(None);
        }

        match session.subject {
            SessionSubject::Guest => Ok(Some(SessionContext::Guest)),
            SessionSubject::Authenticated(user_id) => match self.users.find_by_id(user_id).await? {
                Some(user) => Ok(Some(SessionContext::Authenticated(user))),
                None => {
                    warn!(
                        token = hash_prefix(&token_hash),
                        user_id = %user_id,
                        "Session bound to a missing user"
                    );
                    Ok(None)
                }
            },
        }
    }

    /// 刷新最后活动时间；失败只记录日志
    pub async fn touch(&self, token: &str) {
        let token_hash = hash_token(token);
        match self.sessions.touch(&token_hash, self.clock.now()).await {
            Ok(true) => {}
            Ok(false) => debug!(token = hash_prefix(&token_hash), "Touch on unknown session"),
            Err(e) => warn!(
                token = hash_prefix(&token_hash),
                error = %e,
                "Failed to refresh session activity"
            ),
        }
    }

    /// 撤销会话（幂等）
    pub async fn revoke(&self, token: &str) -> AppResult<()> {
        let token_hash = hash_token(token);
        if self.sessions.delete_by_token_hash(&token_hash).await? {
            counter!("forum_sessions_revoked_total").increment(1);
            info!(token = hash_prefix(&token_hash), "Session revoked");
        }
        Ok(())
    }

    /// 删除所有已过期会话
    pub async fn sweep(&self) -> AppResult<u64> {
        let removed = self.sessions.delete_expired(self.clock.now()).await?;
        counter!("forum_sessions_swept_total").increment(removed);
        if removed > 0 {
            info!(removed, "Expired sessions swept");
        }
        Ok(removed)
    }

    /// 最近活跃的会话数（认证, 游客）
    pub async fn active_count(&self) -> AppResult<ActiveSessionCounts> {
        let now = self.clock.now();
        self.sessions
            .count_active_since(now - self.policy.active_window, now)
            .await
    }

    /// 会话从创建到最后活动的时长
    pub async fn session_duration(&self, token: &str) -> AppResult<Option<Duration>> {
        Ok(self
            .sessions
            .find_by_token_hash(&hash_token(token))
            .await?
            .map(|session| session.duration()))
    }

    /// 对每个请求执行的鉴权流程
    ///
    /// - 没有令牌：签发游客会话
    /// - 令牌有效：刷新活动时间，返回对应身份
    /// - 令牌无效或过期：按游客处理，并要求清除令牌
    /// - 存储故障：按游客处理，不签发新会话
    pub async fn authenticate_request(&self, token: Option<&str>) -> RequestIdentity {
        let Some(token) = token.filter(|t| !t.is_empty()) else {
            return match self.create_guest().await {
                Ok(issued) => RequestIdentity {
                    context: SessionContext::Guest,
                    issued: Some(issued),
                    clear_token: false,
                },
                Err(e) => {
                    warn!(error = %e, "Failed to create guest session");
                    RequestIdentity::guest()
                }
            };
        };

        match self.validate(token).await {
            Ok(Some(context)) => {
                self.touch(token).await;
                RequestIdentity {
                    context,
                    issued: None,
                    clear_token: false,
                }
            }
            Ok(None) => RequestIdentity {
                clear_token: true,
                ..RequestIdentity::guest()
            },
            Err(e) => {
                warn!(error = %e, "Session validation failed, treating request as guest");
                RequestIdentity::guest()
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::repositories::{MockSessionRepository, MockUserRepository};
    use crate::domain::session::SessionKind;
    use forum_common::ManualClock;

    fn store(sessions: MockSessionRepository, users: MockUserRepository) -> SessionStore {
        SessionStore::new(
            Arc::new(sessions),
            Arc::new(users),
            Arc::new(ManualClock::starting_now()),
            SessionPolicy::default(),
        )
    }

    #[tokio::test]
    async fn test_validate_propagates_storage_failure() {
        let mut sessions = MockSessionRepository::new();
        sessions
            .expect_find_by_token_hash()
            .returning(|_| Err(AppError::storage_unavailable("pool timed out")));

        let store = store(sessions, MockUserRepository::new());
        let result = store.validate("token").await;

        assert!(matches!(result, Err(AppError::StorageUnavailable(_))));
    }

    #[tokio::test]
    async fn test_authenticate_request_fails_closed() {
        let mut sessions = MockSessionRepository::new();
        sessions
            .expect_find_by_token_hash()
            .returning(|_| Err(AppError::storage_unavailable("connection refused")));
        sessions.expect_touch().never();
        sessions.expect_insert().never();

        let store = store(sessions, MockUserRepository::new());
        let identity = store.authenticate_request(Some("token")).await;

        assert_eq!(identity.context, SessionContext::Guest);
        assert!(identity.issued.is_none());
        assert!(!identity.clear_token);
    }

    #[tokio::test]
    async fn test_touch_failure_is_suppressed() {
        let mut sessions = MockSessionRepository::new();
        sessions
            .expect_touch()
            .times(1)
            .returning(|_, _| Err(AppError::storage_unavailable("timeout")));

        let store = store(sessions, MockUserRepository::new());
        store.touch("token").await;
    }

    #[tokio::test]
    async fn test_authenticate_request_touches_valid_session() {
        let clock = Arc::new(ManualClock::starting_now());
        let now = clock.now();
        let stored = Session::new(
            hash_token("token"),
            SessionSubject::Guest,
            now,
            Duration::hours(1),
        );

        let mut sessions = MockSessionRepository::new();
        let expected_hash = hash_token("token");
        sessions
            .expect_find_by_token_hash()
            .withf(move |h| h == expected_hash)
            .returning(move |_| Ok(Some(stored.clone())));
        sessions
            .expect_touch()
            .times(1)
            .returning(|_, _| Err(AppError::storage_unavailable("timeout")));

        let store = SessionStore::new(
            Arc::new(sessions),
            Arc::new(MockUserRepository::new()),
            clock,
            SessionPolicy::default(),
        );
        let identity = store.authenticate_request(Some("token")).await;

        assert_eq!(identity.context.kind(), SessionKind::Guest);
        assert!(!identity.clear_token);
    }

    #[tokio::test]
    async fn test_create_authenticated_rejects_non_positive_ttl() {
        let mut sessions = MockSessionRepository::new();
        sessions.expect_replace_for_user().never();

        let store = store(sessions, MockUserRepository::new());
        let result = store.create_authenticated(UserId(7), Duration::zero()).await;

        assert!(matches!(result, Err(AppError::Validation(_))));
    }

    #[tokio::test]
    async fn test_create_guest_propagates_storage_failure() {
        let mut sessions = MockSessionRepository::new();
        sessions
            .expect_insert()
            .returning(|_| Err(AppError::storage_unavailable("down")));

        let store = store(sessions, MockUserRepository::new());
        assert!(store.create_guest().await.is_err());

        // 无令牌请求在存储故障时仍按游客处理
        let identity = store.authenticate_request(None).await;
        assert!(identity.issued.is_none());
        assert!(!identity.context.is_authenticated());
    }
}
