//! 内存 Repository 实现，用于测试和本地开发
//!
//! 每个仓库用一把 `tokio::sync::Mutex` 保护全部状态，单次操作天然原子。

use std::collections::HashMap;
use std::sync::Arc;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use forum_common::{TargetId, UserId};
use forum_errors::{AppError, AppResult};
use tokio::sync::Mutex;

use crate::domain::reaction::{
    Polarity, ReactionCounts, ReactionKey, ReactionState, ReactionTarget, RowOperation, TargetKind,
    ToggleOutcome,
};
use crate::domain::repositories::{ReactionRepository, SessionRepository, UserRepository};
use crate::domain::session::{ActiveSessionCounts, Session, SessionSubject};
use crate::domain::user::{NewUser, User};
use crate::domain::value_objects::{Email, Username};

/// 内存会话仓库
///
/// 认证会话的 user_id 必须存在于关联的用户仓库中，与 Postgres 外键一致。
pub struct MemorySessionRepository {
    sessions: Mutex<HashMap<String, Session>>,
    users: Arc<MemoryUserRepository>,
}

impl MemorySessionRepository {
    pub fn new(users: Arc<MemoryUserRepository>) -> Self {
        Self {
            sessions: Mutex::new(HashMap::new()),
            users,
        }
    }

    /// 持有会话锁时调用；用户仓库从不反向获取会话锁
    async fn ensure_subject_exists(&self, subject: &SessionSubject) -> AppResult<()> {
        if let SessionSubject::Authenticated(user_id) = subject {
            if !self.users.contains(*user_id).await {
                return Err(AppError::validation(
                    "Foreign key constraint violation: sessions_user_id_fkey",
                ));
            }
        }
        Ok(())
    }

    pub async fn len(&self) -> usize {
        self.sessions.lock().await.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.sessions.lock().await.is_empty()
    }
}

#[async_trait]
impl SessionRepository for MemorySessionRepository {
    async fn insert(&self, session: &Session) -> AppResult<()> {
        let mut sessions = self.sessions.lock().await;
        if sessions.contains_key(&session.token_hash) {
            return Err(AppError::conflict("sessions_pkey"));
        }
        self.ensure_subject_exists(&session.subject).await?;
        sessions.insert(session.token_hash.clone(), session.clone());
        Ok(())
    }

    async fn replace_for_user(&self, user_id: UserId, session: &Session) -> AppResult<u64> {
        let mut sessions = self.sessions.lock().await;
        if !self.users.contains(user_id).await {
            return Err(AppError::not_found(format!("User {} not found", user_id)));
        }
        let before = sessions.len();
        sessions.retain(|_, s| s.subject != SessionSubject::Authenticated(user_id));
        let replaced = (before - sessions.len()) as u64;
        sessions.insert(session.token_hash.clone(), session.clone());
        Ok(replaced)
    }

    async fn find_by_token_hash(&self, token_hash: &str) -> AppResult<Option<Session>> {
        Ok(self.sessions.lock().await.get(token_hash).cloned())
    }

    async fn touch(&self, token_hash: &str, at: DateTime<Utc>) -> AppResult<bool> {
        let mut sessions = self.sessions.lock().await;
        match sessions.get_mut(token_hash) {
            Some(session) => {
                session.last_activity_at = session.last_activity_at.max(at);
                Ok(true)
            }
            None => Ok(false),
        }
    }

    async fn delete_by_token_hash(&self, token_hash: &str) -> AppResult<bool> {
        Ok(self.sessions.lock().await.remove(token_hash).is_some())
    }

    async fn delete_expired(&self, now: DateTime<Utc>) -> AppResult<u64> {
        let mut sessions = self.sessions.lock().await;
        let before = sessions.len();
        sessions.retain(|_, s| s.expires_at >= now);
        Ok((before - sessions.len()) as u64)
    }

    async fn count_active_since(
        &self,
        since: DateTime<Utc>,
        now: DateTime<Utc>,
    ) -> AppResult<ActiveSessionCounts> {
        let sessions = self.sessions.lock().await;
        let mut counts = ActiveSessionCounts::default();
        for session in sessions
            .values()
            .filter(|s| s.last_activity_at >= since && s.is_usable_at(now))
        {
            match session.subject {
                SessionSubject::Guest => counts.guest += 1,
                SessionSubject::Authenticated(_) => counts.authenticated += 1,
            }
        }
        Ok(counts)
    }
}

/// 内存用户仓库；用户名和邮箱唯一
#[derive(Default)]
pub struct MemoryUserRepository {
    state: Mutex<UserTable>,
}

#[derive(Default)]
struct UserTable {
    next_id: i64,
    users: Vec<User>,
}

impl MemoryUserRepository {
    pub fn new() -> Self {
        Self::default()
    }

    pub async fn len(&self) -> usize {
        self.state.lock().await.users.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.state.lock().await.users.is_empty()
    }

    pub async fn contains(&self, id: UserId) -> bool {
        self.state.lock().await.users.iter().any(|u| u.id == id)
    }

    /// 删除用户；不级联删除会话
    pub async fn remove(&self, id: UserId) -> bool {
        let mut state = self.state.lock().await;
        let before = state.users.len();
        state.users.retain(|u| u.id != id);
        state.users.len() < before
    }

    async fn find_by<F>(&self, predicate: F) -> Option<User>
    where
        F: Fn(&User) -> bool,
    {
        self.state
            .lock()
            .await
            .users
            .iter()
            .find(|u| predicate(u))
            .cloned()
    }
}

#[async_trait]
impl UserRepository for MemoryUserRepository {
    async fn find_by_id(&self, id: UserId) -> AppResult<Option<User>> {
        Ok(self.find_by(|u| u.id == id).await)
    }

    async fn find_by_username(&self, username: &Username) -> AppResult<Option<User>> {
        Ok(self.find_by(|u| &u.username == username).await)
    }

    async fn find_by_email(&self, email: &Email) -> AppResult<Option<User>> {
        Ok(self.find_by(|u| &u.email == email).await)
    }

    async fn exists_by_username(&self, username: &Username) -> AppResult<bool> {
        Ok(self.find_by_username(username).await?.is_some())
    }

    async fn exists_by_email(&self, email: &Email) -> AppResult<bool> {
        Ok(self.find_by_email(email).await?.is_some())
    }

    async fn insert(&self, user: &NewUser) -> AppResult<User> {
        let mut state = self.state.lock().await;
        if state.users.iter().any(|u| u.username == user.username) {
            return Err(AppError::conflict("users_username_key"));
        }
        if state.users.iter().any(|u| u.email == user.email) {
            return Err(AppError::conflict("users_email_key"));
        }

        state.next_id += 1;
        let created = User {
            id: UserId(state.next_id),
            username: user.username.clone(),
            email: user.email.clone(),
            password_hash: user.password_hash.clone(),
            created_at: user.created_at,
        };
        state.users.push(created.clone());
        Ok(created)
    }
}

/// 内存投票仓库
#[derive(Default)]
pub struct MemoryReactionRepository {
    rows: Mutex<HashMap<ReactionKey, ReactionRow>>,
}

#[derive(Debug, Clone, Copy)]
struct ReactionRow {
    polarity: Polarity,
    updated_at: DateTime<Utc>,
}

impl MemoryReactionRepository {
    pub fn new() -> Self {
        Self::default()
    }

    /// 某目标的行数
    pub async fn rows_for(&self, target: ReactionTarget) -> usize {
        self.rows
            .lock()
            .await
            .keys()
            .filter(|k| k.target == target)
            .count()
    }
}

fn count_rows(rows: &HashMap<ReactionKey, ReactionRow>, target: ReactionTarget) -> ReactionCounts {
    rows.iter()
        .filter(|(k, _)| k.target == target)
        .fold(ReactionCounts::default(), |mut counts, (_, row)| {
            match row.polarity {
                Polarity::Like => counts.likes += 1,
                Polarity::Dislike => counts.dislikes += 1,
            }
            counts
        })
}

#[async_trait]
impl ReactionRepository for MemoryReactionRepository {
    async fn toggle(
        &self,
        key: ReactionKey,
        requested: Polarity,
        at: DateTime<Utc>,
    ) -> AppResult<ToggleOutcome> {
        let mut rows = self.rows.lock().await;
        let current = rows.get(&key).map(|row| row.polarity);
        let (state, operation) = ReactionState::from(current).apply(requested);

        match operation {
            RowOperation::Insert(polarity) | RowOperation::Update(polarity) => {
                rows.insert(
                    key,
                    ReactionRow {
                        polarity,
                        updated_at: at,
                    },
                );
            }
            RowOperation::Delete => {
                rows.remove(&key);
            }
        }

        Ok(ToggleOutcome {
            state,
            operation,
            counts: count_rows(&rows, key.target),
        })
    }

    async fn current(&self, key: ReactionKey) -> AppResult<Option<Polarity>> {
        Ok(self.rows.lock().await.get(&key).map(|row| row.polarity))
    }

    async fn counts(&self, target: ReactionTarget) -> AppResult<ReactionCounts> {
        Ok(count_rows(&*self.rows.lock().await, target))
    }

    async fn delete_all_for(&self, target: ReactionTarget) -> AppResult<u64> {
        let mut rows = self.rows.lock().await;
        let before = rows.len();
        rows.retain(|k, _| k.target != target);
        Ok((before - rows.len()) as u64)
    }

    async fn liked_targets_by(&self, actor: UserId, kind: TargetKind) -> AppResult<Vec<TargetId>> {
        let rows = self.rows.lock().await;
        let mut liked: Vec<_> = rows
            .iter()
            .filter(|(k, row)| {
                k.actor == actor && k.target.kind == kind && row.polarity == Polarity::Like
            })
            .map(|(k, row)| (row.updated_at, k.target.id))
            .collect();
        liked.sort_by(|a, b| b.cmp(a));
        Ok(liked.into_iter().map(|(_, id)| id).collect())
    }
}
