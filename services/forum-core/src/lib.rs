//! forum-core - 论坛核心：会话、联合身份解析、点赞/点踩
//!
//! 三个服务彼此独立，只通过仓库 trait 访问存储。

pub mod application;
pub mod config;
pub mod domain;
mod error;
pub mod infrastructure;

use std::sync::Arc;

use forum_common::{Clock, SystemClock};
use forum_config::AppConfig;
use sqlx::PgPool;

use application::{AccountService, IdentityResolver, ReactionEngine, SessionStore};
use config::Policies;
use domain::repositories::{ReactionRepository, SessionRepository, UserRepository};
use infrastructure::persistence::{
    MemoryReactionRepository, MemorySessionRepository, MemoryUserRepository,
    PostgresReactionRepository, PostgresSessionRepository, PostgresUserRepository,
};

/// 组装好的服务集合
#[derive(Clone)]
pub struct ForumCore {
    pub sessions: Arc<SessionStore>,
    pub identity: Arc<IdentityResolver>,
    pub reactions: Arc<ReactionEngine>,
    pub accounts: Arc<AccountService>,
}

impl ForumCore {
    pub fn new(
        users: Arc<dyn UserRepository>,
        sessions: Arc<dyn SessionRepository>,
        reactions: Arc<dyn ReactionRepository>,
        clock: Arc<dyn Clock>,
        policies: Policies,
    ) -> Self {
        let session_store = Arc::new(SessionStore::new(
            sessions,
            users.clone(),
            clock.clone(),
            policies.session,
        ));
        let identity = Arc::new(IdentityResolver::new(
            users.clone(),
            clock.clone(),
            policies.identity,
        ));
        let reaction_engine = Arc::new(ReactionEngine::new(reactions, clock.clone(), policies.reaction));
        let accounts = Arc::new(AccountService::new(
            users,
            session_store.clone(),
            identity.clone(),
            clock,
        ));

        Self {
            sessions: session_store,
            identity,
            reactions: reaction_engine,
            accounts,
        }
    }

    /// PostgreSQL 存储
    pub fn postgres(pool: PgPool, config: &AppConfig) -> Self {
        Self::new(
            Arc::new(PostgresUserRepository::new(pool.clone())),
            Arc::new(PostgresSessionRepository::new(pool.clone())),
            Arc::new(PostgresReactionRepository::new(pool)),
            Arc::new(SystemClock),
            Policies::from(config),
        )
    }

    /// 内存存储
    pub fn in_memory(clock: Arc<dyn Clock>, policies: Policies) -> Self {
        let users = Arc::new(MemoryUserRepository::new());
        Self::new(
            users.clone(),
            Arc::new(MemorySessionRepository::new(users)),
            Arc::new(MemoryReactionRepository::new()),
            clock,
            policies,
        )
    }
}
