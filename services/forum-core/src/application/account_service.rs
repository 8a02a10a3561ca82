//! 账号服务：注册、密码登录、联合登录、登出

use std::sync::Arc;

use forum_common::Clock;
use forum_errors::{AppError, AppResult};
use tracing::{info, warn};

use super::{IdentityResolver, SessionStore};
use crate::domain::repositories::UserRepository;
use crate::domain::session::IssuedSession;
use crate::domain::user::{NewUser, User};
use crate::domain::value_objects::{Email, HashedPassword, IdentityProvider, Username};

const INVALID_CREDENTIALS: &str = "Invalid username or password";

/// 登录成功后的用户与新会话
#[derive(Debug, Clone)]
pub struct LoginResult {
    pub user: User,
    pub session: IssuedSession,
}

pub struct AccountService {
    users: Arc<dyn UserRepository>,
    sessions: Arc<SessionStore>,
    identity: Arc<IdentityResolver>,
    clock: Arc<dyn Clock>,
}

impl AccountService {
    pub fn new(
        users: Arc<dyn UserRepository>,
        sessions: Arc<SessionStore>,
        identity: Arc<IdentityResolver>,
        clock: Arc<dyn Clock>,
    ) -> Self {
        Self {
            users,
            sessions,
            identity,
            clock,
        }
    }

    /// 注册本地账号并直接登录
    pub async fn register(&self, username: &str, email: &str, password: &str) -> AppResult<LoginResult> {
        let username = Username::new(username.trim())?;
        let email = Email::new(email)?;

        if self.users.exists_by_username(&username).await? {
            return Err(AppError::conflict(format!("Username {} is already taken", username)));
        }
        if self.users.exists_by_email(&email).await? {
            return Err(AppError::conflict(format!("Email {} is already registered", email)));
        }

        let password_hash = HashedPassword::from_plain(password)?;
        let user = self
            .users
            .insert(&NewUser {
                username,
                email,
                password_hash: password_hash.into_inner(),
                created_at: self.clock.now(),
            })
            .await?;

        info!(user_id = %user.id, username = %user.username, "User registered");
        self.start_session(user).await
    }

    /// 用户名密码登录
    ///
    /// 联合登录账号没有密码，一律视为凭证错误。
    pub async fn login(&self, username: &str, password: &str) -> AppResult<LoginResult> {
        let Ok(username) = Username::new(username.trim()) else {
            return Err(AppError::unauthorized(INVALID_CREDENTIALS));
        };

        let Some(user) = self.users.find_by_username(&username).await? else {
            return Err(AppError::unauthorized(INVALID_CREDENTIALS));
        };

        if user.is_federated_only() {
            warn!(user_id = %user.id, "Password login attempted on federated-only account");
            return Err(AppError::unauthorized(INVALID_CREDENTIALS));
        }

        if !HashedPassword::from_hash(user.password_hash.clone()).verify(password)? {
            return Err(AppError::unauthorized(INVALID_CREDENTIALS));
        }

        self.start_session(user).await
    }

    /// 外部提供方回调成功后的登录
    pub async fn federated_login(
        &self,
        email: &str,
        display_name: &str,
        provider: IdentityProvider,
    ) -> AppResult<LoginResult> {
        if email.trim().is_empty() {
            return Err(AppError::validation(format!(
                "{} did not return a usable email",
                provider
            )));
        }

        let user = self
            .identity
            .resolve_or_create(email, display_name, provider)
            .await?;
        self.start_session(user).await
    }

    /// 登出
    pub async fn logout(&self, token: &str) -> AppResult<()> {
        self.sessions.revoke(token).await
    }

    async fn start_session(&self, user: User) -> AppResult<LoginResult> {
        let session = self.sessions.create_authenticated_default(user.id).await?;
        Ok(LoginResult { user, session })
    }
}
