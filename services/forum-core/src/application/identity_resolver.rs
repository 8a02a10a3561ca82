//! 联合身份解析
//!
//! 把外部提供方验证过的 (email, 显示名) 映射到本地用户，首次出现时创建。

use std::sync::Arc;

use forum_common::Clock;
use forum_errors::{AppError, AppResult};
use metrics::counter;
use tracing::{debug, info, instrument};
use uuid::Uuid;

use crate::config::IdentityPolicy;
use crate::domain::repositories::UserRepository;
use crate::domain::user::{NewUser, User};
use crate::domain::value_objects::{Email, IdentityProvider, Username, is_username_char};

/// 基础用户名（不含前缀）的最大字符数，为后缀留出空间
const BASE_MAX_CHARS: usize = 40;
const RANDOM_SUFFIX_LEN: usize = 8;

pub struct IdentityResolver {
    users: Arc<dyn UserRepository>,
    clock: Arc<dyn Clock>,
    policy: IdentityPolicy,
}

impl IdentityResolver {
    pub fn new(users: Arc<dyn UserRepository>, clock: Arc<dyn Clock>, policy: IdentityPolicy) -> Self {
        Self {
            users,
            clock,
            policy,
        }
    }

    /// 按邮箱查找用户，不存在时以空密码创建
    ///
    /// 两个并发登录同时创建同一邮箱时，失败的一方重新读取并返回胜出者的记录。
    #[instrument(skip_all, fields(provider = %provider))]
    pub async fn resolve_or_create(
        &self,
        email: &str,
        display_name: &str,
        provider: IdentityProvider,
    ) -> AppResult<User> {
        let email = Email::new(email)?;
        let base = base_username(provider, display_name, &email);
        let max_attempts = self.policy.max_insert_attempts.max(1);

        for attempt in 1..=max_attempts {
            if let Some(user) = self.users.find_by_email(&email).await? {
                return Ok(user);
            }

            // 最后一次尝试直接使用随机后缀
            let username = if attempt == max_attempts {
                random_username(&base)?
            } else {
                self.available_username(&base).await?
            };

            let new_user = NewUser::federated(username, email.clone(), self.clock.now());
            match self.users.insert(&new_user).await {
                Ok(user) => {
                    counter!("forum_users_federated_created_total", "provider" => provider.as_str())
                        .increment(1);
                    info!(user_id = %user.id, username = %user.username, "Federated user created");
                    return Ok(user);
                }
                Err(AppError::Conflict(reason)) => {
                    debug!(attempt, reason = %reason, "Federated user insert collided, re-resolving");
                }
                Err(e) => return Err(e),
            }
        }

        // 最后一次冲突可能来自邮箱竞争，再读一次
        if let Some(user) = self.users.find_by_email(&email).await? {
            return Ok(user);
        }

        Err(AppError::conflict_retry_exhausted(format!(
            "Could not create a user for {} after {} attempts",
            email, max_attempts
        )))
    }

    /// 基础名可用则直接使用，否则依次尝试 base2, base3, ...，最后退回随机后缀
    async fn available_username(&self, base: &str) -> AppResult<Username> {
        let candidate = Username::new(base)?;
        if !self.users.exists_by_username(&candidate).await? {
            return Ok(candidate);
        }

        for n in 2..=self.policy.max_username_suffix {
            let candidate = Username::new(format!("{}{}", base, n))?;
            if !self.users.exists_by_username(&candidate).await? {
                return Ok(candidate);
            }
        }

        random_username(base)
    }
}

/// 由提供方和外部资料确定性地生成基础用户名
///
/// - GitHub: `GIT_` + 登录名（为空时用邮箱本地部分）
/// - Google: `GO_` + 邮箱本地部分第一个 `.` 之前的片段
pub fn base_username(provider: IdentityProvider, display_name: &str, email: &Email) -> String {
    let raw = match provider {
        IdentityProvider::Github if !display_name.trim().is_empty() => display_name.trim(),
        IdentityProvider::Github => email.local_part(),
        IdentityProvider::Google => email.local_part().split('.').next().unwrap_or_default(),
    };

    let cleaned: String = raw
        .chars()
        .filter(|c| is_username_char(*c))
        .take(BASE_MAX_CHARS)
        .collect();
    let cleaned = if cleaned.is_empty() { "user".to_string() } else { cleaned };

    format!("{}{}", provider.username_prefix(), cleaned)
}

fn random_username(base: &str) -> AppResult<Username> {
    let suffix = Uuid::new_v4().simple().to_string();
    Ok(Username::new(format!(
        "{}_{}",
        base,
        &suffix[..RANDOM_SUFFIX_LEN]
    ))?)
}
