//! 服务策略
//!
//! 从 `AppConfig` 的各个配置段构建，显式传入各服务。

use std::time::Duration as StdDuration;

use chrono::Duration;
use forum_common::RetryConfig;
use forum_config::{AppConfig, IdentityConfig, ReactionConfig, SessionConfig};

/// TTL 上限（十年）
const MAX_TTL_SECS: u64 = 10 * 365 * 24 * 3600;

fn secs(value: u64) -> Duration {
    Duration::seconds(value.min(MAX_TTL_SECS) as i64)
}

/// 会话策略
#[derive(Debug, Clone)]
pub struct SessionPolicy {
    pub guest_ttl: Duration,
    pub authenticated_ttl: Duration,
    /// 在线统计窗口
    pub active_window: Duration,
    pub sweep_interval: StdDuration,
}

impl Default for SessionPolicy {
    fn default() -> Self {
        Self::from(&SessionConfig::default())
    }
}

impl From<&SessionConfig> for SessionPolicy {
    fn from(config: &SessionConfig) -> Self {
        Self {
            guest_ttl: secs(config.guest_ttl_secs),
            authenticated_ttl: secs(config.authenticated_ttl_secs),
            active_window: secs(config.active_window_secs),
            sweep_interval: config.sweep_interval(),
        }
    }
}

/// 投票写冲突重试策略
#[derive(Debug, Clone)]
pub struct ReactionPolicy {
    pub max_attempts: u32,
    pub initial_delay: StdDuration,
}

impl ReactionPolicy {
    pub fn retry_config(&self) -> RetryConfig {
        RetryConfig::new(self.max_attempts, self.initial_delay, self.initial_delay * 20)
    }
}

impl Default for ReactionPolicy {
    fn default() -> Self {
        Self::from(&ReactionConfig::default())
    }
}

impl From<&ReactionConfig> for ReactionPolicy {
    fn from(config: &ReactionConfig) -> Self {
        Self {
            max_attempts: config.max_attempts.max(1),
            initial_delay: StdDuration::from_millis(config.retry_initial_delay_ms),
        }
    }
}

/// 联合登录身份策略
#[derive(Debug, Clone)]
pub struct IdentityPolicy {
    /// 数字后缀上限，之后改用随机后缀
    pub max_username_suffix: u32,
    /// 插入冲突后重新解析的最大次数
    pub max_insert_attempts: u32,
}

impl Default for IdentityPolicy {
    fn default() -> Self {
        Self::from(&IdentityConfig::default())
    }
}

impl From<&IdentityConfig> for IdentityPolicy {
    fn from(config: &IdentityConfig) -> Self {
        Self {
            max_username_suffix: config.max_username_suffix,
            max_insert_attempts: 5,
        }
    }
}

/// 全部策略
#[derive(Debug, Clone, Default)]
pub struct Policies {
    pub session: SessionPolicy,
    pub reaction: ReactionPolicy,
    pub identity: IdentityPolicy,
}

impl From<&AppConfig> for Policies {
    fn from(config: &AppConfig) -> Self {
        Self {
            session: SessionPolicy::from(&config.session),
            reaction: ReactionPolicy::from(&config.reaction),
            identity: IdentityPolicy::from(&config.identity),
        }
    }
}
