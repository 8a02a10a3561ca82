//! forum-config - 配置加载库
//!
//! 合并顺序：`default.toml` → `{APP_ENV}.toml` → `FORUM_` 前缀环境变量
//! （嵌套字段用双下划线，例如 `FORUM_DATABASE__URL`）。

use std::time::Duration;

use figment::{
    providers::{Env, Format, Toml},
    Figment,
};
use serde::Deserialize;
use thiserror::Error;

use secrecy::Secret;

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Failed to load config: {0}")]
    Load(#[from] figment::Error),

    #[error("Invalid config: {0}")]
    Invalid(String),
}

/// 数据库配置
#[derive(Debug, Clone, Deserialize)]
pub struct DatabaseConfig {
    pub url: Secret<String>,
    #[serde(default = "default_max_connections")]
    pub max_connections: u32,
    /// 获取连接的最长等待时间，超时视为存储不可用
    #[serde(default = "default_acquire_timeout_secs")]
    pub acquire_timeout_secs: u64,
    /// 单条语句执行上限（毫秒），对应 Postgres `statement_timeout`
    #[serde(default = "default_statement_timeout_ms")]
    pub statement_timeout_ms: u64,
    /// 等待行锁上限（毫秒），对应 Postgres `lock_timeout`
    #[serde(default = "default_lock_timeout_ms")]
    pub lock_timeout_ms: u64,
}

fn default_max_connections() -> u32 {
    // 开发环境: 10, 生产环境: 50
    match std::env::var("APP_ENV").as_deref() {
        Ok("production") => 50,
        _ => 10,
    }
}

fn default_acquire_timeout_secs() -> u64 {
    5
}

fn default_statement_timeout_ms() -> u64 {
    5_000
}

fn default_lock_timeout_ms() -> u64 {
    3_000
}

/// 遥测配置
#[derive(Debug, Clone, Deserialize)]
pub struct TelemetryConfig {
    #[serde(default = "default_log_level")]
    pub log_level: String,
}

impl Default for TelemetryConfig {
    fn default() -> Self {
        Self {
            log_level: default_log_level(),
        }
    }
}

fn default_log_level() -> String {
    "info".to_string()
}

/// 会话配置
#[derive(Debug, Clone, Deserialize)]
pub struct SessionConfig {
    #[serde(default = "default_session_ttl_secs")]
    pub guest_ttl_secs: u64,
    #[serde(default = "default_session_ttl_secs")]
    pub authenticated_ttl_secs: u64,
    /// 过期会话清理周期
    #[serde(default = "default_sweep_interval_secs")]
    pub sweep_interval_secs: u64,
    /// "在线" 统计窗口
    #[serde(default = "default_active_window_secs")]
    pub active_window_secs: u64,
}

impl Default for SessionConfig {
    fn default() -> Self {
        Self {
            guest_ttl_secs: default_session_ttl_secs(),
            authenticated_ttl_secs: default_session_ttl_secs(),
            sweep_interval_secs: default_sweep_interval_secs(),
            active_window_secs: default_active_window_secs(),
        }
    }
}

impl SessionConfig {
    pub fn guest_ttl(&self) -> Duration {
        Duration::from_secs(self.guest_ttl_secs)
    }

    pub fn authenticated_ttl(&self) -> Duration {
        Duration::from_secs(self.authenticated_ttl_secs)
    }

    pub fn sweep_interval(&self) -> Duration {
        Duration::from_secs(self.sweep_interval_secs)
    }

    pub fn active_window(&self) -> Duration {
        Duration::from_secs(self.active_window_secs)
    }
}

fn default_session_ttl_secs() -> u64 {
    86_400
}

fn default_sweep_interval_secs() -> u64 {
    3_600
}

fn default_active_window_secs() -> u64 {
    300
}

/// 点赞/点踩配置
#[derive(Debug, Clone, Deserialize)]
pub struct ReactionConfig {
    /// 条件写冲突的最大尝试次数
    #[serde(default = "default_reaction_max_attempts")]
    pub max_attempts: u32,
    #[serde(default = "default_retry_initial_delay_ms")]
    pub retry_initial_delay_ms: u64,
}

impl Default for ReactionConfig {
    fn default() -> Self {
        Self {
            max_attempts: default_reaction_max_attempts(),
            retry_initial_delay_ms: default_retry_initial_delay_ms(),
        }
    }
}

fn default_reaction_max_attempts() -> u32 {
    5
}

fn default_retry_initial_delay_ms() -> u64 {
    10
}

/// 联合登录身份配置
#[derive(Debug, Clone, Deserialize)]
pub struct IdentityConfig {
    /// 用户名数字后缀的上限，超过后改用随机后缀
    #[serde(default = "default_max_username_suffix")]
    pub max_username_suffix: u32,
}

impl Default for IdentityConfig {
    fn default() -> Self {
        Self {
            max_username_suffix: default_max_username_suffix(),
        }
    }
}

fn default_max_username_suffix() -> u32 {
    100
}

/// 应用配置
#[derive(Debug, Clone, Deserialize)]
pub struct AppConfig {
    pub app_name: String,
    pub app_env: String,
    pub database: DatabaseConfig,
    #[serde(default)]
    pub telemetry: TelemetryConfig,
    #[serde(default)]
    pub session: SessionConfig,
    #[serde(default)]
    pub reaction: ReactionConfig,
    #[serde(default)]
    pub identity: IdentityConfig,
}

impl AppConfig {
    /// 构建配置来源（不解析）
    pub fn figment(config_dir: &str) -> Figment {
        let env = std::env::var("APP_ENV").unwrap_or_else(|_| "development".to_string());

        Figment::new()
            .merge(Toml::file(format!("{}/default.toml", config_dir)))
            .merge(Toml::file(format!("{}/{}.toml", config_dir, env)))
            .merge(Env::prefixed("FORUM_").split("__"))
    }

    /// 从配置文件和环境变量加载配置
    pub fn load(config_dir: &str) -> Result<Self, ConfigError> {
        let config: Self = Self::figment(config_dir).extract()?;
        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.session.guest_ttl_secs == 0 || self.session.authenticated_ttl_secs == 0 {
            return Err(ConfigError::Invalid(
                "session ttl must be greater than zero".to_string(),
            ));
        }
        if self.session.sweep_interval_secs == 0 {
            return Err(ConfigError::Invalid(
                "session.sweep_interval_secs must be greater than zero".to_string(),
            ));
        }
        // Postgres 把 0 解释为不限时
        if self.database.statement_timeout_ms == 0 || self.database.lock_timeout_ms == 0 {
            return Err(ConfigError::Invalid(
                "database statement/lock timeout must be greater than zero".to_string(),
            ));
        }
        if self.reaction.max_attempts == 0 {
            return Err(ConfigError::Invalid(
                "reaction.max_attempts must be at least 1".to_string(),
            ));
        }
        Ok(())
    }

    /// 是否为生产环境
    pub fn is_production(&self) -> bool {
        self.app_env == "production"
    }
}
