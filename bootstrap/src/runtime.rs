//! 服务运行时

use forum_config::AppConfig;
use forum_errors::{AppError, AppResult};
use forum_telemetry::{init_for_env, init_metrics};
use metrics_exporter_prometheus::PrometheusHandle;
use tracing::info;

/// 服务运行时配置
pub struct RuntimeConfig {
    pub config_dir: String,
}

impl Default for RuntimeConfig {
    fn default() -> Self {
        Self {
            config_dir: std::env::var("FORUM_CONFIG_DIR").unwrap_or_else(|_| "config".to_string()),
        }
    }
}

/// 初始化服务运行时：日志与 metrics recorder
pub fn init_runtime(config: &AppConfig) -> AppResult<PrometheusHandle> {
    init_for_env(&config.telemetry.log_level, config.is_production())
        .map_err(|e| AppError::internal(e.to_string()))?;

    let handle = init_metrics().map_err(|e| AppError::internal(e.to_string()))?;

    info!(
        app_name = %config.app_name,
        app_env = %config.app_env,
        "Runtime initialized"
    );
    Ok(handle)
}
