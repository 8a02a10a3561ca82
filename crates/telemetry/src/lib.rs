//! forum-telemetry - 可观测性库

use metrics_exporter_prometheus::{BuildError, PrometheusBuilder, PrometheusHandle};
use tracing_subscriber::{EnvFilter, layer::SubscriberExt, util::SubscriberInitExt};

#[derive(Debug, thiserror::Error)]
pub enum TelemetryError {
    #[error("Failed to install tracing subscriber: {0}")]
    Tracing(String),

    #[error("Failed to install Prometheus recorder: {0}")]
    Metrics(#[from] BuildError),
}

fn env_filter(log_level: &str) -> EnvFilter {
    EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(log_level))
}

/// 初始化 tracing
pub fn init_tracing(log_level: &str) -> Result<(), TelemetryError> {
    tracing_subscriber::registry()
        .with(env_filter(log_level))
        .with(tracing_subscriber::fmt::layer())
        .try_init()
        .map_err(|e| TelemetryError::Tracing(e.to_string()))
}

/// 初始化 JSON 格式的 tracing（生产环境）
pub fn init_tracing_json(log_level: &str) -> Result<(), TelemetryError> {
    tracing_subscriber::registry()
        .with(env_filter(log_level))
        .with(tracing_subscriber::fmt::layer().json())
        .try_init()
        .map_err(|e| TelemetryError::Tracing(e.to_string()))
}

/// 按环境选择输出格式
pub fn init_for_env(log_level: &str, production: bool) -> Result<(), TelemetryError> {
    if production {
        init_tracing_json(log_level)
    } else {
        init_tracing(log_level)
    }
}

/// 初始化 Prometheus metrics
///
/// 未安装 recorder 时，`metrics` 的计数器调用为空操作。
pub fn init_metrics() -> Result<PrometheusHandle, TelemetryError> {
    let handle = PrometheusBuilder::new().install_recorder()?;
    describe_metrics();
    Ok(handle)
}

fn describe_metrics() {
    metrics::describe_counter!("forum_sessions_created_total", "Sessions issued, by kind");
    metrics::describe_counter!("forum_sessions_revoked_total", "Sessions revoked explicitly");
    metrics::describe_counter!("forum_sessions_swept_total", "Expired sessions removed by the sweep");
    metrics::describe_counter!(
        "forum_reaction_toggles_total",
        "Reaction toggles, by target kind and resulting row operation"
    );
    metrics::describe_counter!(
        "forum_reaction_conflicts_total",
        "Reaction writes that hit the uniqueness constraint and were retried"
    );
    metrics::describe_counter!(
        "forum_users_federated_created_total",
        "Local users created from a federated identity, by provider"
    );
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_second_tracing_init_reports_error() {
        // 同一进程只能安装一次全局 subscriber
        let first = init_tracing("debug");
        let second = init_tracing("debug");
        assert!(first.is_ok() || second.is_err());
        assert!(second.is_err());
    }
}
