//! forum-core 服务入口
//!
//! 加载配置、初始化日志与 metrics、执行迁移、启动过期会话清理，直到收到关闭信号。

use std::sync::Arc;

use anyhow::Context;
use forum_bootstrap::{Infrastructure, RuntimeConfig, init_runtime, shutdown_signal};
use forum_config::AppConfig;
use forum_core::ForumCore;
use forum_core::infrastructure::{SessionSweepTask, run_migrations};
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    dotenvy::dotenv().ok();

    let runtime = RuntimeConfig::default();
    let config = AppConfig::load(&runtime.config_dir)
        .with_context(|| format!("failed to load configuration from {}", runtime.config_dir))?;
    let metrics = init_runtime(&config)?;

    let infra = Infrastructure::from_config(config).await?;
    run_migrations(&infra.postgres_pool()).await?;

    let core = ForumCore::postgres(infra.postgres_pool(), infra.config());
    match core.sessions.active_count().await {
        Ok(counts) => info!(
            authenticated = counts.authenticated,
            guest = counts.guest,
            "Active sessions at startup"
        ),
        Err(e) => warn!(error = %e, "Failed to count active sessions"),
    }

    let shutdown = CancellationToken::new();
    let sweep = Arc::new(SessionSweepTask::new(
        core.sessions.clone(),
        core.sessions.policy().sweep_interval,
    ));
    let sweep_handle = sweep.start(shutdown.clone());

    info!(app_name = %infra.config().app_name, "forum-core started");
    shutdown_signal().await;

    shutdown.cancel();
    if let Err(e) = sweep_handle.await {
        warn!(error = %e, "Session sweep task ended abnormally");
    }

    let (size, idle) = infra.postgres_pool_status();
    info!(pool_size = size, pool_idle = idle, "Closing PostgreSQL pool");
    infra.postgres_pool().close().await;

    debug!(metrics = %metrics.render(), "Final metrics snapshot");
    info!("forum-core stopped");
    Ok(())
}
