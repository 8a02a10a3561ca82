//! 过期会话定期清理

use std::sync::Arc;
use std::time::Duration;

use tokio::time::interval;
use tokio_util::sync::CancellationToken;
use tracing::{error, info};

use crate::application::SessionStore;

pub struct SessionSweepTask {
    store: Arc<SessionStore>,
    interval: Duration,
}

impl SessionSweepTask {
    pub fn new(store: Arc<SessionStore>, interval: Duration) -> Self {
        Self { store, interval }
    }

    /// 启动后台任务；第一次清理立即执行
    pub fn start(self: Arc<Self>, shutdown: CancellationToken) -> tokio::task::JoinHandle<()> {
        tokio::spawn(async move {
            info!(interval_secs = self.interval.as_secs(), "Session sweep task started");
            let mut ticker = interval(self.interval);

            loop {
                tokio::select! {
                    _ = ticker.tick() => {
                        if let Err(e) = self.store.sweep().await {
                            error!(error = %e, "Failed to sweep expired sessions");
                        }
                    }
                    _ = shutdown.cancelled() => {
                        info!("Session sweep task received shutdown signal");
                        break;
                    }
                }
            }
            info!("Session sweep task stopped");
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::SessionPolicy;
    use crate::domain::repositories::SessionRepository;
    use crate::domain::session::{Session, SessionSubject};
    use crate::infrastructure::persistence::{MemorySessionRepository, MemoryUserRepository};
    use forum_common::{Clock, ManualClock};

    #[tokio::test]
    async fn test_sweeps_on_start_and_stops_on_cancel() {
        let clock = Arc::new(ManualClock::starting_now());
        let users = Arc::new(MemoryUserRepository::new());
        let sessions = Arc::new(MemorySessionRepository::new(users.clone()));
        sessions
            .insert(&Session::new(
                "expired".to_string(),
                SessionSubject::Guest,
                clock.now() - chrono::Duration::hours(2),
                chrono::Duration::hours(1),
            ))
            .await
            .unwrap();

        let store = Arc::new(SessionStore::new(
            sessions.clone(),
            users,
            clock,
            SessionPolicy::default(),
        ));
        let task = Arc::new(SessionSweepTask::new(store, Duration::from_secs(3600)));
        let shutdown = CancellationToken::new();
        let handle = task.start(shutdown.clone());

        for _ in 0..50 {
            if sessions.is_empty().await {
                break;
            }
            tokio::time::sleep(Duration::from_millis(10)).await;
        }
        assert!(sessions.is_empty().await);

        shutdown.cancel();
        tokio::time::timeout(Duration::from_secs(1), handle)
            .await
            .unwrap()
            .unwrap();
    }
}
