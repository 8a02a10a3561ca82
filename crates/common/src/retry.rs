//! 通用重试机制模块
//!
//! 指数退避重试，用于连接建立以及唯一约束冲突后的条件写重试

use std::future::Future;
use std::time::Duration;

use tracing::{debug, warn};

/// 重试配置
#[derive(Debug, Clone)]
pub struct RetryConfig {
    /// 最大尝试次数（含第一次）
    pub max_attempts: u32,
    /// 初始延迟
    pub initial_delay: Duration,
    /// 最大延迟
    pub max_delay: Duration,
    /// 退避乘数
    pub multiplier: f64,
}

impl Default for RetryConfig {
    fn default() -> Self {
        Self {
            max_attempts: 3,
            initial_delay: Duration::from_millis(100),
            max_delay: Duration::from_secs(5),
            multiplier: 2.0,
        }
    }
}

impl RetryConfig {
    pub fn new(max_attempts: u32, initial_delay: Duration, max_delay: Duration) -> Self {
        Self {
            max_attempts: max_attempts.max(1),
            initial_delay,
            max_delay,
            multiplier: 2.0,
        }
    }

    /// 计算第 n 次重试前的延迟
    pub fn delay_for_attempt(&self, attempt: u32) -> Duration {
        let delay_ms =
            self.initial_delay.as_millis() as f64 * self.multiplier.powi(attempt as i32);
        let capped_delay = (delay_ms as u64).min(self.max_delay.as_millis() as u64);
        Duration::from_millis(capped_delay)
    }
}

/// 所有错误都重试
pub async fn with_retry<F, Fut, T, E>(
    config: &RetryConfig,
    operation_name: &str,
    operation: F,
) -> Result<T, E>
where
    F: FnMut() -> Fut,
    Fut: Future<Output = Result<T, E>>,
    E: std::fmt::Display,
{
    with_conditional_retry(config, operation_name, operation, |_| true).await
}

/// 仅当 `should_retry` 返回 true 时重试
///
/// 返回最后一次尝试的错误；调用方据此区分"重试耗尽"和"不可重试"。
pub async fn with_conditional_retry<F, Fut, T, E, P>(
    config: &RetryConfig,
    operation_name: &str,
    mut operation: F,
    should_retry: P,
) -> Result<T, E>
where
    F: FnMut() -> Fut,
    Fut: Future<Output = Result<T, E>>,
    E: std::fmt::Display,
    P: Fn(&E) -> bool,
{
    let max_attempts = config.max_attempts.max(1);
    let mut attempt = 0;

    loop {
        let err = match operation().await {
            Ok(result) => {
                if attempt > 0 {
                    debug!(
                        operation = operation_name,
                        attempt = attempt + 1,
                        "Operation succeeded after retry"
                    );
                }
                return Ok(result);
            }
            Err(e) => e,
        };

        if !should_retry(&err) {
            return Err(err);
        }

        if attempt + 1 >= max_attempts {
            warn!(
                operation = operation_name,
                attempt = attempt + 1,
                max_attempts,
                error = %err,
                "Operation failed, no more retries"
            );
            return Err(err);
        }

        let delay = config.delay_for_attempt(attempt);
        warn!(
            operation = operation_name,
            attempt = attempt + 1,
            max_attempts,
            error = %err,
            delay_ms = delay.as_millis() as u64,
            "Operation failed, retrying"
        );
        tokio::time::sleep(delay).await;
        attempt += 1;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicU32, Ordering};

    #[tokio::test]
    async fn test_retry_success_after_failures() {
        let config = RetryConfig::new(3, Duration::from_millis(1), Duration::from_millis(10));
        let counter = AtomicU32::new(0);

        let result: Result<i32, &str> = with_retry(&config, "test", || {
            let count = counter.fetch_add(1, Ordering::SeqCst);
            async move {
                if count < 2 {
                    Err("temporary error")
                } else {
                    Ok(42)
                }
            }
        })
        .await;

        assert_eq!(result.unwrap(), 42);
        assert_eq!(counter.load(Ordering::SeqCst), 3);
    }

    #[tokio::test]
    async fn test_retry_gives_up_after_max_attempts() {
        let config = RetryConfig::new(4, Duration::from_millis(1), Duration::from_millis(10));
        let counter = AtomicU32::new(0);

        let result: Result<i32, &str> = with_retry(&config, "test", || {
            counter.fetch_add(1, Ordering::SeqCst);
            async { Err("permanent error") }
        })
        .await;

        assert_eq!(result.unwrap_err(), "permanent error");
        assert_eq!(counter.load(Ordering::SeqCst), 4);
    }

    #[tokio::test]
    async fn test_conditional_retry_stops_on_non_retryable() {
        let config = RetryConfig::new(5, Duration::from_millis(1), Duration::from_millis(10));
        let counter = AtomicU32::new(0);

        let result: Result<i32, &str> = with_conditional_retry(
            &config,
            "test",
            || {
                counter.fetch_add(1, Ordering::SeqCst);
                async { Err("fatal") }
            },
            |e| e.contains("conflict"),
        )
        .await;

        assert!(result.is_err());
        assert_eq!(counter.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn test_zero_attempts_still_runs_once() {
        let config = RetryConfig::new(0, Duration::from_millis(1), Duration::from_millis(10));
        let counter = AtomicU32::new(0);

        let _: Result<(), &str> = with_retry(&config, "test", || {
            counter.fetch_add(1, Ordering::SeqCst);
            async { Err("conflict") }
        })
        .await;

        assert_eq!(counter.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn test_delay_calculation() {
        let config = RetryConfig::new(5, Duration::from_millis(100), Duration::from_secs(5));

        assert_eq!(config.delay_for_attempt(0), Duration::from_millis(100));
        assert_eq!(config.delay_for_attempt(1), Duration::from_millis(200));
        assert_eq!(config.delay_for_attempt(2), Duration::from_millis(400));
        assert_eq!(config.delay_for_attempt(10), Duration::from_secs(5));
    }
}
