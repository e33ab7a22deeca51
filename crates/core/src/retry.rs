use std::future::Future;
use std::time::Duration;

use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

use crate::errors::AnalysisResult;

/// 重试策略
///
/// 第 `n` 次重试（从 0 开始）前等待 `base_delay * backoff_multiplier^n`，
/// 上限为 `max_delay`，可选抖动。
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RetryPolicy {
    pub max_attempts: u32,
    pub base_delay: Duration,
    pub max_delay: Duration,
    pub backoff_multiplier: f64,
    pub jitter_factor: f64,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_attempts: 3,
            base_delay: Duration::from_secs(1),
            max_delay: Duration::from_secs(60),
            backoff_multiplier: 2.0,
            jitter_factor: 0.0,
        }
    }
}

impl RetryPolicy {
    pub fn new(max_attempts: u32, base_delay: Duration) -> Self {
        Self {
            max_attempts,
            base_delay,
            ..Default::default()
        }
    }

    /// 不等待的策略，主要用于测试
    pub fn immediate(max_attempts: u32) -> Self {
        Self::new(max_attempts, Duration::ZERO)
    }

    pub fn with_max_delay(mut self, max_delay: Duration) -> Self {
        self.max_delay = max_delay;
        self
    }

    pub fn with_jitter(mut self, jitter_factor: f64) -> Self {
        self.jitter_factor = jitter_factor;
        self
    }

    /// 第 `attempt` 次失败后的等待时间
    pub fn delay_for(&self, attempt: u32) -> Duration {
        let base = self.base_delay.as_secs_f64();
        let exponent = i32::try_from(attempt).unwrap_or(i32::MAX);
        let exponential = base * self.backoff_multiplier.powi(exponent);
        let capped = exponential.min(self.max_delay.as_secs_f64());

        let jitter = if self.jitter_factor > 0.0 {
            capped * self.jitter_factor * (rand::random::<f64>() - 0.5) * 2.0
        } else {
            0.0
        };

        let seconds = (capped + jitter).max(0.0);
        if seconds.is_finite() {
            Duration::from_secs_f64(seconds)
        } else {
            self.max_delay
        }
    }
}

/// 按策略重试异步操作
///
/// 可重试错误在等待后再次调用 `operation`，直至成功或达到 `max_attempts`；
/// 最后一次失败后不再等待，原样返回最后一个错误。不可重试错误立即返回。
pub async fn with_retry<T, F, Fut>(
    policy: &RetryPolicy,
    operation_name: &str,
    mut operation: F,
) -> AnalysisResult<T>
where
    F: FnMut() -> Fut,
    Fut: Future<Output = AnalysisResult<T>>,
{
    let max_attempts = policy.max_attempts.max(1);
    let mut attempt = 0;

    loop {
        match operation().await {
            Ok(value) => {
                if attempt > 0 {
                    debug!(
                        event = "retry_succeeded",
                        operation = operation_name,
                        attempts = attempt + 1,
                        "操作重试成功"
                    );
                }
                return Ok(value);
            }
            Err(error) if !error.is_retryable() => return Err(error),
            Err(error) => {
                attempt += 1;
                if attempt >= max_attempts {
                    warn!(
                        event = "retry_exhausted",
                        operation = operation_name,
                        attempts = attempt,
                        error.code = error.error_code(),
                        "操作在 {} 次尝试后仍然失败: {}",
                        attempt,
                        error
                    );
                    metrics::counter!(
                        "analysis_retry_exhausted_total",
                        "operation" => operation_name.to_string()
                    )
                    .increment(1);
                    return Err(error);
                }

                let delay = policy.delay_for(attempt - 1);
                warn!(
                    event = "retry_scheduled",
                    operation = operation_name,
                    attempt = attempt,
                    max_attempts = max_attempts,
                    delay_ms = delay.as_millis() as u64,
                    error.code = error.error_code(),
                    "第 {} 次尝试失败，{:?} 后重试: {}",
                    attempt,
                    delay,
                    error
                );
                metrics::counter!(
                    "analysis_retry_attempts_total",
                    "operation" => operation_name.to_string()
                )
                .increment(1);

                if !delay.is_zero() {
                    tokio::time::sleep(delay).await;
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::errors::{AnalysisError, ErrorKind};
    use std::sync::atomic::{AtomicU32, Ordering};
    use std::sync::Arc;

    #[test]
    fn test_delay_doubles_and_caps() {
        let policy = RetryPolicy::new(5, Duration::from_secs(1))
            .with_max_delay(Duration::from_secs(3));
        assert_eq!(policy.delay_for(0), Duration::from_secs(1));
        assert_eq!(policy.delay_for(1), Duration::from_secs(2));
        assert_eq!(policy.delay_for(2), Duration::from_secs(3));
        assert_eq!(policy.delay_for(10), Duration::from_secs(3));
    }

    #[test]
    fn test_jitter_stays_in_range() {
        let policy = RetryPolicy::new(3, Duration::from_secs(10)).with_jitter(0.1);
        for _ in 0..50 {
            let delay = policy.delay_for(0).as_secs_f64();
            assert!((9.0..=11.0).contains(&delay), "delay={delay}");
        }
    }

    #[tokio::test]
    async fn test_succeeds_after_transient_failures() {
        let calls = Arc::new(AtomicU32::new(0));
        let counter = calls.clone();

        let result = with_retry(&RetryPolicy::immediate(3), "flaky", || {
            let counter = counter.clone();
            async move {
                let n = counter.fetch_add(1, Ordering::SeqCst);
                if n < 2 {
                    Err(AnalysisError::technical("transient"))
                } else {
                    Ok(42)
                }
            }
        })
        .await;

        assert_eq!(result.unwrap(), 42);
        assert_eq!(calls.load(Ordering::SeqCst), 3);
    }

    #[tokio::test]
    async fn test_returns_last_error_after_exhaustion() {
        let calls = Arc::new(AtomicU32::new(0));
        let counter = calls.clone();

        let result: AnalysisResult<()> = with_retry(&RetryPolicy::immediate(3), "broken", || {
            let counter = counter.clone();
            async move {
                let n = counter.fetch_add(1, Ordering::SeqCst);
                Err(AnalysisError::economic(format!("failure {n}")))
            }
        })
        .await;

        let error = result.unwrap_err();
        assert_eq!(error.kind(), ErrorKind::EconomicAnalysis);
        assert_eq!(error.message(), "failure 2");
        assert_eq!(calls.load(Ordering::SeqCst), 3);
    }

    #[tokio::test]
    async fn test_non_retryable_error_is_not_retried() {
        let calls = Arc::new(AtomicU32::new(0));
        let counter = calls.clone();

        let result: AnalysisResult<()> = with_retry(&RetryPolicy::immediate(3), "invalid", || {
            let counter = counter.clone();
            async move {
                counter.fetch_add(1, Ordering::SeqCst);
                Err(AnalysisError::validation("bad input"))
            }
        })
        .await;

        assert_eq!(result.unwrap_err().kind(), ErrorKind::Validation);
        assert_eq!(calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn test_no_sleep_after_last_attempt() {
        let policy = RetryPolicy::new(2, Duration::from_secs(10));
        let started = tokio::time::Instant::now();

        let result: AnalysisResult<()> = with_retry(&policy, "slow", || async {
            Err(AnalysisError::technical("down"))
        })
        .await;

        assert!(result.is_err());
        // 只有第一次失败后等待
        let elapsed = started.elapsed();
        assert!(elapsed >= Duration::from_secs(10), "elapsed={elapsed:?}");
        assert!(elapsed < Duration::from_secs(20), "elapsed={elapsed:?}");
    }
}
