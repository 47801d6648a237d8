use std::future::Future;
use std::time::Duration;

use tracing::debug;

use crate::{CollectorError, CollectorResult};

/// 重试策略配置
#[derive(Debug, Clone)]
pub struct RetryConfig {
    /// 最大尝试次数（含首次执行）
    pub max_attempts: u32,
    /// 基础重试间隔
    pub base_delay: Duration,
    /// 最大重试间隔
    pub max_delay: Duration,
    /// 指数退避倍数
    pub backoff_multiplier: f64,
    /// 重试间隔的随机抖动范围（0.0-1.0）
    pub jitter_factor: f64,
}

impl Default for RetryConfig {
    fn default() -> Self {
        Self {
            max_attempts: 3,
            base_delay: Duration::from_millis(1000),
            max_delay: Duration::from_millis(30_000),
            backoff_multiplier: 2.0,
            jitter_factor: 0.1,
        }
    }
}

/// 一次带重试执行的最终结果
#[derive(Debug)]
pub struct RetryOutcome<T> {
    pub result: CollectorResult<T>,
    /// 实际执行的次数
    pub attempts: u32,
}

impl<T> RetryOutcome<T> {
    pub fn is_success(&self) -> bool {
        self.result.is_ok()
    }
}

/// 重试过程中的事件，供调用方同步任务状态
#[derive(Debug)]
pub enum RetryEvent<'a> {
    /// 即将开始第 `attempt` 次尝试
    Attempt { attempt: u32 },
    /// 第 `attempt` 次尝试失败，等待 `delay` 后重试
    Retrying {
        attempt: u32,
        error: &'a CollectorError,
        delay: Duration,
    },
}

/// 指数退避重试策略
#[derive(Debug, Clone, Default)]
pub struct RetryPolicy {
    config: RetryConfig,
}

impl RetryPolicy {
    pub fn new(config: RetryConfig) -> Self {
        Self { config }
    }

    pub fn config(&self) -> &RetryConfig {
        &self.config
    }

    fn max_attempts(&self) -> u32 {
        self.config.max_attempts.max(1)
    }

    /// 执行操作，失败时按策略重试，直到成功或策略耗尽
    pub async fn execute<F, Fut, T>(&self, operation: F) -> RetryOutcome<T>
    where
        F: FnMut() -> Fut,
        Fut: Future<Output = CollectorResult<T>>,
    {
        self.execute_with_hook(operation, |_| {}).await
    }

    /// 与 [`execute`](Self::execute) 相同，并在每次尝试前后回调 `hook`
    pub async fn execute_with_hook<F, Fut, T, H>(
        &self,
        mut operation: F,
        mut hook: H,
    ) -> RetryOutcome<T>
    where
        F: FnMut() -> Fut,
        Fut: Future<Output = CollectorResult<T>>,
        H: FnMut(RetryEvent<'_>),
    {
        let mut attempt = 1;

        loop {
            hook(RetryEvent::Attempt { attempt });

            let error = match operation().await {
                Ok(value) => {
                    return RetryOutcome {
                        result: Ok(value),
                        attempts: attempt,
                    }
                }
                Err(error) => error,
            };

            if !self.should_retry(&error, attempt) {
                return RetryOutcome {
                    result: Err(error),
                    attempts: attempt,
                };
            }

            // 限流错误带有明确等待时间时直接使用
            let delay = error
                .retry_after()
                .unwrap_or_else(|| self.calculate_delay(attempt));

            debug!(
                attempt,
                delay_ms = delay.as_millis() as u64,
                error_kind = error.kind(),
                "操作失败，准备重试: {}",
                error
            );
            hook(RetryEvent::Retrying {
                attempt,
                error: &error,
                delay,
            });

            tokio::time::sleep(delay).await;
            attempt += 1;
        }
    }

    /// 第 `attempt` 次失败后是否继续重试
    pub fn should_retry(&self, error: &CollectorError, attempt: u32) -> bool {
        attempt < self.max_attempts() && error.is_retryable()
    }

    /// 不含抖动的退避间隔：`min(base * multiplier^(attempt-1), max)`
    pub fn exponential_delay(&self, attempt: u32) -> Duration {
        let base_ms = self.config.base_delay.as_secs_f64() * 1000.0;
        let max_ms = self.config.max_delay.as_secs_f64() * 1000.0;
        let exponent = attempt.saturating_sub(1).min(i32::MAX as u32) as i32;

        let raw = base_ms * self.config.backoff_multiplier.powi(exponent);
        let capped = if raw.is_finite() { raw.min(max_ms) } else { max_ms };

        Duration::from_secs_f64(capped.max(0.0) / 1000.0)
    }

    /// 第 `attempt` 次失败后的等待时间，带对称随机抖动
    pub fn calculate_delay(&self, attempt: u32) -> Duration {
        let capped = self.exponential_delay(attempt).as_secs_f64();
        let jitter_factor = self.config.jitter_factor.clamp(0.0, 1.0);

        // 添加随机抖动以避免雷群效应
        let jitter = capped * jitter_factor * (rand::random::<f64>() - 0.5) * 2.0;
        Duration::from_secs_f64((capped + jitter).max(0.0))
    }
}
