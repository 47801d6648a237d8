//! Test helper utilities

use std::time::Duration;

use collector_core::{CircuitBreaker, CircuitBreakerConfig, RetryConfig, RetryPolicy};
use tokio::time::sleep;

/// Retry policy with millisecond delays and no jitter
pub fn fast_retry_policy(max_attempts: u32) -> RetryPolicy {
    RetryPolicy::new(RetryConfig {
        max_attempts,
        base_delay: Duration::from_millis(1),
        max_delay: Duration::from_millis(4),
        backoff_multiplier: 2.0,
        jitter_factor: 0.0,
    })
}

/// Breaker that will not trip during ordinary tests
pub fn lenient_breaker() -> CircuitBreaker {
    CircuitBreaker::with_config(
        "test-upstream",
        CircuitBreakerConfig {
            failure_threshold: 1_000,
            recovery_timeout: Duration::from_secs(60),
            monitoring_window: Duration::from_secs(60),
            call_timeout: Duration::from_secs(5),
        },
    )
}

/// Wait for a condition to be true with timeout
pub async fn wait_for<F, Fut>(mut condition: F, timeout: Duration) -> bool
where
    F: FnMut() -> Fut,
    Fut: std::future::Future<Output = bool>,
{
    let start = std::time::Instant::now();

    while start.elapsed() < timeout {
        if condition().await {
            return true;
        }
        sleep(Duration::from_millis(10)).await;
    }

    false
}
