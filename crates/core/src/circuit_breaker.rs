use std::sync::Arc;
use std::time::{Duration, Instant};

use serde::{Deserialize, Serialize};
use tokio::sync::RwLock;
use tracing::{info, warn};

use crate::{CollectorError, CollectorResult};

/// Circuit breaker state
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum CircuitState {
    /// Circuit is closed - normal operation
    Closed,
    /// Circuit is open - calls are blocked
    Open,
    /// Circuit is half-open - testing if the upstream has recovered
    HalfOpen,
}

/// Circuit breaker configuration
#[derive(Debug, Clone)]
pub struct CircuitBreakerConfig {
    /// Consecutive failures before opening the circuit
    pub failure_threshold: usize,
    /// How long the circuit stays open before a trial call is let through
    pub recovery_timeout: Duration,
    /// Failures further apart than this do not accumulate
    pub monitoring_window: Duration,
    /// Upper bound for a single guarded call
    pub call_timeout: Duration,
}

impl Default for CircuitBreakerConfig {
    fn default() -> Self {
        Self {
            failure_threshold: 5,
            recovery_timeout: Duration::from_secs(60),
            monitoring_window: Duration::from_secs(120),
            call_timeout: Duration::from_secs(30),
        }
    }
}

/// Circuit breaker statistics
#[derive(Debug, Clone)]
pub struct CircuitBreakerStats {
    /// Current state
    pub state: CircuitState,
    /// Failures counted toward the threshold
    pub consecutive_failures: usize,
    /// Total calls that reached the operation
    pub total_calls: u64,
    pub successful_calls: u64,
    pub failed_calls: u64,
    /// Calls refused while open
    pub rejected_calls: u64,
    pub last_state_change: Instant,
    pub last_failure: Option<Instant>,
    /// The single trial call of the current half-open period is running
    pub half_open_trial_in_flight: bool,
}

impl CircuitBreakerStats {
    fn new() -> Self {
        Self {
            state: CircuitState::Closed,
            consecutive_failures: 0,
            total_calls: 0,
            successful_calls: 0,
            failed_calls: 0,
            rejected_calls: 0,
            last_state_change: Instant::now(),
            last_failure: None,
            half_open_trial_in_flight: false,
        }
    }

    pub fn failure_rate(&self) -> f64 {
        if self.total_calls == 0 {
            0.0
        } else {
            self.failed_calls as f64 / self.total_calls as f64
        }
    }

    pub fn success_rate(&self) -> f64 {
        if self.total_calls == 0 {
            0.0
        } else {
            self.successful_calls as f64 / self.total_calls as f64
        }
    }
}

/// Circuit breaker guarding one upstream dependency.
///
/// Clones share state, so one breaker can be handed to every concurrent job.
pub struct CircuitBreaker {
    name: String,
    config: CircuitBreakerConfig,
    stats: Arc<RwLock<CircuitBreakerStats>>,
}

impl CircuitBreaker {
    pub fn new(name: impl Into<String>) -> Self {
        Self::with_config(name, CircuitBreakerConfig::default())
    }

    pub fn with_config(name: impl Into<String>, config: CircuitBreakerConfig) -> Self {
        Self {
            name: name.into(),
            config,
            stats: Arc::new(RwLock::new(CircuitBreakerStats::new())),
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    /// Execute operation with circuit breaker protection.
    ///
    /// While open the operation is not invoked at all and
    /// [`CollectorError::CircuitOpen`] is returned. Half-open lets exactly one
    /// trial call through; concurrent callers are rejected until it settles.
    ///
    /// Only errors that point at the upstream itself (retryable kinds and
    /// timeouts) count toward the threshold. A permanent error means the
    /// upstream answered, so it is tallied but never trips the circuit.
    pub async fn execute<F, Fut, T>(&self, operation: F) -> CollectorResult<T>
    where
        F: FnOnce() -> Fut,
        Fut: std::future::Future<Output = CollectorResult<T>>,
    {
        if !self.should_allow_call().await {
            return Err(CollectorError::CircuitOpen(self.name.clone()));
        }

        let result = tokio::time::timeout(self.config.call_timeout, operation()).await;

        match result {
            Ok(Ok(value)) => {
                self.record_success().await;
                Ok(value)
            }
            Ok(Err(error)) if error.is_retryable() => {
                self.record_failure().await;
                Err(error)
            }
            Ok(Err(error)) => {
                self.record_answered_failure().await;
                Err(error)
            }
            Err(_) => {
                self.record_failure().await;
                Err(CollectorError::Timeout(format!(
                    "{} call exceeded {}ms",
                    self.name,
                    self.config.call_timeout.as_millis()
                )))
            }
        }
    }

    async fn should_allow_call(&self) -> bool {
        let mut stats = self.stats.write().await;

        match stats.state {
            CircuitState::Closed => true,
            CircuitState::HalfOpen => {
                // a trial whose caller was dropped never settles; call_timeout bounds a live one
                let abandoned = stats.last_state_change.elapsed()
                    >= self.config.recovery_timeout + self.config.call_timeout;
                if stats.half_open_trial_in_flight && !abandoned {
                    stats.rejected_calls += 1;
                    false
                } else {
                    stats.half_open_trial_in_flight = true;
                    stats.last_state_change = Instant::now();
                    true
                }
            }
            CircuitState::Open => {
                if stats.last_state_change.elapsed() >= self.config.recovery_timeout {
                    stats.state = CircuitState::HalfOpen;
                    stats.last_state_change = Instant::now();
                    stats.half_open_trial_in_flight = true;
                    info!(breaker = %self.name, "circuit half-open, allowing trial call");
                    true
                } else {
                    stats.rejected_calls += 1;
                    false
                }
            }
        }
    }

    async fn record_success(&self) {
        let mut stats = self.stats.write().await;

        stats.total_calls += 1;
        stats.successful_calls += 1;
        stats.consecutive_failures = 0;
        self.close_if_recovering(&mut stats);
    }

    /// The upstream rejected this particular request but is reachable.
    async fn record_answered_failure(&self) {
        let mut stats = self.stats.write().await;

        stats.total_calls += 1;
        stats.failed_calls += 1;
        // a straggler from before the trip must not close an open circuit
        if stats.state == CircuitState::HalfOpen {
            self.close_if_recovering(&mut stats);
        }
    }

    fn close_if_recovering(&self, stats: &mut CircuitBreakerStats) {
        stats.half_open_trial_in_flight = false;
        if stats.state != CircuitState::Closed {
            stats.state = CircuitState::Closed;
            stats.consecutive_failures = 0;
            stats.last_state_change = Instant::now();
            info!(breaker = %self.name, "circuit closed");
        }
    }

    async fn record_failure(&self) {
        let mut stats = self.stats.write().await;
        let now = Instant::now();

        stats.total_calls += 1;
        stats.failed_calls += 1;
        stats.half_open_trial_in_flight = false;

        let stale = stats
            .last_failure
            .is_some_and(|last| now.duration_since(last) > self.config.monitoring_window);
        if stale {
            stats.consecutive_failures = 0;
        }
        stats.consecutive_failures += 1;
        stats.last_failure = Some(now);

        let trip = match stats.state {
            CircuitState::HalfOpen => true,
            CircuitState::Closed => stats.consecutive_failures >= self.config.failure_threshold,
            CircuitState::Open => false,
        };

        if trip {
            stats.state = CircuitState::Open;
            stats.last_state_change = now;
            warn!(
                breaker = %self.name,
                consecutive_failures = stats.consecutive_failures,
                recovery_timeout_ms = self.config.recovery_timeout.as_millis() as u64,
                "circuit opened"
            );
        }
    }

    pub async fn state(&self) -> CircuitState {
        self.stats.read().await.state
    }

    pub async fn stats(&self) -> CircuitBreakerStats {
        self.stats.read().await.clone()
    }

    pub async fn reset(&self) {
        *self.stats.write().await = CircuitBreakerStats::new();
    }

    /// Force open circuit (maintenance)
    pub async fn force_open(&self) {
        let mut stats = self.stats.write().await;
        stats.state = CircuitState::Open;
        stats.last_state_change = Instant::now();
        stats.half_open_trial_in_flight = false;
        warn!(breaker = %self.name, "circuit forced open");
    }

    pub async fn force_close(&self) {
        let mut stats = self.stats.write().await;
        stats.state = CircuitState::Closed;
        stats.last_state_change = Instant::now();
        stats.consecutive_failures = 0;
        stats.half_open_trial_in_flight = false;
    }
}

impl Clone for CircuitBreaker {
    fn clone(&self) -> Self {
        Self {
            name: self.name.clone(),
            config: self.config.clone(),
            stats: Arc::clone(&self.stats),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};

    fn failing() -> CollectorError {
        CollectorError::Network("upstream reset".to_string())
    }

    fn delisted() -> CollectorError {
        CollectorError::InvalidAsset("DELISTED".to_string())
    }

    async fn slow_failure(invocations: &AtomicUsize) -> CollectorResult<()> {
        invocations.fetch_add(1, Ordering::SeqCst);
        tokio::time::sleep(Duration::from_millis(30)).await;
        Err(failing())
    }

    async fn trip(cb: &CircuitBreaker, times: usize) {
        for _ in 0..times {
            let _: CollectorResult<()> = cb.execute(|| async { Err(failing()) }).await;
        }
    }

    fn breaker(threshold: usize, recovery: Duration) -> CircuitBreaker {
        CircuitBreaker::with_config(
            "test",
            CircuitBreakerConfig {
                failure_threshold: threshold,
                recovery_timeout: recovery,
                ..Default::default()
            },
        )
    }

    #[tokio::test]
    async fn test_circuit_breaker_closed_state() {
        let cb = CircuitBreaker::new("test");
        assert_eq!(cb.state().await, CircuitState::Closed);

        let result = cb.execute(|| async { Ok::<(), CollectorError>(()) }).await;
        assert!(result.is_ok());
        assert_eq!(cb.state().await, CircuitState::Closed);
    }

    #[tokio::test]
    async fn test_open_circuit_fails_fast_without_invoking() {
        let cb = breaker(2, Duration::from_millis(200));

        for _ in 0..2 {
            let result: CollectorResult<()> = cb.execute(|| async { Err(failing()) }).await;
            assert!(result.is_err());
        }
        assert_eq!(cb.state().await, CircuitState::Open);

        let invoked = AtomicBool::new(false);
        let result = cb
            .execute(|| async {
                invoked.store(true, Ordering::SeqCst);
                Ok::<(), CollectorError>(())
            })
            .await;

        assert!(result.unwrap_err().is_circuit_open());
        assert!(!invoked.load(Ordering::SeqCst));
        assert_eq!(cb.stats().await.rejected_calls, 1);
    }

    #[tokio::test]
    async fn test_half_open_success_closes_and_resets_counter() {
        let cb = breaker(2, Duration::from_millis(100));

        for _ in 0..2 {
            let _: CollectorResult<()> = cb.execute(|| async { Err(failing()) }).await;
        }
        assert_eq!(cb.state().await, CircuitState::Open);

        tokio::time::sleep(Duration::from_millis(150)).await;

        let result = cb.execute(|| async { Ok::<u32, CollectorError>(7) }).await;
        assert_eq!(result.unwrap(), 7);

        let stats = cb.stats().await;
        assert_eq!(stats.state, CircuitState::Closed);
        assert_eq!(stats.consecutive_failures, 0);
    }

    #[tokio::test]
    async fn test_half_open_failure_reopens() {
        let cb = breaker(2, Duration::from_millis(100));
        for _ in 0..2 {
            let _: CollectorResult<()> = cb.execute(|| async { Err(failing()) }).await;
        }
        tokio::time::sleep(Duration::from_millis(150)).await;

        let _: CollectorResult<()> = cb.execute(|| async { Err(failing()) }).await;
        assert_eq!(cb.state().await, CircuitState::Open);

        let result: CollectorResult<()> = cb.execute(|| async { Ok(()) }).await;
        assert!(result.unwrap_err().is_circuit_open());
    }

    #[tokio::test]
    async fn test_half_open_admits_a_single_trial_call() {
        let cb = breaker(2, Duration::from_millis(50));
        trip(&cb, 2).await;
        tokio::time::sleep(Duration::from_millis(80)).await;

        let invocations = AtomicUsize::new(0);
        let (a, b, c, d, e) = tokio::join!(
            cb.execute(|| slow_failure(&invocations)),
            cb.execute(|| slow_failure(&invocations)),
            cb.execute(|| slow_failure(&invocations)),
            cb.execute(|| slow_failure(&invocations)),
            cb.execute(|| slow_failure(&invocations)),
        );

        let rejected = [a, b, c, d, e]
            .into_iter()
            .filter(|r| r.as_ref().is_err_and(|e| e.is_circuit_open()))
            .count();
        assert_eq!(invocations.load(Ordering::SeqCst), 1);
        assert_eq!(rejected, 4);

        let stats = cb.stats().await;
        assert_eq!(stats.state, CircuitState::Open);
        assert_eq!(stats.rejected_calls, 4);
        assert!(!stats.half_open_trial_in_flight);
    }

    #[tokio::test]
    async fn test_abandoned_trial_does_not_wedge_half_open() {
        let cb = CircuitBreaker::with_config(
            "test",
            CircuitBreakerConfig {
                failure_threshold: 1,
                recovery_timeout: Duration::from_millis(50),
                call_timeout: Duration::from_millis(50),
                ..Default::default()
            },
        );
        trip(&cb, 1).await;
        tokio::time::sleep(Duration::from_millis(80)).await;

        // the trial's caller goes away before the call settles
        let invocations = AtomicUsize::new(0);
        let dropped = tokio::time::timeout(
            Duration::from_millis(10),
            cb.execute(|| slow_failure(&invocations)),
        )
        .await;
        assert!(dropped.is_err());
        assert_eq!(cb.state().await, CircuitState::HalfOpen);

        let result: CollectorResult<()> = cb.execute(|| async { Ok(()) }).await;
        assert!(result.unwrap_err().is_circuit_open());

        tokio::time::sleep(Duration::from_millis(120)).await;
        let result: CollectorResult<()> = cb.execute(|| async { Ok(()) }).await;
        assert!(result.is_ok());
        assert_eq!(cb.state().await, CircuitState::Closed);
    }

    #[tokio::test]
    async fn test_permanent_errors_do_not_trip() {
        let cb = breaker(2, Duration::from_secs(60));

        for _ in 0..3 {
            let result: CollectorResult<()> = cb.execute(|| async { Err(delisted()) }).await;
            assert!(matches!(result, Err(CollectorError::InvalidAsset(_))));
        }
        let result = cb.execute(|| async { Ok::<(), CollectorError>(()) }).await;
        assert!(result.is_ok());

        let stats = cb.stats().await;
        assert_eq!(stats.state, CircuitState::Closed);
        assert_eq!(stats.consecutive_failures, 0);
        assert_eq!(stats.failed_calls, 3);
        assert_eq!(stats.total_calls, 4);
        assert!((stats.failure_rate() - 0.75).abs() < f64::EPSILON);
        assert!((stats.success_rate() - 0.25).abs() < f64::EPSILON);
    }

    #[tokio::test]
    async fn test_permanent_error_during_trial_closes() {
        let cb = breaker(2, Duration::from_millis(50));
        trip(&cb, 2).await;
        tokio::time::sleep(Duration::from_millis(80)).await;

        let result: CollectorResult<()> = cb.execute(|| async { Err(delisted()) }).await;
        assert!(!result.unwrap_err().is_circuit_open());
        assert_eq!(cb.state().await, CircuitState::Closed);
    }

    #[tokio::test]
    async fn test_force_open_then_reset() {
        let cb = breaker(5, Duration::from_secs(60));
        assert_eq!(cb.name(), "test");

        cb.force_open().await;
        let invoked = AtomicBool::new(false);
        let result = cb
            .execute(|| async {
                invoked.store(true, Ordering::SeqCst);
                Ok::<(), CollectorError>(())
            })
            .await;
        assert!(result.unwrap_err().is_circuit_open());
        assert!(!invoked.load(Ordering::SeqCst));

        cb.reset().await;
        let stats = cb.stats().await;
        assert_eq!(stats.state, CircuitState::Closed);
        assert_eq!(stats.rejected_calls, 0);
        assert_eq!(stats.total_calls, 0);
        assert_eq!(stats.success_rate(), 0.0);

        let result = cb.execute(|| async { Ok::<u8, CollectorError>(1) }).await;
        assert_eq!(result.unwrap(), 1);
    }

    #[tokio::test]
    async fn test_failures_outside_window_do_not_accumulate() {
        let cb = CircuitBreaker::with_config(
            "test",
            CircuitBreakerConfig {
                failure_threshold: 2,
                monitoring_window: Duration::from_millis(50),
                ..Default::default()
            },
        );

        let _: CollectorResult<()> = cb.execute(|| async { Err(failing()) }).await;
        tokio::time::sleep(Duration::from_millis(100)).await;
        let _: CollectorResult<()> = cb.execute(|| async { Err(failing()) }).await;

        let stats = cb.stats().await;
        assert_eq!(stats.state, CircuitState::Closed);
        assert_eq!(stats.consecutive_failures, 1);
    }

    #[tokio::test]
    async fn test_circuit_breaker_timeout() {
        let cb = CircuitBreaker::with_config(
            "test",
            CircuitBreakerConfig {
                call_timeout: Duration::from_millis(50),
                ..Default::default()
            },
        );

        let result = cb
            .execute(|| async {
                tokio::time::sleep(Duration::from_millis(200)).await;
                Ok::<(), CollectorError>(())
            })
            .await;

        let err = result.unwrap_err();
        assert!(matches!(err, CollectorError::Timeout(_)));
        assert!(err.is_retryable());
        assert_eq!(cb.stats().await.consecutive_failures, 1);
    }

    #[tokio::test]
    async fn test_clones_share_state() {
        let cb = breaker(1, Duration::from_secs(60));
        let other = cb.clone();
        let _: CollectorResult<()> = other.execute(|| async { Err(failing()) }).await;
        assert_eq!(cb.state().await, CircuitState::Open);

        cb.force_close().await;
        assert_eq!(other.state().await, CircuitState::Closed);
    }
}
