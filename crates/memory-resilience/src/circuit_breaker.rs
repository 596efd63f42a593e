//! Circuit breaker for the LLM gateway's chat/embedding calls (§4.B, §5).
//!
//! Closed -> Open happens after `failure_threshold` consecutive failures.
//! Open rejects immediately until `reset_timeout_ms` has elapsed, at which
//! point a single probe is allowed through (Half-Open); `success_threshold`
//! consecutive probe successes closes the circuit again, any probe failure
//! re-opens it.

use std::sync::atomic::{AtomicU64, AtomicU8, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::RwLock;
use tokio::time::Instant;
use tracing::{info, warn};

#[derive(Debug, thiserror::Error)]
#[error("circuit breaker is open, rejecting call")]
pub struct CircuitBreakerOpenError;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CircuitState {
    Closed,
    Open,
    HalfOpen,
}

impl From<u8> for CircuitState {
    fn from(v: u8) -> Self {
        match v {
            1 => CircuitState::Open,
            2 => CircuitState::HalfOpen,
            _ => CircuitState::Closed,
        }
    }
}

impl From<CircuitState> for u8 {
    fn from(s: CircuitState) -> Self {
        match s {
            CircuitState::Closed => 0,
            CircuitState::Open => 1,
            CircuitState::HalfOpen => 2,
        }
    }
}

#[derive(Debug, Clone)]
pub struct CircuitBreakerConfig {
    pub failure_threshold: u32,
    pub success_threshold: u32,
    pub reset_timeout_ms: u64,
}

impl Default for CircuitBreakerConfig {
    fn default() -> Self {
        Self {
            failure_threshold: 5,
            success_threshold: 3,
            reset_timeout_ms: 30_000,
        }
    }
}

#[derive(Debug, Clone, Copy)]
pub struct CircuitBreakerStats {
    pub state: CircuitState,
    pub consecutive_failures: u32,
    pub consecutive_successes: u32,
}

/// Shared, cloneable handle. Internals are all atomics/RwLock so it can sit
/// behind an `Arc` in the gateway without an outer mutex.
#[derive(Clone)]
pub struct CircuitBreaker {
    inner: Arc<Inner>,
}

struct Inner {
    config: CircuitBreakerConfig,
    state: AtomicU8,
    consecutive_failures: AtomicU64,
    consecutive_successes: AtomicU64,
    opened_at: RwLock<Option<Instant>>,
}

impl CircuitBreaker {
    pub fn new(config: CircuitBreakerConfig) -> Self {
        Self {
            inner: Arc::new(Inner {
                config,
                state: AtomicU8::new(CircuitState::Closed.into()),
                consecutive_failures: AtomicU64::new(0),
                consecutive_successes: AtomicU64::new(0),
                opened_at: RwLock::new(None),
            }),
        }
    }

    pub async fn stats(&self) -> CircuitBreakerStats {
        CircuitBreakerStats {
            state: self.inner.state.load(Ordering::SeqCst).into(),
            consecutive_failures: self.inner.consecutive_failures.load(Ordering::SeqCst) as u32,
            consecutive_successes: self.inner.consecutive_successes.load(Ordering::SeqCst) as u32,
        }
    }

    /// Run `operation` if the breaker permits it, recording the outcome.
    /// Callers map `CallError::Rejected` onto `MemoryError::Overloaded`.
    pub async fn call<F, Fut, T, E>(&self, operation: F) -> Result<T, CallError<E>>
    where
        F: FnOnce() -> Fut,
        Fut: std::future::Future<Output = Result<T, E>>,
    {
        if !self.permit().await {
            return Err(CallError::Rejected(CircuitBreakerOpenError));
        }
        match operation().await {
            Ok(value) => {
                self.on_success().await;
                Ok(value)
            }
            Err(error) => {
                self.on_failure().await;
                Err(CallError::Operation(error))
            }
        }
    }

    async fn permit(&self) -> bool {
        let state: CircuitState = self.inner.state.load(Ordering::SeqCst).into();
        match state {
            CircuitState::Closed | CircuitState::HalfOpen => true,
            CircuitState::Open => {
                let opened_at = *self.inner.opened_at.read().await;
                let elapsed = opened_at.map(|t| t.elapsed()).unwrap_or_default();
                if elapsed >= Duration::from_millis(self.inner.config.reset_timeout_ms) {
                    info!("circuit breaker reset timeout elapsed, probing");
                    self.inner
                        .state
                        .store(CircuitState::HalfOpen.into(), Ordering::SeqCst);
                    self.inner.consecutive_successes.store(0, Ordering::SeqCst);
                    true
                } else {
                    false
                }
            }
        }
    }

    async fn on_success(&self) {
        let state: CircuitState = self.inner.state.load(Ordering::SeqCst).into();
        self.inner.consecutive_failures.store(0, Ordering::SeqCst);
        if state == CircuitState::HalfOpen {
            let successes = self.inner.consecutive_successes.fetch_add(1, Ordering::SeqCst) + 1;
            if successes as u32 >= self.inner.config.success_threshold {
                info!("circuit breaker closing after successful probes");
                self.inner.state.store(CircuitState::Closed.into(), Ordering::SeqCst);
                self.inner.consecutive_successes.store(0, Ordering::SeqCst);
            }
        }
    }

    async fn on_failure(&self) {
        let state: CircuitState = self.inner.state.load(Ordering::SeqCst).into();
        if state == CircuitState::HalfOpen {
            warn!("probe failed while half-open, re-opening circuit");
            self.open().await;
            return;
        }
        let failures = self.inner.consecutive_failures.fetch_add(1, Ordering::SeqCst) + 1;
        if failures as u32 >= self.inner.config.failure_threshold {
            warn!(failures, "failure threshold reached, opening circuit");
            self.open().await;
        }
    }

    async fn open(&self) {
        self.inner.state.store(CircuitState::Open.into(), Ordering::SeqCst);
        self.inner.consecutive_successes.store(0, Ordering::SeqCst);
        *self.inner.opened_at.write().await = Some(Instant::now());
    }
}

#[derive(Debug, thiserror::Error)]
pub enum CallError<E> {
    #[error(transparent)]
    Rejected(#[from] CircuitBreakerOpenError),
    #[error("operation failed: {0}")]
    Operation(E),
}

#[cfg(test)]
mod tests {
    use super::*;

    fn config() -> CircuitBreakerConfig {
        CircuitBreakerConfig {
            failure_threshold: 2,
            success_threshold: 1,
            reset_timeout_ms: 20,
        }
    }

    #[tokio::test]
    async fn opens_after_threshold_failures() {
        let cb = CircuitBreaker::new(config());
        for _ in 0..2 {
            let _ = cb.call(|| async { Err::<(), &str>("boom") }).await;
        }
        assert_eq!(cb.stats().await.state, CircuitState::Open);

        let result = cb.call(|| async { Ok::<_, &str>(()) }).await;
        assert!(matches!(result, Err(CallError::Rejected(_))));
    }

    #[tokio::test]
    async fn half_opens_after_reset_timeout_and_closes_on_success() {
        let cb = CircuitBreaker::new(config());
        for _ in 0..2 {
            let _ = cb.call(|| async { Err::<(), &str>("boom") }).await;
        }
        tokio::time::sleep(Duration::from_millis(30)).await;

        let result = cb.call(|| async { Ok::<_, &str>(7) }).await;
        assert_eq!(result.unwrap(), 7);
        assert_eq!(cb.stats().await.state, CircuitState::Closed);
    }

    #[tokio::test]
    async fn half_open_probe_failure_reopens() {
        let cb = CircuitBreaker::new(config());
        for _ in 0..2 {
            let _ = cb.call(|| async { Err::<(), &str>("boom") }).await;
        }
        tokio::time::sleep(Duration::from_millis(30)).await;

        let _ = cb.call(|| async { Err::<(), &str>("still down") }).await;
        assert_eq!(cb.stats().await.state, CircuitState::Open);
    }
}
