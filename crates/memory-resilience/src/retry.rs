//! Retry with exponential backoff and a bounded total time budget.
//!
//! Ported from the agency's V2/V3 retry patterns: bounded attempts, jittered
//! exponential backoff, and a policy hook for deciding what is worth
//! retrying at all.

use rand::Rng;
use serde::{Deserialize, Serialize};
use std::time::Duration;
use tokio::time::{sleep, Instant};
use tracing::{error, warn};

/// Retry configuration. The gateway (§4.B) uses `max_attempts: 3` and a
/// `total_budget` of 30s; callers elsewhere may configure more generously.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RetryConfig {
    pub max_attempts: u32,
    pub initial_delay_ms: u64,
    pub max_delay_ms: u64,
    pub backoff_multiplier: f64,
    pub jitter_factor: f64,
    pub total_budget_ms: u64,
}

impl Default for RetryConfig {
    fn default() -> Self {
        Self {
            max_attempts: 3,
            initial_delay_ms: 250,
            max_delay_ms: 5_000,
            backoff_multiplier: 2.0,
            jitter_factor: 0.1,
            total_budget_ms: 30_000,
        }
    }
}

#[derive(Debug, thiserror::Error)]
pub enum RetryError<E> {
    #[error("max retry attempts ({attempts}) exceeded: {source}")]
    MaxAttemptsExceeded { attempts: u32, source: E },

    #[error("retry budget of {budget_ms}ms exhausted: {source}")]
    BudgetExhausted { budget_ms: u64, source: E },
}

impl<E> RetryError<E> {
    pub fn into_source(self) -> E {
        match self {
            RetryError::MaxAttemptsExceeded { source, .. } => source,
            RetryError::BudgetExhausted { source, .. } => source,
        }
    }
}

/// Execute `operation` with bounded, jittered exponential backoff. `should_retry`
/// decides, given the error and the attempt number, whether another try is
/// worth making — callers that only want to retry transient errors (and not,
/// say, a schema-violation `PlanError`) pass a narrower predicate.
pub async fn retry_with<F, Fut, T, E>(
    config: &RetryConfig,
    mut should_retry: impl FnMut(&E, u32) -> bool,
    mut operation: F,
) -> Result<T, RetryError<E>>
where
    F: FnMut() -> Fut,
    Fut: std::future::Future<Output = Result<T, E>>,
{
    let start = Instant::now();
    let mut attempt = 0u32;

    loop {
        attempt += 1;
        match operation().await {
            Ok(value) => return Ok(value),
            Err(error) => {
                let elapsed = start.elapsed();
                if elapsed.as_millis() as u64 >= config.total_budget_ms {
                    error!(attempt, "retry budget exhausted");
                    return Err(RetryError::BudgetExhausted {
                        budget_ms: config.total_budget_ms,
                        source: error,
                    });
                }
                if attempt >= config.max_attempts || !should_retry(&error, attempt) {
                    error!(attempt, "retry attempts exhausted");
                    return Err(RetryError::MaxAttemptsExceeded {
                        attempts: attempt,
                        source: error,
                    });
                }

                let delay = calculate_delay(config, attempt);
                warn!(attempt, delay_ms = delay, "retrying after failure");
                sleep(Duration::from_millis(delay)).await;
            }
        }
    }
}

fn calculate_delay(config: &RetryConfig, attempt: u32) -> u64 {
    let base = config.initial_delay_ms as f64 * config.backoff_multiplier.powi(attempt as i32 - 1);
    let capped = base.min(config.max_delay_ms as f64) as u64;
    if config.jitter_factor <= 0.0 {
        return capped;
    }
    let jitter_range = (capped as f64 * config.jitter_factor) as u64;
    let jitter = rand::thread_rng().gen_range(0..=jitter_range.max(1));
    capped.saturating_sub(jitter)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicU32, Ordering};
    use std::sync::Arc;

    #[tokio::test]
    async fn succeeds_first_try_without_delay() {
        let config = RetryConfig::default();
        let result: Result<i32, RetryError<&str>> =
            retry_with(&config, |_, _| true, || async { Ok(42) }).await;
        assert_eq!(result.unwrap(), 42);
    }

    #[tokio::test]
    async fn retries_then_succeeds() {
        let config = RetryConfig {
            initial_delay_ms: 1,
            max_delay_ms: 2,
            jitter_factor: 0.0,
            ..Default::default()
        };
        let attempts = Arc::new(AtomicU32::new(0));
        let attempts2 = attempts.clone();
        let result: Result<i32, RetryError<&str>> = retry_with(
            &config,
            |_, _| true,
            move || {
                let attempts = attempts2.clone();
                async move {
                    if attempts.fetch_add(1, Ordering::SeqCst) < 2 {
                        Err("transient")
                    } else {
                        Ok(7)
                    }
                }
            },
        )
        .await;
        assert_eq!(result.unwrap(), 7);
        assert_eq!(attempts.load(Ordering::SeqCst), 3);
    }

    #[tokio::test]
    async fn stops_at_max_attempts() {
        let config = RetryConfig {
            max_attempts: 2,
            initial_delay_ms: 1,
            max_delay_ms: 2,
            jitter_factor: 0.0,
            ..Default::default()
        };
        let result: Result<i32, RetryError<&str>> =
            retry_with(&config, |_, _| true, || async { Err("down") }).await;
        match result.unwrap_err() {
            RetryError::MaxAttemptsExceeded { attempts, .. } => assert_eq!(attempts, 2),
            other => panic!("unexpected: {other:?}"),
        }
    }

    #[tokio::test]
    async fn should_retry_false_stops_immediately() {
        let config = RetryConfig::default();
        let result: Result<i32, RetryError<&str>> =
            retry_with(&config, |_, _| false, || async { Err("fatal") }).await;
        match result.unwrap_err() {
            RetryError::MaxAttemptsExceeded { attempts, .. } => assert_eq!(attempts, 1),
            other => panic!("unexpected: {other:?}"),
        }
    }
}
