//! Retry-with-backoff and circuit breaker primitives shared by the LLM
//! gateway and the store adapters (§4.B, §5).

pub mod circuit_breaker;
pub mod retry;

pub use circuit_breaker::{CallError, CircuitBreaker, CircuitBreakerConfig, CircuitBreakerOpenError, CircuitBreakerStats, CircuitState};
pub use retry::{retry_with, RetryConfig, RetryError};
