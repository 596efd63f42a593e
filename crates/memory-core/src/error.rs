//! Error taxonomy shared by every layer of the memory engine.
//!
//! One enum per §7 of the spec: each variant names a kind, not a type, so the
//! remote access surface can map it onto a fixed set of JSON-RPC error codes
//! without guessing at intent.

/// Result type used throughout the memory engine.
pub type MemoryResult<T> = Result<T, MemoryError>;

#[derive(Debug, thiserror::Error)]
pub enum MemoryError {
    #[error("invalid scope: {0}")]
    InvalidScope(String),

    #[error("validation error: {0}")]
    Validation(String),

    #[error("not found: {0}")]
    NotFound(String),

    #[error("invalid state transition: {0}")]
    InvalidStateTransition(String),

    #[error("embedding provider error: {0}")]
    Embed(String),

    #[error("planner error: {0}")]
    Plan(String),

    #[error("store error: {0}")]
    Store(String),

    #[error("operation timed out: {0}")]
    Timeout(String),

    #[error("overloaded: {0}")]
    Overloaded(String),

    #[error("partial failure: {0}")]
    PartialFailure(String),

    #[error("serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("unknown memory error: {0}")]
    Other(String),
}

impl From<anyhow::Error> for MemoryError {
    fn from(err: anyhow::Error) -> Self {
        MemoryError::Other(err.to_string())
    }
}

impl MemoryError {
    /// Whether a caller should retry this operation as-is.
    pub fn is_retriable(&self) -> bool {
        matches!(
            self,
            MemoryError::Embed(_)
                | MemoryError::Store(_)
                | MemoryError::Timeout(_)
                | MemoryError::Overloaded(_)
        )
    }
}
