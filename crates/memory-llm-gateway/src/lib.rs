//! Embedding/LLM Gateway (§4.B): pluggable embed/plan operations over a
//! provider pair, with retry, circuit breaking, and a content-hash cache.

pub mod gateway;
pub mod provider;

pub use gateway::{Gateway, GatewayError};
pub use provider::{ChatProvider, DeterministicProvider, EmbeddingProvider, HttpProvider, ProviderError};
