//! The Embedding/LLM Gateway (§4.B): `embed` and `plan`, wrapping a provider
//! pair with retry, a circuit breaker, and a content-keyed embedding cache.

use crate::provider::{ChatProvider, EmbeddingProvider, ProviderError};
use dashmap::DashMap;
use memory_resilience::{retry_with, CallError, CircuitBreaker, CircuitBreakerConfig, RetryConfig};
use sha2::{Digest, Sha256};
use std::sync::Arc;
use tracing::{instrument, warn};

#[derive(Debug, thiserror::Error)]
pub enum GatewayError {
    #[error("embedding failed: {0}")]
    Embed(String),
    #[error("plan failed: {0}")]
    Plan(String),
    #[error("gateway overloaded")]
    Overloaded,
}

pub struct Gateway {
    embedder: Arc<dyn EmbeddingProvider>,
    chat: Arc<dyn ChatProvider>,
    retry_config: RetryConfig,
    breaker: CircuitBreaker,
    cache: DashMap<String, Vec<f32>>,
}

impl Gateway {
    pub fn new(embedder: Arc<dyn EmbeddingProvider>, chat: Arc<dyn ChatProvider>) -> Self {
        Self::with_config(embedder, chat, RetryConfig::default(), CircuitBreakerConfig::default())
    }

    pub fn with_config(
        embedder: Arc<dyn EmbeddingProvider>,
        chat: Arc<dyn ChatProvider>,
        retry_config: RetryConfig,
        breaker_config: CircuitBreakerConfig,
    ) -> Self {
        Self {
            embedder,
            chat,
            retry_config,
            breaker: CircuitBreaker::new(breaker_config),
            cache: DashMap::new(),
        }
    }

    pub fn dimension(&self) -> usize {
        self.embedder.dimension()
    }

    /// Produce a unit-normalized embedding for `text`, serving from the
    /// content-hash-keyed cache on hit (§4.B: cache is an implementation
    /// detail, never a correctness dependency — a miss always falls
    /// through to the provider).
    #[instrument(skip(self, text), fields(len = text.len()))]
    pub async fn embed(&self, text: &str) -> Result<Vec<f32>, GatewayError> {
        let key = cache_key(text);
        if let Some(cached) = self.cache.get(&key) {
            return Ok(cached.clone());
        }

        let embedder = self.embedder.clone();
        let text_owned = text.to_string();
        let result = self
            .breaker
            .call(|| {
                let embedder = embedder.clone();
                let text_owned = text_owned.clone();
                async move {
                    retry_with(
                        &self.retry_config,
                        |_, _| true,
                        move || {
                            let embedder = embedder.clone();
                            let text_owned = text_owned.clone();
                            async move { embedder.embed_batch(&[text_owned]).await }
                        },
                    )
                    .await
                    .map_err(|e| e.into_source())
                }
            })
            .await;

        let mut vectors = match result {
            Ok(vectors) => vectors,
            Err(CallError::Rejected(_)) => return Err(GatewayError::Overloaded),
            Err(CallError::Operation(e)) => return Err(GatewayError::Embed(e.to_string())),
        };
        let vector = vectors.pop().ok_or_else(|| GatewayError::Embed("empty embedding batch".to_string()))?;

        self.cache.insert(key, vector.clone());
        Ok(vector)
    }

    pub async fn embed_batch(&self, texts: &[String]) -> Result<Vec<Vec<f32>>, GatewayError> {
        let mut out = Vec::with_capacity(texts.len());
        for text in texts {
            out.push(self.embed(text).await?);
        }
        Ok(out)
    }

    /// Send `prompt` to the chat model and parse the response as `T`.
    /// Schema validation is the `serde::Deserialize` impl of `T` — a
    /// malformed or schema-violating response fails to parse and is
    /// surfaced as `GatewayError::Plan`, matching §4.B's `PlanError`.
    #[instrument(skip(self, prompt), fields(len = prompt.len()))]
    pub async fn plan<T: serde::de::DeserializeOwned>(&self, prompt: &str) -> Result<T, GatewayError> {
        let chat = self.chat.clone();
        let prompt_owned = prompt.to_string();
        let result = self
            .breaker
            .call(|| {
                let chat = chat.clone();
                let prompt_owned = prompt_owned.clone();
                async move {
                    retry_with(
                        &self.retry_config,
                        |_, _| true,
                        move || {
                            let chat = chat.clone();
                            let prompt_owned = prompt_owned.clone();
                            async move { chat.complete(&prompt_owned).await }
                        },
                    )
                    .await
                    .map_err(|e| e.into_source())
                }
            })
            .await;

        let raw = match result {
            Ok(raw) => raw,
            Err(CallError::Rejected(_)) => return Err(GatewayError::Overloaded),
            Err(CallError::Operation(e)) => return Err(GatewayError::Plan(e.to_string())),
        };

        if raw.trim().is_empty() {
            return Err(GatewayError::Plan("empty response".to_string()));
        }

        serde_json::from_str(&raw).map_err(|e| {
            warn!(error = %e, "plan response failed schema validation");
            GatewayError::Plan(format!("schema violation: {e}"))
        })
    }
}

fn cache_key(text: &str) -> String {
    let mut hasher = Sha256::new();
    hasher.update(text.trim().as_bytes());
    format!("{:x}", hasher.finalize())
}

impl From<ProviderError> for GatewayError {
    fn from(err: ProviderError) -> Self {
        GatewayError::Embed(err.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::provider::DeterministicProvider;

    fn gateway() -> Gateway {
        let provider = Arc::new(DeterministicProvider::new(8));
        Gateway::new(provider.clone(), provider)
    }

    #[tokio::test]
    async fn embed_is_cached_after_first_call() {
        let gateway = gateway();
        let first = gateway.embed("loves pizza").await.unwrap();
        let second = gateway.embed("loves pizza").await.unwrap();
        assert_eq!(first, second);
        assert_eq!(gateway.cache.len(), 1);
    }

    #[tokio::test]
    async fn plan_parses_scripted_json_response() {
        let provider = Arc::new(DeterministicProvider::new(4).with_default_completion("[\"loves pizza\"]"));
        let gateway = Gateway::new(provider.clone(), provider);
        let facts: Vec<String> = gateway.plan("extract").await.unwrap();
        assert_eq!(facts, vec!["loves pizza".to_string()]);
    }

    #[tokio::test]
    async fn plan_rejects_malformed_json() {
        let provider = Arc::new(DeterministicProvider::new(4).with_default_completion("not json"));
        let gateway = Gateway::new(provider.clone(), provider);
        let result: Result<Vec<String>, GatewayError> = gateway.plan("extract").await;
        assert!(matches!(result, Err(GatewayError::Plan(_))));
    }

    #[tokio::test]
    async fn plan_rejects_empty_response() {
        let provider = Arc::new(DeterministicProvider::new(4).with_default_completion(""));
        let gateway = Gateway::new(provider.clone(), provider);
        let result: Result<Vec<String>, GatewayError> = gateway.plan("extract").await;
        assert!(matches!(result, Err(GatewayError::Plan(_))));
    }
}
