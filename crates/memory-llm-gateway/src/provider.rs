//! Provider traits and two concrete implementations (§4.B), grounded in
//! `embedding-service::provider`'s `EmbeddingProvider` trait and its Ollama
//! / dummy implementations, generalized with a matching `ChatProvider`.

use async_trait::async_trait;

#[derive(Debug, thiserror::Error)]
pub enum ProviderError {
    #[error("provider request failed: {0}")]
    Request(String),
    #[error("provider returned malformed response: {0}")]
    Malformed(String),
    #[error("provider returned dimension {got}, expected {expected}")]
    DimensionMismatch { got: usize, expected: usize },
}

#[async_trait]
pub trait EmbeddingProvider: Send + Sync {
    async fn embed_batch(&self, texts: &[String]) -> Result<Vec<Vec<f32>>, ProviderError>;
    fn dimension(&self) -> usize;
    fn model_name(&self) -> &str;
    async fn health_check(&self) -> Result<bool, ProviderError>;
}

#[async_trait]
pub trait ChatProvider: Send + Sync {
    async fn complete(&self, prompt: &str) -> Result<String, ProviderError>;
    fn model_name(&self) -> &str;
}

/// Ollama-shaped HTTP provider: POST `{base_url}/api/embeddings` and
/// `{base_url}/api/chat`, grounded in `OllamaEmbeddingProvider`.
pub struct HttpProvider {
    client: reqwest::Client,
    embedding_url: String,
    chat_url: String,
    embedding_model: String,
    chat_model: String,
    dimension: usize,
}

impl HttpProvider {
    pub fn new(
        embedding_url: impl Into<String>,
        chat_url: impl Into<String>,
        embedding_model: impl Into<String>,
        chat_model: impl Into<String>,
        dimension: usize,
        request_timeout: std::time::Duration,
    ) -> Self {
        let client = reqwest::Client::builder()
            .timeout(request_timeout)
            .build()
            .expect("failed to build HTTP client");
        Self {
            client,
            embedding_url: embedding_url.into(),
            chat_url: chat_url.into(),
            embedding_model: embedding_model.into(),
            chat_model: chat_model.into(),
            dimension,
        }
    }
}

#[async_trait]
impl EmbeddingProvider for HttpProvider {
    async fn embed_batch(&self, texts: &[String]) -> Result<Vec<Vec<f32>>, ProviderError> {
        let mut embeddings = Vec::with_capacity(texts.len());
        for text in texts {
            let body = serde_json::json!({ "model": self.embedding_model, "prompt": text });
            let response = self
                .client
                .post(&self.embedding_url)
                .json(&body)
                .send()
                .await
                .map_err(|e| ProviderError::Request(e.to_string()))?;

            if !response.status().is_success() {
                return Err(ProviderError::Request(format!(
                    "embedding endpoint returned {}",
                    response.status()
                )));
            }

            let parsed: serde_json::Value = response
                .json()
                .await
                .map_err(|e| ProviderError::Malformed(e.to_string()))?;
            let values = parsed["embedding"]
                .as_array()
                .ok_or_else(|| ProviderError::Malformed("missing 'embedding' array".to_string()))?;
            let vector: Vec<f32> = values.iter().map(|v| v.as_f64().unwrap_or(0.0) as f32).collect();

            if vector.len() != self.dimension {
                return Err(ProviderError::DimensionMismatch {
                    got: vector.len(),
                    expected: self.dimension,
                });
            }
            embeddings.push(vector);
        }
        Ok(embeddings)
    }

    fn dimension(&self) -> usize {
        self.dimension
    }

    fn model_name(&self) -> &str {
        &self.embedding_model
    }

    async fn health_check(&self) -> Result<bool, ProviderError> {
        let response = self
            .client
            .get(&self.embedding_url)
            .send()
            .await
            .map_err(|e| ProviderError::Request(e.to_string()))?;
        Ok(response.status().is_success() || response.status().as_u16() == 405)
    }
}

#[async_trait]
impl ChatProvider for HttpProvider {
    async fn complete(&self, prompt: &str) -> Result<String, ProviderError> {
        let body = serde_json::json!({
            "model": self.chat_model,
            "messages": [{ "role": "user", "content": prompt }],
            "stream": false,
        });
        let response = self
            .client
            .post(&self.chat_url)
            .json(&body)
            .send()
            .await
            .map_err(|e| ProviderError::Request(e.to_string()))?;

        if !response.status().is_success() {
            return Err(ProviderError::Request(format!(
                "chat endpoint returned {}",
                response.status()
            )));
        }

        let parsed: serde_json::Value = response
            .json()
            .await
            .map_err(|e| ProviderError::Malformed(e.to_string()))?;
        parsed["message"]["content"]
            .as_str()
            .map(str::to_string)
            .ok_or_else(|| ProviderError::Malformed("missing 'message.content'".to_string()))
    }

    fn model_name(&self) -> &str {
        &self.chat_model
    }
}

/// Deterministic, hash-seeded provider for tests, grounded in
/// `DummyEmbeddingProvider`. Never makes a network call.
pub struct DeterministicProvider {
    dimension: usize,
    scripted_completions: dashmap::DashMap<String, String>,
    default_completion: String,
}

impl DeterministicProvider {
    pub fn new(dimension: usize) -> Self {
        Self {
            dimension,
            scripted_completions: dashmap::DashMap::new(),
            default_completion: "[]".to_string(),
        }
    }

    /// Script an exact-match response for a given prompt, for tests that
    /// need to drive the planner down a specific path.
    pub fn script(&self, prompt: impl Into<String>, completion: impl Into<String>) {
        self.scripted_completions.insert(prompt.into(), completion.into());
    }

    pub fn with_default_completion(mut self, completion: impl Into<String>) -> Self {
        self.default_completion = completion.into();
        self
    }
}

#[async_trait]
impl EmbeddingProvider for DeterministicProvider {
    async fn embed_batch(&self, texts: &[String]) -> Result<Vec<Vec<f32>>, ProviderError> {
        Ok(texts.iter().map(|text| deterministic_vector(text, self.dimension)).collect())
    }

    fn dimension(&self) -> usize {
        self.dimension
    }

    fn model_name(&self) -> &str {
        "deterministic-test-provider"
    }

    async fn health_check(&self) -> Result<bool, ProviderError> {
        Ok(true)
    }
}

#[async_trait]
impl ChatProvider for DeterministicProvider {
    async fn complete(&self, prompt: &str) -> Result<String, ProviderError> {
        Ok(self
            .scripted_completions
            .get(prompt)
            .map(|entry| entry.value().clone())
            .unwrap_or_else(|| self.default_completion.clone()))
    }

    fn model_name(&self) -> &str {
        "deterministic-test-provider"
    }
}

fn deterministic_vector(text: &str, dimension: usize) -> Vec<f32> {
    use std::hash::{Hash, Hasher};
    let mut hasher = std::collections::hash_map::DefaultHasher::new();
    text.hash(&mut hasher);
    let hash = hasher.finish();

    let mut vector: Vec<f32> = (0..dimension)
        .map(|i| {
            let seed = hash.wrapping_add(i as u64);
            (seed % 1000) as f32 / 1000.0 * 2.0 - 1.0
        })
        .collect();

    let norm: f32 = vector.iter().map(|x| x * x).sum::<f32>().sqrt();
    if norm > 0.0 {
        for value in vector.iter_mut() {
            *value /= norm;
        }
    }
    vector
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn deterministic_provider_is_stable_across_calls() {
        let provider = DeterministicProvider::new(8);
        let a = provider.embed_batch(&["loves pizza".to_string()]).await.unwrap();
        let b = provider.embed_batch(&["loves pizza".to_string()]).await.unwrap();
        assert_eq!(a, b);
    }

    #[tokio::test]
    async fn scripted_completion_overrides_default() {
        let provider = DeterministicProvider::new(4).with_default_completion("[]".to_string());
        provider.script("extract facts", "[\"loves pizza\"]");

        assert_eq!(provider.complete("extract facts").await.unwrap(), "[\"loves pizza\"]");
        assert_eq!(provider.complete("anything else").await.unwrap(), "[]");
    }
}
