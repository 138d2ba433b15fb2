//! Embedding provider abstraction, wired through the storage circuit breaker.

use async_trait::async_trait;

use crate::constants::defaults;
use crate::error::{Error, Result};
use crate::storage::circuit_breaker::CircuitBreaker;

/// Produces a dense embedding vector for a piece of text.
#[async_trait]
pub trait EmbeddingProvider: Send + Sync {
    /// Embed `text` into a fixed-dimension vector.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Embedding`] on provider failure.
    async fn embed(&self, text: &str) -> Result<Vec<f32>>;

    /// Dimensionality this provider returns.
    fn dimension(&self) -> usize;
}

/// Always-available fallback used when no embedding provider is
/// configured. Returns a deterministic zero vector so hybrid search can
/// still run with cosine similarity degrading to its `0.5` fallback.
pub struct NullProvider {
    dimension: usize,
}

impl NullProvider {
    #[must_use]
    pub fn new(dimension: usize) -> Self {
        Self { dimension }
    }
}

impl Default for NullProvider {
    fn default() -> Self {
        Self::new(defaults::EMBEDDING_DIMENSION)
    }
}

#[async_trait]
impl EmbeddingProvider for NullProvider {
    async fn embed(&self, _text: &str) -> Result<Vec<f32>> {
        Ok(vec![0.0; self.dimension])
    }

    fn dimension(&self) -> usize {
        self.dimension
    }
}

#[cfg(feature = "http-embeddings")]
mod http {
    use super::{async_trait, defaults, EmbeddingProvider, Error, Result};
    use serde::Deserialize;

    /// Thin client for an OpenAI-compatible embeddings HTTP endpoint.
    pub struct HttpProvider {
        client: reqwest::Client,
        endpoint: String,
        api_key: String,
        model: String,
        dimension: usize,
    }

    #[derive(Deserialize)]
    struct EmbeddingResponseItem {
        embedding: Vec<f32>,
    }

    #[derive(Deserialize)]
    struct EmbeddingResponse {
        data: Vec<EmbeddingResponseItem>,
    }

    impl HttpProvider {
        #[must_use]
        pub fn new(endpoint: String, api_key: String, model: String) -> Self {
            Self {
                client: reqwest::Client::new(),
                endpoint,
                api_key,
                model,
                dimension: defaults::EMBEDDING_DIMENSION,
            }
        }
    }

    #[async_trait]
    impl EmbeddingProvider for HttpProvider {
        async fn embed(&self, text: &str) -> Result<Vec<f32>> {
            let response = self
                .client
                .post(&self.endpoint)
                .bearer_auth(&self.api_key)
                .json(&serde_json::json!({ "input": text, "model": self.model }))
                .send()
                .await
                .map_err(|e| Error::Embedding(e.to_string()))?;

            let parsed: EmbeddingResponse = response
                .json()
                .await
                .map_err(|e| Error::Embedding(e.to_string()))?;

            parsed
                .data
                .into_iter()
                .next()
                .map(|item| item.embedding)
                .ok_or_else(|| Error::Embedding("empty embeddings response".to_string()))
        }

        fn dimension(&self) -> usize {
            self.dimension
        }
    }
}

#[cfg(feature = "http-embeddings")]
pub use http::HttpProvider;

/// Wraps any [`EmbeddingProvider`] with circuit-breaker-guarded retry.
pub struct GuardedProvider<P> {
    inner: P,
    breaker: CircuitBreaker,
}

impl<P: EmbeddingProvider> GuardedProvider<P> {
    #[must_use]
    pub fn new(inner: P, breaker: CircuitBreaker) -> Self {
        Self { inner, breaker }
    }
}

#[async_trait]
impl<P: EmbeddingProvider> EmbeddingProvider for GuardedProvider<P> {
    async fn embed(&self, text: &str) -> Result<Vec<f32>> {
        self.breaker.call(|| self.inner.embed(text)).await
    }

    fn dimension(&self) -> usize {
        self.inner.dimension()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn null_provider_returns_zero_vector_of_configured_dimension() {
        let provider = NullProvider::new(8);
        let embedding = provider.embed("hello").await.unwrap();
        assert_eq!(embedding.len(), 8);
        assert!(embedding.iter().all(|&v| v == 0.0));
    }

    #[tokio::test]
    async fn guarded_provider_delegates_to_inner_provider() {
        let breaker = CircuitBreaker::new(crate::storage::circuit_breaker::CircuitBreakerConfig::default());
        let guarded = GuardedProvider::new(NullProvider::new(4), breaker);
        let embedding = guarded.embed("hello").await.unwrap();
        assert_eq!(embedding.len(), 4);
    }
}
