//! Embedding backends
//!
//! The memory tiers treat embedding as an external collaborator: text in,
//! fixed-dimension float vector out, deterministic for a given model version.
//! Two backends are provided: an HTTP client for a local embedding endpoint
//! and a deterministic hash-based fallback for offline runs and tests. A
//! caching wrapper keyed by content hash sits in front of either.

use std::num::NonZeroUsize;
use std::time::Duration;

use async_trait::async_trait;
use lru::LruCache;
use tokio::sync::Mutex;

use crate::config::EmbeddingConfig;
use crate::error::{Result, VitalisError};

/// Async contract for embedding generation.
#[async_trait]
pub trait Embedder: Send + Sync {
    /// Generate an embedding for `text`.
    async fn embed(&self, text: &str) -> Result<Vec<f32>>;

    /// Dimension of the vectors this embedder produces.
    fn dimension(&self) -> usize;
}

/// Deterministic hash-based embedder.
///
/// Produces stable pseudo-random vectors in [-1, 1] from the input text hash.
/// No semantic signal, but deterministic and dependency-free: similar enough
/// for exercising the vector plumbing offline and in tests.
#[derive(Debug, Clone)]
pub struct HashEmbedder {
    dimension: usize,
}

impl HashEmbedder {
    pub fn new(dimension: usize) -> Self {
        Self { dimension }
    }
}

#[async_trait]
impl Embedder for HashEmbedder {
    async fn embed(&self, text: &str) -> Result<Vec<f32>> {
        use std::collections::hash_map::DefaultHasher;
        use std::hash::{Hash, Hasher};

        let mut hasher = DefaultHasher::new();
        text.hash(&mut hasher);
        let seed = hasher.finish();

        Ok((0..self.dimension)
            .map(|i| {
                let x = seed
                    .wrapping_mul(i as u64 + 1)
                    .wrapping_add(0x9e3779b97f4a7c15);
                let normalized = (x as f32) / (u64::MAX as f32);
                (normalized * 2.0) - 1.0
            })
            .collect())
    }

    fn dimension(&self) -> usize {
        self.dimension
    }
}

/// HTTP embedder against a local embedding endpoint (Ollama-style API).
pub struct HttpEmbedder {
    client: reqwest::Client,
    endpoint: String,
    model: String,
    dimension: usize,
}

impl HttpEmbedder {
    pub fn new(endpoint: String, model: String, dimension: usize) -> Result<Self> {
        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(30))
            .build()
            .map_err(|e| VitalisError::Embedding(format!("Failed to create HTTP client: {e}")))?;

        Ok(Self {
            client,
            endpoint,
            model,
            dimension,
        })
    }
}

#[async_trait]
impl Embedder for HttpEmbedder {
    async fn embed(&self, text: &str) -> Result<Vec<f32>> {
        let url = format!("{}/api/embeddings", self.endpoint.trim_end_matches('/'));
        let body = serde_json::json!({
            "model": self.model,
            "prompt": text,
        });

        let response = self
            .client
            .post(&url)
            .json(&body)
            .send()
            .await
            .map_err(|e| VitalisError::Embedding(format!("Embedding request failed: {e}")))?;

        if !response.status().is_success() {
            return Err(VitalisError::Embedding(format!(
                "Embedding endpoint returned {}",
                response.status()
            )));
        }

        let payload: serde_json::Value = response
            .json()
            .await
            .map_err(|e| VitalisError::Embedding(format!("Invalid embedding response: {e}")))?;

        let vector: Vec<f32> = payload
            .get("embedding")
            .and_then(|v| v.as_array())
            .ok_or_else(|| {
                VitalisError::Embedding("Embedding response missing 'embedding' array".to_string())
            })?
            .iter()
            .filter_map(|v| v.as_f64().map(|f| f as f32))
            .collect();

        if vector.is_empty() {
            return Err(VitalisError::Embedding(
                "Embedding endpoint returned an empty vector".to_string(),
            ));
        }

        Ok(vector)
    }

    fn dimension(&self) -> usize {
        self.dimension
    }
}

/// Caching wrapper around any embedder, keyed by content hash.
pub struct CachedEmbedder<E> {
    inner: E,
    cache: Mutex<LruCache<u64, Vec<f32>>>,
}

impl<E: Embedder> CachedEmbedder<E> {
    pub fn new(inner: E, capacity: usize) -> Self {
        let capacity = NonZeroUsize::new(capacity.max(1)).expect("capacity is at least 1");
        Self {
            inner,
            cache: Mutex::new(LruCache::new(capacity)),
        }
    }

    fn content_hash(text: &str) -> u64 {
        use std::collections::hash_map::DefaultHasher;
        use std::hash::{Hash, Hasher};

        let mut hasher = DefaultHasher::new();
        text.hash(&mut hasher);
        hasher.finish()
    }
}

#[async_trait]
impl<E: Embedder> Embedder for CachedEmbedder<E> {
    async fn embed(&self, text: &str) -> Result<Vec<f32>> {
        let key = Self::content_hash(text);

        if let Some(cached) = self.cache.lock().await.get(&key) {
            return Ok(cached.clone());
        }

        let vector = self.inner.embed(text).await?;
        self.cache.lock().await.put(key, vector.clone());
        Ok(vector)
    }

    fn dimension(&self) -> usize {
        self.inner.dimension()
    }
}

/// Build the configured embedder behind a trait object.
///
/// An HTTP endpoint is used when configured; otherwise the deterministic hash
/// fallback keeps the memory tiers functional offline.
pub fn build_embedder(config: &EmbeddingConfig) -> Result<Box<dyn Embedder>> {
    match &config.endpoint {
        Some(endpoint) if !endpoint.is_empty() => {
            let http = HttpEmbedder::new(endpoint.clone(), config.model.clone(), config.dimension)?;
            Ok(Box::new(CachedEmbedder::new(http, config.cache_size)))
        }
        _ => {
            tracing::info!("No embedding endpoint configured, using deterministic fallback");
            Ok(Box::new(CachedEmbedder::new(
                HashEmbedder::new(config.dimension),
                config.cache_size,
            )))
        }
    }
}
