//! Key-value/vector store contract
//!
//! All four memory tiers are built on this contract: per-key get/put with TTL,
//! prefix scans, and vector similarity search over embedded records. The
//! backend is expected to provide per-key atomicity only; the tiers do not
//! assume cross-key transactions.

pub mod memory;

use std::time::Duration;

use async_trait::async_trait;

use crate::error::Result;

pub use memory::InMemoryStore;

/// A record returned from a vector search, ranked by similarity.
#[derive(Debug, Clone)]
pub struct ScoredRecord {
    /// Key the record is stored under
    pub key: String,
    /// Serialized record payload (JSON)
    pub value: String,
    /// Cosine similarity against the query embedding (0-1)
    pub score: f32,
}

/// Async contract for the backing key-value/vector store.
///
/// Every write carries a TTL; no tier is allowed unbounded growth.
#[async_trait]
pub trait KeyValueStore: Send + Sync {
    /// Fetch the value stored under `key`, if present and unexpired.
    async fn get(&self, key: &str) -> Result<Option<String>>;

    /// Store `value` under `key` with the given TTL.
    async fn put(&self, key: &str, value: String, ttl: Duration) -> Result<()>;

    /// Store `value` under `key` together with an embedding for vector search.
    async fn put_with_embedding(
        &self,
        key: &str,
        value: String,
        embedding: Vec<f32>,
        ttl: Duration,
    ) -> Result<()>;

    /// List all unexpired keys starting with `prefix`.
    async fn scan(&self, prefix: &str) -> Result<Vec<String>>;

    /// Delete the given keys, returning how many existed.
    async fn delete(&self, keys: &[String]) -> Result<usize>;

    /// Rank embedded records under `prefix` by cosine similarity to
    /// `embedding`, returning at most `top_k` results.
    async fn vector_search(
        &self,
        prefix: &str,
        embedding: &[f32],
        top_k: usize,
    ) -> Result<Vec<ScoredRecord>>;

    /// Count unexpired keys under `prefix`.
    async fn count(&self, prefix: &str) -> Result<usize>;
}

/// Cosine similarity between two vectors, clamped to [-1, 1].
///
/// Mismatched lengths and zero vectors score 0.0.
pub fn cosine_similarity(a: &[f32], b: &[f32]) -> f32 {
    if a.len() != b.len() || a.is_empty() {
        return 0.0;
    }

    let dot: f32 = a.iter().zip(b.iter()).map(|(x, y)| x * y).sum();
    let norm_a: f32 = a.iter().map(|x| x * x).sum::<f32>().sqrt();
    let norm_b: f32 = b.iter().map(|x| x * x).sum::<f32>().sqrt();

    if norm_a == 0.0 || norm_b == 0.0 {
        return 0.0;
    }

    (dot / (norm_a * norm_b)).clamp(-1.0, 1.0)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_cosine_similarity_identical() {
        let v = vec![1.0, 0.0, 0.0];
        let sim = cosine_similarity(&v, &v);
        assert!((sim - 1.0).abs() < 0.001);
    }

    #[test]
    fn test_cosine_similarity_orthogonal() {
        let v1 = vec![1.0, 0.0, 0.0];
        let v2 = vec![0.0, 1.0, 0.0];
        assert!(cosine_similarity(&v1, &v2).abs() < 0.001);
    }

    #[test]
    fn test_cosine_similarity_empty_or_mismatched() {
        assert_eq!(cosine_similarity(&[], &[]), 0.0);
        assert_eq!(cosine_similarity(&[1.0, 0.0], &[1.0, 0.0, 0.0]), 0.0);
    }

    #[test]
    fn test_cosine_similarity_zero_vector() {
        let v1 = vec![0.0, 0.0, 0.0];
        let v2 = vec![1.0, 2.0, 3.0];
        assert_eq!(cosine_similarity(&v1, &v2), 0.0);
    }
}
