//! In-memory store backend
//!
//! DashMap-backed implementation of the key-value/vector contract with lazy
//! TTL expiry. Serves as the default backend for local runs and as the store
//! used throughout the test suite.

use std::time::{Duration, Instant};

use async_trait::async_trait;
use dashmap::DashMap;

use crate::error::Result;
use crate::store::{KeyValueStore, ScoredRecord, cosine_similarity};

#[derive(Debug, Clone)]
struct Entry {
    value: String,
    embedding: Option<Vec<f32>>,
    expires_at: Instant,
}

impl Entry {
    fn is_expired(&self) -> bool {
        Instant::now() >= self.expires_at
    }
}

/// DashMap-backed store with per-key TTL.
///
/// Expired entries are dropped lazily: reads treat them as absent and remove
/// them on contact, scans and searches skip them.
#[derive(Debug, Default)]
pub struct InMemoryStore {
    entries: DashMap<String, Entry>,
}

impl InMemoryStore {
    pub fn new() -> Self {
        Self {
            entries: DashMap::new(),
        }
    }

    fn insert(&self, key: &str, value: String, embedding: Option<Vec<f32>>, ttl: Duration) {
        self.entries.insert(
            key.to_string(),
            Entry {
                value,
                embedding,
                expires_at: Instant::now() + ttl,
            },
        );
    }
}

#[async_trait]
impl KeyValueStore for InMemoryStore {
    async fn get(&self, key: &str) -> Result<Option<String>> {
        if let Some(entry) = self.entries.get(key) {
            if entry.is_expired() {
                drop(entry);
                self.entries.remove(key);
                return Ok(None);
            }
            return Ok(Some(entry.value.clone()));
        }
        Ok(None)
    }

    async fn put(&self, key: &str, value: String, ttl: Duration) -> Result<()> {
        self.insert(key, value, None, ttl);
        Ok(())
    }

    async fn put_with_embedding(
        &self,
        key: &str,
        value: String,
        embedding: Vec<f32>,
        ttl: Duration,
    ) -> Result<()> {
        self.insert(key, value, Some(embedding), ttl);
        Ok(())
    }

    async fn scan(&self, prefix: &str) -> Result<Vec<String>> {
        let mut keys: Vec<String> = self
            .entries
            .iter()
            .filter(|e| e.key().starts_with(prefix) && !e.value().is_expired())
            .map(|e| e.key().clone())
            .collect();
        keys.sort();
        Ok(keys)
    }

    async fn delete(&self, keys: &[String]) -> Result<usize> {
        let mut removed = 0;
        for key in keys {
            if self.entries.remove(key).is_some() {
                removed += 1;
            }
        }
        Ok(removed)
    }

    async fn vector_search(
        &self,
        prefix: &str,
        embedding: &[f32],
        top_k: usize,
    ) -> Result<Vec<ScoredRecord>> {
        if top_k == 0 {
            return Ok(Vec::new());
        }

        let mut results: Vec<ScoredRecord> = self
            .entries
            .iter()
            .filter(|e| e.key().starts_with(prefix) && !e.value().is_expired())
            .filter_map(|e| {
                let entry = e.value();
                entry.embedding.as_ref().map(|emb| ScoredRecord {
                    key: e.key().clone(),
                    value: entry.value.clone(),
                    score: cosine_similarity(embedding, emb),
                })
            })
            .collect();

        results.sort_by(|a, b| {
            b.score
                .total_cmp(&a.score)
                .then_with(|| a.key.cmp(&b.key))
        });
        results.truncate(top_k);
        Ok(results)
    }

    async fn count(&self, prefix: &str) -> Result<usize> {
        Ok(self
            .entries
            .iter()
            .filter(|e| e.key().starts_with(prefix) && !e.value().is_expired())
            .count())
    }
}
