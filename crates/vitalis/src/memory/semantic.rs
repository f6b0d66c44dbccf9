//! Semantic memory: general verified health facts
//!
//! Bulk-loaded at startup from the built-in knowledge base and retrieved by
//! vector similarity. Read-mostly at runtime; facts derived from conversation
//! land under a separate key prefix so the cascade clear can remove them
//! without touching the verified base.

use std::sync::Arc;
use std::time::Duration;

use uuid::Uuid;

use crate::embedding::Embedder;
use crate::error::{Result, VitalisError};
use crate::memory::knowledge::VERIFIED_FACTS;
use crate::memory::types::SemanticFact;
use crate::store::KeyValueStore;

const KEY_PREFIX: &str = "vitalis:se:";
const BASE_PREFIX: &str = "vitalis:se:kb:";
const DERIVED_PREFIX: &str = "vitalis:se:derived:";

/// Vector-indexed store for general health knowledge.
pub struct SemanticStore {
    store: Arc<dyn KeyValueStore>,
    embedder: Arc<dyn Embedder>,
    ttl: Duration,
}

impl SemanticStore {
    pub fn new(store: Arc<dyn KeyValueStore>, embedder: Arc<dyn Embedder>, ttl: Duration) -> Self {
        Self {
            store,
            embedder,
            ttl,
        }
    }

    /// Load the built-in verified knowledge base. Called once at startup;
    /// reloading refreshes TTLs in place.
    pub async fn load_knowledge_base(&self) -> Result<usize> {
        let mut loaded = 0;
        for (idx, entry) in VERIFIED_FACTS.iter().enumerate() {
            let fact = entry.to_fact();
            let key = format!("{BASE_PREFIX}{idx}");
            self.put_fact(&key, &fact).await?;
            loaded += 1;
        }
        tracing::info!("Loaded {loaded} verified facts into semantic memory");
        Ok(loaded)
    }

    /// Store a fact derived from conversation. Lowest-priority write path;
    /// facts stored here are still never user-specific.
    pub async fn store_derived_fact(&self, fact: &SemanticFact) -> Result<()> {
        let key = format!("{DERIVED_PREFIX}{}", Uuid::new_v4());
        self.put_fact(&key, fact).await
    }

    /// Facts most similar to the query, best first.
    pub async fn similar_facts(&self, query: &str, top_k: usize) -> Result<Vec<SemanticFact>> {
        let embedding = self.embedder.embed(query).await?;
        let records = self
            .store
            .vector_search(KEY_PREFIX, &embedding, top_k)
            .await?;

        Ok(records
            .into_iter()
            .filter_map(|r| match serde_json::from_str::<SemanticFact>(&r.value) {
                Ok(fact) => Some(fact),
                Err(e) => {
                    tracing::warn!("Skipping malformed fact record {}: {e}", r.key);
                    None
                }
            })
            .collect())
    }

    /// Number of stored facts, verified and derived.
    pub async fn count(&self) -> Result<usize> {
        self.store.count(KEY_PREFIX).await
    }

    /// Delete conversation-derived facts. The verified base is kept.
    pub async fn clear_derived(&self) -> Result<usize> {
        let keys = self.store.scan(DERIVED_PREFIX).await?;
        self.store.delete(&keys).await
    }

    async fn put_fact(&self, key: &str, fact: &SemanticFact) -> Result<()> {
        let embedding = self.embedder.embed(&fact.fact_text).await?;
        let payload = serde_json::to_string(fact)
            .map_err(|e| VitalisError::Serialization(format!("Failed to encode fact: {e}")))?;
        self.store
            .put_with_embedding(key, payload, embedding, self.ttl)
            .await
    }
}
