//! Episodic memory: user-declared goals
//!
//! Goals are embedded on write and retrieved by vector similarity against the
//! query embedding. Records are append-only and expire after roughly seven
//! months.

use std::sync::Arc;
use std::time::Duration;

use uuid::Uuid;

use crate::embedding::Embedder;
use crate::error::{Result, VitalisError};
use crate::memory::types::Goal;
use crate::store::KeyValueStore;

const KEY_PREFIX: &str = "vitalis:ep:";

/// Vector-indexed store for user goals and preferences.
pub struct EpisodicStore {
    store: Arc<dyn KeyValueStore>,
    embedder: Arc<dyn Embedder>,
    ttl: Duration,
}

impl EpisodicStore {
    pub fn new(store: Arc<dyn KeyValueStore>, embedder: Arc<dyn Embedder>, ttl: Duration) -> Self {
        Self {
            store,
            embedder,
            ttl,
        }
    }

    fn user_prefix(user_id: &str) -> String {
        format!("{KEY_PREFIX}{user_id}:")
    }

    /// Store a new goal. Goals append; an earlier goal for the same metric is
    /// never overwritten.
    pub async fn store_goal(&self, goal: &Goal) -> Result<()> {
        let embedding = self.embedder.embed(&goal.raw_text).await?;
        let payload = serde_json::to_string(goal)
            .map_err(|e| VitalisError::Serialization(format!("Failed to encode goal: {e}")))?;
        let key = format!("{}{}", Self::user_prefix(&goal.user_id), Uuid::new_v4());

        self.store
            .put_with_embedding(&key, payload, embedding, self.ttl)
            .await
    }

    /// Goals most similar to the query, best first. Malformed records are
    /// skipped so one bad entry cannot break retrieval of its siblings.
    pub async fn similar_goals(&self, user_id: &str, query: &str, top_k: usize) -> Result<Vec<Goal>> {
        let embedding = self.embedder.embed(query).await?;
        let records = self
            .store
            .vector_search(&Self::user_prefix(user_id), &embedding, top_k)
            .await?;

        Ok(records
            .into_iter()
            .filter_map(|r| match serde_json::from_str::<Goal>(&r.value) {
                Ok(goal) => Some(goal),
                Err(e) => {
                    tracing::warn!("Skipping malformed goal record {}: {e}", r.key);
                    None
                }
            })
            .collect())
    }

    /// The most recently declared goal for a user, if any.
    pub async fn latest_goal(&self, user_id: &str) -> Result<Option<Goal>> {
        let keys = self.store.scan(&Self::user_prefix(user_id)).await?;

        let mut latest: Option<Goal> = None;
        for key in keys {
            let Some(payload) = self.store.get(&key).await? else {
                continue;
            };
            match serde_json::from_str::<Goal>(&payload) {
                Ok(goal) => {
                    if latest
                        .as_ref()
                        .map(|g| goal.created_at > g.created_at)
                        .unwrap_or(true)
                    {
                        latest = Some(goal);
                    }
                }
                Err(e) => tracing::warn!("Skipping malformed goal record {key}: {e}"),
            }
        }

        Ok(latest)
    }

    /// Number of stored goals for a user.
    pub async fn count(&self, user_id: &str) -> Result<usize> {
        self.store.count(&Self::user_prefix(user_id)).await
    }

    /// Delete every goal for a user. Idempotent.
    pub async fn clear(&self, user_id: &str) -> Result<usize> {
        let keys = self.store.scan(&Self::user_prefix(user_id)).await?;
        self.store.delete(&keys).await
    }
}
