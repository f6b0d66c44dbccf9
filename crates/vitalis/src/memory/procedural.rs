//! Procedural memory: learned tool-call sequences
//!
//! Maps a normalized query pattern to the tool sequence that answered it,
//! with running averages for execution time and success. Repeat matches fold
//! into the averages; confidence grows with execution count.

use std::sync::Arc;
use std::time::Duration;

use crate::error::{Result, VitalisError};
use crate::memory::types::Procedure;
use crate::store::KeyValueStore;

const KEY_PREFIX: &str = "vitalis:pr:";

/// Hash-indexed store for learned query-pattern -> tool-sequence mappings.
pub struct ProceduralStore {
    store: Arc<dyn KeyValueStore>,
    ttl: Duration,
}

impl ProceduralStore {
    pub fn new(store: Arc<dyn KeyValueStore>, ttl: Duration) -> Self {
        Self { store, ttl }
    }

    /// Normalize a query into a pattern hash.
    ///
    /// Lowercases, replaces digit runs with a placeholder, and collapses
    /// whitespace, so "heart rate on July 3" and "heart rate on July 14" share
    /// a pattern.
    pub fn pattern_hash(query: &str) -> String {
        use std::collections::hash_map::DefaultHasher;
        use std::hash::{Hash, Hasher};

        let mut normalized = String::with_capacity(query.len());
        let mut in_digits = false;
        let mut last_space = true;
        for c in query.trim().to_lowercase().chars() {
            if c.is_ascii_digit() {
                if !in_digits {
                    normalized.push('#');
                    in_digits = true;
                    last_space = false;
                }
            } else if c.is_whitespace() {
                if !last_space {
                    normalized.push(' ');
                    last_space = true;
                }
                in_digits = false;
            } else {
                normalized.push(c);
                in_digits = false;
                last_space = false;
            }
        }

        let mut hasher = DefaultHasher::new();
        normalized.trim_end().hash(&mut hasher);
        format!("{:016x}", hasher.finish())
    }

    /// Record a successful tool-calling execution for a query.
    ///
    /// First match creates the procedure; repeat matches fold into the running
    /// averages via read-modify-write. Concurrent writers to the same pattern
    /// hash can lose an update; acceptable for a single-user assistant.
    pub async fn record_execution(
        &self,
        query: &str,
        tool_sequence: &[String],
        execution_ms: f64,
        success_score: f64,
    ) -> Result<()> {
        if tool_sequence.is_empty() {
            return Err(VitalisError::Memory(
                "Refusing to store a procedure with an empty tool sequence".to_string(),
            ));
        }

        let hash = Self::pattern_hash(query);
        let key = format!("{KEY_PREFIX}{hash}");

        let procedure = match self.load(&key).await? {
            Some(mut existing) => {
                existing.record_execution(execution_ms, success_score);
                existing
            }
            None => Procedure::new(
                hash,
                query.to_string(),
                tool_sequence.to_vec(),
                execution_ms,
                success_score,
            ),
        };

        let payload = serde_json::to_string(&procedure)
            .map_err(|e| VitalisError::Serialization(format!("Failed to encode procedure: {e}")))?;
        self.store.put(&key, payload, self.ttl).await
    }

    /// Look up a learned procedure for a query, if the pattern is known.
    pub async fn lookup(&self, query: &str) -> Result<Option<Procedure>> {
        let key = format!("{KEY_PREFIX}{}", Self::pattern_hash(query));
        self.load(&key).await
    }

    /// Number of learned procedures.
    pub async fn count(&self) -> Result<usize> {
        self.store.count(KEY_PREFIX).await
    }

    /// Delete every learned procedure. Idempotent.
    pub async fn clear(&self) -> Result<usize> {
        let keys = self.store.scan(KEY_PREFIX).await?;
        self.store.delete(&keys).await
    }

    async fn load(&self, key: &str) -> Result<Option<Procedure>> {
        match self.store.get(key).await? {
            Some(payload) => match serde_json::from_str(&payload) {
                Ok(procedure) => Ok(Some(procedure)),
                Err(e) => {
                    tracing::warn!("Discarding malformed procedure record {key}: {e}");
                    Ok(None)
                }
            },
            None => Ok(None),
        }
    }
}
