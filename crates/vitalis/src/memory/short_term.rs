//! Short-term conversation memory
//!
//! Recent turns per session, stored under a single session key and trimmed
//! oldest-first by turn count and token budget. The session key carries a TTL
//! refreshed on every write.

use std::sync::Arc;
use std::time::Duration;

use crate::error::{Result, VitalisError};
use crate::memory::types::{ConversationTurn, Role};
use crate::store::KeyValueStore;

const KEY_PREFIX: &str = "vitalis:st:";

/// Store for recent conversation turns, bounded by count and tokens.
pub struct ShortTermStore {
    store: Arc<dyn KeyValueStore>,
    max_turns: usize,
    max_tokens: usize,
    ttl: Duration,
}

impl ShortTermStore {
    pub fn new(
        store: Arc<dyn KeyValueStore>,
        max_turns: usize,
        max_tokens: usize,
        ttl: Duration,
    ) -> Self {
        Self {
            store,
            max_turns,
            max_tokens,
            ttl,
        }
    }

    fn session_key(session_id: &str) -> String {
        format!("{KEY_PREFIX}{session_id}")
    }

    /// Append a turn to the session history, enforcing the turn and token
    /// limits by evicting oldest turns.
    pub async fn append_turn(
        &self,
        session_id: &str,
        role: Role,
        content: String,
        tools_used: Vec<String>,
    ) -> Result<ConversationTurn> {
        let turn = ConversationTurn::new(session_id, role, content, tools_used);

        let mut turns = self.load_turns(session_id).await?;
        turns.push(turn.clone());
        self.enforce_limits(&mut turns);

        let payload = serde_json::to_string(&turns)
            .map_err(|e| VitalisError::Serialization(format!("Failed to encode turns: {e}")))?;
        self.store
            .put(&Self::session_key(session_id), payload, self.ttl)
            .await?;

        Ok(turn)
    }

    /// All retained turns for a session, oldest first.
    pub async fn recent_turns(&self, session_id: &str) -> Result<Vec<ConversationTurn>> {
        self.load_turns(session_id).await
    }

    /// Number of retained turns for a session.
    pub async fn turn_count(&self, session_id: &str) -> Result<usize> {
        Ok(self.load_turns(session_id).await?.len())
    }

    /// Drop all history for a session. Clearing an absent session succeeds.
    pub async fn clear(&self, session_id: &str) -> Result<()> {
        self.store
            .delete(&[Self::session_key(session_id)])
            .await?;
        Ok(())
    }

    /// Drop history for every session. Used by the cascade clear.
    pub async fn clear_all(&self) -> Result<usize> {
        let keys = self.store.scan(KEY_PREFIX).await?;
        self.store.delete(&keys).await
    }

    async fn load_turns(&self, session_id: &str) -> Result<Vec<ConversationTurn>> {
        match self.store.get(&Self::session_key(session_id)).await? {
            Some(payload) => match serde_json::from_str(&payload) {
                Ok(turns) => Ok(turns),
                Err(e) => {
                    // A corrupted record must not break the session; start fresh.
                    tracing::warn!("Discarding malformed short-term record: {e}");
                    Ok(Vec::new())
                }
            },
            None => Ok(Vec::new()),
        }
    }

    fn enforce_limits(&self, turns: &mut Vec<ConversationTurn>) {
        while turns.len() > self.max_turns {
            turns.remove(0);
        }

        let mut total: usize = turns.iter().map(|t| t.estimate_tokens()).sum();
        while total > self.max_tokens && !turns.is_empty() {
            let evicted = turns.remove(0);
            total -= evicted.estimate_tokens();
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::store::InMemoryStore;

    fn test_store(max_turns: usize, max_tokens: usize) -> ShortTermStore {
        ShortTermStore::new(
            Arc::new(InMemoryStore::new()),
            max_turns,
            max_tokens,
            Duration::from_secs(60),
        )
    }

    #[tokio::test]
    async fn test_append_and_recall_in_order() {
        let store = test_store(10, 10_000);

        store
            .append_turn("s1", Role::User, "first".to_string(), Vec::new())
            .await
            .unwrap();
        store
            .append_turn("s1", Role::Assistant, "second".to_string(), Vec::new())
            .await
            .unwrap();

        let turns = store.recent_turns("s1").await.unwrap();
        assert_eq!(turns.len(), 2);
        assert_eq!(turns[0].content, "first");
        assert_eq!(turns[1].content, "second");
        assert_eq!(turns[1].role, Role::Assistant);
    }

    #[tokio::test]
    async fn test_sessions_are_isolated() {
        let store = test_store(10, 10_000);

        store
            .append_turn("s1", Role::User, "for s1".to_string(), Vec::new())
            .await
            .unwrap();

        assert!(store.recent_turns("s2").await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_turn_count_eviction() {
        let store = test_store(3, 10_000);

        for i in 0..5 {
            store
                .append_turn("s1", Role::User, format!("Message {i}"), Vec::new())
                .await
                .unwrap();
        }

        let turns = store.recent_turns("s1").await.unwrap();
        let contents: Vec<_> = turns.iter().map(|t| t.content.clone()).collect();
        assert_eq!(contents, vec!["Message 2", "Message 3", "Message 4"]);
    }

    #[tokio::test]
    async fn test_token_budget_eviction() {
        // Each 40-char turn is ~10 tokens; budget of 25 keeps only two.
        let store = test_store(100, 25);

        for i in 0..3 {
            store
                .append_turn("s1", Role::User, format!("{i}").repeat(40), Vec::new())
                .await
                .unwrap();
        }

        let turns = store.recent_turns("s1").await.unwrap();
        assert_eq!(turns.len(), 2);
        assert!(turns[0].content.starts_with('1'));
    }

    #[tokio::test]
    async fn test_clear_is_idempotent() {
        let store = test_store(10, 10_000);

        store
            .append_turn("s1", Role::User, "hello".to_string(), Vec::new())
            .await
            .unwrap();
        store.clear("s1").await.unwrap();
        assert_eq!(store.turn_count("s1").await.unwrap(), 0);

        // Clearing an already-empty session succeeds
        store.clear("s1").await.unwrap();
    }

    #[tokio::test]
    async fn test_malformed_record_starts_fresh() {
        let kv = Arc::new(InMemoryStore::new());
        kv.put(
            "vitalis:st:s1",
            "{not valid json".to_string(),
            Duration::from_secs(60),
        )
        .await
        .unwrap();

        let store = ShortTermStore::new(kv, 10, 10_000, Duration::from_secs(60));
        assert!(store.recent_turns("s1").await.unwrap().is_empty());

        store
            .append_turn("s1", Role::User, "recovered".to_string(), Vec::new())
            .await
            .unwrap();
        assert_eq!(store.turn_count("s1").await.unwrap(), 1);
    }

    #[tokio::test]
    async fn test_tools_used_preserved() {
        let store = test_store(10, 10_000);

        store
            .append_turn(
                "s1",
                Role::Assistant,
                "Your average was 72 bpm".to_string(),
                vec!["aggregate_metrics".to_string()],
            )
            .await
            .unwrap();

        let turns = store.recent_turns("s1").await.unwrap();
        assert_eq!(turns[0].tools_used, vec!["aggregate_metrics"]);
    }
}
