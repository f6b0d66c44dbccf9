//! Test doubles shared by unit and integration tests
//!
//! Scripted agent replies, fault-injecting and call-recording stores, and a
//! coordinator wired entirely in memory. Not part of the serving path.

use std::collections::VecDeque;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use async_trait::async_trait;

use crate::agent::{Agent, AgentReply, ChatMessage};
use crate::config::MemoryConfig;
use crate::embedding::HashEmbedder;
use crate::error::{Result, VitalisError};
use crate::memory::{
    EpisodicStore, MemoryCoordinator, ProceduralStore, SemanticStore, ShortTermStore,
};
use crate::store::{InMemoryStore, KeyValueStore, ScoredRecord};

/// Agent that plays back a fixed script of replies.
///
/// An exhausted script answers with a plain acknowledgement; `failing()`
/// errors on every call.
#[derive(Default)]
pub struct ScriptedAgent {
    replies: Mutex<VecDeque<AgentReply>>,
    fail: bool,
    calls: AtomicUsize,
}

impl ScriptedAgent {
    pub fn with_replies(replies: Vec<AgentReply>) -> Self {
        Self {
            replies: Mutex::new(replies.into()),
            fail: false,
            calls: AtomicUsize::new(0),
        }
    }

    pub fn failing() -> Self {
        Self {
            fail: true,
            ..Self::default()
        }
    }

    /// How many times `generate` has been called.
    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl Agent for ScriptedAgent {
    async fn generate(&self, _system_prompt: &str, _messages: &[ChatMessage]) -> Result<AgentReply> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        if self.fail {
            return Err(VitalisError::Agent("scripted failure".to_string()));
        }

        Ok(self
            .replies
            .lock()
            .expect("script lock poisoned")
            .pop_front()
            .unwrap_or_else(|| AgentReply {
                response_text: "Okay, noted.".to_string(),
                tool_calls: Vec::new(),
            }))
    }
}

/// Store where every operation fails. For degradation tests.
pub struct FailingStore;

#[async_trait]
impl KeyValueStore for FailingStore {
    async fn get(&self, _key: &str) -> Result<Option<String>> {
        Err(VitalisError::Store("injected store failure".to_string()))
    }

    async fn put(&self, _key: &str, _value: String, _ttl: Duration) -> Result<()> {
        Err(VitalisError::Store("injected store failure".to_string()))
    }

    async fn put_with_embedding(
        &self,
        _key: &str,
        _value: String,
        _embedding: Vec<f32>,
        _ttl: Duration,
    ) -> Result<()> {
        Err(VitalisError::Store("injected store failure".to_string()))
    }

    async fn scan(&self, _prefix: &str) -> Result<Vec<String>> {
        Err(VitalisError::Store("injected store failure".to_string()))
    }

    async fn delete(&self, _keys: &[String]) -> Result<usize> {
        Err(VitalisError::Store("injected store failure".to_string()))
    }

    async fn vector_search(
        &self,
        _prefix: &str,
        _embedding: &[f32],
        _top_k: usize,
    ) -> Result<Vec<ScoredRecord>> {
        Err(VitalisError::Store("injected store failure".to_string()))
    }

    async fn count(&self, _prefix: &str) -> Result<usize> {
        Err(VitalisError::Store("injected store failure".to_string()))
    }
}

/// Store wrapper that records the key or prefix of every read it serves.
pub struct RecordingStore {
    inner: Arc<dyn KeyValueStore>,
    reads: Mutex<Vec<String>>,
}

impl RecordingStore {
    pub fn new(inner: Arc<dyn KeyValueStore>) -> Self {
        Self {
            inner,
            reads: Mutex::new(Vec::new()),
        }
    }

    /// Keys and prefixes touched by reads so far.
    pub fn reads(&self) -> Vec<String> {
        self.reads.lock().expect("reads lock poisoned").clone()
    }

    fn record(&self, target: &str) {
        self.reads
            .lock()
            .expect("reads lock poisoned")
            .push(target.to_string());
    }
}

#[async_trait]
impl KeyValueStore for RecordingStore {
    async fn get(&self, key: &str) -> Result<Option<String>> {
        self.record(key);
        self.inner.get(key).await
    }

    async fn put(&self, key: &str, value: String, ttl: Duration) -> Result<()> {
        self.inner.put(key, value, ttl).await
    }

    async fn put_with_embedding(
        &self,
        key: &str,
        value: String,
        embedding: Vec<f32>,
        ttl: Duration,
    ) -> Result<()> {
        self.inner.put_with_embedding(key, value, embedding, ttl).await
    }

    async fn scan(&self, prefix: &str) -> Result<Vec<String>> {
        self.record(prefix);
        self.inner.scan(prefix).await
    }

    async fn delete(&self, keys: &[String]) -> Result<usize> {
        self.inner.delete(keys).await
    }

    async fn vector_search(
        &self,
        prefix: &str,
        embedding: &[f32],
        top_k: usize,
    ) -> Result<Vec<ScoredRecord>> {
        self.record(prefix);
        self.inner.vector_search(prefix, embedding, top_k).await
    }

    async fn count(&self, prefix: &str) -> Result<usize> {
        self.record(prefix);
        self.inner.count(prefix).await
    }
}

/// Coordinator with every tier on a shared in-memory store.
pub fn test_coordinator(config: &MemoryConfig) -> MemoryCoordinator {
    test_coordinator_with_store(Arc::new(InMemoryStore::new()), config)
}

/// Coordinator with every tier on the given store.
pub fn test_coordinator_with_store(
    store: Arc<dyn KeyValueStore>,
    config: &MemoryConfig,
) -> MemoryCoordinator {
    test_coordinator_with_stores(store.clone(), store, config)
}

/// Coordinator with short-term and long-term tiers on different stores, for
/// fault-injection on one side only.
pub fn test_coordinator_with_stores(
    short_term_store: Arc<dyn KeyValueStore>,
    long_term_store: Arc<dyn KeyValueStore>,
    config: &MemoryConfig,
) -> MemoryCoordinator {
    let embedder = Arc::new(HashEmbedder::new(64));
    let day = Duration::from_secs(86400);

    MemoryCoordinator::new(
        Arc::new(ShortTermStore::new(
            short_term_store,
            config.short_term_max_turns,
            config.short_term_max_tokens,
            Duration::from_secs(config.short_term_ttl_secs),
        )),
        Arc::new(EpisodicStore::new(
            long_term_store.clone(),
            embedder.clone(),
            day * config.episodic_ttl_days as u32,
        )),
        Arc::new(ProceduralStore::new(
            long_term_store.clone(),
            day * config.procedural_ttl_days as u32,
        )),
        Arc::new(SemanticStore::new(
            long_term_store,
            embedder,
            day * config.semantic_ttl_days as u32,
        )),
        config,
    )
}
