//! Memory coordinator: fan-out reads, background writes
//!
//! Single entry point for the four memory tiers. Reads fan out concurrently
//! and a failing tier degrades to an empty contribution instead of failing
//! the turn. Long-term writes go through a bounded background queue so the
//! response is never blocked on them; only the short-term append is awaited.

use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};

use serde::Serialize;
use tokio::sync::{mpsc, oneshot};

use crate::config::MemoryConfig;
use crate::memory::episodic::EpisodicStore;
use crate::memory::procedural::ProceduralStore;
use crate::memory::semantic::SemanticStore;
use crate::memory::short_term::ShortTermStore;
use crate::memory::types::{ConversationTurn, Goal, Procedure, Role, SemanticFact};
use crate::router::{derive_semantic_fact, goal_from_statement, is_goal_setting_statement};

/// Context assembled from all four tiers for one turn.
#[derive(Debug, Clone, Default)]
pub struct FullContext {
    /// Recent turns for the session, oldest first
    pub short_term: Vec<ConversationTurn>,
    /// Goals most similar to the query, best first
    pub episodic: Vec<Goal>,
    /// Learned tool sequence for this query pattern, if known
    pub procedural: Option<Procedure>,
    /// Health facts most similar to the query, best first
    pub semantic: Vec<SemanticFact>,
}

impl FullContext {
    pub fn is_empty(&self) -> bool {
        self.short_term.is_empty()
            && self.episodic.is_empty()
            && self.procedural.is_none()
            && self.semantic.is_empty()
    }

    /// Render the context as a prompt block under a token budget.
    ///
    /// Sections are emitted in priority order: goals, then the learned tool
    /// hint, then facts, then conversation history with the most recent turns
    /// kept when the budget forces trimming. Tokens use the chars/4 heuristic.
    pub fn render(&self, token_budget: usize) -> String {
        let mut budget = Budget::new(token_budget);
        let mut sections: Vec<String> = Vec::new();

        if !self.episodic.is_empty() {
            let mut lines = vec!["User goals:".to_string()];
            for goal in &self.episodic {
                lines.push(format!(
                    "- {} (metric: {}, set {})",
                    goal.raw_text,
                    goal.metric,
                    goal.created_at.format("%Y-%m-%d")
                ));
            }
            budget.push_section(&mut sections, lines);
        }

        if let Some(proc) = &self.procedural {
            let lines = vec![format!(
                "For similar questions, the tools [{}] worked well (confidence {:.2}).",
                proc.tool_sequence.join(", "),
                proc.confidence()
            )];
            budget.push_section(&mut sections, lines);
        }

        if !self.semantic.is_empty() {
            let mut lines = vec!["Relevant health facts:".to_string()];
            for fact in &self.semantic {
                lines.push(format!("- {} ({})", fact.fact_text, fact.source));
            }
            budget.push_section(&mut sections, lines);
        }

        if !self.short_term.is_empty() {
            // Walk newest-first so trimming drops the oldest turns.
            let mut turn_lines = Vec::new();
            for turn in self.short_term.iter().rev() {
                let line = format!("{}: {}", turn.role.as_str(), turn.content);
                if !budget.take(&line) {
                    break;
                }
                turn_lines.push(line);
            }
            if !turn_lines.is_empty() {
                turn_lines.push("Recent conversation:".to_string());
                turn_lines.reverse();
                sections.push(turn_lines.join("\n"));
            }
        }

        sections.join("\n\n")
    }
}

struct Budget {
    remaining: usize,
}

impl Budget {
    fn new(tokens: usize) -> Self {
        Self { remaining: tokens }
    }

    fn take(&mut self, line: &str) -> bool {
        let cost = line.len() / 4 + 1;
        if cost > self.remaining {
            return false;
        }
        self.remaining -= cost;
        true
    }

    /// Append the section only if every line fits; a truncated goal or fact
    /// list is worse than none.
    fn push_section(&mut self, sections: &mut Vec<String>, lines: Vec<String>) {
        let cost: usize = lines.iter().map(|l| l.len() / 4 + 1).sum();
        if cost <= self.remaining {
            self.remaining -= cost;
            sections.push(lines.join("\n"));
        }
    }
}

/// Per-tier result of recording an interaction.
///
/// Short-term flags report completed writes; the others report acceptance
/// into the background queue, not completion.
#[derive(Debug, Clone, Default, Serialize)]
pub struct StoreOutcome {
    pub short_term_user: bool,
    pub short_term_assistant: bool,
    pub episodic_queued: bool,
    pub procedural_queued: bool,
    pub semantic_queued: bool,
}

/// Per-tier record counts. `None` means the tier failed to answer.
#[derive(Debug, Clone, Serialize)]
pub struct MemoryStats {
    pub short_term_turns: Option<usize>,
    pub episodic_goals: Option<usize>,
    pub procedures: Option<usize>,
    pub semantic_facts: Option<usize>,
    pub writes: QueueSnapshot,
}

/// Point-in-time view of the background write queue counters.
#[derive(Debug, Clone, Copy, Serialize)]
pub struct QueueSnapshot {
    /// Jobs accepted into the queue
    pub queued: u64,
    /// Jobs rejected because the queue was full
    pub dropped: u64,
    /// Jobs that reached a tier store and failed there
    pub failed: u64,
}

#[derive(Default)]
struct QueueMetrics {
    queued: AtomicU64,
    dropped: AtomicU64,
    failed: AtomicU64,
}

impl QueueMetrics {
    fn snapshot(&self) -> QueueSnapshot {
        QueueSnapshot {
            queued: self.queued.load(Ordering::Relaxed),
            dropped: self.dropped.load(Ordering::Relaxed),
            failed: self.failed.load(Ordering::Relaxed),
        }
    }
}

enum WriteJob {
    Goal(Goal),
    Procedure {
        query: String,
        tool_sequence: Vec<String>,
        execution_ms: f64,
        success_score: f64,
    },
    Fact(SemanticFact),
    /// Acknowledged once every job submitted before it has completed.
    Flush(oneshot::Sender<()>),
}

/// Coordinates reads and writes across the four memory tiers.
pub struct MemoryCoordinator {
    short_term: Arc<ShortTermStore>,
    episodic: Arc<EpisodicStore>,
    procedural: Arc<ProceduralStore>,
    semantic: Arc<SemanticStore>,
    top_k: usize,
    context_token_budget: usize,
    writer: mpsc::Sender<WriteJob>,
    metrics: Arc<QueueMetrics>,
}

impl MemoryCoordinator {
    /// Build the coordinator and spawn its background write worker. The
    /// worker exits when the coordinator is dropped.
    pub fn new(
        short_term: Arc<ShortTermStore>,
        episodic: Arc<EpisodicStore>,
        procedural: Arc<ProceduralStore>,
        semantic: Arc<SemanticStore>,
        config: &MemoryConfig,
    ) -> Self {
        let (writer, rx) = mpsc::channel(config.write_queue_capacity.max(1));
        let metrics = Arc::new(QueueMetrics::default());

        tokio::spawn(run_write_worker(
            rx,
            episodic.clone(),
            procedural.clone(),
            semantic.clone(),
            metrics.clone(),
        ));

        Self {
            short_term,
            episodic,
            procedural,
            semantic,
            top_k: config.top_k,
            context_token_budget: config.context_token_budget,
            writer,
            metrics,
        }
    }

    /// Token budget for rendering the merged context.
    pub fn context_token_budget(&self) -> usize {
        self.context_token_budget
    }

    /// Fetch context from all tiers concurrently.
    ///
    /// With `skip_long_term` the episodic and semantic tiers are not consulted
    /// at all; short-term and the procedural lookup always run. A tier that
    /// errors contributes an empty section; the turn proceeds on whatever
    /// memory is reachable.
    pub async fn get_full_context(
        &self,
        user_id: &str,
        session_id: &str,
        query: &str,
        skip_long_term: bool,
    ) -> FullContext {
        let (short_term, episodic, procedural, semantic) = tokio::join!(
            self.short_term.recent_turns(session_id),
            async {
                if skip_long_term {
                    Ok(Vec::new())
                } else {
                    self.episodic.similar_goals(user_id, query, self.top_k).await
                }
            },
            self.procedural.lookup(query),
            async {
                if skip_long_term {
                    Ok(Vec::new())
                } else {
                    self.semantic.similar_facts(query, self.top_k).await
                }
            },
        );

        FullContext {
            short_term: short_term.unwrap_or_else(|e| {
                tracing::warn!("Short-term read failed, continuing without history: {e}");
                Vec::new()
            }),
            episodic: episodic.unwrap_or_else(|e| {
                tracing::warn!("Episodic read failed, continuing without goals: {e}");
                Vec::new()
            }),
            procedural: procedural.unwrap_or_else(|e| {
                tracing::warn!("Procedural read failed, continuing without a tool hint: {e}");
                None
            }),
            semantic: semantic.unwrap_or_else(|e| {
                tracing::warn!("Semantic read failed, continuing without facts: {e}");
                Vec::new()
            }),
        }
    }

    /// Record a completed turn across the tiers.
    ///
    /// Short-term appends are awaited; goal, procedure, and derived-fact
    /// writes are queued for the background worker. A failed short-term
    /// append is reported in the outcome but never propagated.
    pub async fn store_interaction(
        &self,
        session_id: &str,
        user_id: &str,
        user_message: &str,
        assistant_response: &str,
        tools_used: &[String],
        execution_ms: f64,
        success_score: f64,
    ) -> StoreOutcome {
        let mut outcome = StoreOutcome::default();

        outcome.short_term_user = match self
            .short_term
            .append_turn(session_id, Role::User, user_message.to_string(), Vec::new())
            .await
        {
            Ok(_) => true,
            Err(e) => {
                tracing::warn!("Failed to store user turn: {e}");
                false
            }
        };
        outcome.short_term_assistant = match self
            .short_term
            .append_turn(
                session_id,
                Role::Assistant,
                assistant_response.to_string(),
                tools_used.to_vec(),
            )
            .await
        {
            Ok(_) => true,
            Err(e) => {
                tracing::warn!("Failed to store assistant turn: {e}");
                false
            }
        };

        if is_goal_setting_statement(user_message) {
            let goal = goal_from_statement(user_id, user_message);
            outcome.episodic_queued = self.submit(WriteJob::Goal(goal));
        }

        if !tools_used.is_empty() {
            outcome.procedural_queued = self.submit(WriteJob::Procedure {
                query: user_message.to_string(),
                tool_sequence: tools_used.to_vec(),
                execution_ms,
                success_score,
            });
        }

        if let Some(fact) =
            derive_semantic_fact(assistant_response).or_else(|| derive_semantic_fact(user_message))
        {
            outcome.semantic_queued = self.submit(WriteJob::Fact(fact));
        }

        outcome
    }

    /// The user's most recently declared goal. A failing episodic tier reads
    /// as no goal.
    pub async fn latest_goal(&self, user_id: &str) -> Option<Goal> {
        match self.episodic.latest_goal(user_id).await {
            Ok(goal) => goal,
            Err(e) => {
                tracing::warn!("Latest-goal lookup failed: {e}");
                None
            }
        }
    }

    /// Wait for every previously queued write to complete. Test hook; the
    /// serving path never blocks on the queue.
    pub async fn flush_writes(&self) {
        let (tx, rx) = oneshot::channel();
        if self.writer.send(WriteJob::Flush(tx)).await.is_ok() {
            let _ = rx.await;
        }
    }

    /// Per-tier record counts plus the write-queue counters.
    pub async fn get_memory_stats(&self, user_id: &str, session_id: &str) -> MemoryStats {
        let (short_term, episodic, procedural, semantic) = tokio::join!(
            self.short_term.turn_count(session_id),
            self.episodic.count(user_id),
            self.procedural.count(),
            self.semantic.count(),
        );

        MemoryStats {
            short_term_turns: short_term.ok(),
            episodic_goals: episodic.ok(),
            procedures: procedural.ok(),
            semantic_facts: semantic.ok(),
            writes: self.metrics.snapshot(),
        }
    }

    /// Clear short-term history, the user's goals, learned procedures, and
    /// conversation-derived facts. The verified knowledge base is kept.
    ///
    /// Idempotent; returns false when any tier failed to clear.
    pub async fn clear_all_memories(&self, user_id: &str) -> bool {
        let mut ok = true;

        if let Err(e) = self.short_term.clear_all().await {
            tracing::warn!("Failed to clear short-term memory: {e}");
            ok = false;
        }
        if let Err(e) = self.episodic.clear(user_id).await {
            tracing::warn!("Failed to clear episodic memory: {e}");
            ok = false;
        }
        if let Err(e) = self.procedural.clear().await {
            tracing::warn!("Failed to clear procedural memory: {e}");
            ok = false;
        }
        if let Err(e) = self.semantic.clear_derived().await {
            tracing::warn!("Failed to clear derived semantic facts: {e}");
            ok = false;
        }

        ok
    }

    /// Current write-queue counters.
    pub fn queue_snapshot(&self) -> QueueSnapshot {
        self.metrics.snapshot()
    }

    fn submit(&self, job: WriteJob) -> bool {
        match self.writer.try_send(job) {
            Ok(()) => {
                self.metrics.queued.fetch_add(1, Ordering::Relaxed);
                true
            }
            Err(mpsc::error::TrySendError::Full(_)) => {
                self.metrics.dropped.fetch_add(1, Ordering::Relaxed);
                tracing::warn!("Write queue full, dropping a background memory write");
                false
            }
            Err(mpsc::error::TrySendError::Closed(_)) => {
                tracing::error!("Write worker is gone, dropping a background memory write");
                false
            }
        }
    }
}

async fn run_write_worker(
    mut rx: mpsc::Receiver<WriteJob>,
    episodic: Arc<EpisodicStore>,
    procedural: Arc<ProceduralStore>,
    semantic: Arc<SemanticStore>,
    metrics: Arc<QueueMetrics>,
) {
    while let Some(job) = rx.recv().await {
        let result = match job {
            WriteJob::Goal(goal) => episodic.store_goal(&goal).await,
            WriteJob::Procedure {
                query,
                tool_sequence,
                execution_ms,
                success_score,
            } => {
                procedural
                    .record_execution(&query, &tool_sequence, execution_ms, success_score)
                    .await
            }
            WriteJob::Fact(fact) => semantic.store_derived_fact(&fact).await,
            WriteJob::Flush(ack) => {
                let _ = ack.send(());
                continue;
            }
        };

        if let Err(e) = result {
            metrics.failed.fetch_add(1, Ordering::Relaxed);
            tracing::warn!("Background memory write failed: {e}");
        }
    }
    tracing::debug!("Write worker shutting down");
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::embedding::HashEmbedder;
    use crate::store::InMemoryStore;
    use chrono::Utc;
    use std::time::Duration;

    fn coordinator() -> MemoryCoordinator {
        coordinator_with_config(&MemoryConfig::default())
    }

    fn coordinator_with_config(config: &MemoryConfig) -> MemoryCoordinator {
        let store: Arc<InMemoryStore> = Arc::new(InMemoryStore::new());
        let embedder: Arc<HashEmbedder> = Arc::new(HashEmbedder::new(64));
        let day = Duration::from_secs(86400);

        MemoryCoordinator::new(
            Arc::new(ShortTermStore::new(
                store.clone(),
                config.short_term_max_turns,
                config.short_term_max_tokens,
                Duration::from_secs(config.short_term_ttl_secs),
            )),
            Arc::new(EpisodicStore::new(
                store.clone(),
                embedder.clone(),
                day * config.episodic_ttl_days as u32,
            )),
            Arc::new(ProceduralStore::new(
                store.clone(),
                day * config.procedural_ttl_days as u32,
            )),
            Arc::new(SemanticStore::new(
                store,
                embedder,
                day * config.semantic_ttl_days as u32,
            )),
            config,
        )
    }

    #[tokio::test]
    async fn test_store_interaction_writes_short_term() {
        let coord = coordinator();

        let outcome = coord
            .store_interaction(
                "s1",
                "u1",
                "what was my heart rate?",
                "Your average was 72 bpm",
                &["aggregate_metrics".to_string()],
                120.0,
                1.0,
            )
            .await;

        assert!(outcome.short_term_user);
        assert!(outcome.short_term_assistant);
        assert!(outcome.procedural_queued);

        let context = coord.get_full_context("u1", "s1", "anything", true).await;
        assert_eq!(context.short_term.len(), 2);
        assert_eq!(context.short_term[0].role, Role::User);
        assert_eq!(
            context.short_term[1].tools_used,
            vec!["aggregate_metrics"]
        );
    }

    #[tokio::test]
    async fn test_goal_statement_reaches_episodic_after_flush() {
        let coord = coordinator();

        let outcome = coord
            .store_interaction(
                "s1",
                "u1",
                "my goal is to reach 150 lbs",
                "Got it! I've saved your goal.",
                &[],
                10.0,
                1.0,
            )
            .await;
        assert!(outcome.episodic_queued);
        assert!(!outcome.procedural_queued, "No tools were used");

        coord.flush_writes().await;

        let context = coord
            .get_full_context("u1", "s1", "what is my goal?", false)
            .await;
        assert_eq!(context.episodic.len(), 1);
        assert_eq!(context.episodic[0].target_value, Some(150.0));
        assert_eq!(context.episodic[0].unit.as_deref(), Some("lbs"));
    }

    #[tokio::test]
    async fn test_procedure_learned_after_flush() {
        let coord = coordinator();

        coord
            .store_interaction(
                "s1",
                "u1",
                "average heart rate last week",
                "Your average was 72 bpm",
                &["aggregate_metrics".to_string()],
                150.0,
                1.0,
            )
            .await;
        coord.flush_writes().await;

        let context = coord
            .get_full_context("u1", "s1", "average heart rate last week", false)
            .await;
        let proc = context.procedural.expect("procedure should be learned");
        assert_eq!(proc.tool_sequence, vec!["aggregate_metrics"]);
        assert_eq!(proc.execution_count, 1);
    }

    #[tokio::test]
    async fn test_skip_long_term_returns_only_history() {
        let coord = coordinator();

        coord
            .store_interaction(
                "s1",
                "u1",
                "my goal is to reach 150 lbs",
                "Saved.",
                &[],
                10.0,
                1.0,
            )
            .await;
        coord.flush_writes().await;

        let context = coord
            .get_full_context("u1", "s1", "what did we just discuss?", true)
            .await;
        assert!(!context.short_term.is_empty());
        assert!(context.episodic.is_empty());
        // The procedural lookup still runs; nothing was learned for this query.
        assert!(context.procedural.is_none());
        assert!(context.semantic.is_empty());
    }

    #[tokio::test]
    async fn test_clear_all_memories_cascades() {
        let coord = coordinator();

        coord
            .store_interaction(
                "s1",
                "u1",
                "my goal is to reach 150 lbs",
                "Saved.",
                &["search_records".to_string()],
                10.0,
                1.0,
            )
            .await;
        coord.flush_writes().await;

        assert!(coord.clear_all_memories("u1").await);

        let stats = coord.get_memory_stats("u1", "s1").await;
        assert_eq!(stats.short_term_turns, Some(0));
        assert_eq!(stats.episodic_goals, Some(0));
        assert_eq!(stats.procedures, Some(0));

        // Idempotent
        assert!(coord.clear_all_memories("u1").await);
    }

    #[tokio::test]
    async fn test_queue_metrics_count_submissions() {
        let coord = coordinator();

        coord
            .store_interaction(
                "s1",
                "u1",
                "steps yesterday",
                "You walked 9000 steps",
                &["aggregate_metrics".to_string()],
                80.0,
                1.0,
            )
            .await;
        coord.flush_writes().await;

        let snapshot = coord.queue_snapshot();
        assert!(snapshot.queued >= 1);
        assert_eq!(snapshot.dropped, 0);
        assert_eq!(snapshot.failed, 0);
    }

    #[tokio::test]
    async fn test_memory_stats_report_counts() {
        let coord = coordinator();

        coord
            .store_interaction("s1", "u1", "hello there friend", "Hi!", &[], 5.0, 1.0)
            .await;

        let stats = coord.get_memory_stats("u1", "s1").await;
        assert_eq!(stats.short_term_turns, Some(2));
        assert_eq!(stats.episodic_goals, Some(0));
    }

    #[test]
    fn test_render_orders_sections_and_respects_budget() {
        let context = FullContext {
            short_term: vec![
                ConversationTurn::new("s1", Role::User, "older message".to_string(), Vec::new()),
                ConversationTurn::new("s1", Role::Assistant, "newer reply".to_string(), Vec::new()),
            ],
            episodic: vec![Goal {
                user_id: "u1".to_string(),
                metric: "weight".to_string(),
                target_value: Some(150.0),
                unit: Some("lbs".to_string()),
                raw_text: "reach 150 lbs".to_string(),
                created_at: Utc::now(),
            }],
            procedural: None,
            semantic: Vec::new(),
        };

        let rendered = context.render(2000);
        assert!(rendered.contains("User goals:"));
        assert!(rendered.contains("reach 150 lbs"));
        let goals_pos = rendered.find("User goals:").unwrap();
        let history_pos = rendered.find("Recent conversation:").unwrap();
        assert!(goals_pos < history_pos);

        // Tight budget keeps the newest turn and drops the oldest.
        let tight = context.render(16);
        assert!(tight.contains("newer reply") || !tight.contains("older message"));
    }

    #[test]
    fn test_render_empty_context() {
        assert_eq!(FullContext::default().render(2000), "");
    }
}
