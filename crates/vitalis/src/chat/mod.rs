//! Chat turn pipeline
//!
//! One entry point per user message: fast-path bypass for goal statements,
//! memory fan-out, agent generation, validation with a single bounded retry,
//! and background persistence of the completed turn.

use std::sync::Arc;
use std::time::Instant;

use serde::Serialize;

use crate::agent::{Agent, ChatMessage};
use crate::config::ValidationConfig;
use crate::error::Result;
use crate::memory::{FullContext, MemoryCoordinator, MemoryStats};
use crate::router::{BypassDecision, MemoryScope, classify_memory_scope, should_bypass_tools};
use crate::validation::{RetryController, ValidationReport};

const SYSTEM_PROMPT: &str = "You are a personal health assistant with access to the user's \
health data through tools. Answer using only values returned by the tools. If the tools \
return no data, say so instead of guessing.";

/// Everything the HTTP layer needs to answer one chat request.
#[derive(Debug, Serialize)]
pub struct TurnOutput {
    /// The response delivered to the user
    pub response: String,
    /// Fast-path intent when the tool loop was bypassed
    pub intent: Option<&'static str>,
    /// Ordered, deduplicated tool names used this turn
    pub tools_used: Vec<String>,
    /// Total tool invocations this turn
    pub tool_calls_made: usize,
    /// Whether a corrective regeneration was performed
    pub retried: bool,
    /// Per-tier memory counts after the turn was stored
    pub memory_stats: MemoryStats,
    /// Validation summary for the delivered response
    pub validation: ValidationReport,
}

/// Orchestrates a full chat turn across memory, agent, and validation.
pub struct ChatPipeline {
    coordinator: Arc<MemoryCoordinator>,
    agent: Arc<dyn Agent>,
    retry: RetryController,
}

impl ChatPipeline {
    pub fn new(
        coordinator: Arc<MemoryCoordinator>,
        agent: Arc<dyn Agent>,
        validation: &ValidationConfig,
    ) -> Self {
        Self {
            coordinator,
            agent,
            retry: RetryController::new(validation),
        }
    }

    /// Handle one user message end to end.
    ///
    /// Memory failures degrade the answer; only an agent failure on the
    /// primary generation propagates as an error.
    pub async fn handle_turn(
        &self,
        user_id: &str,
        session_id: &str,
        message: &str,
    ) -> Result<TurnOutput> {
        let started = Instant::now();

        // Goal statements and goal questions are answered without the tool
        // loop; the goal itself is persisted when the turn is stored.
        let prior_goal = self.coordinator.latest_goal(user_id).await;
        let decision = should_bypass_tools(user_id, message, prior_goal.as_ref());
        if let BypassDecision::GoalSetting { response, .. }
        | BypassDecision::GoalRetrieval { response } = &decision
        {
            let intent = decision.intent();
            tracing::info!(user_id, intent, "Answering via fast path");
            return Ok(self
                .finish_turn(
                    user_id,
                    session_id,
                    message,
                    response.clone(),
                    intent,
                    Vec::new(),
                    0,
                    false,
                    ValidationReport::clean(),
                    started,
                )
                .await);
        }

        let scope = classify_memory_scope(message);
        let skip_long_term = scope == MemoryScope::Session;
        let context = self
            .coordinator
            .get_full_context(user_id, session_id, message, skip_long_term)
            .await;

        let system_prompt = build_system_prompt(&context, self.coordinator.context_token_budget());
        let messages = vec![ChatMessage::new("user", message)];
        let reply = self.agent.generate(&system_prompt, &messages).await?;

        let draft = reply.response_text.clone();
        let outcome = self
            .retry
            .run(message, draft.clone(), &reply.tool_calls, |correction| {
                let agent = self.agent.clone();
                let system_prompt = system_prompt.clone();
                let mut retry_messages = messages.clone();
                retry_messages.push(ChatMessage::new("assistant", draft));
                retry_messages.push(ChatMessage::new("user", correction));
                async move {
                    agent
                        .generate(&system_prompt, &retry_messages)
                        .await
                        .map(|r| r.response_text)
                }
            })
            .await;

        Ok(self
            .finish_turn(
                user_id,
                session_id,
                message,
                outcome.response,
                None,
                reply.tools_used(),
                reply.tool_calls.len(),
                outcome.retried,
                outcome.report,
                started,
            )
            .await)
    }

    #[allow(clippy::too_many_arguments)]
    async fn finish_turn(
        &self,
        user_id: &str,
        session_id: &str,
        message: &str,
        response: String,
        intent: Option<&'static str>,
        tools_used: Vec<String>,
        tool_calls_made: usize,
        retried: bool,
        validation: ValidationReport,
        started: Instant,
    ) -> TurnOutput {
        let execution_ms = started.elapsed().as_secs_f64() * 1000.0;
        self.coordinator
            .store_interaction(
                session_id,
                user_id,
                message,
                &response,
                &tools_used,
                execution_ms,
                validation.score,
            )
            .await;

        let memory_stats = self.coordinator.get_memory_stats(user_id, session_id).await;

        TurnOutput {
            response,
            intent,
            tools_used,
            tool_calls_made,
            retried,
            memory_stats,
            validation,
        }
    }
}

/// Compose the system prompt: persona plus the rendered memory context.
fn build_system_prompt(context: &FullContext, token_budget: usize) -> String {
    if context.is_empty() {
        return SYSTEM_PROMPT.to_string();
    }
    format!(
        "{SYSTEM_PROMPT}\n\nWhat you remember about this user:\n\n{}",
        context.render(token_budget)
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::MemoryConfig;
    use crate::testing::{ScriptedAgent, test_coordinator};

    fn pipeline(agent: ScriptedAgent) -> (ChatPipeline, Arc<MemoryCoordinator>) {
        let coordinator = Arc::new(test_coordinator(&MemoryConfig::default()));
        let pipeline = ChatPipeline::new(
            coordinator.clone(),
            Arc::new(agent),
            &ValidationConfig::default(),
        );
        (pipeline, coordinator)
    }

    #[tokio::test]
    async fn test_goal_setting_bypasses_agent() {
        let agent = ScriptedAgent::default();
        let (pipeline, coordinator) = pipeline(agent);

        let output = pipeline
            .handle_turn("u1", "s1", "my goal is to reach 150 lbs")
            .await
            .unwrap();

        assert_eq!(output.intent, Some("goal_setting"));
        assert!(output.response.contains("150 lbs"));
        assert!(output.tools_used.is_empty());
        assert!(output.validation.valid);

        coordinator.flush_writes().await;
        let goal = coordinator.latest_goal("u1").await.expect("goal stored");
        assert_eq!(goal.target_value, Some(150.0));
        assert_eq!(goal.unit.as_deref(), Some("lbs"));
    }

    #[tokio::test]
    async fn test_goal_retrieval_answers_from_memory() {
        let agent = ScriptedAgent::default();
        let (pipeline, coordinator) = pipeline(agent);

        pipeline
            .handle_turn("u1", "s1", "my goal is to reach 150 lbs")
            .await
            .unwrap();
        coordinator.flush_writes().await;

        let output = pipeline
            .handle_turn("u1", "s1", "what is my goal?")
            .await
            .unwrap();

        assert_eq!(output.intent, Some("goal_retrieval"));
        assert!(output.response.contains("reach 150 lbs"));
    }

    #[tokio::test]
    async fn test_clean_response_not_retried() {
        let agent = ScriptedAgent::with_replies(vec![crate::agent::AgentReply {
            response_text: "Your average heart rate was 88 bpm".to_string(),
            tool_calls: vec![crate::agent::ToolCall {
                name: "aggregate_metrics".to_string(),
                arguments: serde_json::Value::Null,
                result: "Average: 87.5 bpm".to_string(),
            }],
        }]);
        let (pipeline, _) = pipeline(agent);

        let output = pipeline
            .handle_turn("u1", "s1", "what was my average heart rate?")
            .await
            .unwrap();

        assert!(!output.retried);
        assert!(output.validation.valid);
        assert_eq!(output.tools_used, vec!["aggregate_metrics"]);
        assert_eq!(output.tool_calls_made, 1);
    }

    #[tokio::test]
    async fn test_hallucinated_response_retried_once() {
        let tool = crate::agent::ToolCall {
            name: "search_records".to_string(),
            arguments: serde_json::Value::Null,
            result: "BodyMass: 136.8 lb".to_string(),
        };
        let agent = ScriptedAgent::with_replies(vec![
            crate::agent::AgentReply {
                response_text: "Your weight is 150 lb".to_string(),
                tool_calls: vec![tool],
            },
            crate::agent::AgentReply {
                response_text: "Your weight is 136.8 lb".to_string(),
                tool_calls: Vec::new(),
            },
        ]);
        let (pipeline, _) = pipeline(agent);

        let output = pipeline
            .handle_turn("u1", "s1", "what is my weight?")
            .await
            .unwrap();

        assert!(output.retried);
        assert_eq!(output.response, "Your weight is 136.8 lb");
        assert!(output.validation.valid);
    }

    #[tokio::test]
    async fn test_turn_is_stored_in_short_term() {
        let agent = ScriptedAgent::default();
        let (pipeline, coordinator) = pipeline(agent);

        pipeline
            .handle_turn("u1", "s1", "good morning")
            .await
            .unwrap();

        let context = coordinator.get_full_context("u1", "s1", "x", true).await;
        assert_eq!(context.short_term.len(), 2);
        assert_eq!(context.short_term[0].content, "good morning");
    }

    #[tokio::test]
    async fn test_agent_failure_propagates() {
        let agent = ScriptedAgent::failing();
        let (pipeline, _) = pipeline(agent);

        assert!(pipeline
            .handle_turn("u1", "s1", "how did I sleep?")
            .await
            .is_err());
    }
}
