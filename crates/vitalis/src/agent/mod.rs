//! LLM agent contract and HTTP implementation
//!
//! The agent is an external collaborator: given a system prompt and messages
//! it produces a response plus a record of the tool calls it made. The HTTP
//! implementation drives an Ollama-style chat endpoint with a bounded
//! tool-call loop; tool execution itself is delegated through a trait.

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::config::AgentConfig;
use crate::error::{Result, VitalisError};

/// A chat message handed to the agent.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ChatMessage {
    pub role: String,
    pub content: String,
}

impl ChatMessage {
    pub fn new(role: &str, content: impl Into<String>) -> Self {
        Self {
            role: role.to_string(),
            content: content.into(),
        }
    }
}

/// One tool invocation the agent made, with its result text.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ToolCall {
    /// Tool name
    pub name: String,
    /// Arguments the model passed
    pub arguments: Value,
    /// Result text returned by the tool; validator ground truth
    pub result: String,
}

/// The agent's output for one generation request.
#[derive(Debug, Clone, Default)]
pub struct AgentReply {
    /// The generated response text
    pub response_text: String,
    /// Tool calls made while producing the response, in call order
    pub tool_calls: Vec<ToolCall>,
}

impl AgentReply {
    /// Ordered, deduplicated tool names used in this reply.
    pub fn tools_used(&self) -> Vec<String> {
        let mut names = Vec::new();
        for call in &self.tool_calls {
            if !names.contains(&call.name) {
                names.push(call.name.clone());
            }
        }
        names
    }
}

/// Async contract for the tool-calling LLM loop.
#[async_trait]
pub trait Agent: Send + Sync {
    /// Generate a response for the given prompt and history.
    async fn generate(&self, system_prompt: &str, messages: &[ChatMessage]) -> Result<AgentReply>;
}

/// Executes tools on behalf of the agent loop.
///
/// The health-data tools themselves live outside this crate; this seam is how
/// they are plugged in.
#[async_trait]
pub trait ToolExecutor: Send + Sync {
    /// Tool specifications in the chat endpoint's expected format.
    fn specs(&self) -> Vec<Value>;

    /// Execute a named tool and return its result text.
    async fn execute(&self, name: &str, arguments: &Value) -> Result<String>;
}

/// A tool executor with no tools. The agent falls back to plain chat.
pub struct NoTools;

#[async_trait]
impl ToolExecutor for NoTools {
    fn specs(&self) -> Vec<Value> {
        Vec::new()
    }

    async fn execute(&self, name: &str, _arguments: &Value) -> Result<String> {
        Err(VitalisError::Agent(format!("Unknown tool: {name}")))
    }
}

/// HTTP agent against an Ollama-style `/api/chat` endpoint.
///
/// Runs a bounded tool-call loop: each round posts the conversation, executes
/// any requested tools, and feeds results back until the model answers in
/// plain text or the round limit is reached.
pub struct HttpAgent {
    client: reqwest::Client,
    base_url: String,
    model: String,
    max_tool_rounds: usize,
    tools: Arc<dyn ToolExecutor>,
}

impl HttpAgent {
    pub fn new(config: &AgentConfig, tools: Arc<dyn ToolExecutor>) -> Result<Self> {
        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(config.timeout_secs))
            .build()
            .map_err(|e| VitalisError::Agent(format!("Failed to create HTTP client: {e}")))?;

        Ok(Self {
            client,
            base_url: config.base_url.trim_end_matches('/').to_string(),
            model: config.model.clone(),
            max_tool_rounds: config.max_tool_rounds,
            tools,
        })
    }

    async fn chat_round(&self, messages: &[Value]) -> Result<Value> {
        let mut body = serde_json::json!({
            "model": self.model,
            "messages": messages,
            "stream": false,
        });
        let specs = self.tools.specs();
        if !specs.is_empty() {
            body["tools"] = Value::Array(specs);
        }

        let response = self
            .client
            .post(format!("{}/api/chat", self.base_url))
            .json(&body)
            .send()
            .await
            .map_err(|e| VitalisError::Agent(format!("Chat request failed: {e}")))?;

        if !response.status().is_success() {
            return Err(VitalisError::Agent(format!(
                "Chat endpoint returned {}",
                response.status()
            )));
        }

        response
            .json()
            .await
            .map_err(|e| VitalisError::Agent(format!("Invalid chat response: {e}")))
    }
}

#[async_trait]
impl Agent for HttpAgent {
    async fn generate(&self, system_prompt: &str, messages: &[ChatMessage]) -> Result<AgentReply> {
        let mut conversation: Vec<Value> = Vec::with_capacity(messages.len() + 1);
        conversation.push(serde_json::json!({"role": "system", "content": system_prompt}));
        for msg in messages {
            conversation.push(serde_json::json!({"role": msg.role, "content": msg.content}));
        }

        let mut tool_calls = Vec::new();

        // Bounded loop: the round limit guarantees termination even if the
        // model keeps asking for tools.
        for round in 0..=self.max_tool_rounds {
            let payload = self.chat_round(&conversation).await?;
            let message = payload.get("message").cloned().unwrap_or_default();
            let content = message
                .get("content")
                .and_then(|c| c.as_str())
                .unwrap_or("")
                .to_string();

            let requested: Vec<Value> = message
                .get("tool_calls")
                .and_then(|t| t.as_array())
                .cloned()
                .unwrap_or_default();

            if requested.is_empty() || round == self.max_tool_rounds {
                if round == self.max_tool_rounds && !requested.is_empty() {
                    tracing::warn!("Tool round limit reached, returning last response");
                }
                return Ok(AgentReply {
                    response_text: content,
                    tool_calls,
                });
            }

            conversation.push(message.clone());

            for call in requested {
                let name = call
                    .pointer("/function/name")
                    .and_then(|n| n.as_str())
                    .unwrap_or("")
                    .to_string();
                let arguments = call
                    .pointer("/function/arguments")
                    .cloned()
                    .unwrap_or(Value::Null);

                let result = match self.tools.execute(&name, &arguments).await {
                    Ok(text) => text,
                    Err(e) => {
                        tracing::warn!("Tool {name} failed: {e}");
                        format!("Tool error: {e}")
                    }
                };

                conversation.push(serde_json::json!({"role": "tool", "content": result}));
                tool_calls.push(ToolCall {
                    name,
                    arguments,
                    result,
                });
            }
        }

        unreachable!("loop returns within the round limit")
    }
}
