use serde::Deserialize;

/// Main configuration structure for Vitalis
#[derive(Debug, Clone, Deserialize, Default)]
pub struct Config {
    /// HTTP server configuration
    #[serde(default)]
    pub server: ServerConfig,
    /// Memory tier configuration
    #[serde(default)]
    pub memory: MemoryConfig,
    /// Response validation configuration
    #[serde(default)]
    pub validation: ValidationConfig,
    /// LLM agent configuration
    #[serde(default)]
    pub agent: AgentConfig,
    /// Embedding backend configuration
    #[serde(default)]
    pub embedding: EmbeddingConfig,
}

/// HTTP server configuration
#[derive(Debug, Clone, Deserialize)]
pub struct ServerConfig {
    /// Address to listen on (e.g., "127.0.0.1:8787")
    #[serde(default = "default_listen_addr")]
    pub listen_addr: String,
    /// Request timeout in seconds
    #[serde(default = "default_timeout_secs")]
    pub timeout_secs: u64,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            listen_addr: default_listen_addr(),
            timeout_secs: default_timeout_secs(),
        }
    }
}

fn default_listen_addr() -> String {
    "127.0.0.1:8787".to_string()
}

fn default_timeout_secs() -> u64 {
    120
}

/// Memory tier configuration
#[derive(Debug, Clone, Deserialize)]
pub struct MemoryConfig {
    /// Maximum conversation turns kept per session
    #[serde(default = "default_short_term_max_turns")]
    pub short_term_max_turns: usize,
    /// Token budget for short-term history (chars/4 heuristic)
    #[serde(default = "default_short_term_max_tokens")]
    pub short_term_max_tokens: usize,
    /// TTL for short-term session keys, in seconds
    #[serde(default = "default_short_term_ttl_secs")]
    pub short_term_ttl_secs: u64,
    /// TTL for episodic goals, in days (roughly 7 months)
    #[serde(default = "default_episodic_ttl_days")]
    pub episodic_ttl_days: u64,
    /// TTL for learned procedures, in days
    #[serde(default = "default_procedural_ttl_days")]
    pub procedural_ttl_days: u64,
    /// TTL for semantic facts, in days
    #[serde(default = "default_semantic_ttl_days")]
    pub semantic_ttl_days: u64,
    /// Maximum results per vector-backed tier query
    #[serde(default = "default_top_k")]
    pub top_k: usize,
    /// Token budget for the merged context handed to the agent
    #[serde(default = "default_context_token_budget")]
    pub context_token_budget: usize,
    /// Capacity of the background write queue
    #[serde(default = "default_write_queue_capacity")]
    pub write_queue_capacity: usize,
}

impl Default for MemoryConfig {
    fn default() -> Self {
        Self {
            short_term_max_turns: default_short_term_max_turns(),
            short_term_max_tokens: default_short_term_max_tokens(),
            short_term_ttl_secs: default_short_term_ttl_secs(),
            episodic_ttl_days: default_episodic_ttl_days(),
            procedural_ttl_days: default_procedural_ttl_days(),
            semantic_ttl_days: default_semantic_ttl_days(),
            top_k: default_top_k(),
            context_token_budget: default_context_token_budget(),
            write_queue_capacity: default_write_queue_capacity(),
        }
    }
}

fn default_short_term_max_turns() -> usize {
    20
}

fn default_short_term_max_tokens() -> usize {
    4000
}

fn default_short_term_ttl_secs() -> u64 {
    60 * 60 * 24
}

fn default_episodic_ttl_days() -> u64 {
    210
}

fn default_procedural_ttl_days() -> u64 {
    90
}

fn default_semantic_ttl_days() -> u64 {
    365
}

fn default_top_k() -> usize {
    5
}

fn default_context_token_budget() -> usize {
    2000
}

fn default_write_queue_capacity() -> usize {
    256
}

/// Response validation configuration
#[derive(Debug, Clone, Deserialize)]
pub struct ValidationConfig {
    /// Relative tolerance for numeric fuzzy matching (0.0-1.0)
    #[serde(default = "default_relative_tolerance")]
    pub relative_tolerance: f64,
    /// Absolute tolerance for numeric fuzzy matching
    #[serde(default = "default_absolute_tolerance")]
    pub absolute_tolerance: f64,
    /// Numeric score at or below which a corrective retry is issued.
    /// Default 0.0: retry only on total numeric failure, never on near-miss
    /// roundings.
    #[serde(default = "default_retry_threshold")]
    pub retry_threshold: f64,
    /// Strict mode: disable the absolute rounding leeway
    #[serde(default)]
    pub strict: bool,
}

impl Default for ValidationConfig {
    fn default() -> Self {
        Self {
            relative_tolerance: default_relative_tolerance(),
            absolute_tolerance: default_absolute_tolerance(),
            retry_threshold: default_retry_threshold(),
            strict: false,
        }
    }
}

fn default_relative_tolerance() -> f64 {
    0.10
}

fn default_absolute_tolerance() -> f64 {
    1.0
}

fn default_retry_threshold() -> f64 {
    0.0
}

/// LLM agent configuration
#[derive(Debug, Clone, Deserialize)]
pub struct AgentConfig {
    /// Base URL of the local LLM chat endpoint
    #[serde(default = "default_agent_base_url")]
    pub base_url: String,
    /// Model identifier passed to the endpoint
    #[serde(default = "default_agent_model")]
    pub model: String,
    /// Maximum tool-call rounds per turn
    #[serde(default = "default_max_tool_rounds")]
    pub max_tool_rounds: usize,
    /// Request timeout in seconds
    #[serde(default = "default_agent_timeout_secs")]
    pub timeout_secs: u64,
}

impl Default for AgentConfig {
    fn default() -> Self {
        Self {
            base_url: default_agent_base_url(),
            model: default_agent_model(),
            max_tool_rounds: default_max_tool_rounds(),
            timeout_secs: default_agent_timeout_secs(),
        }
    }
}

fn default_agent_base_url() -> String {
    "http://127.0.0.1:11434".to_string()
}

fn default_agent_model() -> String {
    "llama3.1".to_string()
}

fn default_max_tool_rounds() -> usize {
    5
}

fn default_agent_timeout_secs() -> u64 {
    90
}

/// Embedding backend configuration
#[derive(Debug, Clone, Deserialize)]
pub struct EmbeddingConfig {
    /// Embedding endpoint URL (empty = deterministic local fallback)
    #[serde(default)]
    pub endpoint: Option<String>,
    /// Model identifier for the embedding endpoint
    #[serde(default = "default_embedding_model")]
    pub model: String,
    /// Embedding dimension size
    #[serde(default = "default_embedding_dimension")]
    pub dimension: usize,
    /// Entries kept in the content-hash embedding cache
    #[serde(default = "default_embedding_cache_size")]
    pub cache_size: usize,
}

impl Default for EmbeddingConfig {
    fn default() -> Self {
        Self {
            endpoint: None,
            model: default_embedding_model(),
            dimension: default_embedding_dimension(),
            cache_size: default_embedding_cache_size(),
        }
    }
}

fn default_embedding_model() -> String {
    "nomic-embed-text".to_string()
}

fn default_embedding_dimension() -> usize {
    384
}

fn default_embedding_cache_size() -> usize {
    1024
}
