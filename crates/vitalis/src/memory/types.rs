//! Memory types for the Vitalis tier stores
//!
//! Defines the records each tier persists: conversation turns (short-term),
//! user goals (episodic), learned tool sequences (procedural), and verified
//! health facts (semantic).

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Role of a conversation participant
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    /// User message
    User,
    /// Assistant message
    Assistant,
}

impl Role {
    /// Convert role to string representation
    pub fn as_str(&self) -> &'static str {
        match self {
            Role::User => "user",
            Role::Assistant => "assistant",
        }
    }
}

/// A single turn in a conversation, owned by the short-term tier.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ConversationTurn {
    /// Session this turn belongs to
    pub session_id: String,
    /// Role of the speaker
    pub role: Role,
    /// Content of the message
    pub content: String,
    /// Timestamp when the turn was recorded
    pub timestamp: DateTime<Utc>,
    /// Ordered tool names used to produce this turn (assistant turns only)
    pub tools_used: Vec<String>,
}

impl ConversationTurn {
    /// Create a new conversation turn with the current timestamp
    pub fn new(session_id: &str, role: Role, content: String, tools_used: Vec<String>) -> Self {
        Self {
            session_id: session_id.to_string(),
            role,
            content,
            timestamp: Utc::now(),
            tools_used,
        }
    }

    /// Estimate token count using the chars/4 heuristic.
    ///
    /// Fast approximation for budget management, not precise tokenization.
    pub fn estimate_tokens(&self) -> usize {
        self.content.len() / 4
    }
}

/// A user-declared goal, owned by the episodic tier.
///
/// Goals are append-only: a new declaration stores a new record rather than
/// overwriting an earlier one.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Goal {
    /// User this goal belongs to
    pub user_id: String,
    /// Metric the goal targets (e.g. "weight")
    pub metric: String,
    /// Parsed target value, when the statement carried one
    pub target_value: Option<f64>,
    /// Unit of the target value (e.g. "lbs")
    pub unit: Option<String>,
    /// The goal text as the user stated it
    pub raw_text: String,
    /// When this goal was declared
    pub created_at: DateTime<Utc>,
}

impl Goal {
    /// Create a new goal with the current timestamp
    pub fn new(
        user_id: &str,
        metric: String,
        target_value: Option<f64>,
        unit: Option<String>,
        raw_text: String,
    ) -> Self {
        Self {
            user_id: user_id.to_string(),
            metric,
            target_value,
            unit,
            raw_text,
            created_at: Utc::now(),
        }
    }
}

/// A learned tool-call sequence for a query pattern, owned by the procedural
/// tier.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Procedure {
    /// Hash of the normalized query pattern
    pub pattern_hash: String,
    /// A representative query matching this pattern
    pub representative_query: String,
    /// Ordered tool names that answered this pattern; never empty for a
    /// stored procedure
    pub tool_sequence: Vec<String>,
    /// How many times this pattern has executed
    pub execution_count: u32,
    /// Running average execution time in milliseconds
    pub avg_execution_ms: f64,
    /// Running average success score in [0, 1]
    pub avg_success_score: f64,
    /// When this procedure was last matched
    pub last_used_at: DateTime<Utc>,
}

impl Procedure {
    /// Create a procedure from its first observed execution.
    pub fn new(
        pattern_hash: String,
        representative_query: String,
        tool_sequence: Vec<String>,
        execution_ms: f64,
        success_score: f64,
    ) -> Self {
        Self {
            pattern_hash,
            representative_query,
            tool_sequence,
            execution_count: 1,
            avg_execution_ms: execution_ms,
            avg_success_score: success_score.clamp(0.0, 1.0),
            last_used_at: Utc::now(),
        }
    }

    /// Fold a repeat execution into the running averages.
    pub fn record_execution(&mut self, execution_ms: f64, success_score: f64) {
        let count = self.execution_count as f64;
        self.avg_execution_ms = (self.avg_execution_ms * count + execution_ms) / (count + 1.0);
        self.avg_success_score =
            (self.avg_success_score * count + success_score.clamp(0.0, 1.0)) / (count + 1.0);
        self.execution_count += 1;
        self.last_used_at = Utc::now();
    }

    /// Confidence in this procedure, in [0, 1].
    ///
    /// Grows with repeat executions: `min(avg_success * (1 + count/10), 1.0)`.
    pub fn confidence(&self) -> f64 {
        (self.avg_success_score * (1.0 + self.execution_count as f64 / 10.0)).min(1.0)
    }
}

/// Classification of a semantic fact
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum FactType {
    /// What a metric or term means
    Definition,
    /// A recommended range or practice
    Guideline,
    /// How two metrics relate
    Relationship,
}

/// Confidence level of a semantic fact's source
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum FactConfidence {
    High,
    Medium,
}

/// A general, non-user-specific verified health fact, owned by the semantic
/// tier.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SemanticFact {
    /// The fact statement
    pub fact_text: String,
    /// Classification of the fact
    pub fact_type: FactType,
    /// Category the fact belongs to (e.g. "heart_rate")
    pub category: String,
    /// When the fact applies
    pub context: String,
    /// Where the fact comes from
    pub source: String,
    /// Source confidence level
    pub confidence: FactConfidence,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_conversation_turn_serialization() {
        let turn = ConversationTurn::new(
            "session-1",
            Role::User,
            "What was my heart rate yesterday?".to_string(),
            Vec::new(),
        );

        let json = serde_json::to_string(&turn).expect("Failed to serialize turn");
        assert!(json.contains("\"role\":\"user\""));
        let deserialized: ConversationTurn =
            serde_json::from_str(&json).expect("Failed to deserialize turn");
        assert_eq!(deserialized.session_id, "session-1");
        assert_eq!(deserialized.role, Role::User);
    }

    #[test]
    fn test_turn_estimate_tokens() {
        let turn = ConversationTurn::new("s", Role::User, "a".repeat(100), Vec::new());
        assert_eq!(turn.estimate_tokens(), 25);
    }

    #[test]
    fn test_procedure_incremental_average() {
        let mut proc = Procedure::new(
            "hash-1".to_string(),
            "average heart rate last week".to_string(),
            vec!["aggregate_metrics".to_string()],
            100.0,
            0.8,
        );

        proc.record_execution(200.0, 1.0);
        assert_eq!(proc.execution_count, 2);
        assert!((proc.avg_execution_ms - 150.0).abs() < 1e-9);
        assert!((proc.avg_success_score - 0.9).abs() < 1e-9);
    }

    #[test]
    fn test_procedure_confidence_monotone_under_perfect_scores() {
        let mut proc = Procedure::new(
            "hash-1".to_string(),
            "query".to_string(),
            vec!["search".to_string()],
            50.0,
            1.0,
        );

        let mut last = proc.confidence();
        for _ in 0..20 {
            proc.record_execution(50.0, 1.0);
            let current = proc.confidence();
            assert!(
                current >= last,
                "Confidence should be non-decreasing: {last} -> {current}"
            );
            last = current;
        }
        assert!((last - 1.0).abs() < 1e-9, "Confidence should saturate at 1.0");
    }

    #[test]
    fn test_procedure_confidence_clamped() {
        let proc = Procedure::new(
            "h".to_string(),
            "q".to_string(),
            vec!["t".to_string()],
            10.0,
            1.0,
        );
        assert!(proc.confidence() <= 1.0);

        let low = Procedure::new(
            "h".to_string(),
            "q".to_string(),
            vec!["t".to_string()],
            10.0,
            0.5,
        );
        assert!((low.confidence() - 0.55).abs() < 1e-9);
    }

    #[test]
    fn test_success_score_clamped_on_record() {
        let mut proc = Procedure::new(
            "h".to_string(),
            "q".to_string(),
            vec!["t".to_string()],
            10.0,
            2.0,
        );
        assert_eq!(proc.avg_success_score, 1.0);

        proc.record_execution(10.0, -1.0);
        assert!(proc.avg_success_score >= 0.0);
    }

    #[test]
    fn test_semantic_fact_serialization() {
        let fact = SemanticFact {
            fact_text: "A normal resting heart rate for adults is 60-100 bpm".to_string(),
            fact_type: FactType::Guideline,
            category: "heart_rate".to_string(),
            context: "resting, adults".to_string(),
            source: "AHA".to_string(),
            confidence: FactConfidence::High,
        };

        let json = serde_json::to_string(&fact).expect("Failed to serialize fact");
        assert!(json.contains("\"fact_type\":\"guideline\""));
        assert!(json.contains("\"confidence\":\"high\""));
    }

    #[test]
    fn test_goal_serialization_round_trip() {
        let goal = Goal::new(
            "user-1",
            "weight".to_string(),
            Some(150.0),
            Some("lbs".to_string()),
            "reach 150 lbs".to_string(),
        );

        let json = serde_json::to_string(&goal).expect("Failed to serialize goal");
        let deserialized: Goal = serde_json::from_str(&json).expect("Failed to deserialize goal");
        assert_eq!(deserialized.target_value, Some(150.0));
        assert_eq!(deserialized.unit.as_deref(), Some("lbs"));
    }
}
