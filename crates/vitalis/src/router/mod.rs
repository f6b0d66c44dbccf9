//! Query intent and memory-scope classification
//!
//! Pure, stateless pre-routing: decides which memory tiers a query needs and
//! answers goal statements and goal-retrieval questions without invoking the
//! tool-calling loop at all. The phrase lists are deliberate heuristics; a
//! missed match falls through to the full tool path rather than failing.

use std::sync::LazyLock;

use regex::Regex;

use crate::memory::types::{FactConfidence, FactType, Goal, SemanticFact};

/// Which memory tiers a query should consult.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MemoryScope {
    /// Only the current session's history is relevant
    Session,
    /// Only cross-session memory (goals, facts, habits) is relevant
    CrossSession,
    /// Consult everything
    Both,
}

/// Phrases that reference the current conversation.
const SESSION_PHRASES: &[&str] = &[
    "first thing i asked",
    "earlier in this conversation",
    "earlier in this chat",
    "you just said",
    "you just told me",
    "we just talked",
    "a moment ago",
    "in this conversation",
    "what did i just",
];

/// Phrases that reference durable, cross-session memory.
const CROSS_SESSION_PHRASES: &[&str] = &[
    "my goal",
    "my goals",
    "my target",
    "usually",
    "normally",
    "typically",
    "in general",
    "last time we",
    "do you remember",
    "what do you know about me",
];

/// Lead-in patterns that open a goal declaration.
const GOAL_LEADINS: &[&str] = &[
    "my goal is to ",
    "my goal is ",
    "my target is to ",
    "my target is ",
    "i want to ",
    "i plan to ",
    "i am aiming to ",
    "i'm aiming to ",
];

static GOAL_RETRIEVAL_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(
        r"(?i)\b(what\s+(is|was|are)\s+my\s+goals?|what's\s+my\s+goals?|tell\s+me\s+my\s+goals?|remind\s+me\s+(of|about)\s+my\s+goals?|do\s+i\s+have\s+a\s+goal)\b",
    )
    .expect("goal retrieval regex is valid")
});

static GOAL_TARGET_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?i)(\d+(?:\.\d+)?)\s*(lbs?|pounds?|kgs?|kilograms?|bpm|steps?|hours?|minutes?|mins?|%)")
        .expect("goal target regex is valid")
});

/// Classify which memory tiers a query should consult.
///
/// Defaults to [`MemoryScope::Both`]; an utterance matching both phrase lists
/// also falls back to `Both`.
pub fn classify_memory_scope(query: &str) -> MemoryScope {
    let lower = query.to_lowercase();
    let session = SESSION_PHRASES.iter().any(|p| lower.contains(p));
    let cross = CROSS_SESSION_PHRASES.iter().any(|p| lower.contains(p));

    match (session, cross) {
        (true, false) => MemoryScope::Session,
        (false, true) => MemoryScope::CrossSession,
        _ => MemoryScope::Both,
    }
}

/// Whether the text declares a goal ("my goal is...", "I want to...").
///
/// Interrogative forms never match.
pub fn is_goal_setting_statement(text: &str) -> bool {
    let trimmed = text.trim();
    if trimmed.ends_with('?') {
        return false;
    }
    let lower = trimmed.to_lowercase();
    if lower.starts_with("what")
        || lower.starts_with("how")
        || lower.starts_with("when")
        || lower.starts_with("why")
        || lower.starts_with("do i")
    {
        return false;
    }

    GOAL_LEADINS.iter().any(|p| lower.contains(p))
}

/// Whether the text asks what the stored goal is.
///
/// Progress-style questions ("how am I doing with my goal") do not match;
/// those need tool data, not a stored string.
pub fn is_goal_retrieval_question(text: &str) -> bool {
    let lower = text.to_lowercase();
    if lower.contains("how am i doing") || lower.contains("progress") {
        return false;
    }
    GOAL_RETRIEVAL_RE.is_match(text)
}

/// Extract the goal text following the lead-in pattern, preserving the
/// original casing. Falls back to the full text when no pattern matches.
pub fn extract_goal_from_statement(text: &str) -> String {
    let trimmed = text.trim();
    let lower = trimmed.to_lowercase();

    for leadin in GOAL_LEADINS {
        if let Some(pos) = lower.find(leadin) {
            let start = pos + leadin.len();
            if let Some(rest) = trimmed.get(start..) {
                let goal = rest.trim().trim_end_matches(['.', '!']);
                if !goal.is_empty() {
                    return goal.to_string();
                }
            }
        }
    }

    trimmed.to_string()
}

/// Parse a structured target out of a goal text: "reach 150 lbs" ->
/// (150.0, "lbs").
pub fn parse_goal_target(text: &str) -> Option<(f64, String)> {
    let caps = GOAL_TARGET_RE.captures(text)?;
    let value: f64 = caps.get(1)?.as_str().parse().ok()?;
    let unit = caps.get(2)?.as_str().to_lowercase();
    Some((value, unit))
}

/// Infer which metric a goal text refers to.
pub fn infer_goal_metric(text: &str) -> String {
    let lower = text.to_lowercase();
    if lower.contains("lb") || lower.contains("kg") || lower.contains("pound") || lower.contains("weigh")
    {
        "weight".to_string()
    } else if lower.contains("bpm") || lower.contains("heart") {
        "heart_rate".to_string()
    } else if lower.contains("step") {
        "steps".to_string()
    } else if lower.contains("sleep") || lower.contains("hour") {
        "sleep".to_string()
    } else if lower.contains("run") || lower.contains("walk") || lower.contains("exercise") {
        "exercise".to_string()
    } else {
        "general".to_string()
    }
}

/// Build a [`Goal`] from a declarative goal statement.
pub fn goal_from_statement(user_id: &str, text: &str) -> Goal {
    let goal_text = extract_goal_from_statement(text);
    let target = parse_goal_target(&goal_text);
    Goal::new(
        user_id,
        infer_goal_metric(&goal_text),
        target.as_ref().map(|(v, _)| *v),
        target.map(|(_, u)| u),
        goal_text,
    )
}

/// Derive a general-knowledge statement from conversation, if the text looks
/// like one. Declarative only; never user-specific.
pub fn derive_semantic_fact(text: &str) -> Option<SemanticFact> {
    let trimmed = text.trim();
    if trimmed.ends_with('?') || trimmed.len() < 20 {
        return None;
    }
    let lower = trimmed.to_lowercase();
    if lower.contains(" my ") || lower.starts_with("my ") || lower.contains(" i ") || lower.starts_with("i ")
    {
        return None;
    }

    let markers = [
        "generally",
        "typically",
        "on average",
        "research shows",
        "is considered",
        "experts recommend",
    ];
    if !markers.iter().any(|m| lower.contains(m)) {
        return None;
    }

    Some(SemanticFact {
        fact_text: trimmed.trim_end_matches(['.', '!']).to_string(),
        fact_type: FactType::Guideline,
        category: "general".to_string(),
        context: "derived from conversation".to_string(),
        source: "conversation".to_string(),
        confidence: FactConfidence::Medium,
    })
}

/// Outcome of the fast-path bypass check.
#[derive(Debug, Clone)]
pub enum BypassDecision {
    /// The message declares a goal: acknowledge it without tools. The caller
    /// is responsible for persisting `goal` into episodic memory.
    GoalSetting { goal: Goal, response: String },
    /// The message asks for the stored goal: answer from memory.
    GoalRetrieval { response: String },
    /// Neither fast path applies: proceed to the full tool-calling loop.
    Proceed,
}

impl BypassDecision {
    /// Intent label for observability, matching the wire field.
    pub fn intent(&self) -> Option<&'static str> {
        match self {
            BypassDecision::GoalSetting { .. } => Some("goal_setting"),
            BypassDecision::GoalRetrieval { .. } => Some("goal_retrieval"),
            BypassDecision::Proceed => None,
        }
    }
}

/// Decide whether the message can be answered without the tool-calling loop.
///
/// `prior_goal` is the most recent stored goal, fetched by the caller; passing
/// it in keeps this function pure.
pub fn should_bypass_tools(user_id: &str, message: &str, prior_goal: Option<&Goal>) -> BypassDecision {
    if is_goal_setting_statement(message) {
        let goal = goal_from_statement(user_id, message);
        let response = format!(
            "Got it! I've saved your goal: {}. I'll keep it in mind going forward.",
            goal.raw_text
        );
        return BypassDecision::GoalSetting { goal, response };
    }

    if is_goal_retrieval_question(message) {
        let response = match prior_goal {
            Some(goal) => format!(
                "Your current goal is: {} (set on {}).",
                goal.raw_text,
                goal.created_at.format("%B %-d, %Y")
            ),
            None => "You haven't set a goal yet. Tell me your goal and I'll remember it."
                .to_string(),
        };
        return BypassDecision::GoalRetrieval { response };
    }

    BypassDecision::Proceed
}
