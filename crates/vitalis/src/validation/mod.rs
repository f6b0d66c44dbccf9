//! Response validation against tool evidence
//!
//! Numeric and date fact-checking for generated responses, plus the bounded
//! retry policy that requests one corrective regeneration when validation
//! fails outright.

pub mod dates;
pub mod numeric;
pub mod retry;

use serde::Serialize;

pub use dates::{DateCheck, DateMention, DateValidator};
pub use numeric::{NumberMatch, NumericValidator, extract_numbers_with_context, extract_tool_numbers};
pub use retry::{RetryController, RetryOutcome};

/// Validation outcome for a single response. Ephemeral; never persisted.
///
/// Invariant: `score == 1.0` exactly when `hallucinations` is empty.
#[derive(Debug, Clone, Serialize)]
pub struct ValidationReport {
    /// Whether the response passed validation
    pub valid: bool,
    /// Fraction of response numbers confirmed by tool evidence (0-1)
    pub score: f64,
    /// Numeric tokens confirmed against tool evidence
    pub matched: Vec<String>,
    /// Numeric tokens present in the response but unsupported by evidence
    pub hallucinations: Vec<String>,
    /// Human-readable notes, including date mismatches
    pub warnings: Vec<String>,
}

impl ValidationReport {
    /// A passing report for a response with nothing to check.
    pub fn clean() -> Self {
        Self {
            valid: true,
            score: 1.0,
            matched: Vec::new(),
            hallucinations: Vec::new(),
            warnings: Vec::new(),
        }
    }
}

impl Default for ValidationReport {
    fn default() -> Self {
        Self::clean()
    }
}
