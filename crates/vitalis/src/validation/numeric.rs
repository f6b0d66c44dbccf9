//! Numeric extraction and fact-checking
//!
//! Extracts numeric values (with adjacent units) from a generated response
//! and from tool results, then flags response values unsupported by any tool
//! evidence. Tolerances allow the model to round for readability without
//! being flagged.

use std::sync::LazyLock;

use regex::Regex;

use crate::agent::ToolCall;
use crate::validation::dates::DateValidator;
use crate::validation::ValidationReport;

static NUMBER_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"\d{1,3}(?:,\d{3})+(?:\.\d+)?|\d+(?:\.\d+)?").expect("number regex is valid")
});

static UNIT_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(
        r"(?i)^\s*(bpm|lbs?|pounds?|kgs?|kilograms?|steps?|hours?|hrs?|minutes?|mins?|miles?|km|cal(?:orie)?s?|kcal|percent|%|count)\b",
    )
    .expect("unit regex is valid")
});

/// How far past a number to look for its unit token.
const UNIT_WINDOW: usize = 12;

/// A numeric value extracted from text, with an adjacent unit when present.
#[derive(Debug, Clone, PartialEq)]
pub struct NumberMatch {
    /// Parsed value
    pub value: f64,
    /// Unit token found within the window after the number, lowercased
    pub unit: Option<String>,
    /// Byte offset of the number in the source text
    pub position: usize,
    /// The number as written
    pub raw: String,
}

impl NumberMatch {
    fn describe(&self) -> String {
        match &self.unit {
            Some(unit) => format!("{} {unit}", self.raw),
            None => self.raw.clone(),
        }
    }
}

/// Extract numeric literals plus adjacent unit tokens from text.
pub fn extract_numbers_with_context(text: &str) -> Vec<NumberMatch> {
    NUMBER_RE
        .find_iter(text)
        .filter_map(|m| {
            let raw = m.as_str().to_string();
            let value: f64 = raw.replace(',', "").parse().ok()?;

            let window_end = (m.end() + UNIT_WINDOW).min(text.len());
            let unit = text
                .get(m.end()..window_end)
                .and_then(|window| UNIT_RE.captures(window))
                .map(|caps| caps[1].to_lowercase());

            Some(NumberMatch {
                value,
                unit,
                position: m.start(),
                raw,
            })
        })
        .collect()
}

/// Extract ground-truth numbers from tool results.
pub fn extract_tool_numbers(tool_calls: &[ToolCall]) -> Vec<NumberMatch> {
    tool_calls
        .iter()
        .flat_map(|call| extract_numbers_with_context(&call.result))
        .collect()
}

/// Numeric fact-checker with configurable tolerances.
#[derive(Debug, Clone)]
pub struct NumericValidator {
    /// Relative tolerance (fraction of the larger magnitude)
    pub relative_tolerance: f64,
    /// Absolute tolerance covering readability roundings ("87.5" -> "88")
    pub absolute_tolerance: f64,
}

impl Default for NumericValidator {
    fn default() -> Self {
        Self {
            relative_tolerance: 0.10,
            absolute_tolerance: 1.0,
        }
    }
}

impl NumericValidator {
    pub fn new(relative_tolerance: f64, absolute_tolerance: f64) -> Self {
        Self {
            relative_tolerance,
            absolute_tolerance,
        }
    }

    /// Whether two values agree within tolerance.
    ///
    /// Matches when the absolute difference is within the rounding allowance
    /// OR the relative difference is within the configured fraction. The two
    /// thresholds cover small roundings and proportional drift on large
    /// values respectively.
    pub fn values_match(&self, a: f64, b: f64) -> bool {
        let diff = (a - b).abs();
        if diff <= self.absolute_tolerance {
            return true;
        }
        let scale = a.abs().max(b.abs());
        scale > 0.0 && diff / scale <= self.relative_tolerance
    }

    /// Exact agreement, used in strict mode: no rounding leeway.
    fn values_match_strict(a: f64, b: f64) -> bool {
        (a - b).abs() <= f64::EPSILON * a.abs().max(b.abs()).max(1.0)
    }

    /// Check every number in the response against tool evidence.
    ///
    /// Numbers that are components of a date mention are excluded; dates are
    /// fact-checked separately. A response with no numbers scores 1.0, since
    /// there is nothing to hallucinate.
    pub fn validate_response(
        &self,
        response: &str,
        tool_calls: &[ToolCall],
        strict: bool,
    ) -> ValidationReport {
        let date_spans = DateValidator::date_spans(response);
        let response_numbers: Vec<NumberMatch> = extract_numbers_with_context(response)
            .into_iter()
            .filter(|n| !date_spans.iter().any(|span| span.contains(&n.position)))
            .collect();

        if response_numbers.is_empty() {
            return ValidationReport::clean();
        }

        let truth = extract_tool_numbers(tool_calls);

        if truth.is_empty() {
            let hallucinations: Vec<String> =
                response_numbers.iter().map(|n| n.describe()).collect();
            return ValidationReport {
                valid: false,
                score: 0.0,
                matched: Vec::new(),
                warnings: vec![format!(
                    "Response contains {} numeric value(s) but no tool data is available to verify them",
                    hallucinations.len()
                )],
                hallucinations,
            };
        }

        let mut matched = Vec::new();
        let mut hallucinations = Vec::new();

        for number in &response_numbers {
            let confirmed = truth.iter().any(|t| {
                if strict {
                    Self::values_match_strict(number.value, t.value)
                } else {
                    self.values_match(number.value, t.value)
                }
            });
            if confirmed {
                matched.push(number.describe());
            } else {
                hallucinations.push(number.describe());
            }
        }

        let score = matched.len() as f64 / response_numbers.len() as f64;
        let warnings = if hallucinations.is_empty() {
            Vec::new()
        } else {
            vec![format!(
                "Values not supported by tool results: {}",
                hallucinations.join(", ")
            )]
        };

        ValidationReport {
            valid: hallucinations.is_empty(),
            score,
            matched,
            hallucinations,
            warnings,
        }
    }
}
