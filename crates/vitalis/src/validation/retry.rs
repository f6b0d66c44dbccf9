//! Bounded validation-retry policy
//!
//! Runs the numeric and date validators over a draft response and requests at
//! most one corrective regeneration. The retry trigger is deliberately
//! conservative: total numeric failure or a date contradiction, never a
//! near-miss rounding.

use std::future::Future;

use crate::agent::ToolCall;
use crate::config::ValidationConfig;
use crate::error::Result;
use crate::validation::dates::DateValidator;
use crate::validation::numeric::NumericValidator;
use crate::validation::ValidationReport;

/// Outcome of the validate-and-maybe-retry step.
#[derive(Debug, Clone)]
pub struct RetryOutcome {
    /// The response to deliver
    pub response: String,
    /// Merged numeric + date validation summary for the delivered response
    pub report: ValidationReport,
    /// Whether a corrective regeneration was performed
    pub retried: bool,
}

/// Deterministic single-retry controller.
pub struct RetryController {
    numeric: NumericValidator,
    /// Numeric score at or below which a retry fires. Default 0.0: only a
    /// complete numeric failure triggers regeneration; partial scores pass
    /// through flagged.
    retry_threshold: f64,
    strict: bool,
}

impl RetryController {
    pub fn new(config: &ValidationConfig) -> Self {
        Self {
            numeric: NumericValidator::new(config.relative_tolerance, config.absolute_tolerance),
            retry_threshold: config.retry_threshold,
            strict: config.strict,
        }
    }

    /// Validate `draft` against tool evidence; regenerate at most once.
    ///
    /// The regeneration callback receives a correction instruction naming the
    /// unsupported values. If the callback itself fails, the original draft
    /// is delivered with its validation flags intact: a flagged answer beats
    /// no answer.
    pub async fn run<F, Fut>(
        &self,
        query: &str,
        draft: String,
        tool_calls: &[ToolCall],
        regenerate: F,
    ) -> RetryOutcome
    where
        F: FnOnce(String) -> Fut,
        Fut: Future<Output = Result<String>>,
    {
        let numeric = self.numeric.validate_response(&draft, tool_calls, self.strict);
        let dates = DateValidator::validate_response(query, &draft);

        let numbers_failed =
            !numeric.hallucinations.is_empty() && numeric.score <= self.retry_threshold;
        let dates_failed = !dates.mismatches.is_empty();

        if !numbers_failed && !dates_failed {
            return RetryOutcome {
                report: build_validation_result(numeric, &dates),
                response: draft,
                retried: false,
            };
        }

        let correction = build_correction(&numeric, &dates, tool_calls);
        tracing::info!(
            score = numeric.score,
            date_mismatches = dates.mismatches.len(),
            "Validation failed, requesting one corrective regeneration"
        );

        match regenerate(correction).await {
            Ok(new_draft) => {
                // One retry only; the regenerated draft is delivered whatever
                // its validation outcome.
                let new_numeric = self
                    .numeric
                    .validate_response(&new_draft, tool_calls, self.strict);
                let new_dates = DateValidator::validate_response(query, &new_draft);
                RetryOutcome {
                    report: build_validation_result(new_numeric, &new_dates),
                    response: new_draft,
                    retried: true,
                }
            }
            Err(e) => {
                tracing::warn!("Regeneration failed, delivering flagged draft: {e}");
                RetryOutcome {
                    report: build_validation_result(numeric, &dates),
                    response: draft,
                    retried: false,
                }
            }
        }
    }
}

/// Merge numeric and date outcomes into the summary returned to callers.
///
/// The score and hallucination list stay numeric-only; date mismatches land
/// in the warnings and fail `valid`.
pub fn build_validation_result(numeric: ValidationReport, dates: &DateCheckView) -> ValidationReport {
    let mut warnings = numeric.warnings;
    warnings.extend(dates.warnings.iter().cloned());

    ValidationReport {
        valid: numeric.valid && dates.valid,
        score: numeric.score,
        matched: numeric.matched,
        hallucinations: numeric.hallucinations,
        warnings,
    }
}

/// The subset of the date check the merge needs.
pub type DateCheckView = crate::validation::dates::DateCheck;

fn build_correction(
    numeric: &ValidationReport,
    dates: &DateCheckView,
    tool_calls: &[ToolCall],
) -> String {
    let mut parts = Vec::new();

    if !numeric.hallucinations.is_empty() {
        parts.push(format!(
            "These values are not supported by the tool results: {}.",
            numeric.hallucinations.join(", ")
        ));
        let evidence: Vec<String> = tool_calls
            .iter()
            .filter(|c| !c.result.is_empty())
            .map(|c| format!("{}: {}", c.name, c.result))
            .collect();
        if !evidence.is_empty() {
            parts.push(format!("The tool results were: {}.", evidence.join("; ")));
        }
    }

    if !dates.mismatches.is_empty() {
        parts.push(format!(
            "These dates do not match the question: {}.",
            dates.mismatches.join(", ")
        ));
    }

    parts.push(
        "Rewrite your answer using only values and dates present in the tool results and the question."
            .to_string(),
    );
    parts.join(" ")
}
