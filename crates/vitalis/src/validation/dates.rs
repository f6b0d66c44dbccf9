//! Date extraction and fact-checking
//!
//! Extracts specific dates (month name + day, optional year) from text and
//! flags response dates that contradict the dates the user asked about.

use std::ops::Range;
use std::sync::LazyLock;

use regex::Regex;

static DATE_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(
        r"(?ix)
        \b(january|jan|february|feb|march|mar|april|apr|may|june|jun|
           july|jul|august|aug|september|sept|sep|october|oct|
           november|nov|december|dec)\b
        \.?\s+
        (\d{1,2})(?:st|nd|rd|th)?
        (?:,?\s*(\d{4}))?",
    )
    .expect("date regex is valid")
});

/// A specific date mentioned in text.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DateMention {
    pub month: u32,
    pub day: u32,
    pub year: Option<i32>,
}

impl DateMention {
    fn describe(&self) -> String {
        match self.year {
            Some(year) => format!("{}/{} {}", self.month, self.day, year),
            None => format!("{}/{}", self.month, self.day),
        }
    }
}

/// Outcome of checking response dates against query dates.
#[derive(Debug, Clone)]
pub struct DateCheck {
    pub valid: bool,
    pub mismatches: Vec<String>,
    pub warnings: Vec<String>,
    pub query_dates: Vec<DateMention>,
    pub response_dates: Vec<DateMention>,
}

fn month_number(name: &str) -> Option<u32> {
    let month = match &name.to_lowercase()[..3] {
        "jan" => 1,
        "feb" => 2,
        "mar" => 3,
        "apr" => 4,
        "may" => 5,
        "jun" => 6,
        "jul" => 7,
        "aug" => 8,
        "sep" => 9,
        "oct" => 10,
        "nov" => 11,
        "dec" => 12,
        _ => return None,
    };
    Some(month)
}

/// Validator for dates in generated responses.
pub struct DateValidator;

impl DateValidator {
    /// Extract specific dates from text: month name or abbreviation, day with
    /// optional ordinal suffix, optional year.
    pub fn extract_specific_dates(text: &str) -> Vec<DateMention> {
        DATE_RE
            .captures_iter(text)
            .filter_map(|caps| {
                let month = month_number(caps.get(1)?.as_str())?;
                let day: u32 = caps.get(2)?.as_str().parse().ok()?;
                if !(1..=31).contains(&day) {
                    return None;
                }
                let year = caps.get(3).and_then(|y| y.as_str().parse().ok());
                Some(DateMention { month, day, year })
            })
            .collect()
    }

    /// Byte ranges of date mentions. Used to exclude date components from
    /// numeric fact-checking.
    pub fn date_spans(text: &str) -> Vec<Range<usize>> {
        DATE_RE
            .captures_iter(text)
            .filter_map(|caps| caps.get(0).map(|m| m.range()))
            .collect()
    }

    /// Month and day must match exactly; the year is compared only when both
    /// sides carry one.
    pub fn dates_match(a: &DateMention, b: &DateMention) -> bool {
        if a.month != b.month || a.day != b.day {
            return false;
        }
        match (a.year, b.year) {
            (Some(ya), Some(yb)) => ya == yb,
            _ => true,
        }
    }

    /// Flag response dates that contradict the dates the query asked about.
    ///
    /// Trivially valid when the query mentions no dates or the response
    /// mentions none: nothing to contradict.
    pub fn validate_response(query: &str, response: &str) -> DateCheck {
        let query_dates = Self::extract_specific_dates(query);
        let response_dates = Self::extract_specific_dates(response);

        if query_dates.is_empty() || response_dates.is_empty() {
            return DateCheck {
                valid: true,
                mismatches: Vec::new(),
                warnings: Vec::new(),
                query_dates,
                response_dates,
            };
        }

        let mut mismatches = Vec::new();
        for rd in &response_dates {
            if !query_dates.iter().any(|qd| Self::dates_match(qd, rd)) {
                mismatches.push(rd.describe());
            }
        }

        let warnings = if mismatches.is_empty() {
            Vec::new()
        } else {
            vec![format!(
                "Response mentions dates not present in the question: {}",
                mismatches.join(", ")
            )]
        };

        DateCheck {
            valid: mismatches.is_empty(),
            mismatches,
            warnings,
            query_dates,
            response_dates,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_extract_full_date() {
        let dates = DateValidator::extract_specific_dates("October 15th, 2025");
        assert_eq!(dates.len(), 1);
        assert_eq!(
            dates[0],
            DateMention {
                month: 10,
                day: 15,
                year: Some(2025)
            }
        );
    }

    #[test]
    fn test_extract_abbreviated_month_without_year() {
        let dates = DateValidator::extract_specific_dates("your peak was on Oct 3");
        assert_eq!(dates.len(), 1);
        assert_eq!(
            dates[0],
            DateMention {
                month: 10,
                day: 3,
                year: None
            }
        );
    }

    #[test]
    fn test_extract_rejects_invalid_day() {
        assert!(DateValidator::extract_specific_dates("January 42").is_empty());
    }

    #[test]
    fn test_extract_multiple_dates() {
        let dates =
            DateValidator::extract_specific_dates("between June 1st and June 30th you walked more");
        assert_eq!(dates.len(), 2);
        assert_eq!(dates[0].day, 1);
        assert_eq!(dates[1].day, 30);
    }

    #[test]
    fn test_dates_match_year_optional() {
        let without_year = DateMention {
            month: 10,
            day: 15,
            year: None,
        };
        let with_year = DateMention {
            month: 10,
            day: 15,
            year: Some(2025),
        };
        assert!(DateValidator::dates_match(&without_year, &with_year));
        assert!(DateValidator::dates_match(&with_year, &without_year));
    }

    #[test]
    fn test_dates_match_exact_year_conflict() {
        let a = DateMention {
            month: 10,
            day: 15,
            year: Some(2024),
        };
        let b = DateMention {
            month: 10,
            day: 15,
            year: Some(2025),
        };
        assert!(!DateValidator::dates_match(&a, &b));
    }

    #[test]
    fn test_dates_match_day_mismatch() {
        let a = DateMention {
            month: 10,
            day: 15,
            year: None,
        };
        let b = DateMention {
            month: 10,
            day: 16,
            year: None,
        };
        assert!(!DateValidator::dates_match(&a, &b));
    }

    #[test]
    fn test_validate_flags_contradicting_date() {
        let check = DateValidator::validate_response(
            "What was my heart rate on October 15th?",
            "On October 17th your average was 72 bpm",
        );
        assert!(!check.valid);
        assert_eq!(check.mismatches, vec!["10/17"]);
        assert_eq!(check.warnings.len(), 1);
    }

    #[test]
    fn test_validate_passes_matching_date() {
        let check = DateValidator::validate_response(
            "What was my heart rate on October 15th, 2025?",
            "On October 15th your average was 72 bpm",
        );
        assert!(check.valid);
        assert!(check.mismatches.is_empty());
    }

    #[test]
    fn test_validate_trivially_passes_without_query_dates() {
        let check = DateValidator::validate_response(
            "What was my heart rate yesterday?",
            "On October 17th your average was 72 bpm",
        );
        assert!(check.valid, "No query dates means nothing to contradict");
    }

    #[test]
    fn test_validate_trivially_passes_without_response_dates() {
        let check = DateValidator::validate_response(
            "What was my heart rate on October 15th?",
            "Your average was 72 bpm",
        );
        assert!(check.valid);
    }

    #[test]
    fn test_date_spans_cover_mentions() {
        let text = "On October 15th, 2025 you walked 9000 steps";
        let spans = DateValidator::date_spans(text);
        assert_eq!(spans.len(), 1);
        let covered = &text[spans[0].clone()];
        assert!(covered.contains("October 15th"));
        assert!(covered.contains("2025"));
    }
}
