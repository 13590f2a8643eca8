//! Recovers error records from free-form model output.
//!
//! The model is asked for a bare JSON array but routinely wraps it in prose or markdown, cuts it
//! short, or invents fields. Extraction tries a fixed cascade of strategies and validates each
//! record on its own; it never fails, it only finds fewer records.

use super::{ErrorType, ValidatedError};
use log::{debug, warn};
use once_cell::sync::Lazy;
use regex::Regex;
use serde_json::Value;
use thiserror::Error;

/// Bracketed matches shorter than this are treated as noise (`[]`, `[1]`, ...).
const MIN_CANDIDATE_LEN: usize = 10;

const INVISIBLE_CHARS: [char; 4] = ['\u{200B}', '\u{200C}', '\u{200D}', '\u{FEFF}'];

static FIRST_BRACKETS: Lazy<Regex> = Lazy::new(|| Regex::new(r"(?s)\[.*?\]").unwrap());
static OUTER_BRACKETS: Lazy<Regex> = Lazy::new(|| Regex::new(r"(?s)\[.*\]").unwrap());
static FENCED_ARRAY: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"(?s)```(?:json)?\s*(\[.*?\])\s*```").unwrap());

/// Which step of the cascade produced the array.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Strategy {
    FirstBrackets,
    OuterBrackets,
    FencedBlock,
    WholeInput,
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum RecordRejection {
    #[error("record is not an object")]
    NotAnObject,
    #[error("`word` missing or empty")]
    MissingWord,
    #[error("`position` missing or not a finite number")]
    BadPosition,
    #[error("`suggestions` missing or without any string entry")]
    NoSuggestions,
}

impl TryFrom<&Value> for ValidatedError {
    type Error = RecordRejection;

    fn try_from(value: &Value) -> Result<Self, Self::Error> {
        let record = value.as_object().ok_or(RecordRejection::NotAnObject)?;

        let word = record
            .get("word")
            .and_then(Value::as_str)
            .filter(|w| !w.trim().is_empty())
            .ok_or(RecordRejection::MissingWord)?;

        let position = record
            .get("position")
            .and_then(finite_number)
            .ok_or(RecordRejection::BadPosition)?;

        let suggestions: Vec<String> = record
            .get("suggestions")
            .and_then(Value::as_array)
            .map(|items| {
                items
                    .iter()
                    .filter_map(Value::as_str)
                    .map(str::to_string)
                    .collect()
            })
            .unwrap_or_default();
        if suggestions.is_empty() {
            return Err(RecordRejection::NoSuggestions);
        }

        // An explicit end wins when it is consistent; otherwise the word length decides.
        let end_position = record
            .get("endPosition")
            .and_then(finite_number)
            .filter(|end| *end >= position)
            .unwrap_or_else(|| position.saturating_add(word.chars().count() as i64));

        Ok(ValidatedError {
            word: word.to_string(),
            position,
            end_position,
            error_type: ErrorType::parse_lenient(record.get("type").and_then(Value::as_str)),
            suggestions,
        })
    }
}

fn finite_number(value: &Value) -> Option<i64> {
    value
        .as_f64()
        .filter(|n| n.is_finite())
        .map(|n| n.floor() as i64)
}

/// Extracts every valid error record from raw model output.
pub fn extract(raw: &str) -> Vec<ValidatedError> {
    let content = raw.replace(&INVISIBLE_CHARS[..], "");

    let Some((strategy, items)) = locate_array(&content) else {
        return Vec::new();
    };

    let total = items.len();
    let errors: Vec<ValidatedError> = items
        .iter()
        .filter_map(|item| match ValidatedError::try_from(item) {
            Ok(error) => Some(error),
            Err(reason) => {
                debug!("Dropping error record: {}", reason);
                None
            }
        })
        .collect();

    debug!(
        "Recovered {} of {} error records via {:?}",
        errors.len(),
        total,
        strategy
    );
    errors
}

/// Runs the strategy cascade and returns the first array that parses.
pub fn locate_array(content: &str) -> Option<(Strategy, Vec<Value>)> {
    let candidates = [
        (
            Strategy::FirstBrackets,
            FIRST_BRACKETS.find(content).map(|m| m.as_str()),
        ),
        (
            Strategy::OuterBrackets,
            OUTER_BRACKETS.find(content).map(|m| m.as_str()),
        ),
        (
            Strategy::FencedBlock,
            FENCED_ARRAY
                .captures(content)
                .and_then(|c| c.get(1))
                .map(|m| m.as_str()),
        ),
    ];

    let mut rejected: Option<&str> = None;
    for (strategy, candidate) in candidates {
        let Some(candidate) = candidate else {
            continue;
        };
        if candidate.chars().count() < MIN_CANDIDATE_LEN {
            continue;
        }
        match serde_json::from_str::<Value>(candidate) {
            Ok(Value::Array(items)) => return Some((strategy, items)),
            Ok(_) => {}
            Err(e) => debug!("{:?} candidate is not valid JSON: {}", strategy, e),
        }
        rejected.get_or_insert(candidate);
    }

    if let Ok(Value::Array(items)) = serde_json::from_str::<Value>(content.trim()) {
        return Some((Strategy::WholeInput, items));
    }

    match rejected {
        Some(candidate) => warn!(
            "Failed to parse model output as a JSON array, treating as no errors. Matched content: {}",
            preview(candidate)
        ),
        None => debug!("No JSON array found in model output"),
    }
    None
}

fn preview(text: &str) -> &str {
    crate::dom::char_slice(text, 0, 200)
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    const FULL_RECORD: &str =
        r#"{"word":"x","position":0,"endPosition":1,"type":"spelling","suggestions":["y"]}"#;

    #[test]
    fn test_plain_prose_yields_nothing() {
        assert!(extract("no json here").is_empty());
        assert!(extract("").is_empty());
    }

    #[test]
    fn test_fenced_block_with_surrounding_prose() {
        let raw = format!("prefix ```json\n[{}]\n``` suffix", FULL_RECORD);
        let errors = extract(&raw);

        assert_eq!(
            errors,
            vec![ValidatedError {
                word: "x".to_string(),
                position: 0,
                end_position: 1,
                error_type: ErrorType::Spelling,
                suggestions: vec!["y".to_string()],
            }]
        );
    }

    #[test]
    fn test_fenced_block_is_reached_when_brackets_fail() {
        let raw = format!(
            "Notes [see below] and [broken\n```\n[{}]\n```",
            FULL_RECORD
        );
        let (strategy, items) = locate_array(&raw).unwrap();

        assert_eq!(strategy, Strategy::FencedBlock);
        assert_eq!(items.len(), 1);
    }

    #[test]
    fn test_outer_brackets_recover_nested_arrays() {
        let raw = format!("Here you go: [{0}, {0}] hope that helps", FULL_RECORD);
        let (strategy, items) = locate_array(&raw).unwrap();

        assert_eq!(strategy, Strategy::OuterBrackets);
        assert_eq!(items.len(), 2);
    }

    #[test]
    fn test_whole_input_accepts_short_arrays() {
        let (strategy, items) = locate_array("  [] ").unwrap();
        assert_eq!(strategy, Strategy::WholeInput);
        assert!(items.is_empty());
    }

    #[test]
    fn test_missing_fields_are_dropped() {
        assert!(extract(r#"[{"word":"x"}]"#).is_empty());
    }

    #[test]
    fn test_validation_gating() {
        let raw = r#"[
            {"word":"teh","position":4,"suggestions":[]},
            {"word":"teh","position":"5","suggestions":["the"]},
            {"word":"","position":1,"suggestions":["a"]},
            "not an object",
            {"word":"teh","position":4,"suggestions":["the", 3]}
        ]"#;
        let errors = extract(raw);

        assert_eq!(errors.len(), 1);
        assert_eq!(errors[0].suggestions, vec!["the".to_string()]);
    }

    #[test]
    fn test_defaults_for_type_and_end_position() {
        let raw = r#"[
            {"word":"recieve","position":10,"suggestions":["receive"]},
            {"word":"go","position":3,"endPosition":1,"type":"style","suggestions":["goes"]},
            {"word":"was","position":7,"endPosition":12,"type":"Grammar","suggestions":["were"]}
        ]"#;
        let errors = extract(raw);

        assert_eq!(errors[0].end_position, 17);
        assert_eq!(errors[0].error_type, ErrorType::Spelling);
        assert_eq!(errors[1].end_position, 5);
        assert_eq!(errors[1].error_type, ErrorType::Spelling);
        assert_eq!(errors[2].end_position, 12);
        assert_eq!(errors[2].error_type, ErrorType::Grammar);
    }

    #[test]
    fn test_huge_positions_saturate() {
        let raw = r#"[
            {"word":"teh","position":9223372036854775807,"suggestions":["the"]},
            {"word":"teh","position":1e300,"endPosition":1e300,"suggestions":["the"]},
            {"word":"teh","position":-1e300,"endPosition":1e300,"suggestions":["the"]}
        ]"#;
        let errors = extract(raw);

        assert_eq!(errors.len(), 3);
        assert_eq!(errors[0].position, i64::MAX);
        assert_eq!(errors[0].end_position, i64::MAX);
        assert_eq!(errors[1].end_position, i64::MAX);
        assert_eq!(errors[2].position, i64::MIN);
    }

    #[test]
    fn test_invisible_characters_are_stripped() {
        let raw = format!("\u{FEFF}[\u{200B}{}]", FULL_RECORD);
        assert_eq!(extract(&raw).len(), 1);
    }

    #[test]
    fn test_truncated_array_is_not_fatal() {
        let raw = r#"[{"word":"teh","position":0,"suggestions":["the"]}, {"word":"#;
        assert!(extract(raw).is_empty());
    }

    #[test]
    fn test_rejection_reasons() {
        let value: Value = serde_json::json!({"word": "a", "position": 1.5, "suggestions": "b"});
        assert_eq!(
            ValidatedError::try_from(&value),
            Err(RecordRejection::NoSuggestions)
        );
        let value: Value = serde_json::json!(42);
        assert_eq!(
            ValidatedError::try_from(&value),
            Err(RecordRejection::NotAnObject)
        );
    }
}
