pub mod mapper;
pub mod response;
pub mod serializer;
pub mod session;

use crate::dom::NodeId;
use serde::{Deserialize, Serialize};
use std::sync::{Arc, Weak};

/// Kind of problem reported by the model.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum ErrorType {
    #[default]
    Spelling,
    Grammar,
}

impl ErrorType {
    /// Unknown or missing labels count as spelling.
    pub fn parse_lenient(label: Option<&str>) -> Self {
        match label.map(str::to_ascii_lowercase).as_deref() {
            Some("grammar") => ErrorType::Grammar,
            _ => ErrorType::Spelling,
        }
    }
}

impl std::fmt::Display for ErrorType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ErrorType::Spelling => write!(f, "spelling"),
            ErrorType::Grammar => write!(f, "grammar"),
        }
    }
}

/// One serialized unit of visible text.
///
/// `end_offset - start_offset` always equals the character length of `text`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TextSpan {
    pub element: NodeId,
    pub text: String,
    pub start_offset: usize,
    pub end_offset: usize,
    pub context: String,
}

impl TextSpan {
    pub fn len(&self) -> usize {
        self.end_offset - self.start_offset
    }

    pub fn is_empty(&self) -> bool {
        self.start_offset == self.end_offset
    }

    pub fn contains(&self, position: usize) -> bool {
        self.start_offset <= position && position < self.end_offset
    }
}

/// Error record that passed shape validation.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ValidatedError {
    pub word: String,
    pub position: i64,
    pub end_position: i64,
    #[serde(rename = "type")]
    pub error_type: ErrorType,
    pub suggestions: Vec<String>,
}

/// A validated error located inside one span.
#[derive(Debug, Clone)]
pub struct ResolvedError {
    pub id: usize,
    pub word: String,
    pub error_type: ErrorType,
    pub suggestions: Vec<String>,
    pub span_relative_position: usize,
    pub span_relative_end_position: usize,
    pub owner_span: Weak<TextSpan>,
}

impl ResolvedError {
    pub fn span(&self) -> Option<Arc<TextSpan>> {
        self.owner_span.upgrade()
    }

    pub fn len(&self) -> usize {
        self.span_relative_end_position - self.span_relative_position
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}
