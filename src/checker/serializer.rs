//! Turns the visible text of a document subtree into one offset-addressable buffer.

use super::TextSpan;
use crate::dom::{self, Document, NodeId};
use log::debug;
use std::sync::Arc;

/// Elements whose text is collected.
pub const TEXT_TAGS: &[&str] = &[
    "p", "h1", "h2", "h3", "h4", "h5", "h6", "li", "td", "th", "span", "div", "label", "button",
    "a", "article", "section", "main", "aside", "blockquote", "figcaption",
];

/// Anything inside one of these is never checked.
pub const SKIPPED_CONTAINERS: &[&str] = &["pre", "code", "script", "style", "noscript"];

pub const SEPARATOR: &str = "\n\n";
pub const SEPARATOR_LEN: usize = 2;

pub const MIN_TEXT_LEN: usize = 3;

const CONTEXT_LEN: usize = 100;

#[derive(Debug, Clone, Copy, Default)]
pub struct SerializeOptions {
    /// Cap on the number of characters in `full_text`.
    pub max_length: Option<usize>,
}

#[derive(Debug, Clone, Default)]
pub struct Serialization {
    pub full_text: String,
    pub spans: Vec<Arc<TextSpan>>,
    pub truncated: bool,
    /// Character length before truncation.
    pub original_length: usize,
}

impl Serialization {
    pub fn is_empty(&self) -> bool {
        self.full_text.trim().is_empty()
    }

    /// End offset of the last span.
    pub fn len(&self) -> usize {
        self.spans.last().map(|s| s.end_offset).unwrap_or(0)
    }
}

pub fn serialize<D: Document + ?Sized>(
    doc: &D,
    root: NodeId,
    options: &SerializeOptions,
) -> Serialization {
    let mut texts = Vec::new();
    let mut spans = Vec::new();
    let mut position = 0;

    for element in dom::descendants(doc, root) {
        let Some(tag) = doc.tag_name(element) else {
            continue;
        };
        if !TEXT_TAGS.contains(&tag.as_str()) {
            continue;
        }
        if dom::closest(doc, element, SKIPPED_CONTAINERS).is_some() {
            continue;
        }
        if !dom::is_visible(doc, element) {
            continue;
        }

        let content = dom::text_content(doc, element);
        let text = content.trim();
        let len = text.chars().count();
        if len < MIN_TEXT_LEN {
            continue;
        }

        if !spans.is_empty() {
            position += SEPARATOR_LEN;
        }
        spans.push(TextSpan {
            element,
            text: text.to_string(),
            start_offset: position,
            end_offset: position + len,
            context: context_for(text),
        });
        texts.push(text.to_string());
        position += len;
    }

    let full_text = texts.join(SEPARATOR);
    let original_length = position;
    debug!(
        "Serialized {} spans, {} chars of text",
        spans.len(),
        original_length
    );

    let mut serialization = Serialization {
        full_text,
        spans: Vec::new(),
        truncated: false,
        original_length,
    };

    match options.max_length {
        Some(limit) if original_length > limit => {
            serialization.full_text = dom::char_slice(&serialization.full_text, 0, limit).to_string();
            serialization.spans = truncate_spans(spans, limit)
                .into_iter()
                .map(Arc::new)
                .collect();
            serialization.truncated = true;
            debug!(
                "Text truncated from {} to {} characters",
                original_length, limit
            );
        }
        _ => {
            serialization.spans = spans.into_iter().map(Arc::new).collect();
        }
    }

    serialization
}

/// Keeps the spans that survive a cut at `limit`, clipping the one that straddles it.
fn truncate_spans(spans: Vec<TextSpan>, limit: usize) -> Vec<TextSpan> {
    spans
        .into_iter()
        .take_while(|span| span.start_offset < limit)
        .map(|mut span| {
            if span.end_offset > limit {
                let keep = limit - span.start_offset;
                span.text = dom::char_slice(&span.text, 0, keep).to_string();
                span.end_offset = limit;
            }
            span
        })
        .collect()
}

fn context_for(text: &str) -> String {
    if text.chars().count() > CONTEXT_LEN {
        format!("{}...", dom::char_slice(text, 0, CONTEXT_LEN))
    } else {
        text.to_string()
    }
}
