//! Maps absolute offsets reported by the model back onto spans and text nodes.

use super::{ResolvedError, TextSpan, ValidatedError};
use crate::dom::{self, Document, NodeId};
use log::debug;
use std::sync::Arc;

/// Span whose `[start, end)` range contains `position`.
pub fn resolve_span(spans: &[Arc<TextSpan>], position: usize) -> Option<&Arc<TextSpan>> {
    let idx = spans.partition_point(|span| span.end_offset <= position);
    spans.get(idx).filter(|span| span.contains(position))
}

/// Absolute position of the first occurrence of `word`, searching spans in order.
pub fn find_word(spans: &[Arc<TextSpan>], word: &str) -> Option<usize> {
    spans.iter().find_map(|span| {
        span.text
            .find(word)
            .map(|byte| span.start_offset + span.text[..byte].chars().count())
    })
}

/// Joins validated records against the span index.
///
/// Records that land outside every span are retried by searching for their word; records that
/// still cannot be placed are dropped. Ids are handed out in processing order to the records
/// that resolve.
pub fn resolve_errors(spans: &[Arc<TextSpan>], errors: &[ValidatedError]) -> Vec<ResolvedError> {
    let mut resolved = Vec::with_capacity(errors.len());

    for error in errors {
        let direct = usize::try_from(error.position)
            .ok()
            .and_then(|position| resolve_span(spans, position).map(|span| (span, position)));

        let (span, absolute, length) = match direct {
            Some((span, position)) => {
                let length = error.end_position.saturating_sub(error.position).max(0) as usize;
                (span, position, length)
            }
            None => {
                let Some((span, position)) = find_word(spans, &error.word)
                    .and_then(|position| resolve_span(spans, position).map(|s| (s, position)))
                else {
                    debug!(
                        "Dropping '{}' at {}: no span contains it",
                        error.word, error.position
                    );
                    continue;
                };
                debug!(
                    "Relocated '{}' from {} to {} by text search",
                    error.word, error.position, position
                );
                (span, position, error.word.chars().count())
            }
        };

        let start = absolute - span.start_offset;
        let end = start
            .saturating_add(length)
            .clamp(start + 1, span.len().max(start + 1));

        resolved.push(ResolvedError {
            id: resolved.len(),
            word: error.word.clone(),
            error_type: error.error_type,
            suggestions: error.suggestions.clone(),
            span_relative_position: start,
            span_relative_end_position: end,
            owner_span: Arc::downgrade(span),
        });
    }

    resolved
}

/// Text node and in-node offset of a span-relative position.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct NodePosition {
    pub node: NodeId,
    pub offset: usize,
}

/// Finds the text node under `element` holding `length` characters at `relative_position`.
///
/// The element's text is read again, so the answer reflects the document as it is now. Span
/// text was trimmed when it was serialized, so leading whitespace is skipped before counting.
/// Returns `None` when the range would cross a node boundary or run past the text.
pub fn resolve_node<D: Document + ?Sized>(
    doc: &D,
    element: NodeId,
    relative_position: usize,
    length: usize,
) -> Option<NodePosition> {
    let leading = dom::text_content(doc, element)
        .chars()
        .take_while(|c| c.is_whitespace())
        .count();
    let target = relative_position + leading;

    let run = dom::text_runs(doc, element).find(|run| run.end() > target)?;
    let offset = target - run.start;
    (offset + length <= run.len).then_some(NodePosition {
        node: run.node,
        offset,
    })
}

/// What an overlay should cover.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum HighlightTarget {
    Range { node: NodeId, start: usize, end: usize },
    Element(NodeId),
}

impl HighlightTarget {
    /// Precise range when the error can still be found in a single text node, else the element.
    pub fn for_error<D: Document + ?Sized>(
        doc: &D,
        element: NodeId,
        error: &ResolvedError,
    ) -> Self {
        match resolve_node(doc, element, error.span_relative_position, error.len()) {
            Some(position) => HighlightTarget::Range {
                node: position.node,
                start: position.offset,
                end: position.offset + error.len(),
            },
            None => {
                debug!(
                    "Falling back to whole-element highlight for error {}",
                    error.id
                );
                HighlightTarget::Element(element)
            }
        }
    }
}
