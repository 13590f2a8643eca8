//! Per-page analysis state: the last serialization, its resolved errors and the highlight.

use super::mapper::{self, HighlightTarget};
use super::response;
use super::serializer::{self, SerializeOptions, Serialization};
use super::{ErrorType, ResolvedError};
use crate::dom::Document;
use crate::error::AnalysisError;
use crate::llm::prompt::build_analysis_prompt;
use crate::llm::ModelClient;
use crate::overlay::{OverlayController, OverlaySurface};
use log::{debug, info, warn};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use tokio::sync::RwLock;

pub const DEFAULT_MAX_TEXT_LENGTH: usize = 8000;

fn default_true() -> bool {
    true
}

fn default_max_text_length() -> usize {
    DEFAULT_MAX_TEXT_LENGTH
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AnalyzeOptions {
    #[serde(default = "default_true")]
    pub spell_enabled: bool,
    #[serde(default = "default_true")]
    pub grammar_enabled: bool,
    #[serde(default = "default_max_text_length")]
    pub max_text_length: usize,
}

impl Default for AnalyzeOptions {
    fn default() -> Self {
        Self {
            spell_enabled: true,
            grammar_enabled: true,
            max_text_length: DEFAULT_MAX_TEXT_LENGTH,
        }
    }
}

/// What the popup shows for one error.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ErrorSummary {
    pub id: usize,
    pub word: String,
    pub suggestions: Vec<String>,
    #[serde(rename = "type")]
    pub error_type: ErrorType,
    pub context: String,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AnalysisReport {
    pub error_count: usize,
    pub errors: Vec<ErrorSummary>,
    pub text_truncated: bool,
}

impl AnalysisReport {
    fn from_errors(errors: &[ResolvedError], text_truncated: bool) -> Self {
        let errors: Vec<ErrorSummary> = errors
            .iter()
            .map(|error| ErrorSummary {
                id: error.id,
                word: error.word.clone(),
                suggestions: error.suggestions.clone(),
                error_type: error.error_type,
                context: error
                    .span()
                    .map(|span| span.context.clone())
                    .unwrap_or_default(),
            })
            .collect();
        Self {
            error_count: errors.len(),
            errors,
            text_truncated,
        }
    }
}

#[derive(Debug, Default)]
struct SessionState {
    /// Owns the spans the resolved errors point into.
    serialization: Option<Serialization>,
    errors: Vec<ResolvedError>,
    overlays: OverlayController,
}

/// Releases the in-flight flag when an analysis ends, however it ends.
struct InFlight<'a>(&'a AtomicBool);

impl<'a> InFlight<'a> {
    fn acquire(flag: &'a AtomicBool) -> Option<Self> {
        flag.compare_exchange(false, true, Ordering::AcqRel, Ordering::Acquire)
            .ok()
            .map(|_| InFlight(flag))
    }
}

impl Drop for InFlight<'_> {
    fn drop(&mut self) {
        self.0.store(false, Ordering::Release);
    }
}

/// Checker state for one page. At most one analysis runs at a time.
#[derive(Debug, Default)]
pub struct CheckerSession {
    state: Mutex<SessionState>,
    analyzing: AtomicBool,
}

impl CheckerSession {
    pub fn new() -> Self {
        Self::default()
    }

    fn state(&self) -> MutexGuard<'_, SessionState> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    pub fn is_analyzing(&self) -> bool {
        self.analyzing.load(Ordering::Acquire)
    }

    /// Checks the visible text of `doc` with the model behind `client`.
    ///
    /// Overlays and results from the previous run are discarded before anything else happens.
    /// On failure nothing new is stored.
    pub async fn analyze<D, S, C>(
        &self,
        doc: &D,
        surface: &mut S,
        client: &C,
        options: AnalyzeOptions,
    ) -> Result<AnalysisReport, AnalysisError>
    where
        D: Document + ?Sized,
        S: OverlaySurface + ?Sized,
        C: ModelClient + ?Sized,
    {
        let Some(_in_flight) = InFlight::acquire(&self.analyzing) else {
            warn!("Analysis requested while another is running");
            return Err(AnalysisError::Busy);
        };

        if !options.spell_enabled && !options.grammar_enabled {
            return Err(AnalysisError::NoChecksEnabled);
        }

        {
            let mut state = self.state();
            state.overlays.clear_all(surface);
            state.errors.clear();
            state.serialization = None;
        }

        let serialization = serializer::serialize(
            doc,
            doc.root(),
            &SerializeOptions {
                max_length: Some(options.max_text_length),
            },
        );
        if serialization.is_empty() {
            info!("No visible text to analyze");
            return Ok(AnalysisReport::default());
        }
        if serialization.truncated {
            info!(
                "Text truncated from {} to {} characters",
                serialization.original_length, options.max_text_length
            );
        }

        let prompt = build_analysis_prompt(
            &serialization.full_text,
            options.spell_enabled,
            options.grammar_enabled,
        );
        info!(
            "Analyzing {} characters across {} spans",
            serialization.full_text.chars().count(),
            serialization.spans.len()
        );

        let raw = client.analyze_text(&prompt).await?;

        let validated = response::extract(&raw);
        let errors = mapper::resolve_errors(&serialization.spans, &validated);
        if errors.len() < validated.len() {
            debug!(
                "{} of {} reported errors could not be placed",
                validated.len() - errors.len(),
                validated.len()
            );
        }
        info!("Analysis found {} errors", errors.len());

        let report = AnalysisReport::from_errors(&errors, serialization.truncated);
        let mut state = self.state();
        state.errors = errors;
        state.serialization = Some(serialization);
        Ok(report)
    }

    /// Scrolls to error `id` and highlights it. Returns `false` when there is nothing to show.
    pub fn highlight_error<D, S>(&self, doc: &D, surface: &mut S, id: usize) -> bool
    where
        D: Document + ?Sized,
        S: OverlaySurface + ?Sized,
    {
        let mut state = self.state();
        let Some(error) = state.errors.iter().find(|error| error.id == id).cloned() else {
            debug!("No error with id {}", id);
            return false;
        };
        let Some(span) = error.span() else {
            debug!("Span for error {} is gone", id);
            return false;
        };
        if !doc.is_attached(span.element) {
            debug!("Element for error {} left the document", id);
            state.overlays.clear_all(surface);
            return false;
        }

        surface.reveal(span.element);
        let target = HighlightTarget::for_error(doc, span.element, &error);
        state
            .overlays
            .highlight(doc, surface, target, error.error_type);
        true
    }

    pub fn clear_highlights<S: OverlaySurface + ?Sized>(&self, surface: &mut S) {
        self.state().overlays.clear_all(surface);
    }

    /// Called by the host for every scroll or resize while a highlight is shown.
    pub fn on_viewport_change<D, S>(&self, doc: &D, surface: &mut S)
    where
        D: Document + ?Sized,
        S: OverlaySurface + ?Sized,
    {
        self.state().overlays.reposition(doc, surface);
    }

    pub fn errors(&self) -> Vec<ResolvedError> {
        self.state().errors.clone()
    }

    pub fn is_highlighted(&self) -> bool {
        self.state().overlays.active().is_some()
    }
}

/// Sessions keyed by page context, so a re-injected script finds the existing state.
#[derive(Debug, Default)]
pub struct SessionRegistry {
    sessions: RwLock<HashMap<String, Arc<CheckerSession>>>,
}

impl SessionRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    pub async fn get_or_init(&self, page: &str) -> Arc<CheckerSession> {
        if let Some(session) = self.sessions.read().await.get(page) {
            debug!("Reusing checker session for {}", page);
            return session.clone();
        }

        let mut sessions = self.sessions.write().await;
        sessions
            .entry(page.to_string())
            .or_insert_with(|| {
                debug!("Creating checker session for {}", page);
                Arc::new(CheckerSession::new())
            })
            .clone()
    }

    /// Forgets the session of an unloaded page.
    pub async fn remove(&self, page: &str) -> Option<Arc<CheckerSession>> {
        self.sessions.write().await.remove(page)
    }

    pub async fn len(&self) -> usize {
        self.sessions.read().await.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.sessions.read().await.is_empty()
    }
}
