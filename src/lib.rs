//! Spelling and grammar checking for live web pages.
//!
//! Visible text is serialized into one string with an offset index, sent to a language model,
//! and the errors it reports are mapped back onto the page and highlighted on demand.

pub mod checker;
pub mod commands;
pub mod dom;
pub mod error;
pub mod llm;
pub mod logging;
pub mod overlay;
pub mod settings;

pub use checker::session::{
    AnalysisReport, AnalyzeOptions, CheckerSession, ErrorSummary, SessionRegistry,
};
pub use checker::{ErrorType, ResolvedError, TextSpan, ValidatedError};
pub use dom::{Document, MemoryDocument, NodeId};
pub use error::{AnalysisError, ProviderError};
pub use llm::{HttpModelClient, ModelClient, ProviderId};
pub use overlay::{MemorySurface, OverlayController, OverlaySurface};
pub use settings::{AppSettings, LogLevel};
