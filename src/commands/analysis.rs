use crate::checker::session::{AnalysisReport, AnalyzeOptions, CheckerSession};
use crate::dom::Document;
use crate::error::AnalysisError;
use crate::llm::{HttpModelClient, ModelClient};
use crate::overlay::OverlaySurface;
use crate::settings::{get_settings, AppSettings, SettingsStore};
use log::{debug, error};
use serde::{Deserialize, Serialize};

/// Message sent to the page by the popup.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "action", rename_all = "camelCase")]
pub enum ContentRequest {
    AnalyzePage {
        #[serde(default)]
        options: AnalyzeOptions,
    },
    HighlightError {
        #[serde(rename = "errorId")]
        error_id: usize,
    },
    ClearHighlights,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ContentResponse {
    pub success: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
    #[serde(flatten)]
    pub report: Option<AnalysisReport>,
}

impl ContentResponse {
    pub fn ok() -> Self {
        Self {
            success: true,
            error: None,
            report: None,
        }
    }

    pub fn report(report: AnalysisReport) -> Self {
        Self {
            success: true,
            error: None,
            report: Some(report),
        }
    }

    pub fn failed(message: impl Into<String>) -> Self {
        Self {
            success: false,
            error: Some(message.into()),
            report: None,
        }
    }
}

/// Builds the model client for the current settings.
pub trait ClientFactory {
    type Client: ModelClient;

    fn create(&self, settings: &AppSettings) -> Result<Self::Client, AnalysisError>;
}

#[derive(Debug, Clone, Copy, Default)]
pub struct HttpClientFactory;

impl ClientFactory for HttpClientFactory {
    type Client = HttpModelClient;

    fn create(&self, settings: &AppSettings) -> Result<HttpModelClient, AnalysisError> {
        HttpModelClient::from_settings(settings)
    }
}

/// Runs one page message against `session`.
///
/// Settings are read fresh for every analysis, so key or model changes apply immediately.
pub async fn handle_content_request<D, S, St, F>(
    session: &CheckerSession,
    doc: &D,
    surface: &mut S,
    store: &St,
    factory: &F,
    request: ContentRequest,
) -> ContentResponse
where
    D: Document + ?Sized,
    S: OverlaySurface + ?Sized,
    St: SettingsStore + ?Sized,
    F: ClientFactory + ?Sized,
{
    match request {
        ContentRequest::AnalyzePage { mut options } => {
            let settings = get_settings(store);
            options.max_text_length = settings.max_text_length;

            let result = match factory.create(&settings) {
                Ok(client) => session.analyze(doc, surface, &client, options).await,
                Err(e) => Err(e),
            };
            match result {
                Ok(report) => ContentResponse::report(report),
                Err(e) => {
                    error!("Analysis error: {}", e);
                    ContentResponse::failed(e.to_string())
                }
            }
        }
        ContentRequest::HighlightError { error_id } => {
            if !session.highlight_error(doc, surface, error_id) {
                debug!("Nothing highlighted for error {}", error_id);
            }
            ContentResponse::ok()
        }
        ContentRequest::ClearHighlights => {
            session.clear_highlights(surface);
            ContentResponse::ok()
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_request_wire_format() {
        let request: ContentRequest = serde_json::from_value(json!({
            "action": "analyzePage",
            "options": {"spellEnabled": true, "grammarEnabled": false}
        }))
        .unwrap();
        assert_eq!(
            request,
            ContentRequest::AnalyzePage {
                options: AnalyzeOptions {
                    grammar_enabled: false,
                    ..AnalyzeOptions::default()
                }
            }
        );

        let request: ContentRequest =
            serde_json::from_value(json!({"action": "analyzePage"})).unwrap();
        assert_eq!(
            request,
            ContentRequest::AnalyzePage {
                options: AnalyzeOptions::default()
            }
        );

        let request: ContentRequest =
            serde_json::from_value(json!({"action": "highlightError", "errorId": 3})).unwrap();
        assert_eq!(request, ContentRequest::HighlightError { error_id: 3 });

        let request: ContentRequest =
            serde_json::from_value(json!({"action": "clearHighlights"})).unwrap();
        assert_eq!(request, ContentRequest::ClearHighlights);
    }

    #[test]
    fn test_response_flattens_report() {
        let value = serde_json::to_value(ContentResponse::report(AnalysisReport::default()))
            .unwrap();
        assert_eq!(
            value,
            json!({"success": true, "errorCount": 0, "errors": [], "textTruncated": false})
        );

        let value = serde_json::to_value(ContentResponse::failed("Invalid API key")).unwrap();
        assert_eq!(value, json!({"success": false, "error": "Invalid API key"}));

        let value = serde_json::to_value(ContentResponse::ok()).unwrap();
        assert_eq!(value, json!({"success": true}));
    }
}
