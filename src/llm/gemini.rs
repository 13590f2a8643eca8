use super::{status_message, ProviderModel};
use crate::error::ProviderError;
use log::{debug, error, info, warn};
use serde::{Deserialize, Serialize};

pub const GEMINI_API_URL: &str = "https://generativelanguage.googleapis.com/v1beta/models";
pub const DEFAULT_MODEL: &str = "gemini-2.0-flash";

/// Tried in order after the selected model when the API reports it as unknown.
const FALLBACK_MODELS: &[&str] = &["gemini-2.0-flash", "gemini-1.5-flash"];

const TEMPERATURE: f32 = 0.2;
const MAX_OUTPUT_TOKENS: u32 = 4000;

#[derive(Debug, Serialize)]
struct GeminiRequest {
    contents: Vec<GeminiContent>,
    #[serde(rename = "generationConfig", skip_serializing_if = "Option::is_none")]
    generation_config: Option<GenerationConfig>,
}

#[derive(Debug, Serialize)]
struct GeminiContent {
    parts: Vec<GeminiPart>,
}

#[derive(Debug, Serialize)]
struct GeminiPart {
    text: String,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct GenerationConfig {
    temperature: f32,
    max_output_tokens: u32,
}

#[derive(Debug, Deserialize)]
struct GeminiResponse {
    candidates: Option<Vec<GeminiCandidate>>,
    error: Option<GeminiError>,
}

#[derive(Debug, Deserialize)]
struct GeminiCandidate {
    content: Option<GeminiResponseContent>,
}

#[derive(Debug, Deserialize)]
struct GeminiResponseContent {
    parts: Vec<GeminiResponsePart>,
}

#[derive(Debug, Deserialize)]
struct GeminiResponsePart {
    text: Option<String>,
}

#[derive(Debug, Deserialize)]
struct GeminiError {
    message: String,
    status: Option<String>,
}

pub fn get_available_models() -> Vec<ProviderModel> {
    vec![
        ProviderModel {
            id: "gemini-2.0-flash".to_string(),
            name: "Gemini 2.0 Flash".to_string(),
            description: "Fast and capable - Recommended".to_string(),
        },
        ProviderModel {
            id: "gemini-2.5-flash".to_string(),
            name: "Gemini 2.5 Flash".to_string(),
            description: "Better accuracy, higher latency".to_string(),
        },
        ProviderModel {
            id: "gemini-1.5-flash".to_string(),
            name: "Gemini 1.5 Flash".to_string(),
            description: "Stable version".to_string(),
        },
    ]
}

fn single_prompt(text: &str, generation_config: Option<GenerationConfig>) -> GeminiRequest {
    GeminiRequest {
        contents: vec![GeminiContent {
            parts: vec![GeminiPart {
                text: text.to_string(),
            }],
        }],
        generation_config,
    }
}

fn map_error(status: reqwest::StatusCode, body: &str) -> ProviderError {
    let upstream = serde_json::from_str::<GeminiResponse>(body)
        .ok()
        .and_then(|response| response.error);

    match upstream {
        Some(error) => match error.status.as_deref() {
            Some("INVALID_ARGUMENT") if error.message.contains("API key") => {
                ProviderError::InvalidApiKey
            }
            Some("PERMISSION_DENIED") | Some("UNAUTHENTICATED") => ProviderError::InvalidApiKey,
            Some("RESOURCE_EXHAUSTED") => ProviderError::QuotaExceeded,
            _ => status_message(status, Some(error.message)),
        },
        None => status_message(status, None),
    }
}

/// Selected model first, then the fallbacks, without repeats.
fn candidate_models(model: &str) -> Vec<&str> {
    let mut models = vec![model];
    for fallback in FALLBACK_MODELS {
        if !models.contains(fallback) {
            models.push(fallback);
        }
    }
    models
}

pub async fn analyze_text(
    client: &reqwest::Client,
    base_url: &str,
    api_key: &str,
    model: &str,
    prompt: &str,
) -> Result<String, ProviderError> {
    let request = single_prompt(
        prompt,
        Some(GenerationConfig {
            temperature: TEMPERATURE,
            max_output_tokens: MAX_OUTPUT_TOKENS,
        }),
    );

    let mut last_error = ProviderError::Request("No Gemini model available".to_string());
    for candidate in candidate_models(model) {
        match generate(client, base_url, api_key, candidate, &request).await {
            Err(ProviderError::Api { status: 404, message }) => {
                warn!(
                    "Gemini model '{}' unavailable ({}), trying next model",
                    candidate, message
                );
                last_error = ProviderError::Api {
                    status: 404,
                    message,
                };
            }
            other => return other,
        }
    }
    Err(last_error)
}

async fn generate(
    client: &reqwest::Client,
    base_url: &str,
    api_key: &str,
    model: &str,
    request: &GeminiRequest,
) -> Result<String, ProviderError> {
    let url = format!("{}/{}:generateContent?key={}", base_url, model, api_key);

    let response = client
        .post(&url)
        .header("Content-Type", "application/json")
        .json(request)
        .send()
        .await
        .map_err(|e| {
            // The key is part of the query string.
            let e = e.without_url();
            error!("Gemini API request failed: {}", e);
            ProviderError::from_send(e)
        })?;

    let status = response.status();
    let response_text = response
        .text()
        .await
        .map_err(|e| ProviderError::Request(format!("Failed to read response: {}", e)))?;

    debug!("Gemini API response status: {} (model {})", status, model);

    if !status.is_success() {
        error!(
            "Gemini API error: status={}, body={}",
            status, response_text
        );
        return Err(map_error(status, &response_text));
    }

    let gemini_response: GeminiResponse = serde_json::from_str(&response_text)
        .map_err(|e| ProviderError::InvalidResponse(e.to_string()))?;

    if let Some(error) = gemini_response.error {
        return Err(status_message(status, Some(error.message)));
    }

    let text = gemini_response
        .candidates
        .and_then(|c| c.into_iter().next())
        .and_then(|c| c.content)
        .and_then(|c| c.parts.into_iter().next())
        .and_then(|p| p.text)
        .unwrap_or_default();

    if text.trim().is_empty() {
        warn!("Empty response from Gemini");
    } else {
        info!("Gemini analysis returned {} chars", text.len());
    }
    Ok(text)
}

/// Lists models with the key, which validates it without spending generation quota.
pub async fn test_connection(
    client: &reqwest::Client,
    base_url: &str,
    api_key: &str,
) -> Result<bool, ProviderError> {
    let response = client
        .get(format!("{}?key={}", base_url, api_key))
        .send()
        .await
        .map_err(|e| {
            let e = e.without_url();
            error!("Gemini connection test failed: {}", e);
            ProviderError::from_send(e)
        })?;

    let status = response.status();
    if status.is_success() {
        info!("Gemini API connection test successful");
        Ok(true)
    } else {
        let response_text = response.text().await.unwrap_or_default();
        error!(
            "Gemini API connection test failed: status={}, body={}",
            status, response_text
        );
        Err(map_error(status, &response_text))
    }
}
