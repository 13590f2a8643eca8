use super::{status_message, ProviderModel};
use crate::error::ProviderError;
use log::{debug, error, info, warn};
use serde::{Deserialize, Serialize};

pub const OPENROUTER_API_URL: &str = "https://openrouter.ai/api/v1";
pub const DEFAULT_MODEL: &str = "deepseek/deepseek-chat";

const APP_REFERER: &str = "https://github.com/proofread/proofread";
const APP_TITLE: &str = "Spell & Grammar Checker";
const TEMPERATURE: f32 = 0.2;
const MAX_TOKENS: u32 = 4000;

#[derive(Debug, Serialize)]
struct ChatRequest<'a> {
    model: &'a str,
    messages: Vec<ChatMessage<'a>>,
    temperature: f32,
    max_tokens: u32,
}

#[derive(Debug, Serialize)]
struct ChatMessage<'a> {
    role: &'a str,
    content: &'a str,
}

#[derive(Debug, Deserialize)]
struct ChatResponse {
    choices: Option<Vec<ChatChoice>>,
}

#[derive(Debug, Deserialize)]
struct ChatChoice {
    message: Option<ChatResponseMessage>,
}

#[derive(Debug, Deserialize)]
struct ChatResponseMessage {
    content: Option<String>,
}

#[derive(Debug, Deserialize)]
struct OpenRouterErrorResponse {
    error: OpenRouterError,
}

#[derive(Debug, Deserialize)]
struct OpenRouterError {
    message: String,
}

pub fn get_available_models() -> Vec<ProviderModel> {
    vec![
        ProviderModel {
            id: "deepseek/deepseek-chat".to_string(),
            name: "DeepSeek V3".to_string(),
            description: "Fast and accurate - Recommended".to_string(),
        },
        ProviderModel {
            id: "deepseek/deepseek-r1".to_string(),
            name: "DeepSeek R1".to_string(),
            description: "Reasoning model, slower but more thorough".to_string(),
        },
    ]
}

fn map_error(status: reqwest::StatusCode, body: &str) -> ProviderError {
    match status.as_u16() {
        401 => ProviderError::InvalidApiKey,
        402 => ProviderError::QuotaExceeded,
        429 => ProviderError::RateLimited,
        _ => status_message(
            status,
            serde_json::from_str::<OpenRouterErrorResponse>(body)
                .ok()
                .map(|response| response.error.message),
        ),
    }
}

pub async fn analyze_text(
    client: &reqwest::Client,
    base_url: &str,
    api_key: &str,
    model: &str,
    prompt: &str,
) -> Result<String, ProviderError> {
    let request = ChatRequest {
        model,
        messages: vec![ChatMessage {
            role: "user",
            content: prompt,
        }],
        temperature: TEMPERATURE,
        max_tokens: MAX_TOKENS,
    };

    let response = client
        .post(format!("{}/chat/completions", base_url))
        .header("Authorization", format!("Bearer {}", api_key))
        .header("HTTP-Referer", APP_REFERER)
        .header("X-Title", APP_TITLE)
        .json(&request)
        .send()
        .await
        .map_err(|e| {
            error!("OpenRouter API request failed: {}", e);
            ProviderError::from_send(e)
        })?;

    let status = response.status();
    let response_text = response
        .text()
        .await
        .map_err(|e| ProviderError::Request(format!("Failed to read response: {}", e)))?;

    debug!("OpenRouter API response status: {}", status);

    if !status.is_success() {
        error!(
            "OpenRouter API error: status={}, body={}",
            status, response_text
        );
        return Err(map_error(status, &response_text));
    }

    let chat: ChatResponse = serde_json::from_str(&response_text)
        .map_err(|e| ProviderError::InvalidResponse(e.to_string()))?;

    let content = chat
        .choices
        .and_then(|choices| choices.into_iter().next())
        .and_then(|choice| choice.message)
        .and_then(|message| message.content)
        .unwrap_or_default();

    if content.trim().is_empty() {
        warn!("Empty response from OpenRouter");
    } else {
        info!("OpenRouter analysis returned {} chars", content.len());
    }
    Ok(content)
}

pub async fn test_connection(
    client: &reqwest::Client,
    base_url: &str,
    api_key: &str,
) -> Result<bool, ProviderError> {
    let response = client
        .get(format!("{}/auth/key", base_url))
        .header("Authorization", format!("Bearer {}", api_key))
        .send()
        .await
        .map_err(ProviderError::from_send)?;

    let status = response.status();
    if status.is_success() {
        info!("OpenRouter API connection test successful");
        Ok(true)
    } else {
        let response_text = response.text().await.unwrap_or_default();
        error!(
            "OpenRouter API connection test failed: status={}, body={}",
            status, response_text
        );
        Err(map_error(status, &response_text))
    }
}
