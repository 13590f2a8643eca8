pub mod gemini;
pub mod openrouter;
pub mod prompt;

use crate::error::{AnalysisError, ProviderError};
use crate::settings::AppSettings;
use log::info;
use serde::{Deserialize, Serialize};
use std::future::Future;
use std::time::Duration;

const CONNECTION_TEST_TIMEOUT_SECS: u64 = 10;

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash, Default)]
#[serde(rename_all = "lowercase")]
pub enum ProviderId {
    /// DeepSeek models served through OpenRouter.
    #[default]
    DeepSeek,
    Gemini,
}

impl std::fmt::Display for ProviderId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ProviderId::DeepSeek => write!(f, "deepseek"),
            ProviderId::Gemini => write!(f, "gemini"),
        }
    }
}

impl ProviderId {
    pub fn parse(s: &str) -> Option<Self> {
        match s.to_lowercase().as_str() {
            "deepseek" => Some(ProviderId::DeepSeek),
            "gemini" => Some(ProviderId::Gemini),
            _ => None,
        }
    }

    pub fn default_model(&self) -> &'static str {
        match self {
            ProviderId::DeepSeek => openrouter::DEFAULT_MODEL,
            ProviderId::Gemini => gemini::DEFAULT_MODEL,
        }
    }

    pub fn base_url(&self) -> &'static str {
        match self {
            ProviderId::DeepSeek => openrouter::OPENROUTER_API_URL,
            ProviderId::Gemini => gemini::GEMINI_API_URL,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ModelProvider {
    pub id: ProviderId,
    pub label: String,
    pub description: String,
    pub base_url: String,
    pub models: Vec<ProviderModel>,
    pub default_model: String,
    pub api_key_url: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ProviderModel {
    pub id: String,
    pub name: String,
    pub description: String,
}

pub fn get_available_providers() -> Vec<ModelProvider> {
    vec![
        ModelProvider {
            id: ProviderId::DeepSeek,
            label: "DeepSeek (OpenRouter)".to_string(),
            description: "Accurate and inexpensive".to_string(),
            base_url: openrouter::OPENROUTER_API_URL.to_string(),
            models: openrouter::get_available_models(),
            default_model: openrouter::DEFAULT_MODEL.to_string(),
            api_key_url: "https://openrouter.ai/keys".to_string(),
        },
        ModelProvider {
            id: ProviderId::Gemini,
            label: "Google Gemini".to_string(),
            description: "Fast with a free tier".to_string(),
            base_url: gemini::GEMINI_API_URL.to_string(),
            models: gemini::get_available_models(),
            default_model: gemini::DEFAULT_MODEL.to_string(),
            api_key_url: "https://aistudio.google.com/apikey".to_string(),
        },
    ]
}

/// Sends one prompt to a language model and returns its unwrapped text answer.
pub trait ModelClient {
    fn analyze_text(&self, prompt: &str)
        -> impl Future<Output = Result<String, ProviderError>> + Send;
}

/// HTTP client for the configured provider.
#[derive(Debug, Clone)]
pub struct HttpModelClient {
    provider: ProviderId,
    api_key: String,
    model: String,
    base_url: String,
    http: reqwest::Client,
}

impl HttpModelClient {
    pub fn new(
        provider: ProviderId,
        api_key: impl Into<String>,
        model: impl Into<String>,
        timeout: Duration,
    ) -> Result<Self, ProviderError> {
        let http = reqwest::Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|e| ProviderError::Request(format!("Failed to create HTTP client: {}", e)))?;

        Ok(Self {
            provider,
            api_key: api_key.into(),
            model: model.into(),
            base_url: provider.base_url().to_string(),
            http,
        })
    }

    /// Client for the provider selected in `settings`, failing when its key is not set.
    pub fn from_settings(settings: &AppSettings) -> Result<Self, AnalysisError> {
        let provider = settings.api_provider;
        let api_key = settings.api_key(provider)?;
        let client = Self::new(
            provider,
            api_key,
            settings.model_for(provider),
            Duration::from_secs(settings.request_timeout_secs),
        )?;
        Ok(client)
    }

    /// Points the client at another endpoint, e.g. a proxy.
    pub fn with_base_url(mut self, base_url: impl Into<String>) -> Self {
        self.base_url = base_url.into().trim_end_matches('/').to_string();
        self
    }

    pub fn provider(&self) -> ProviderId {
        self.provider
    }

    pub fn model(&self) -> &str {
        &self.model
    }

    pub async fn test_connection(&self) -> Result<bool, ProviderError> {
        info!("Testing {} API connection", self.provider);
        match self.provider {
            ProviderId::DeepSeek => {
                openrouter::test_connection(&self.http, &self.base_url, &self.api_key).await
            }
            ProviderId::Gemini => {
                gemini::test_connection(&self.http, &self.base_url, &self.api_key).await
            }
        }
    }
}

impl ModelClient for HttpModelClient {
    async fn analyze_text(&self, prompt: &str) -> Result<String, ProviderError> {
        info!(
            "Analyzing with {}: model={}, prompt={} chars",
            self.provider,
            self.model,
            prompt.chars().count()
        );
        match self.provider {
            ProviderId::DeepSeek => {
                openrouter::analyze_text(
                    &self.http,
                    &self.base_url,
                    &self.api_key,
                    &self.model,
                    prompt,
                )
                .await
            }
            ProviderId::Gemini => {
                gemini::analyze_text(&self.http, &self.base_url, &self.api_key, &self.model, prompt)
                    .await
            }
        }
    }
}

pub async fn test_connection(provider: ProviderId, api_key: &str) -> Result<bool, ProviderError> {
    let client = HttpModelClient::new(
        provider,
        api_key.trim(),
        provider.default_model(),
        Duration::from_secs(CONNECTION_TEST_TIMEOUT_SECS),
    )?;
    client.test_connection().await
}

/// Prefers the upstream `error.message`, else a generic status line.
pub(crate) fn status_message(status: reqwest::StatusCode, message: Option<String>) -> ProviderError {
    ProviderError::Api {
        status: status.as_u16(),
        message: message.unwrap_or_else(|| {
            format!(
                "HTTP {}: {}",
                status.as_u16(),
                status.canonical_reason().unwrap_or("Unknown status")
            )
        }),
    }
}
