use crate::llm::ProviderId;
use thiserror::Error;

/// Failure talking to a model provider.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ProviderError {
    #[error("Request timeout - please try again")]
    Timeout,
    #[error("Network error - please check your connection")]
    Network,
    #[error("Invalid API key")]
    InvalidApiKey,
    #[error("API quota exceeded - please check your account")]
    QuotaExceeded,
    #[error("Rate limit exceeded - please wait and try again")]
    RateLimited,
    #[error("{message}")]
    Api { status: u16, message: String },
    #[error("Request failed: {0}")]
    Request(String),
    #[error("Failed to parse response: {0}")]
    InvalidResponse(String),
}

impl ProviderError {
    pub(crate) fn from_send(e: reqwest::Error) -> Self {
        if e.is_timeout() {
            ProviderError::Timeout
        } else if e.is_connect() {
            ProviderError::Network
        } else {
            ProviderError::Request(e.to_string())
        }
    }
}

/// Failure of a user-visible operation. Only these reach the person using the checker.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum AnalysisError {
    #[error("API key not configured for {provider}. Please set your API key in settings.")]
    MissingApiKey { provider: ProviderId },
    #[error("Please enable at least one check")]
    NoChecksEnabled,
    #[error("An analysis is already running on this page")]
    Busy,
    #[error(transparent)]
    Provider(#[from] ProviderError),
}
