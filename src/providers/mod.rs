//! HTTP clients for the remote generative models used by extraction and summarization.
//!
//! Two request shapes are supported: single-prompt text generation (Gemini `generateContent`)
//! and role-tagged chat completion (Mistral). Both clients issue plain JSON requests through
//! `reqwest`, so tests can point them at a mock server via the configured base URL.

pub mod gemini;
pub mod mistral;

pub use gemini::GeminiClient;
pub use mistral::MistralClient;

use async_trait::async_trait;
use serde::Serialize;
use std::time::Duration;
use thiserror::Error;

/// Upper bound for a single remote generation call.
pub(crate) const REQUEST_TIMEOUT: Duration = Duration::from_secs(120);
pub(crate) const USER_AGENT: &str = concat!("pdf-digest/", env!("CARGO_PKG_VERSION"));

/// Errors surfaced while calling a remote model.
#[derive(Debug, Error)]
pub enum ProviderError {
    /// Provider could not be reached or the client could not be built.
    #[error("Provider unavailable: {0}")]
    Unavailable(String),
    /// Provider returned an error response.
    #[error("Generation failed: {0}")]
    GenerationFailed(String),
    /// Provider response could not be parsed.
    #[error("Malformed provider response: {0}")]
    InvalidResponse(String),
}

/// Model that turns one prompt into text.
#[async_trait]
pub trait GenerativeModel: Send + Sync {
    /// Generate a completion for `prompt`, returned verbatim.
    async fn generate(&self, prompt: &str) -> Result<String, ProviderError>;
}

/// Role of a chat message.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum ChatRole {
    /// Instructions framing the conversation.
    System,
    /// Caller-supplied content.
    User,
}

/// One message of a chat completion request.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ChatMessage {
    /// Speaker of the message.
    pub role: ChatRole,
    /// Message text.
    pub content: String,
}

impl ChatMessage {
    /// System message.
    pub fn system(content: impl Into<String>) -> Self {
        Self {
            role: ChatRole::System,
            content: content.into(),
        }
    }

    /// User message.
    pub fn user(content: impl Into<String>) -> Self {
        Self {
            role: ChatRole::User,
            content: content.into(),
        }
    }
}

/// Chat-style model answering a list of role-tagged messages.
#[async_trait]
pub trait ChatModel: Send + Sync {
    /// Return the assistant reply for `messages`.
    async fn chat(&self, messages: &[ChatMessage]) -> Result<String, ProviderError>;
}

pub(crate) fn build_http_client() -> Result<reqwest::Client, ProviderError> {
    reqwest::Client::builder()
        .user_agent(USER_AGENT)
        .timeout(REQUEST_TIMEOUT)
        .build()
        .map_err(|error| {
            ProviderError::Unavailable(format!("failed to build HTTP client: {error}"))
        })
}

/// Turn a non-success HTTP response into [`ProviderError::GenerationFailed`].
pub(crate) async fn ensure_success(
    provider: &str,
    response: reqwest::Response,
) -> Result<reqwest::Response, ProviderError> {
    if response.status().is_success() {
        return Ok(response);
    }
    let status = response.status();
    let body = response.text().await.unwrap_or_default();
    Err(ProviderError::GenerationFailed(format!(
        "{provider} returned {status}: {body}"
    )))
}
