//! Extraction strategies turning document bytes into text, plus summarization.
//!
//! The set of strategies is closed: a [`Parser`] selector maps to exactly one implementation
//! through an exhaustive match in [`StrategySet::get_parser_function`].

mod direct;
mod enhanced;
mod ocr;
mod summarize;

pub use direct::{DirectExtractor, page_marker};
pub use enhanced::EnhancedExtractor;
pub use ocr::{OCR_PLACEHOLDER, OcrEnhanceExtractor};
pub use summarize::Summarizer;

use crate::config::ProviderConfig;
use crate::providers::{ChatModel, GeminiClient, GenerativeModel, MistralClient, ProviderError};
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use std::sync::Arc;
use thiserror::Error;

/// Errors raised by extraction strategies and summarization.
#[derive(Debug, Error)]
pub enum ExtractionError {
    /// Selector does not name a known strategy.
    #[error("Unknown parser: {0}")]
    UnknownParser(String),
    /// A required credential is missing. Not retryable.
    #[error("Configuration error: {0}")]
    Configuration(String),
    /// Bytes could not be read as a PDF document.
    #[error("Invalid PDF document: {0}")]
    InvalidDocument(String),
    /// Remote model call failed.
    #[error("Remote provider failure: {0}")]
    Provider(#[from] ProviderError),
}

/// Selector naming an extraction strategy. Fixed at job creation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum Parser {
    /// Local per-page text extraction.
    Direct,
    /// Direct extraction reformatted into markdown by a generative model.
    Enhanced,
    /// Direct extraction corrected by a chat model, degrading to Direct on remote failure.
    OcrEnhance,
}

impl Parser {
    /// Every selector, in display order.
    pub const ALL: [Parser; 3] = [Parser::Direct, Parser::Enhanced, Parser::OcrEnhance];

    /// Wire representation used in queue entries and API requests.
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Direct => "direct",
            Self::Enhanced => "enhanced",
            Self::OcrEnhance => "ocr-enhance",
        }
    }

    /// Comma separated list of valid selectors, for error messages.
    pub fn choices() -> String {
        Self::ALL
            .iter()
            .map(|parser| parser.as_str())
            .collect::<Vec<_>>()
            .join(", ")
    }
}

impl fmt::Display for Parser {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Parser {
    type Err = ExtractionError;

    /// Accepts the canonical names plus the provider-named aliases `pypdf`, `gemini` and
    /// `mistral` that older clients send.
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim() {
            "direct" | "pypdf" => Ok(Self::Direct),
            "enhanced" | "gemini" => Ok(Self::Enhanced),
            "ocr-enhance" | "mistral" => Ok(Self::OcrEnhance),
            _ => Err(ExtractionError::UnknownParser(s.to_string())),
        }
    }
}

/// Capability shared by all extraction strategies.
#[async_trait]
pub trait ExtractionStrategy: Send + Sync {
    /// Selector this strategy answers to.
    fn parser(&self) -> Parser;

    /// Turn raw document bytes into text or markdown.
    async fn extract(&self, document: &[u8]) -> Result<String, ExtractionError>;
}

/// The fixed set of strategies plus the summarizer, built once at startup.
pub struct StrategySet {
    direct: DirectExtractor,
    enhanced: EnhancedExtractor,
    ocr_enhance: OcrEnhanceExtractor,
    summarizer: Summarizer,
}

impl StrategySet {
    /// Assemble strategies from optional remote models. A missing model is the
    /// "no credential configured" case for the strategies that need it.
    pub fn new(
        generative: Option<Arc<dyn GenerativeModel>>,
        chat: Option<Arc<dyn ChatModel>>,
    ) -> Self {
        Self {
            direct: DirectExtractor,
            enhanced: EnhancedExtractor::new(generative.clone()),
            ocr_enhance: OcrEnhanceExtractor::new(chat),
            summarizer: Summarizer::new(generative),
        }
    }

    /// Build the remote clients for whichever credentials are configured.
    pub fn from_config(config: &ProviderConfig) -> Result<Self, ProviderError> {
        let generative: Option<Arc<dyn GenerativeModel>> = match &config.gemini_api_key {
            Some(key) => Some(Arc::new(GeminiClient::new(
                &config.gemini_base_url,
                &config.gemini_model,
                key,
            )?)),
            None => {
                tracing::warn!(
                    provider = "gemini",
                    "Gemini API key not configured; enhanced extraction and summarization will fail"
                );
                None
            }
        };
        let chat: Option<Arc<dyn ChatModel>> = match &config.mistral_api_key {
            Some(key) => Some(Arc::new(MistralClient::new(
                &config.mistral_base_url,
                &config.mistral_model,
                key,
            )?)),
            None => {
                tracing::warn!(
                    provider = "mistral",
                    "Mistral API key not configured; OCR enhancement returns a placeholder"
                );
                None
            }
        };
        Ok(Self::new(generative, chat))
    }

    /// Strategy for a validated selector.
    pub fn get_parser_function(&self, parser: Parser) -> &dyn ExtractionStrategy {
        match parser {
            Parser::Direct => &self.direct,
            Parser::Enhanced => &self.enhanced,
            Parser::OcrEnhance => &self.ocr_enhance,
        }
    }

    /// Parse a raw selector and return its strategy.
    pub fn resolve(&self, selector: &str) -> Result<&dyn ExtractionStrategy, ExtractionError> {
        let parser = selector.parse::<Parser>()?;
        tracing::debug!(parser = %parser, "Resolved extraction strategy");
        Ok(self.get_parser_function(parser))
    }

    /// Summarization step run after every successful extraction.
    pub fn summarizer(&self) -> &Summarizer {
        &self.summarizer
    }
}

#[cfg(test)]
#[path = "../../tests/support/pdf.rs"]
mod pdf_fixture;

#[cfg(test)]
pub(crate) mod test_support {
    use super::*;
    use crate::providers::ChatMessage;
    use std::sync::atomic::{AtomicUsize, Ordering};

    pub(crate) use super::pdf_fixture::pdf_with_pages;

    /// Generative model returning a canned reply and counting calls.
    pub(crate) struct StaticModel {
        pub(crate) reply: Result<String, String>,
        pub(crate) calls: AtomicUsize,
    }

    impl StaticModel {
        pub(crate) fn ok(reply: &str) -> Arc<Self> {
            Arc::new(Self {
                reply: Ok(reply.to_string()),
                calls: AtomicUsize::new(0),
            })
        }

        pub(crate) fn failing(message: &str) -> Arc<Self> {
            Arc::new(Self {
                reply: Err(message.to_string()),
                calls: AtomicUsize::new(0),
            })
        }

        pub(crate) fn call_count(&self) -> usize {
            self.calls.load(Ordering::SeqCst)
        }

        fn answer(&self) -> Result<String, ProviderError> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            self.reply.clone().map_err(ProviderError::Unavailable)
        }
    }

    #[async_trait]
    impl GenerativeModel for StaticModel {
        async fn generate(&self, _prompt: &str) -> Result<String, ProviderError> {
            self.answer()
        }
    }

    #[async_trait]
    impl ChatModel for StaticModel {
        async fn chat(&self, _messages: &[ChatMessage]) -> Result<String, ProviderError> {
            self.answer()
        }
    }
}
