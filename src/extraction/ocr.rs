use super::{DirectExtractor, ExtractionError, ExtractionStrategy, Parser};
use crate::providers::{ChatMessage, ChatModel};
use async_trait::async_trait;
use std::sync::Arc;

/// Text returned when no chat model credential is configured.
pub const OCR_PLACEHOLDER: &str = "[OCR enhancement unavailable: no credential configured]";

const SYSTEM_INSTRUCTION: &str = "You are an OCR enhancement service. Improve the text extraction \
by fixing any OCR errors and formatting issues.";
const USER_INSTRUCTION: &str =
    "Please enhance this extracted text, fixing any OCR errors and improving formatting:";

/// Direct extraction corrected by a chat model.
///
/// Remote failures never fail the job: the Direct text is returned unmodified instead.
pub struct OcrEnhanceExtractor {
    model: Option<Arc<dyn ChatModel>>,
}

impl OcrEnhanceExtractor {
    /// Wrap the chat model; `None` means no credential is configured.
    pub fn new(model: Option<Arc<dyn ChatModel>>) -> Self {
        Self { model }
    }

    fn messages(raw: &str) -> [ChatMessage; 2] {
        [
            ChatMessage::system(SYSTEM_INSTRUCTION),
            ChatMessage::user(format!("{USER_INSTRUCTION}\n\n{raw}")),
        ]
    }
}

#[async_trait]
impl ExtractionStrategy for OcrEnhanceExtractor {
    fn parser(&self) -> Parser {
        Parser::OcrEnhance
    }

    async fn extract(&self, document: &[u8]) -> Result<String, ExtractionError> {
        let Some(model) = &self.model else {
            tracing::warn!("OCR enhancement requested without a Mistral credential");
            return Ok(OCR_PLACEHOLDER.to_string());
        };

        let raw = DirectExtractor.extract(document).await?;
        match model.chat(&Self::messages(&raw)).await {
            Ok(enhanced) => Ok(enhanced),
            Err(error) => {
                tracing::warn!(%error, "OCR enhancement failed; falling back to direct extraction");
                Ok(raw)
            }
        }
    }
}
