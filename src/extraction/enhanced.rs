use super::{DirectExtractor, ExtractionError, ExtractionStrategy, Parser};
use crate::providers::GenerativeModel;
use async_trait::async_trait;
use std::sync::Arc;

const MARKDOWN_INSTRUCTION: &str = "Convert the following PDF content to well-structured markdown. \
Create headers, lists, and proper formatting:";

/// Direct extraction followed by markdown reformatting through a generative model.
pub struct EnhancedExtractor {
    model: Option<Arc<dyn GenerativeModel>>,
}

impl EnhancedExtractor {
    /// Wrap the generative model; `None` means no credential is configured.
    pub fn new(model: Option<Arc<dyn GenerativeModel>>) -> Self {
        Self { model }
    }

    fn prompt(raw: &str) -> String {
        format!("{MARKDOWN_INSTRUCTION}\n\n{raw}")
    }
}

#[async_trait]
impl ExtractionStrategy for EnhancedExtractor {
    fn parser(&self) -> Parser {
        Parser::Enhanced
    }

    async fn extract(&self, document: &[u8]) -> Result<String, ExtractionError> {
        let Some(model) = &self.model else {
            return Err(ExtractionError::Configuration(
                "Gemini API key not configured".into(),
            ));
        };

        let raw = DirectExtractor.extract(document).await?;
        let markdown = model.generate(&Self::prompt(&raw)).await?;
        tracing::debug!(
            input_len = raw.len(),
            output_len = markdown.len(),
            "Enhanced extraction completed"
        );
        Ok(markdown)
    }
}
