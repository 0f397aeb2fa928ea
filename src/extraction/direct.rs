use super::{ExtractionError, ExtractionStrategy, Parser};
use async_trait::async_trait;
use std::fmt::Write as _;

/// Marker line preceding the text of page `number` (1-based).
pub fn page_marker(number: u32) -> String {
    format!("--- Page {number} ---")
}

/// Local, deterministic text extraction page by page.
#[derive(Debug, Clone, Copy, Default)]
pub struct DirectExtractor;

impl DirectExtractor {
    /// Extract every page's text, each preceded by its page marker.
    ///
    /// A page whose text cannot be decoded keeps its marker with an empty body so the page
    /// count in the output always matches the document.
    pub fn extract_pages(document: &[u8]) -> Result<String, ExtractionError> {
        let doc = lopdf::Document::load_mem(document)
            .map_err(|error| ExtractionError::InvalidDocument(error.to_string()))?;

        let mut text = String::new();
        for (page_number, _) in doc.get_pages() {
            let page_text = match doc.extract_text(&[page_number]) {
                Ok(page_text) => page_text,
                Err(error) => {
                    tracing::warn!(page = page_number, %error, "Failed to decode page text");
                    String::new()
                }
            };
            let _ = write!(text, "{}\n\n{}\n\n", page_marker(page_number), page_text);
        }
        Ok(text)
    }
}

#[async_trait]
impl ExtractionStrategy for DirectExtractor {
    fn parser(&self) -> Parser {
        Parser::Direct
    }

    async fn extract(&self, document: &[u8]) -> Result<String, ExtractionError> {
        let bytes = document.to_vec();
        tokio::task::spawn_blocking(move || Self::extract_pages(&bytes))
            .await
            .map_err(|error| {
                ExtractionError::InvalidDocument(format!("text extraction task failed: {error}"))
            })?
    }
}
