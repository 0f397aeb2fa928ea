use super::ExtractionError;
use crate::providers::GenerativeModel;
use std::sync::Arc;

const SUMMARY_INSTRUCTION: &str = "Provide a concise summary of the following document content. \
Focus on the key points and main ideas:";

/// Produces a short summary of extracted content through a generative model.
pub struct Summarizer {
    model: Option<Arc<dyn GenerativeModel>>,
}

impl Summarizer {
    /// Wrap the generative model; `None` means no credential is configured.
    pub fn new(model: Option<Arc<dyn GenerativeModel>>) -> Self {
        Self { model }
    }

    /// Summarize `content`. There is no fallback: a remote failure fails the job.
    pub async fn summarize(&self, content: &str) -> Result<String, ExtractionError> {
        let Some(model) = &self.model else {
            return Err(ExtractionError::Configuration(
                "Gemini API key not configured".into(),
            ));
        };
        let prompt = format!("{SUMMARY_INSTRUCTION}\n\n{content}");
        let summary = model.generate(&prompt).await?;
        tracing::debug!(summary_len = summary.len(), "Summary generated");
        Ok(summary)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::extraction::test_support::StaticModel;

    #[tokio::test]
    async fn returns_model_summary() {
        let summarizer = Summarizer::new(Some(StaticModel::ok("Short summary")));
        assert_eq!(
            summarizer.summarize("long content").await.expect("summary"),
            "Short summary"
        );
    }

    #[tokio::test]
    async fn missing_credential_is_configuration_error() {
        let error = Summarizer::new(None)
            .summarize("content")
            .await
            .expect_err("no key");
        assert!(matches!(error, ExtractionError::Configuration(_)));
    }

    #[tokio::test]
    async fn remote_failure_is_not_masked() {
        let error = Summarizer::new(Some(StaticModel::failing("timeout")))
            .summarize("content")
            .await
            .expect_err("remote");
        assert!(matches!(error, ExtractionError::Provider(_)));
    }
}
