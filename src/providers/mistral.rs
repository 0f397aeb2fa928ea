//! Mistral chat completions client.

use super::{ChatMessage, ChatModel, ProviderError, build_http_client, ensure_success};
use async_trait::async_trait;
use reqwest::Client;
use serde::Deserialize;
use serde_json::json;

/// Client for the Mistral chat completions endpoint.
pub struct MistralClient {
    http: Client,
    base_url: String,
    model: String,
    api_key: String,
}

impl MistralClient {
    /// Build a client for `model` at `base_url`, authenticated with `api_key`.
    pub fn new(
        base_url: impl Into<String>,
        model: impl Into<String>,
        api_key: impl Into<String>,
    ) -> Result<Self, ProviderError> {
        Ok(Self {
            http: build_http_client()?,
            base_url: base_url.into(),
            model: model.into(),
            api_key: api_key.into(),
        })
    }

    fn endpoint(&self) -> String {
        format!(
            "{}/v1/chat/completions",
            self.base_url.trim_end_matches('/')
        )
    }
}

#[derive(Debug, Deserialize)]
struct ChatResponse {
    #[serde(default)]
    choices: Vec<Choice>,
}

#[derive(Debug, Deserialize)]
struct Choice {
    message: ResponseMessage,
}

#[derive(Debug, Deserialize)]
struct ResponseMessage {
    #[serde(default)]
    content: Option<String>,
}

#[async_trait]
impl ChatModel for MistralClient {
    async fn chat(&self, messages: &[ChatMessage]) -> Result<String, ProviderError> {
        let payload = json!({
            "model": self.model,
            "messages": messages,
        });

        let response = self
            .http
            .post(self.endpoint())
            .bearer_auth(&self.api_key)
            .json(&payload)
            .send()
            .await
            .map_err(|error| {
                ProviderError::Unavailable(format!(
                    "failed to reach Mistral at {}: {error}",
                    self.base_url
                ))
            })?;
        let response = ensure_success("Mistral", response).await?;

        let body: ChatResponse = response.json().await.map_err(|error| {
            ProviderError::InvalidResponse(format!("failed to decode Mistral response: {error}"))
        })?;

        body.choices
            .into_iter()
            .next()
            .and_then(|choice| choice.message.content)
            .ok_or_else(|| ProviderError::InvalidResponse("Mistral response had no choices".into()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use httpmock::{Method::POST, MockServer};

    fn client(server: &MockServer) -> MistralClient {
        MistralClient::new(server.base_url(), "mistral-tiny", "secret").expect("client")
    }

    #[tokio::test]
    async fn returns_first_choice_content() {
        let server = MockServer::start_async().await;
        let mock = server
            .mock_async(|when, then| {
                when.method(POST)
                    .path("/v1/chat/completions")
                    .header("authorization", "Bearer secret")
                    .body_contains("\"role\":\"system\"");
                then.status(200).json_body(json!({
                    "choices": [{ "message": { "role": "assistant", "content": "Cleaned text" } }]
                }));
            })
            .await;

        let reply = client(&server)
            .chat(&[
                ChatMessage::system("You fix OCR output."),
                ChatMessage::user("Teh text"),
            ])
            .await
            .expect("reply");

        mock.assert_async().await;
        assert_eq!(reply, "Cleaned text");
    }

    #[tokio::test]
    async fn unauthorized_is_generation_failure() {
        let server = MockServer::start_async().await;
        server
            .mock_async(|when, then| {
                when.method(POST).path("/v1/chat/completions");
                then.status(401).body("unauthorized");
            })
            .await;

        let error = client(&server)
            .chat(&[ChatMessage::user("text")])
            .await
            .expect_err("401");
        assert!(
            matches!(error, ProviderError::GenerationFailed(message) if message.contains("401"))
        );
    }

    #[tokio::test]
    async fn unreachable_server_is_unavailable() {
        let client =
            MistralClient::new("http://127.0.0.1:9", "mistral-tiny", "secret").expect("client");
        let error = client
            .chat(&[ChatMessage::user("text")])
            .await
            .expect_err("connection refused");
        assert!(matches!(error, ProviderError::Unavailable(_)));
    }
}
