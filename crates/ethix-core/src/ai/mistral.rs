use async_trait::async_trait;
use reqwest::Client;
use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

use super::CompletionBackend;
use crate::config::Config;
use crate::error::CompletionError;
use crate::state::{ChatRole, ChatTurn};

/// Reply used when the endpoint answers without any message content
pub const EMPTY_RESPONSE_PLACEHOLDER: &str = "No response received";

#[derive(Serialize)]
struct MistralMessage<'a> {
    role: &'a str,
    content: &'a str,
}

#[derive(Serialize)]
struct MistralRequest<'a> {
    model: &'a str,
    messages: Vec<MistralMessage<'a>>,
    max_tokens: u32,
    temperature: f32,
}

#[derive(Deserialize)]
struct MistralChoice {
    message: Option<MistralResponseMessage>,
}

#[derive(Deserialize)]
struct MistralResponseMessage {
    content: Option<String>,
}

#[derive(Deserialize)]
struct MistralResponse {
    #[serde(default)]
    choices: Vec<MistralChoice>,
}

#[derive(Clone)]
pub struct MistralClient {
    client: Client,
    endpoint: String,
    model: String,
    max_tokens: u32,
    temperature: f32,
}

impl MistralClient {
    pub fn new(config: &Config) -> Self {
        Self {
            client: Client::new(),
            endpoint: format!("{}/v1/chat/completions", config.api_base.trim_end_matches('/')),
            model: config.model.clone(),
            max_tokens: config.max_tokens,
            temperature: config.temperature,
        }
    }

    pub fn model(&self) -> &str {
        &self.model
    }

    pub fn endpoint(&self) -> &str {
        &self.endpoint
    }

    pub async fn query(
        &self,
        api_key: &str,
        history: &[ChatTurn],
        user_text: &str,
    ) -> Result<String, CompletionError> {
        let messages = history
            .iter()
            .map(|turn| MistralMessage {
                role: turn.role.as_str(),
                content: &turn.content,
            })
            .chain(std::iter::once(MistralMessage {
                role: ChatRole::User.as_str(),
                content: user_text,
            }))
            .collect();

        let request = MistralRequest {
            model: &self.model,
            messages,
            max_tokens: self.max_tokens,
            temperature: self.temperature,
        };

        debug!(model = %self.model, turns = history.len() + 1, "sending completion request");

        let response = self.client
            .post(&self.endpoint)
            .header("Authorization", format!("Bearer {}", api_key))
            .header("Content-Type", "application/json")
            .json(&request)
            .send()
            .await?;

        let status = response.status();
        if !status.is_success() {
            warn!(status = status.as_u16(), "completion request rejected");
            return Err(CompletionError::from_status(status));
        }

        let mistral_response: MistralResponse = response.json().await?;
        let content = mistral_response
            .choices
            .into_iter()
            .next()
            .and_then(|c| c.message)
            .and_then(|m| m.content)
            .filter(|c| !c.is_empty());

        if content.is_none() {
            debug!("completion response had no content");
        }

        Ok(content.unwrap_or_else(|| EMPTY_RESPONSE_PLACEHOLDER.to_string()))
    }
}

#[async_trait]
impl CompletionBackend for MistralClient {
    async fn complete(
        &self,
        api_key: &str,
        history: &[ChatTurn],
        user_text: &str,
    ) -> Result<String, CompletionError> {
        self.query(api_key, history, user_text).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use mockito::Matcher;
    use serde_json::json;

    fn client_for(server: &mockito::ServerGuard) -> MistralClient {
        let config = Config {
            api_base: server.url(),
            ..Config::default()
        };
        MistralClient::new(&config)
    }

    #[tokio::test]
    async fn test_sends_history_then_new_message() {
        let mut server = mockito::Server::new_async().await;

        let mock = server
            .mock("POST", "/v1/chat/completions")
            .match_header("authorization", "Bearer test-key")
            .match_body(Matcher::Json(json!({
                "model": "mistral-tiny",
                "messages": [
                    {"role": "user", "content": "Hi"},
                    {"role": "assistant", "content": "Hello!"},
                    {"role": "user", "content": "How are you?"}
                ],
                "max_tokens": 1000,
                "temperature": 0.7
            })))
            .with_status(200)
            .with_header("content-type", "application/json")
            .with_body(r#"{"choices":[{"message":{"role":"assistant","content":"Fine."}}]}"#)
            .create_async()
            .await;

        let history = vec![ChatTurn::user("Hi"), ChatTurn::assistant("Hello!")];
        let reply = client_for(&server)
            .query("test-key", &history, "How are you?")
            .await
            .unwrap();

        mock.assert_async().await;
        assert_eq!(reply, "Fine.");
    }

    #[tokio::test]
    async fn test_missing_choices_gives_placeholder() {
        let mut server = mockito::Server::new_async().await;
        let _mock = server
            .mock("POST", "/v1/chat/completions")
            .with_status(200)
            .with_body(r#"{"choices":[]}"#)
            .create_async()
            .await;

        let reply = client_for(&server).query("k", &[], "Hi").await.unwrap();
        assert_eq!(reply, EMPTY_RESPONSE_PLACEHOLDER);
    }

    #[tokio::test]
    async fn test_null_content_gives_placeholder() {
        let mut server = mockito::Server::new_async().await;
        let _mock = server
            .mock("POST", "/v1/chat/completions")
            .with_status(200)
            .with_body(r#"{"choices":[{"message":{"content":null}}]}"#)
            .create_async()
            .await;

        let reply = client_for(&server).query("k", &[], "Hi").await.unwrap();
        assert_eq!(reply, EMPTY_RESPONSE_PLACEHOLDER);
    }

    #[tokio::test]
    async fn test_unauthorized() {
        let mut server = mockito::Server::new_async().await;
        let _mock = server
            .mock("POST", "/v1/chat/completions")
            .with_status(401)
            .with_body(r#"{"message":"Unauthorized"}"#)
            .create_async()
            .await;

        let err = client_for(&server).query("bad", &[], "Hi").await.unwrap_err();
        assert!(matches!(err, CompletionError::InvalidCredential));
    }

    #[tokio::test]
    async fn test_server_error_carries_status() {
        let mut server = mockito::Server::new_async().await;
        let _mock = server
            .mock("POST", "/v1/chat/completions")
            .with_status(503)
            .create_async()
            .await;

        let err = client_for(&server).query("k", &[], "Hi").await.unwrap_err();
        match err {
            CompletionError::RequestFailed { status, status_text } => {
                assert_eq!(status, 503);
                assert_eq!(status_text, "Service Unavailable");
            }
            other => panic!("unexpected error: {other:?}"),
        }
    }

    #[tokio::test]
    async fn test_garbage_body_is_transport_error() {
        let mut server = mockito::Server::new_async().await;
        let _mock = server
            .mock("POST", "/v1/chat/completions")
            .with_status(200)
            .with_body("not json")
            .create_async()
            .await;

        let err = client_for(&server).query("k", &[], "Hi").await.unwrap_err();
        assert!(matches!(err, CompletionError::Transport(_)));
    }

    #[test]
    fn test_endpoint_trims_trailing_slash() {
        let config = Config {
            api_base: "https://example.com/".to_string(),
            ..Config::default()
        };
        let client = MistralClient::new(&config);
        assert_eq!(client.endpoint(), "https://example.com/v1/chat/completions");
        assert_eq!(client.model(), "mistral-tiny");
    }
}
