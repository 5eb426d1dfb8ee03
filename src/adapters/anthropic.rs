use std::time::Duration;

use anyhow::{Context, Result};
use async_trait::async_trait;
use reqwest::{Client, StatusCode};
use serde::{Deserialize, Serialize};
use tokio::time::sleep;

use crate::adapters::llm::{
    extract_json, CompletionClient, CompletionError, ModelTier, ProviderConfig,
};
use crate::core::models::TokenUsage;

pub struct AnthropicClient {
    client: Client,
    config: ProviderConfig,
    base_url: String,
}

#[derive(Serialize)]
struct AnthropicRequest {
    model: String,
    messages: Vec<Message>,
    max_tokens: usize,
    system: String,
}

#[derive(Serialize)]
struct Message {
    role: String,
    content: String,
}

#[derive(Deserialize)]
struct AnthropicResponse {
    content: Vec<Content>,
    usage: AnthropicUsage,
}

#[derive(Deserialize)]
struct Content {
    #[serde(default)]
    text: String,
    #[serde(rename = "type")]
    content_type: String,
}

#[derive(Deserialize)]
struct AnthropicUsage {
    input_tokens: u64,
    output_tokens: u64,
}

impl AnthropicClient {
    pub fn new(config: ProviderConfig) -> Result<Self> {
        let base_url = config
            .base_url
            .clone()
            .unwrap_or_else(|| "https://api.anthropic.com/v1".to_string());

        let client = Client::builder()
            .timeout(Duration::from_secs(60))
            .build()
            .context("failed to build HTTP client")?;

        Ok(Self {
            client,
            config,
            base_url,
        })
    }

    async fn send_with_retry<F>(
        &self,
        mut make_request: F,
    ) -> Result<reqwest::Response, CompletionError>
    where
        F: FnMut() -> reqwest::RequestBuilder,
    {
        const MAX_RETRIES: usize = 2;
        const BASE_DELAY_MS: u64 = 250;

        for attempt in 0..=MAX_RETRIES {
            match make_request().send().await {
                Ok(response) => {
                    if response.status().is_success() {
                        return Ok(response);
                    }

                    let status = response.status();
                    let body = response.text().await.unwrap_or_default();
                    if is_retryable_status(status) && attempt < MAX_RETRIES {
                        sleep(Duration::from_millis(BASE_DELAY_MS * (attempt as u64 + 1))).await;
                        continue;
                    }

                    return Err(CompletionError::Api { status, body });
                }
                Err(err) => {
                    if attempt < MAX_RETRIES {
                        sleep(Duration::from_millis(BASE_DELAY_MS * (attempt as u64 + 1))).await;
                        continue;
                    }
                    return Err(err.into());
                }
            }
        }

        unreachable!("retry loop always returns")
    }
}

#[async_trait]
impl CompletionClient for AnthropicClient {
    async fn complete_json(
        &self,
        system_prompt: &str,
        user_prompt: &str,
        tier: ModelTier,
        max_tokens: usize,
    ) -> Result<(serde_json::Value, TokenUsage), CompletionError> {
        let model = match tier {
            ModelTier::Primary => &self.config.model_primary,
            ModelTier::Lightweight => &self.config.model_lightweight,
        };

        let request = AnthropicRequest {
            model: model.clone(),
            messages: vec![Message {
                role: "user".to_string(),
                content: user_prompt.to_string(),
            }],
            max_tokens,
            system: system_prompt.to_string(),
        };

        let url = format!("{}/messages", self.base_url);
        let response = self
            .send_with_retry(|| {
                self.client
                    .post(&url)
                    .header("x-api-key", &self.config.api_key)
                    .header("anthropic-version", "2023-06-01")
                    .header("Content-Type", "application/json")
                    .json(&request)
            })
            .await?;

        let parsed: AnthropicResponse = response.json().await?;

        let text = parsed
            .content
            .iter()
            .find(|c| c.content_type == "text")
            .map(|c| c.text.as_str())
            .ok_or(CompletionError::EmptyCompletion)?;

        let value = extract_json(text)?;

        Ok((
            value,
            TokenUsage {
                input_tokens: parsed.usage.input_tokens,
                output_tokens: parsed.usage.output_tokens,
                model: model.clone(),
            },
        ))
    }
}

fn is_retryable_status(status: StatusCode) -> bool {
    status == StatusCode::TOO_MANY_REQUESTS || status.is_server_error()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::adapters::llm::Provider;
    use serde_json::json;

    fn config(base_url: String) -> ProviderConfig {
        ProviderConfig {
            provider: Provider::Anthropic,
            api_key: "test-key".to_string(),
            base_url: Some(base_url),
            model_primary: "model-big".to_string(),
            model_lightweight: "model-small".to_string(),
        }
    }

    #[tokio::test]
    async fn parses_fenced_json_and_reports_usage() {
        let mut server = mockito::Server::new_async().await;
        let _mock = server
            .mock("POST", "/messages")
            .with_status(200)
            .with_header("content-type", "application/json")
            .with_body(
                json!({
                    "content": [{"type": "text", "text": "```json\n[{\"line\": 2}]\n```"}],
                    "usage": {"input_tokens": 42, "output_tokens": 7}
                })
                .to_string(),
            )
            .create_async()
            .await;

        let client = AnthropicClient::new(config(server.url())).unwrap();
        let (value, usage) = client
            .complete_json("sys", "user", ModelTier::Lightweight, 1024)
            .await
            .unwrap();

        assert_eq!(value, json!([{"line": 2}]));
        assert_eq!(usage.input_tokens, 42);
        assert_eq!(usage.output_tokens, 7);
        assert_eq!(usage.model, "model-small");
    }

    #[tokio::test]
    async fn non_json_completion_is_malformed_response() {
        let mut server = mockito::Server::new_async().await;
        let _mock = server
            .mock("POST", "/messages")
            .with_status(200)
            .with_header("content-type", "application/json")
            .with_body(
                json!({
                    "content": [{"type": "text", "text": "I could not review this file."}],
                    "usage": {"input_tokens": 1, "output_tokens": 1}
                })
                .to_string(),
            )
            .create_async()
            .await;

        let client = AnthropicClient::new(config(server.url())).unwrap();
        let err = client
            .complete_json("sys", "user", ModelTier::Primary, 1024)
            .await
            .unwrap_err();
        assert!(matches!(err, CompletionError::MalformedResponse(_)));
    }

    #[tokio::test]
    async fn client_error_is_not_retried_and_surfaces_body() {
        let mut server = mockito::Server::new_async().await;
        let mock = server
            .mock("POST", "/messages")
            .with_status(400)
            .with_body("bad request")
            .expect(1)
            .create_async()
            .await;

        let client = AnthropicClient::new(config(server.url())).unwrap();
        let err = client
            .complete_json("sys", "user", ModelTier::Primary, 1024)
            .await
            .unwrap_err();
        match err {
            CompletionError::Api { status, body } => {
                assert_eq!(status, StatusCode::BAD_REQUEST);
                assert_eq!(body, "bad request");
            }
            other => panic!("unexpected error: {other:?}"),
        }
        mock.assert_async().await;
    }
}
