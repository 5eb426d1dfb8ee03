use std::time::Duration;

use anyhow::{Context, Result};
use async_trait::async_trait;
use reqwest::Client;
use serde::{Deserialize, Serialize};

use crate::adapters::llm::{
    extract_json, CompletionClient, CompletionError, ModelTier, ProviderConfig,
};
use crate::core::models::TokenUsage;

pub struct OpenAIClient {
    client: Client,
    config: ProviderConfig,
    base_url: String,
}

#[derive(Serialize)]
struct OpenAIRequest {
    model: String,
    messages: Vec<Message>,
    max_tokens: usize,
}

#[derive(Serialize, Deserialize)]
struct Message {
    role: String,
    #[serde(default)]
    content: String,
}

#[derive(Deserialize)]
struct OpenAIResponse {
    choices: Vec<Choice>,
    usage: Option<OpenAIUsage>,
}

#[derive(Deserialize)]
struct Choice {
    message: Message,
}

#[derive(Deserialize)]
struct OpenAIUsage {
    prompt_tokens: u64,
    completion_tokens: u64,
}

impl OpenAIClient {
    pub fn new(config: ProviderConfig) -> Result<Self> {
        let base_url = config
            .base_url
            .clone()
            .unwrap_or_else(|| "https://api.openai.com/v1".to_string());

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
}

#[async_trait]
impl CompletionClient for OpenAIClient {
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

        let request = OpenAIRequest {
            model: model.clone(),
            messages: vec![
                Message {
                    role: "system".to_string(),
                    content: system_prompt.to_string(),
                },
                Message {
                    role: "user".to_string(),
                    content: user_prompt.to_string(),
                },
            ],
            max_tokens,
        };

        let response = self
            .client
            .post(format!("{}/chat/completions", self.base_url))
            .header("Authorization", format!("Bearer {}", self.config.api_key))
            .header("Content-Type", "application/json")
            .json(&request)
            .send()
            .await?;

        if !response.status().is_success() {
            let status = response.status();
            let body = response.text().await.unwrap_or_default();
            return Err(CompletionError::Api { status, body });
        }

        let parsed: OpenAIResponse = response.json().await?;

        let text = parsed
            .choices
            .first()
            .map(|c| c.message.content.as_str())
            .filter(|t| !t.is_empty())
            .ok_or(CompletionError::EmptyCompletion)?;

        let value = extract_json(text)?;

        let usage = parsed.usage.unwrap_or(OpenAIUsage {
            prompt_tokens: 0,
            completion_tokens: 0,
        });

        Ok((
            value,
            TokenUsage {
                input_tokens: usage.prompt_tokens,
                output_tokens: usage.completion_tokens,
                model: model.clone(),
            },
        ))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::adapters::llm::Provider;
    use serde_json::json;

    fn config(base_url: String) -> ProviderConfig {
        ProviderConfig {
            provider: Provider::Openai,
            api_key: "test-key".to_string(),
            base_url: Some(base_url),
            model_primary: "gpt-big".to_string(),
            model_lightweight: "gpt-small".to_string(),
        }
    }

    #[tokio::test]
    async fn parses_completion_and_usage() {
        let mut server = mockito::Server::new_async().await;
        let _mock = server
            .mock("POST", "/chat/completions")
            .with_status(200)
            .with_header("content-type", "application/json")
            .with_body(
                json!({
                    "choices": [{"message": {"role": "assistant", "content": "{\"purpose\": \"adds caching\"}"}}],
                    "usage": {"prompt_tokens": 10, "completion_tokens": 5}
                })
                .to_string(),
            )
            .create_async()
            .await;

        let client = OpenAIClient::new(config(server.url())).unwrap();
        let (value, usage) = client
            .complete_json("sys", "user", ModelTier::Primary, 2048)
            .await
            .unwrap();

        assert_eq!(value, json!({"purpose": "adds caching"}));
        assert_eq!(usage.input_tokens, 10);
        assert_eq!(usage.model, "gpt-big");
    }

    #[tokio::test]
    async fn missing_usage_defaults_to_zero() {
        let mut server = mockito::Server::new_async().await;
        let _mock = server
            .mock("POST", "/chat/completions")
            .with_status(200)
            .with_header("content-type", "application/json")
            .with_body(
                json!({
                    "choices": [{"message": {"role": "assistant", "content": "[]"}}]
                })
                .to_string(),
            )
            .create_async()
            .await;

        let client = OpenAIClient::new(config(server.url())).unwrap();
        let (value, usage) = client
            .complete_json("sys", "user", ModelTier::Lightweight, 1024)
            .await
            .unwrap();

        assert_eq!(value, json!([]));
        assert_eq!(usage.input_tokens, 0);
        assert_eq!(usage.output_tokens, 0);
    }
}
