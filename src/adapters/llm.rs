use std::sync::Arc;

use anyhow::Result;
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::core::models::TokenUsage;

/// Which of the two configured models a call should use. Selection
/// policy lives in the review pipeline; the gateway only resolves the
/// tier to a model id.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ModelTier {
    Primary,
    Lightweight,
}

#[derive(Debug, Error)]
pub enum CompletionError {
    #[error("transport error: {0}")]
    Transport(#[from] reqwest::Error),

    #[error("api error ({status}): {body}")]
    Api {
        status: reqwest::StatusCode,
        body: String,
    },

    #[error("empty completion")]
    EmptyCompletion,

    #[error("malformed response: {0}")]
    MalformedResponse(#[from] serde_json::Error),
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ProviderConfig {
    pub provider: Provider,
    pub api_key: String,
    pub base_url: Option<String>,
    pub model_primary: String,
    pub model_lightweight: String,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, clap::ValueEnum)]
#[serde(rename_all = "lowercase")]
pub enum Provider {
    Anthropic,
    Openai,
}

/// Provider-agnostic structured-completion contract. One user-turn
/// request in, parsed JSON plus usage accounting out. No retry policy
/// beyond what the transport itself does; fallback policy belongs to
/// callers.
#[async_trait]
pub trait CompletionClient: Send + Sync {
    async fn complete_json(
        &self,
        system_prompt: &str,
        user_prompt: &str,
        tier: ModelTier,
        max_tokens: usize,
    ) -> Result<(serde_json::Value, TokenUsage), CompletionError>;
}

pub fn create_client(config: &ProviderConfig) -> Result<Arc<dyn CompletionClient>> {
    match config.provider {
        Provider::Anthropic => Ok(Arc::new(crate::adapters::AnthropicClient::new(
            config.clone(),
        )?)),
        Provider::Openai => Ok(Arc::new(crate::adapters::OpenAIClient::new(config.clone())?)),
    }
}

/// Extract a JSON value from completion text that may be wrapped in a
/// markdown code fence (possibly tagged `json`).
pub fn extract_json(text: &str) -> Result<serde_json::Value, serde_json::Error> {
    let cleaned = text.trim();
    if let Some(rest) = cleaned.strip_prefix("```") {
        // Drop the opening fence line (which may carry a language tag)
        // and everything from the closing fence onward.
        let body = rest.split_once('\n').map(|(_, b)| b).unwrap_or("");
        let inner = match body.rfind("```") {
            Some(idx) => &body[..idx],
            None => body,
        };
        serde_json::from_str(inner.trim())
    } else {
        serde_json::from_str(cleaned)
    }
}
