//! HTTP client for hosted LLM providers.

use async_trait::async_trait;
use serde_json::{json, Value};
use std::time::Duration;

use super::{Completion, CompletionRequest, LlmClient, LlmError};
use crate::models::{LlmProvider, ModelConfig};

const ANTHROPIC_VERSION: &str = "2023-06-01";

/// Calls the configured provider over HTTPS
pub struct HttpLlmClient {
    client: reqwest::Client,
    config: ModelConfig,
    api_key: String,
}

impl HttpLlmClient {
    /// Create a client, reading the API key from the provider's env var
    pub fn from_env(config: ModelConfig, timeout: Duration) -> Result<Self, LlmError> {
        let env_var = config.provider.env_var();
        let api_key = std::env::var(env_var)
            .ok()
            .filter(|k| !k.trim().is_empty())
            .ok_or(LlmError::MissingApiKey {
                provider: config.provider,
                env_var,
            })?;
        Self::new(config, api_key, timeout)
    }

    pub fn new(
        config: ModelConfig,
        api_key: impl Into<String>,
        timeout: Duration,
    ) -> Result<Self, LlmError> {
        let client = reqwest::Client::builder()
            .timeout(timeout)
            .user_agent("pressroom/0.1")
            .build()
            .map_err(|source| LlmError::Transport {
                provider: config.provider,
                source,
            })?;
        Ok(Self {
            client,
            config,
            api_key: api_key.into(),
        })
    }

    pub fn config(&self) -> &ModelConfig {
        &self.config
    }

    fn model_for<'a>(&'a self, request: &'a CompletionRequest) -> &'a str {
        request.model.as_deref().unwrap_or(&self.config.model)
    }

    async fn post(&self, url: String, body: Value) -> Result<Value, LlmError> {
        let provider = self.config.provider;
        let builder = self.client.post(&url).json(&body);
        let builder = match provider {
            LlmProvider::Anthropic => builder
                .header("x-api-key", &self.api_key)
                .header("anthropic-version", ANTHROPIC_VERSION),
            _ => builder.bearer_auth(&self.api_key),
        };

        let response = builder
            .send()
            .await
            .map_err(|source| LlmError::Transport { provider, source })?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(LlmError::Status {
                provider,
                status: status.as_u16(),
                body: body.chars().take(500).collect(),
            });
        }

        response
            .json::<Value>()
            .await
            .map_err(|source| LlmError::Transport { provider, source })
    }
}

#[async_trait]
impl LlmClient for HttpLlmClient {
    #[tracing::instrument(skip_all, fields(provider = %self.config.provider))]
    async fn complete(&self, request: &CompletionRequest) -> Result<Completion, LlmError> {
        let model = self.model_for(request).to_string();
        let base = self.config.endpoint_base();

        let completion = match self.config.provider {
            LlmProvider::Anthropic => {
                let body = anthropic_body(&model, request);
                let value = self.post(format!("{}/v1/messages", base), body).await?;
                parse_anthropic(self.config.provider, &model, &value)?
            }
            _ => {
                let body = chat_completions_body(&model, request);
                let value = self
                    .post(format!("{}/chat/completions", base), body)
                    .await?;
                parse_chat_completions(self.config.provider, &model, &value)?
            }
        };

        tracing::debug!(
            chars = completion.text.len(),
            output_tokens = ?completion.output_tokens,
            "LLM completion received"
        );
        Ok(completion)
    }
}

fn anthropic_body(model: &str, request: &CompletionRequest) -> Value {
    json!({
        "model": model,
        "max_tokens": request.max_tokens,
        "temperature": request.temperature,
        "system": request.system,
        "messages": [{ "role": "user", "content": request.user }],
    })
}

fn chat_completions_body(model: &str, request: &CompletionRequest) -> Value {
    json!({
        "model": model,
        "max_tokens": request.max_tokens,
        "temperature": request.temperature,
        "messages": [
            { "role": "system", "content": request.system },
            { "role": "user", "content": request.user },
        ],
    })
}

fn parse_anthropic(
    provider: LlmProvider,
    model: &str,
    value: &Value,
) -> Result<Completion, LlmError> {
    let text = value
        .get("content")
        .and_then(|c| c.as_array())
        .map(|blocks| {
            blocks
                .iter()
                .filter(|b| b.get("type").and_then(|t| t.as_str()) == Some("text"))
                .filter_map(|b| b.get("text").and_then(|t| t.as_str()))
                .collect::<Vec<_>>()
                .join("")
        })
        .unwrap_or_default();

    if text.trim().is_empty() {
        return Err(LlmError::EmptyResponse {
            provider,
            detail: truncated(value),
        });
    }

    let usage = value.get("usage");
    Ok(Completion {
        text,
        model: value
            .get("model")
            .and_then(|m| m.as_str())
            .unwrap_or(model)
            .to_string(),
        input_tokens: token_count(usage, "input_tokens"),
        output_tokens: token_count(usage, "output_tokens"),
    })
}

fn parse_chat_completions(
    provider: LlmProvider,
    model: &str,
    value: &Value,
) -> Result<Completion, LlmError> {
    let text = value
        .pointer("/choices/0/message/content")
        .and_then(|c| c.as_str())
        .unwrap_or_default()
        .to_string();

    if text.trim().is_empty() {
        return Err(LlmError::EmptyResponse {
            provider,
            detail: truncated(value),
        });
    }

    let usage = value.get("usage");
    Ok(Completion {
        text,
        model: value
            .get("model")
            .and_then(|m| m.as_str())
            .unwrap_or(model)
            .to_string(),
        input_tokens: token_count(usage, "prompt_tokens"),
        output_tokens: token_count(usage, "completion_tokens"),
    })
}

fn token_count(usage: Option<&Value>, key: &str) -> Option<u32> {
    usage
        .and_then(|u| u.get(key))
        .and_then(|v| v.as_u64())
        .map(|v| v as u32)
}

fn truncated(value: &Value) -> String {
    value.to_string().chars().take(200).collect()
}
