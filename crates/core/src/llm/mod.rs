//! # LLM Client
//!
//! The pipeline talks to language models through [`LlmClient`], so tests can
//! script responses and the server can swap providers at runtime.

mod http;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::time::Duration;
use thiserror::Error;

use crate::models::{LlmProvider, ModelConfig};
use crate::prompts::{PromptConfig, RenderedPrompt};

pub use http::HttpLlmClient;

/// A single-turn completion request
#[derive(Debug, Clone, Serialize)]
pub struct CompletionRequest {
    pub system: String,
    pub user: String,
    /// Routes the request to another provider than the default
    pub provider: Option<LlmProvider>,
    /// Overrides the client's configured model
    pub model: Option<String>,
    pub temperature: f32,
    pub max_tokens: u32,
}

impl CompletionRequest {
    /// Build a request from a rendered prompt and the config it came from
    pub fn from_prompt(config: &PromptConfig, rendered: RenderedPrompt) -> Self {
        Self {
            system: rendered.system,
            user: rendered.user,
            provider: config.provider,
            model: config.model.clone(),
            temperature: config.temperature,
            max_tokens: config.max_tokens,
        }
    }
}

/// Text returned by a model
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Completion {
    pub text: String,
    pub model: String,
    #[serde(default)]
    pub input_tokens: Option<u32>,
    #[serde(default)]
    pub output_tokens: Option<u32>,
}

#[derive(Debug, Error)]
pub enum LlmError {
    #[error("{provider} API key not set (expected {env_var})")]
    MissingApiKey {
        provider: LlmProvider,
        env_var: &'static str,
    },

    #[error("{provider} returned HTTP {status}: {body}")]
    Status {
        provider: LlmProvider,
        status: u16,
        body: String,
    },

    #[error("request to {provider} failed: {source}")]
    Transport {
        provider: LlmProvider,
        #[source]
        source: reqwest::Error,
    },

    #[error("{provider} response had no text: {detail}")]
    EmptyResponse {
        provider: LlmProvider,
        detail: String,
    },
}

#[async_trait]
pub trait LlmClient: Send + Sync {
    async fn complete(&self, request: &CompletionRequest) -> Result<Completion, LlmError>;
}

/// Sends each request to the provider it names, falling back to the default config.
///
/// A provider override keeps the default model only when the default config
/// already targets that provider; otherwise the provider's default model is used.
pub struct ProviderRouter {
    default: ModelConfig,
    timeout: Duration,
}

impl ProviderRouter {
    pub fn new(default: ModelConfig, timeout: Duration) -> Self {
        Self { default, timeout }
    }

    fn config_for(&self, request: &CompletionRequest) -> ModelConfig {
        match request.provider {
            Some(provider) if provider != self.default.provider => {
                ModelConfig::for_provider(provider)
            }
            _ => self.default.clone(),
        }
    }
}

#[async_trait]
impl LlmClient for ProviderRouter {
    async fn complete(&self, request: &CompletionRequest) -> Result<Completion, LlmError> {
        let client = HttpLlmClient::from_env(self.config_for(request), self.timeout)?;
        client.complete(request).await
    }
}

#[cfg(test)]
pub mod testing {
    //! Scripted client for pipeline tests

    use super::*;
    use std::collections::VecDeque;
    use std::sync::Mutex;

    /// Returns queued responses in order and records every request
    #[derive(Default)]
    pub struct ScriptedLlm {
        responses: Mutex<VecDeque<Result<String, String>>>,
        pub requests: Mutex<Vec<CompletionRequest>>,
    }

    impl ScriptedLlm {
        pub fn new() -> Self {
            Self::default()
        }

        pub fn reply(self, text: &str) -> Self {
            self.responses
                .lock()
                .unwrap()
                .push_back(Ok(text.to_string()));
            self
        }

        pub fn fail(self, body: &str) -> Self {
            self.responses
                .lock()
                .unwrap()
                .push_back(Err(body.to_string()));
            self
        }

        pub fn request_count(&self) -> usize {
            self.requests.lock().unwrap().len()
        }
    }

    #[async_trait]
    impl LlmClient for ScriptedLlm {
        async fn complete(&self, request: &CompletionRequest) -> Result<Completion, LlmError> {
            self.requests.lock().unwrap().push(request.clone());
            let next = self.responses.lock().unwrap().pop_front();
            match next {
                Some(Ok(text)) => Ok(Completion {
                    text,
                    model: "scripted".to_string(),
                    input_tokens: None,
                    output_tokens: None,
                }),
                Some(Err(body)) => Err(LlmError::Status {
                    provider: LlmProvider::Anthropic,
                    status: 529,
                    body,
                }),
                None => Err(LlmError::EmptyResponse {
                    provider: LlmProvider::Anthropic,
                    detail: "script exhausted".to_string(),
                }),
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn request(provider: Option<LlmProvider>) -> CompletionRequest {
        CompletionRequest {
            system: String::new(),
            user: String::new(),
            provider,
            model: None,
            temperature: 0.5,
            max_tokens: 10,
        }
    }

    #[test]
    fn test_router_keeps_default_for_same_provider() {
        let default = ModelConfig::with_provider(LlmProvider::OpenAI, "gpt-4o-mini")
            .with_base_url("http://localhost:8000/v1");
        let router = ProviderRouter::new(default.clone(), Duration::from_secs(1));

        assert_eq!(router.config_for(&request(None)), default);
        assert_eq!(router.config_for(&request(Some(LlmProvider::OpenAI))), default);

        let routed = router.config_for(&request(Some(LlmProvider::DeepSeek)));
        assert_eq!(routed.provider, LlmProvider::DeepSeek);
        assert_eq!(routed.model, "deepseek-chat");
        assert_eq!(routed.base_url, None);
    }
}
