//! Server configuration persisted at `.pressroom/config.json`.
//!
//! Every field is optional so a PATCH body can carry just the keys it
//! changes. Environment variables win over the file.

use anyhow::Context;
use pressroom_core::models::{LlmProvider, ModelConfig};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::time::Duration;
use utoipa::ToSchema;

pub const CONFIG_PATH: &str = ".pressroom/config.json";

const DEFAULT_FREE_CREDITS: i64 = 1;
const DEFAULT_LLM_TIMEOUT_SECS: u64 = 120;

#[derive(Debug, Clone, Serialize, Deserialize, Default, PartialEq, ToSchema)]
pub struct PressroomConfig {
    /// Bearer token for `/api/v1/admin`
    #[serde(skip_serializing_if = "Option::is_none")]
    pub admin_token: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub llm_provider: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub llm_model: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub llm_base_url: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub llm_timeout_secs: Option<u64>,
    /// Credits granted once at signup
    #[serde(skip_serializing_if = "Option::is_none")]
    pub free_credits: Option<i64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub db_path: Option<String>,
}

impl PressroomConfig {
    pub async fn load() -> Self {
        Self::load_from(CONFIG_PATH).await
    }

    /// Missing or unreadable files fall back to defaults
    pub async fn load_from(path: impl AsRef<Path>) -> Self {
        let path = path.as_ref();
        if !path.exists() {
            return Self::default();
        }
        match tokio::fs::read_to_string(path).await {
            Ok(content) => serde_json::from_str(&content).unwrap_or_else(|e| {
                tracing::warn!(path = %path.display(), error = %e, "Ignoring malformed config file");
                Self::default()
            }),
            Err(e) => {
                tracing::warn!(path = %path.display(), error = %e, "Failed to read config file");
                Self::default()
            }
        }
    }

    pub async fn save(&self) -> anyhow::Result<()> {
        self.save_to(CONFIG_PATH).await
    }

    pub async fn save_to(&self, path: impl AsRef<Path>) -> anyhow::Result<()> {
        let path = path.as_ref();
        if let Some(parent) = path.parent() {
            tokio::fs::create_dir_all(parent)
                .await
                .with_context(|| format!("Failed to create {}", parent.display()))?;
        }
        let content = serde_json::to_string_pretty(self).context("Failed to encode config")?;
        tokio::fs::write(path, content)
            .await
            .with_context(|| format!("Failed to write {}", path.display()))
    }

    pub fn merge(&mut self, other: PressroomConfig) {
        if other.admin_token.is_some() {
            self.admin_token = other.admin_token;
        }
        if other.llm_provider.is_some() {
            self.llm_provider = other.llm_provider;
        }
        if other.llm_model.is_some() {
            self.llm_model = other.llm_model;
        }
        if other.llm_base_url.is_some() {
            self.llm_base_url = other.llm_base_url;
        }
        if other.llm_timeout_secs.is_some() {
            self.llm_timeout_secs = other.llm_timeout_secs;
        }
        if other.free_credits.is_some() {
            self.free_credits = other.free_credits;
        }
        if other.db_path.is_some() {
            self.db_path = other.db_path;
        }
    }

    /// Overlay `PRESSROOM_*` environment variables
    pub fn with_env(mut self) -> Self {
        self.merge(Self::from_vars(|key| std::env::var(key).ok()));
        self
    }

    fn from_vars(get: impl Fn(&str) -> Option<String>) -> Self {
        let var = |key: &str| get(key).filter(|v| !v.trim().is_empty());
        Self {
            admin_token: var("PRESSROOM_ADMIN_TOKEN"),
            llm_provider: var("PRESSROOM_LLM_PROVIDER"),
            llm_model: var("PRESSROOM_LLM_MODEL"),
            llm_base_url: var("PRESSROOM_LLM_BASE_URL"),
            llm_timeout_secs: var("PRESSROOM_LLM_TIMEOUT_SECS").and_then(|v| v.parse().ok()),
            free_credits: var("PRESSROOM_FREE_CREDITS").and_then(|v| v.parse().ok()),
            db_path: var("PRESSROOM_DB"),
        }
    }

    /// Reject values the server could not start with
    pub fn validate(&self) -> anyhow::Result<()> {
        if let Some(provider) = &self.llm_provider {
            provider.parse::<LlmProvider>()?;
        }
        if let Some(credits) = self.free_credits {
            anyhow::ensure!(credits >= 0, "free_credits must not be negative");
        }
        if let Some(secs) = self.llm_timeout_secs {
            anyhow::ensure!(secs > 0, "llm_timeout_secs must be positive");
        }
        Ok(())
    }

    pub fn model_config(&self) -> anyhow::Result<ModelConfig> {
        let provider = match &self.llm_provider {
            Some(p) => p.parse::<LlmProvider>()?,
            None => LlmProvider::default(),
        };
        let mut config = match &self.llm_model {
            Some(model) => ModelConfig::with_provider(provider, model.clone()),
            None => ModelConfig::for_provider(provider),
        };
        if let Some(url) = &self.llm_base_url {
            config = config.with_base_url(url.clone());
        }
        Ok(config)
    }

    pub fn llm_timeout(&self) -> Duration {
        Duration::from_secs(self.llm_timeout_secs.unwrap_or(DEFAULT_LLM_TIMEOUT_SECS))
    }

    pub fn free_credits(&self) -> i64 {
        self.free_credits.unwrap_or(DEFAULT_FREE_CREDITS)
    }

    pub fn db_path(&self) -> PathBuf {
        PathBuf::from(
            self.db_path
                .as_deref()
                .unwrap_or(pressroom_core::state::DEFAULT_DB_PATH),
        )
    }

    /// Copy safe to return over the API
    pub fn redacted(&self) -> Self {
        Self {
            admin_token: self.admin_token.as_ref().map(|_| "********".to_string()),
            ..self.clone()
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    #[test]
    fn test_merge_keeps_unset_fields() {
        let mut config = PressroomConfig {
            llm_provider: Some("openai".into()),
            free_credits: Some(2),
            ..Default::default()
        };
        config.merge(PressroomConfig {
            llm_model: Some("gpt-4o-mini".into()),
            free_credits: Some(0),
            ..Default::default()
        });
        assert_eq!(config.llm_provider.as_deref(), Some("openai"));
        assert_eq!(config.llm_model.as_deref(), Some("gpt-4o-mini"));
        assert_eq!(config.free_credits(), 0);
    }

    #[test]
    fn test_env_overrides() {
        let vars: HashMap<&str, &str> = [
            ("PRESSROOM_LLM_PROVIDER", "deepseek"),
            ("PRESSROOM_FREE_CREDITS", "3"),
            ("PRESSROOM_LLM_MODEL", "  "),
        ]
        .into_iter()
        .collect();
        let env = PressroomConfig::from_vars(|k| vars.get(k).map(|v| v.to_string()));
        assert_eq!(env.llm_provider.as_deref(), Some("deepseek"));
        assert_eq!(env.free_credits, Some(3));
        assert_eq!(env.llm_model, None);

        let model = env.model_config().unwrap();
        assert_eq!(model.provider, LlmProvider::DeepSeek);
        assert_eq!(model.model, LlmProvider::DeepSeek.default_model());
    }

    #[test]
    fn test_validate_and_redact() {
        let bad = PressroomConfig {
            llm_provider: Some("nonesuch".into()),
            ..Default::default()
        };
        assert!(bad.validate().is_err());

        let config = PressroomConfig {
            admin_token: Some("secret".into()),
            ..Default::default()
        };
        assert!(config.validate().is_ok());
        assert_eq!(config.redacted().admin_token.as_deref(), Some("********"));
        assert_eq!(config.db_path(), PathBuf::from(".pressroom/pressroom.db"));
    }

    #[tokio::test]
    async fn test_save_and_load_roundtrip() {
        let path = std::env::temp_dir()
            .join(format!("pressroom-config-{}", std::process::id()))
            .join("config.json");
        let config = PressroomConfig {
            llm_provider: Some("gemini".into()),
            llm_timeout_secs: Some(30),
            ..Default::default()
        };
        config.save_to(&path).await.unwrap();
        assert_eq!(PressroomConfig::load_from(&path).await, config);

        tokio::fs::write(&path, "{ not json").await.unwrap();
        assert_eq!(PressroomConfig::load_from(&path).await, PressroomConfig::default());
        let _ = tokio::fs::remove_dir_all(path.parent().unwrap()).await;
    }
}
