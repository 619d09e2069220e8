//! LLM-based field extraction.
//!
//! The extractor is a narrow `extract(content, prompt) -> text` interface
//! with three OpenAI-compatible-chat implementations selected via
//! `AppConfig::extractor_provider`. Grounded on this repo's existing
//! `resolve_api_key`/`resolve_base_url`/`resolve_model` config-resolution
//! idiom (`core::config::ShadowDeepResearchConfig`) and its single
//! external-text-completion collaborator in `tools::deep_research`.

use crate::config::{AppConfig, ExtractorProvider};
use async_trait::async_trait;
use serde_json::json;
use std::fmt;
use std::time::Duration;

#[derive(Debug)]
pub struct ExtractError(pub String);

impl fmt::Display for ExtractError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "extraction failed: {}", self.0)
    }
}

impl std::error::Error for ExtractError {}

#[async_trait]
pub trait Extractor: Send + Sync {
    async fn extract(&self, content: &str, prompt: &str) -> Result<String, ExtractError>;
}

/// A chat-completions-compatible HTTP extractor. All three configured
/// providers (provider-A, provider-B, provider-B-compatible) speak the same
/// wire shape, differing only in base URL / default model — so one struct
/// implements all of them, parameterized at construction time.
pub struct ChatCompletionExtractor {
    client: reqwest::Client,
    base_url: String,
    api_key: Option<String>,
    model: String,
}

impl ChatCompletionExtractor {
    pub fn new(client: reqwest::Client, base_url: String, api_key: Option<String>, model: String) -> Self {
        Self {
            client,
            base_url,
            api_key,
            model,
        }
    }

    /// Build the configured extractor, if any provider is configured.
    /// Returns `None` when no provider is configured — callers use this to
    /// omit `extractPrompt` from the advertised tool schema.
    pub fn from_config(client: reqwest::Client, config: &AppConfig) -> Option<Self> {
        let provider = config.extractor_provider?;
        let (default_base_url, default_model) = match provider {
            ExtractorProvider::ProviderA => ("https://api.provider-a.example/v1", "provider-a-chat"),
            ExtractorProvider::ProviderB => ("https://api.provider-b.example/v1", "provider-b-chat"),
            ExtractorProvider::ProviderBCompatible => ("http://localhost:11434/v1", "provider-b-compatible"),
        };
        Some(Self::new(
            client,
            config.extractor_base_url.clone().unwrap_or_else(|| default_base_url.to_string()),
            config.extractor_api_key.clone(),
            config.extractor_model.clone().unwrap_or_else(|| default_model.to_string()),
        ))
    }
}

#[async_trait]
impl Extractor for ChatCompletionExtractor {
    async fn extract(&self, content: &str, prompt: &str) -> Result<String, ExtractError> {
        let body = json!({
            "model": self.model,
            "messages": [
                {
                    "role": "system",
                    "content": "Answer the user's query using only the provided page content. Be concise."
                },
                {
                    "role": "user",
                    "content": format!("Page content:\n\n{content}\n\nQuery: {prompt}")
                }
            ],
            "max_tokens": 1024,
        });

        let mut request = self
            .client
            .post(format!("{}/chat/completions", self.base_url.trim_end_matches('/')))
            .timeout(Duration::from_secs(60))
            .json(&body);

        if let Some(key) = &self.api_key {
            if !key.is_empty() {
                request = request.bearer_auth(key);
            }
        }

        let response = request.send().await.map_err(|e| ExtractError(e.to_string()))?;
        if !response.status().is_success() {
            return Err(ExtractError(format!("extractor HTTP {}", response.status())));
        }

        let value: serde_json::Value = response.json().await.map_err(|e| ExtractError(e.to_string()))?;
        value
            .get("choices")
            .and_then(|c| c.get(0))
            .and_then(|c| c.get("message"))
            .and_then(|m| m.get("content"))
            .and_then(|t| t.as_str())
            .map(|s| s.trim().to_string())
            .ok_or_else(|| ExtractError("extractor response missing choices[0].message.content".to_string()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::{OptimizeFor, RetentionPolicy, StorageBackendKind};
    use std::path::PathBuf;

    fn base_config() -> AppConfig {
        AppConfig {
            remote_api_key: None,
            remote_base_url: "https://remote.example/v1".to_string(),
            optimize_for: OptimizeFor::Cost,
            learned_store_path: PathBuf::from("/tmp/strategies.md"),
            storage_backend: StorageBackendKind::Memory,
            storage_root: PathBuf::from("/tmp/cache"),
            retention: RetentionPolicy::default(),
            extractor_provider: None,
            extractor_api_key: None,
            extractor_base_url: None,
            extractor_model: None,
            map_default_country: "us".to_string(),
            map_default_languages: vec!["en".to_string()],
            map_default_max_results: 100,
            port: 5000,
            production: false,
            allowed_hosts: Vec::new(),
            allowed_origins: Vec::new(),
            session_resumable: true,
        }
    }

    #[test]
    fn from_config_is_none_without_a_provider() {
        let config = base_config();
        assert!(ChatCompletionExtractor::from_config(reqwest::Client::new(), &config).is_none());
    }

    #[test]
    fn from_config_uses_provider_defaults_when_unset() {
        let mut config = base_config();
        config.extractor_provider = Some(ExtractorProvider::ProviderA);
        let extractor = ChatCompletionExtractor::from_config(reqwest::Client::new(), &config).unwrap();
        assert_eq!(extractor.base_url, "https://api.provider-a.example/v1");
        assert_eq!(extractor.model, "provider-a-chat");
    }

    #[test]
    fn from_config_honors_explicit_base_url_and_model_overrides() {
        let mut config = base_config();
        config.extractor_provider = Some(ExtractorProvider::ProviderBCompatible);
        config.extractor_base_url = Some("http://custom-host:9999/v1".to_string());
        config.extractor_model = Some("custom-model".to_string());
        let extractor = ChatCompletionExtractor::from_config(reqwest::Client::new(), &config).unwrap();
        assert_eq!(extractor.base_url, "http://custom-host:9999/v1");
        assert_eq!(extractor.model, "custom-model");
    }
}
