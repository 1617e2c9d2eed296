//! # Mission Forge Models
//!
//! Centralized LLM configuration types for the pipeline stages.
//! Each stage resolves a [`ModelConfig`] and turns it into a [`ModelClient`]
//! through [`ModelConfig::create_client`].

use std::sync::Arc;

use crate::llm::anthropic::AnthropicClient;
use crate::llm::gemini::GeminiClient;
use crate::llm::openai::OpenAiCompatClient;
use crate::llm::{ModelClient, ModelRequest};
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use tokio::sync::OnceCell;

/// Supported LLM providers
///
/// API keys are read from the environment:
/// - Gemini (Google) - `GEMINI_API_KEY`, falling back to `GOOGLE_API_KEY`
/// - Anthropic (Claude) - `ANTHROPIC_API_KEY`
/// - OpenAI (GPT) - `OPENAI_API_KEY`
/// - OpenRouter (Gateway) - `OPENROUTER_API_KEY`
/// - Grok (xAI) - `XAI_API_KEY`
/// - DeepSeek - `DEEPSEEK_API_KEY`
#[derive(Debug, Clone, Serialize, Deserialize, Default, PartialEq, Eq, Hash)]
#[serde(rename_all = "lowercase")]
pub enum LlmProvider {
    #[default]
    Gemini,
    Anthropic,
    #[serde(rename = "openai")]
    OpenAI,
    OpenRouter,
    Grok,
    DeepSeek,
}

impl LlmProvider {
    /// Get all available providers
    pub fn all() -> Vec<LlmProvider> {
        vec![
            LlmProvider::Gemini,
            LlmProvider::Anthropic,
            LlmProvider::OpenAI,
            LlmProvider::OpenRouter,
            LlmProvider::Grok,
            LlmProvider::DeepSeek,
        ]
    }

    /// Parse the lowercase wire name used by the API and config file
    pub fn from_slug(slug: &str) -> Option<LlmProvider> {
        match slug.trim().to_ascii_lowercase().as_str() {
            "gemini" | "google" => Some(LlmProvider::Gemini),
            "anthropic" | "claude" => Some(LlmProvider::Anthropic),
            "openai" => Some(LlmProvider::OpenAI),
            "openrouter" => Some(LlmProvider::OpenRouter),
            "grok" | "xai" => Some(LlmProvider::Grok),
            "deepseek" => Some(LlmProvider::DeepSeek),
            _ => None,
        }
    }

    /// Display name for UI
    pub fn display_name(&self) -> &'static str {
        match self {
            LlmProvider::Gemini => "Gemini",
            LlmProvider::Anthropic => "Anthropic",
            LlmProvider::OpenAI => "OpenAI",
            LlmProvider::OpenRouter => "OpenRouter",
            LlmProvider::Grok => "Grok",
            LlmProvider::DeepSeek => "DeepSeek",
        }
    }

    /// Environment variables checked (in order) for this provider's API key
    pub fn api_key_vars(&self) -> &'static [&'static str] {
        match self {
            LlmProvider::Gemini => &["GEMINI_API_KEY", "GOOGLE_API_KEY"],
            LlmProvider::Anthropic => &["ANTHROPIC_API_KEY"],
            LlmProvider::OpenAI => &["OPENAI_API_KEY"],
            LlmProvider::OpenRouter => &["OPENROUTER_API_KEY"],
            LlmProvider::Grok => &["XAI_API_KEY"],
            LlmProvider::DeepSeek => &["DEEPSEEK_API_KEY"],
        }
    }

    /// Model used when neither a per-agent nor a global model is configured
    pub fn default_model(&self) -> &'static str {
        match self {
            LlmProvider::Gemini => "gemini-2.5-flash",
            LlmProvider::Anthropic => "claude-sonnet-4-20250514",
            LlmProvider::OpenAI => "gpt-4o",
            LlmProvider::OpenRouter => "anthropic/claude-3.5-sonnet",
            LlmProvider::Grok => "grok-2",
            LlmProvider::DeepSeek => "deepseek-chat",
        }
    }

    /// Whether this provider supports custom base URL
    pub fn supports_base_url(&self) -> bool {
        matches!(self, LlmProvider::OpenAI)
    }

    /// Base URL of the OpenAI-compatible chat completions API, if the provider speaks it
    fn openai_compat_base(&self) -> Option<&'static str> {
        match self {
            LlmProvider::OpenAI => Some("https://api.openai.com/v1"),
            LlmProvider::OpenRouter => Some("https://openrouter.ai/api/v1"),
            LlmProvider::Grok => Some("https://api.x.ai/v1"),
            LlmProvider::DeepSeek => Some("https://api.deepseek.com/v1"),
            LlmProvider::Gemini | LlmProvider::Anthropic => None,
        }
    }

    fn api_key_from_env(&self) -> anyhow::Result<String> {
        self.api_key_vars()
            .iter()
            .find_map(|var| std::env::var(var).ok().filter(|v| !v.trim().is_empty()))
            .ok_or_else(|| {
                anyhow::anyhow!(
                    "{} API key not set (expected one of: {})",
                    self.display_name(),
                    self.api_key_vars().join(", ")
                )
            })
    }
}

/// Configuration for LLM model selection
///
/// Used by the coordinator to configure which provider and model each stage uses.
///
/// ## Example
/// ```rust,ignore
/// use missionforge_core::models::{ModelConfig, LlmProvider};
///
/// let config = ModelConfig::with_provider(LlmProvider::OpenAI, "gpt-4o");
/// let client = config.create_client()?;
/// ```
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct ModelConfig {
    /// LLM provider to use
    #[serde(default)]
    pub provider: LlmProvider,
    /// Model name (e.g., "gemini-2.5-flash", "gpt-4o")
    pub model: String,
    /// Optional base URL override for OpenAI-compatible APIs
    pub base_url: Option<String>,
}

impl Default for ModelConfig {
    fn default() -> Self {
        Self::with_provider(LlmProvider::default(), LlmProvider::default().default_model())
    }
}

impl ModelConfig {
    /// Create a new model config with the default provider (Gemini)
    pub fn new(model: impl Into<String>) -> Self {
        Self::with_provider(LlmProvider::default(), model)
    }

    /// Create config for a specific provider
    pub fn with_provider(provider: LlmProvider, model: impl Into<String>) -> Self {
        Self {
            provider,
            model: model.into(),
            base_url: None,
        }
    }

    /// Set base URL (for OpenAI-compatible endpoints)
    pub fn with_base_url(mut self, url: impl Into<String>) -> Self {
        self.base_url = Some(url.into());
        self
    }

    /// Create a model client based on the configured provider.
    ///
    /// Fails when the provider's API key is missing from the environment.
    pub fn create_client(&self) -> anyhow::Result<Arc<dyn ModelClient>> {
        let api_key = self.provider.api_key_from_env()?;
        let client: Arc<dyn ModelClient> = match &self.provider {
            LlmProvider::Gemini => Arc::new(GeminiClient::new(api_key, &self.model)),
            LlmProvider::Anthropic => Arc::new(AnthropicClient::new(api_key, &self.model)),
            provider => {
                let default_base = provider.openai_compat_base().unwrap_or_default();
                let base = match (&self.base_url, provider.supports_base_url()) {
                    (Some(url), true) => url.as_str(),
                    _ => default_base,
                };
                Arc::new(OpenAiCompatClient::new(
                    provider.display_name(),
                    base,
                    api_key,
                    &self.model,
                ))
            }
        };
        Ok(client)
    }

    /// Client that resolves its API key on first use instead of now.
    ///
    /// A missing key then fails the stage that needs it rather than
    /// construction of the whole coordinator.
    pub fn deferred_client(&self) -> Arc<dyn ModelClient> {
        Arc::new(DeferredClient {
            config: self.clone(),
            inner: OnceCell::new(),
        })
    }
}

struct DeferredClient {
    config: ModelConfig,
    inner: OnceCell<Arc<dyn ModelClient>>,
}

#[async_trait]
impl ModelClient for DeferredClient {
    fn label(&self) -> String {
        format!("{}/{}", self.config.provider.display_name().to_lowercase(), self.config.model)
    }

    async fn generate(&self, request: ModelRequest) -> anyhow::Result<String> {
        let client = self
            .inner
            .get_or_try_init(|| async { self.config.create_client() })
            .await?;
        client.generate(request).await
    }
}
