//! Persisted server configuration and API key loading.
//!
//! Everything lives under `.missionforge/` in the working directory:
//! `config.json` for model and fetch settings, `.env` for provider keys.

use std::collections::HashMap;
use std::path::{Path, PathBuf};

use missionforge_core::models::LlmProvider;
use missionforge_core::swarm::CoordinatorConfig;
use serde::{Deserialize, Serialize};
use utoipa::ToSchema;

pub const CONFIG_DIR: &str = ".missionforge";

/// Load provider API keys from `<dir>/.env`; variables already set win
pub fn load_env(dir: &Path) {
    let path = dir.join(".env");
    match dotenvy::from_path(&path) {
        Ok(()) => tracing::info!(path = %path.display(), "Loaded API keys"),
        Err(e) if e.not_found() => {}
        Err(e) => tracing::warn!(path = %path.display(), error = %e, "Failed to read .env"),
    }
}

/// Persisted configuration (partial override of CoordinatorConfig)
#[derive(Debug, Clone, Serialize, Deserialize, Default, PartialEq, ToSchema)]
pub struct PersistedConfig {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub global_provider: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub global_model: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub base_url: Option<String>,
    #[serde(default, skip_serializing_if = "HashMap::is_empty")]
    pub per_agent_providers: HashMap<String, String>,
    #[serde(default, skip_serializing_if = "HashMap::is_empty")]
    pub per_agent_models: HashMap<String, String>,
    #[serde(default, skip_serializing_if = "HashMap::is_empty")]
    pub per_agent_base_urls: HashMap<String, String>,
    #[serde(default, skip_serializing_if = "HashMap::is_empty")]
    pub per_agent_temperatures: HashMap<String, f32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub max_files: Option<usize>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub max_file_bytes: Option<u64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub fetch_concurrency: Option<usize>,
}

fn config_path(dir: &Path) -> PathBuf {
    dir.join("config.json")
}

impl PersistedConfig {
    pub async fn load(dir: &Path) -> Self {
        let path = config_path(dir);
        match tokio::fs::read_to_string(&path).await {
            Ok(content) => serde_json::from_str(&content).unwrap_or_else(|e| {
                tracing::warn!(path = %path.display(), error = %e, "Ignoring unreadable config");
                Self::default()
            }),
            Err(_) => Self::default(),
        }
    }

    pub async fn save(&self, dir: &Path) -> Result<(), std::io::Error> {
        tokio::fs::create_dir_all(dir).await?;
        let content = serde_json::to_string_pretty(self)
            .map_err(|e| std::io::Error::new(std::io::ErrorKind::InvalidData, e))?;
        tokio::fs::write(config_path(dir), content).await
    }

    pub fn merge(&mut self, other: PersistedConfig) {
        if other.global_provider.is_some() {
            self.global_provider = other.global_provider;
        }
        if other.global_model.is_some() {
            self.global_model = other.global_model;
        }
        if other.base_url.is_some() {
            self.base_url = other.base_url;
        }
        if other.max_files.is_some() {
            self.max_files = other.max_files;
        }
        if other.max_file_bytes.is_some() {
            self.max_file_bytes = other.max_file_bytes;
        }
        if other.fetch_concurrency.is_some() {
            self.fetch_concurrency = other.fetch_concurrency;
        }
        self.per_agent_providers.extend(other.per_agent_providers);
        self.per_agent_models.extend(other.per_agent_models);
        self.per_agent_base_urls.extend(other.per_agent_base_urls);
        self.per_agent_temperatures
            .extend(other.per_agent_temperatures);
    }

    /// Provider names that don't parse, for rejecting a PATCH
    pub fn unknown_providers(&self) -> Vec<String> {
        self.global_provider
            .iter()
            .chain(self.per_agent_providers.values())
            .filter(|p| LlmProvider::from_slug(p).is_none())
            .cloned()
            .collect()
    }

    /// Apply on top of the defaults
    pub fn to_coordinator_config(&self) -> CoordinatorConfig {
        let mut config = CoordinatorConfig::default();
        if let Some(provider) = self
            .global_provider
            .as_deref()
            .and_then(LlmProvider::from_slug)
        {
            config.global_provider = provider;
        }
        config.global_model = self.global_model.clone();
        config.base_url = self.base_url.clone();
        config.per_agent_providers = self
            .per_agent_providers
            .iter()
            .filter_map(|(agent, p)| Some((agent.clone(), LlmProvider::from_slug(p)?)))
            .collect();
        config.per_agent_models = self.per_agent_models.clone();
        config.per_agent_base_urls = self.per_agent_base_urls.clone();
        config.per_agent_temperatures = self.per_agent_temperatures.clone();
        if let Some(max_files) = self.max_files {
            config.fetch.max_files = max_files;
        }
        if let Some(max_file_bytes) = self.max_file_bytes {
            config.fetch.max_file_bytes = max_file_bytes;
        }
        if let Some(concurrency) = self.fetch_concurrency {
            config.fetch.fetch_concurrency = concurrency.max(1);
        }
        config
    }
}
