//! Agency configuration
//!
//! JSON file on disk, overridable from the environment (`.env` supported).

use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::path::PathBuf;
use std::str::FromStr;
use std::sync::Arc;
use tokio::fs;
use tracing::{debug, info};

use crate::agent::{AgentConfig, AgentKind, GenerationParams, LLMProvider, OllamaProvider, OpenAICompatibleProvider};
use crate::error::ConfigError;
use crate::ontology::LocalOntology;
use crate::safety::{EscalationTrigger, RiskEscalationEngine};

pub const ENV_PROVIDER: &str = "CLINICAL_AGENCY_PROVIDER";
pub const ENV_MODEL: &str = "CLINICAL_AGENCY_MODEL";
pub const ENV_PROVIDER_URL: &str = "CLINICAL_AGENCY_PROVIDER_URL";
pub const ENV_API_KEY: &str = "CLINICAL_AGENCY_API_KEY";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum ProviderKind {
    #[default]
    #[serde(rename = "ollama")]
    Ollama,
    #[serde(rename = "openai")]
    OpenAI,
}

impl FromStr for ProviderKind {
    type Err = ConfigError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "ollama" => Ok(ProviderKind::Ollama),
            "openai" | "openai-compatible" => Ok(ProviderKind::OpenAI),
            other => Err(ConfigError::UnknownProvider(other.to_string())),
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ProviderConfig {
    pub kind: ProviderKind,
    /// Server url; the provider default when unset
    pub url: Option<String>,
    pub api_key: Option<String>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct AgencyConfig {
    pub provider: ProviderConfig,
    /// Model for every agent; per-kind defaults when unset
    pub default_model: Option<String>,
    pub model_overrides: HashMap<AgentKind, String>,
    pub generation: GenerationParams,
    /// Ontology JSON file; the built-in table when unset
    pub ontology_path: Option<PathBuf>,
    /// Added to the built-in escalation table, never replacing it
    pub extra_triggers: Vec<EscalationTrigger>,
}

impl AgencyConfig {
    pub fn model_for(&self, kind: AgentKind) -> String {
        self.model_overrides
            .get(&kind)
            .or(self.default_model.as_ref())
            .cloned()
            .unwrap_or_else(|| kind.default_model().to_string())
    }

    pub fn agent_config(&self, kind: AgentKind) -> AgentConfig {
        AgentConfig::new(kind)
            .with_model(self.model_for(kind))
            .with_params(self.generation.clone())
    }

    /// Apply `CLINICAL_AGENCY_*` variables on top of the file values.
    pub fn apply_env(&mut self) -> Result<(), ConfigError> {
        self.apply_overrides(|key| std::env::var(key).ok())
    }

    fn apply_overrides(&mut self, var: impl Fn(&str) -> Option<String>) -> Result<(), ConfigError> {
        let non_empty = |key: &str| var(key).filter(|v| !v.trim().is_empty());

        if let Some(kind) = non_empty(ENV_PROVIDER) {
            self.provider.kind = kind.parse()?;
        }
        if let Some(model) = non_empty(ENV_MODEL) {
            self.default_model = Some(model);
        }
        if let Some(url) = non_empty(ENV_PROVIDER_URL) {
            self.provider.url = Some(url);
        }
        if let Some(key) = non_empty(ENV_API_KEY) {
            self.provider.api_key = Some(key);
        }
        Ok(())
    }

    pub fn build_provider(&self) -> anyhow::Result<Arc<dyn LLMProvider>> {
        let provider: Arc<dyn LLMProvider> = match self.provider.kind {
            ProviderKind::Ollama => match &self.provider.url {
                Some(url) => Arc::new(OllamaProvider::from_url(url)?),
                None => Arc::new(OllamaProvider::default()),
            },
            ProviderKind::OpenAI => {
                let url = self
                    .provider
                    .url
                    .clone()
                    .unwrap_or_else(|| "https://api.openai.com/v1".to_string());
                Arc::new(OpenAICompatibleProvider::new(url, self.provider.api_key.clone()))
            }
        };
        info!("Using {:?} provider", self.provider.kind);
        Ok(provider)
    }

    pub async fn load_ontology(&self) -> Result<LocalOntology, ConfigError> {
        match &self.ontology_path {
            Some(path) => {
                debug!("Loading ontology from {}", path.display());
                LocalOntology::load(path).await
            }
            None => Ok(LocalOntology::builtin()),
        }
    }

    pub fn escalation_engine(&self) -> RiskEscalationEngine {
        RiskEscalationEngine::with_extra_triggers(self.extra_triggers.iter().cloned())
    }
}

pub struct ConfigManager {
    path: PathBuf,
}

impl ConfigManager {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    /// Read the file, writing defaults first if it does not exist.
    pub async fn load(&self) -> Result<AgencyConfig, ConfigError> {
        if !self.path.exists() {
            let default = AgencyConfig::default();
            self.save(&default).await?;
            info!("Wrote default config to {}", self.path.display());
            return Ok(default);
        }
        let content = fs::read_to_string(&self.path).await.map_err(|source| ConfigError::Read {
            path: self.path.display().to_string(),
            source,
        })?;
        let config = serde_json::from_str(&content)?;
        Ok(config)
    }

    /// File values with environment overrides applied.
    pub async fn load_with_env(&self) -> Result<AgencyConfig, ConfigError> {
        let mut config = self.load().await?;
        config.apply_env()?;
        Ok(config)
    }

    pub async fn save(&self, config: &AgencyConfig) -> Result<(), ConfigError> {
        let content = serde_json::to_string_pretty(config)?;
        fs::write(&self.path, content).await.map_err(|source| ConfigError::Write {
            path: self.path.display().to_string(),
            source,
        })?;
        Ok(())
    }
}
