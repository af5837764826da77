//! Inference Module
//!
//! Client side of the remote natural-language inference service.

mod provider;

pub use provider::{
    InferenceOptions, InferenceProvider, InferenceRequest, InferenceResponse, OllamaProvider,
    OpenAICompatibleProvider,
};

use serde::{Deserialize, Serialize};
use std::sync::Arc;
use std::time::Duration;
use tracing::info;

use crate::error::InferenceError;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ProviderKind {
    #[default]
    Ollama,
    OpenAI,
    /// No service bound; every rule degrades to NO_ACTION
    None,
}

fn default_base_url() -> String {
    "http://localhost:11434".to_string()
}

fn default_timeout_secs() -> u64 {
    30
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct InferenceConfig {
    pub provider: ProviderKind,
    #[serde(default = "default_base_url")]
    pub base_url: String,
    pub api_key: Option<String>,
    #[serde(flatten)]
    pub options: InferenceOptions,
    #[serde(default = "default_timeout_secs")]
    pub timeout_secs: u64,
}

impl Default for InferenceConfig {
    fn default() -> Self {
        Self {
            provider: ProviderKind::default(),
            base_url: default_base_url(),
            api_key: None,
            options: InferenceOptions::default(),
            timeout_secs: default_timeout_secs(),
        }
    }
}

impl InferenceConfig {
    pub fn timeout(&self) -> Duration {
        Duration::from_secs(self.timeout_secs)
    }

    /// `Ok(None)` when the provider is `none`
    pub fn build_provider(&self) -> Result<Option<Arc<dyn InferenceProvider>>, InferenceError> {
        let provider: Arc<dyn InferenceProvider> = match self.provider {
            ProviderKind::None => return Ok(None),
            ProviderKind::Ollama => Arc::new(OllamaProvider::new(self.base_url.clone(), self.timeout())?),
            ProviderKind::OpenAI => Arc::new(OpenAICompatibleProvider::new(
                self.base_url.clone(),
                self.api_key.clone(),
                self.timeout(),
            )?),
        };
        info!(
            "Inference provider '{}' at {} (model {})",
            provider.name(),
            self.base_url,
            self.options.model
        );
        Ok(Some(provider))
    }
}
