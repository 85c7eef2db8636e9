//! Model registry for managing available LLM providers

use super::{LlmError, LlmService, LoggingService, Provider};
use std::collections::HashMap;
use std::sync::{Arc, Mutex, PoisonError};

/// Configuration for LLM providers
#[derive(Debug, Clone, Default)]
pub struct LlmConfig {
    pub openai_api_key: Option<String>,
    pub anthropic_api_key: Option<String>,
    pub google_api_key: Option<String>,
}

impl LlmConfig {
    pub fn from_env() -> Self {
        let read = |provider: Provider| {
            std::env::var(provider.api_key_env_var())
                .ok()
                .filter(|key| !key.trim().is_empty())
        };

        Self {
            openai_api_key: read(Provider::OpenAI),
            anthropic_api_key: read(Provider::Anthropic),
            google_api_key: read(Provider::Gemini),
        }
    }

    pub fn api_key(&self, provider: Provider) -> Option<&str> {
        match provider {
            Provider::OpenAI => self.openai_api_key.as_deref(),
            Provider::Anthropic => self.anthropic_api_key.as_deref(),
            Provider::Gemini => self.google_api_key.as_deref(),
        }
    }

    /// Providers with a key configured
    pub fn configured_providers(&self) -> Vec<Provider> {
        [Provider::OpenAI, Provider::Anthropic, Provider::Gemini]
            .into_iter()
            .filter(|p| self.api_key(*p).is_some())
            .collect()
    }
}

/// Registry of LLM services, created on first use per provider and model
pub struct ModelRegistry {
    config: LlmConfig,
    services: Mutex<HashMap<(Provider, String), Arc<dyn LlmService>>>,
}

impl ModelRegistry {
    pub fn new(config: LlmConfig) -> Self {
        Self {
            config,
            services: Mutex::new(HashMap::new()),
        }
    }

    /// Service for `model` on `provider`, wrapped with request logging
    pub fn get(&self, provider: Provider, model: &str) -> Result<Arc<dyn LlmService>, LlmError> {
        let key = (provider, model.to_string());
        let mut services = self.services.lock().unwrap_or_else(PoisonError::into_inner);

        if let Some(service) = services.get(&key) {
            return Ok(service.clone());
        }

        let api_key = self.config.api_key(provider).ok_or_else(|| {
            LlmError::auth(format!(
                "{} is not set; cannot reach {}",
                provider.api_key_env_var(),
                provider.display_name()
            ))
        })?;

        let service: Arc<dyn LlmService> =
            Arc::new(LoggingService::new(provider.create(api_key.to_string(), model)?));
        services.insert(key, service.clone());
        Ok(service)
    }

    pub fn config(&self) -> &LlmConfig {
        &self.config
    }
}
