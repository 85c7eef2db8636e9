//! Provider definitions
//!
//! Participants name a provider and a free-form model string; this module maps
//! the provider to its service constructor and credentials.

use super::{AnthropicService, GeminiService, LlmError, LlmService, OpenAIService};
use serde::{Deserialize, Serialize};
use std::sync::Arc;

/// LLM provider enumeration
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Provider {
    OpenAI,
    Anthropic,
    Gemini,
}

impl Provider {
    /// Get the display name for this provider
    pub fn display_name(self) -> &'static str {
        match self {
            Provider::OpenAI => "OpenAI",
            Provider::Anthropic => "Anthropic",
            Provider::Gemini => "Gemini",
        }
    }

    /// Get the environment variable name for this provider's API key
    pub fn api_key_env_var(self) -> &'static str {
        match self {
            Provider::OpenAI => "OPENAI_API_KEY",
            Provider::Anthropic => "ANTHROPIC_API_KEY",
            Provider::Gemini => "GOOGLE_API_KEY",
        }
    }

    /// Build a service for `model` on this provider
    pub fn create(self, api_key: String, model: &str) -> Result<Arc<dyn LlmService>, LlmError> {
        Ok(match self {
            Provider::OpenAI => Arc::new(OpenAIService::new(api_key, model)?),
            Provider::Anthropic => Arc::new(AnthropicService::new(api_key, model)?),
            Provider::Gemini => Arc::new(GeminiService::new(api_key, model)?),
        })
    }
}
