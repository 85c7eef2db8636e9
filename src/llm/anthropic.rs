//! Anthropic Claude provider implementation

use super::streaming;
use super::types::{LlmRequest, TextStream};
use super::{LlmError, LlmService};
use async_trait::async_trait;
use reqwest::Client;
use serde::{Deserialize, Serialize};

const MESSAGES_URL: &str = "https://api.anthropic.com/v1/messages";
const API_VERSION: &str = "2023-06-01";

/// Anthropic service implementation
pub struct AnthropicService {
    client: Client,
    api_key: String,
    model: String,
    base_url: String,
}

impl AnthropicService {
    pub fn new(api_key: String, model: impl Into<String>) -> Result<Self, LlmError> {
        Ok(Self {
            client: streaming::http_client()?,
            api_key,
            model: model.into(),
            base_url: MESSAGES_URL.to_string(),
        })
    }

    fn translate_request(&self, request: &LlmRequest) -> AnthropicRequest {
        let messages = request
            .messages
            .iter()
            .map(|m| AnthropicMessage {
                role: m.role.as_str(),
                content: m.text.clone(),
            })
            .collect();

        AnthropicRequest {
            model: self.model.clone(),
            max_tokens: request.max_tokens,
            temperature: request.temperature,
            system: (!request.system.is_empty()).then(|| request.system.clone()),
            messages,
            stream: true,
        }
    }
}

/// Text carried by one stream event, if any
fn parse_event(data: &str) -> Result<Option<String>, LlmError> {
    let event: AnthropicStreamEvent = match serde_json::from_str(data) {
        Ok(event) => event,
        Err(e) => {
            tracing::warn!(error = %e, "Skipping unparseable Anthropic stream event");
            return Ok(None);
        }
    };

    match event {
        AnthropicStreamEvent::ContentBlockDelta {
            delta: AnthropicDelta::TextDelta { text },
        } => Ok(Some(text)),
        AnthropicStreamEvent::Error { error } => Err(LlmError::stream(format!(
            "{}: {}",
            error.r#type, error.message
        ))),
        _ => Ok(None),
    }
}

#[async_trait]
impl LlmService for AnthropicService {
    async fn stream(&self, request: &LlmRequest) -> Result<TextStream, LlmError> {
        let body = self.translate_request(request);

        let response = streaming::open(
            self.client
                .post(&self.base_url)
                .header("x-api-key", &self.api_key)
                .header("anthropic-version", API_VERSION)
                .header("content-type", "application/json")
                .json(&body),
        )
        .await?;

        Ok(streaming::text_stream(response, parse_event))
    }

    fn model_id(&self) -> &str {
        &self.model
    }
}

// Anthropic API types

#[derive(Debug, Serialize)]
struct AnthropicRequest {
    model: String,
    max_tokens: u32,
    temperature: f32,
    #[serde(skip_serializing_if = "Option::is_none")]
    system: Option<String>,
    messages: Vec<AnthropicMessage>,
    stream: bool,
}

#[derive(Debug, Serialize)]
struct AnthropicMessage {
    role: &'static str,
    content: String,
}

#[derive(Debug, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
enum AnthropicStreamEvent {
    ContentBlockDelta {
        delta: AnthropicDelta,
    },
    Error {
        error: AnthropicErrorBody,
    },
    #[serde(other)]
    Other,
}

#[derive(Debug, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
enum AnthropicDelta {
    TextDelta {
        text: String,
    },
    #[serde(other)]
    Other,
}

#[derive(Debug, Deserialize)]
struct AnthropicErrorBody {
    r#type: String,
    message: String,
}
