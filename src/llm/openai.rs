//! `OpenAI` chat completions provider implementation

use super::streaming;
use super::types::{LlmRequest, TextStream};
use super::{LlmError, LlmService};
use async_trait::async_trait;
use reqwest::Client;
use serde::{Deserialize, Serialize};

const CHAT_URL: &str = "https://api.openai.com/v1/chat/completions";

/// `OpenAI` service implementation
pub struct OpenAIService {
    client: Client,
    api_key: String,
    model: String,
    base_url: String,
}

impl OpenAIService {
    pub fn new(api_key: String, model: impl Into<String>) -> Result<Self, LlmError> {
        Ok(Self {
            client: streaming::http_client()?,
            api_key,
            model: model.into(),
            base_url: CHAT_URL.to_string(),
        })
    }

    fn translate_request(&self, request: &LlmRequest) -> OpenAIRequest {
        let mut messages = Vec::with_capacity(request.messages.len() + 1);
        if !request.system.is_empty() {
            messages.push(OpenAIMessage {
                role: "system",
                content: request.system.clone(),
            });
        }
        messages.extend(request.messages.iter().map(|m| OpenAIMessage {
            role: m.role.as_str(),
            content: m.text.clone(),
        }));

        OpenAIRequest {
            model: self.model.clone(),
            messages,
            max_tokens: request.max_tokens,
            temperature: request.temperature,
            stream: true,
        }
    }
}

/// Text carried by one completion chunk, if any
fn parse_chunk(data: &str) -> Result<Option<String>, LlmError> {
    let chunk: OpenAIChunk = match serde_json::from_str(data) {
        Ok(chunk) => chunk,
        Err(e) => {
            tracing::warn!(error = %e, "Skipping unparseable OpenAI stream chunk");
            return Ok(None);
        }
    };

    if let Some(error) = chunk.error {
        return Err(LlmError::stream(error.message));
    }

    Ok(chunk
        .choices
        .into_iter()
        .next()
        .and_then(|choice| choice.delta.content)
        .filter(|text| !text.is_empty()))
}

#[async_trait]
impl LlmService for OpenAIService {
    async fn stream(&self, request: &LlmRequest) -> Result<TextStream, LlmError> {
        let body = self.translate_request(request);

        let response = streaming::open(
            self.client
                .post(&self.base_url)
                .bearer_auth(&self.api_key)
                .header("content-type", "application/json")
                .json(&body),
        )
        .await?;

        Ok(streaming::text_stream(response, parse_chunk))
    }

    fn model_id(&self) -> &str {
        &self.model
    }
}

// OpenAI API types

#[derive(Debug, Serialize)]
struct OpenAIRequest {
    model: String,
    messages: Vec<OpenAIMessage>,
    max_tokens: u32,
    temperature: f32,
    stream: bool,
}

#[derive(Debug, Serialize)]
struct OpenAIMessage {
    role: &'static str,
    content: String,
}

#[derive(Debug, Deserialize)]
struct OpenAIChunk {
    #[serde(default)]
    choices: Vec<OpenAIChoice>,
    error: Option<OpenAIErrorBody>,
}

#[derive(Debug, Deserialize)]
struct OpenAIChoice {
    delta: OpenAIDelta,
}

#[derive(Debug, Deserialize)]
struct OpenAIDelta {
    content: Option<String>,
}

#[derive(Debug, Deserialize)]
struct OpenAIErrorBody {
    message: String,
}
