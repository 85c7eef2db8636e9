//! Google Gemini provider implementation

use super::streaming;
use super::types::{LlmRequest, MessageRole, TextStream};
use super::{LlmError, LlmService};
use async_trait::async_trait;
use reqwest::Client;
use serde::{Deserialize, Serialize};

const API_BASE: &str = "https://generativelanguage.googleapis.com/v1beta/models";

/// Gemini service implementation
pub struct GeminiService {
    client: Client,
    api_key: String,
    model: String,
    base_url: String,
}

impl GeminiService {
    pub fn new(api_key: String, model: impl Into<String>) -> Result<Self, LlmError> {
        let model = model.into();
        Ok(Self {
            client: streaming::http_client()?,
            api_key,
            base_url: format!("{API_BASE}/{model}:streamGenerateContent?alt=sse"),
            model,
        })
    }

    fn translate_request(request: &LlmRequest) -> GeminiRequest {
        let system_instruction = (!request.system.is_empty()).then(|| GeminiContent {
            role: None,
            parts: vec![GeminiPart {
                text: request.system.clone(),
            }],
        });

        let contents = request
            .messages
            .iter()
            .map(|m| GeminiContent {
                role: Some(match m.role {
                    MessageRole::User => "user",
                    MessageRole::Assistant => "model",
                }),
                parts: vec![GeminiPart { text: m.text.clone() }],
            })
            .collect();

        GeminiRequest {
            system_instruction,
            contents,
            generation_config: GeminiGenerationConfig {
                temperature: request.temperature,
                max_output_tokens: request.max_tokens,
            },
        }
    }
}

/// Text carried by one streamed candidate chunk, if any
fn parse_chunk(data: &str) -> Result<Option<String>, LlmError> {
    let chunk: GeminiChunk = match serde_json::from_str(data) {
        Ok(chunk) => chunk,
        Err(e) => {
            tracing::warn!(error = %e, "Skipping unparseable Gemini stream chunk");
            return Ok(None);
        }
    };

    if let Some(error) = chunk.error {
        return Err(LlmError::stream(error.message));
    }

    let text: String = chunk
        .candidates
        .into_iter()
        .next()
        .and_then(|c| c.content)
        .map(|content| content.parts.into_iter().filter_map(|p| p.text).collect())
        .unwrap_or_default();

    Ok((!text.is_empty()).then_some(text))
}

#[async_trait]
impl LlmService for GeminiService {
    async fn stream(&self, request: &LlmRequest) -> Result<TextStream, LlmError> {
        let body = Self::translate_request(request);

        let response = streaming::open(
            self.client
                .post(&self.base_url)
                .header("x-goog-api-key", &self.api_key)
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

// Gemini API types

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct GeminiRequest {
    #[serde(skip_serializing_if = "Option::is_none")]
    system_instruction: Option<GeminiContent>,
    contents: Vec<GeminiContent>,
    generation_config: GeminiGenerationConfig,
}

#[derive(Debug, Serialize)]
struct GeminiContent {
    #[serde(skip_serializing_if = "Option::is_none")]
    role: Option<&'static str>,
    parts: Vec<GeminiPart>,
}

#[derive(Debug, Serialize)]
struct GeminiPart {
    text: String,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct GeminiGenerationConfig {
    temperature: f32,
    max_output_tokens: u32,
}

#[derive(Debug, Deserialize)]
struct GeminiChunk {
    #[serde(default)]
    candidates: Vec<GeminiCandidate>,
    error: Option<GeminiErrorBody>,
}

#[derive(Debug, Deserialize)]
struct GeminiCandidate {
    content: Option<GeminiCandidateContent>,
}

#[derive(Debug, Deserialize)]
struct GeminiCandidateContent {
    #[serde(default)]
    parts: Vec<GeminiCandidatePart>,
}

#[derive(Debug, Deserialize)]
struct GeminiCandidatePart {
    text: Option<String>,
}

#[derive(Debug, Deserialize)]
struct GeminiErrorBody {
    message: String,
}
