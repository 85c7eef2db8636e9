//! API request and response types

use crate::db::TranscriptSummary;
use crate::llm::Provider;
use crate::participants::ParticipantConfig;
use serde::{Deserialize, Serialize};

/// Request to start a conversation
#[derive(Debug, Default, Deserialize)]
pub struct StartRequest {
    #[serde(default)]
    pub topic: Option<String>,
    /// Speaking order; the full roster when absent
    #[serde(default)]
    pub participants: Option<Vec<String>>,
}

/// Human interjection
#[derive(Debug, Deserialize)]
pub struct MessageRequest {
    pub content: String,
}

/// Service banner returned at `/`
#[derive(Debug, Serialize)]
pub struct BannerResponse {
    pub message: &'static str,
    pub status: &'static str,
    pub version: &'static str,
}

#[derive(Debug, Serialize)]
pub struct HealthResponse {
    pub status: &'static str,
}

/// One entry of the participant roster
#[derive(Debug, Serialize)]
pub struct ParticipantInfo {
    pub name: String,
    pub provider: Provider,
    pub model: String,
    pub personality: String,
}

impl From<&ParticipantConfig> for ParticipantInfo {
    fn from(config: &ParticipantConfig) -> Self {
        Self {
            name: config.name.clone(),
            provider: config.provider,
            model: config.model.clone(),
            personality: config.personality.clone(),
        }
    }
}

#[derive(Debug, Serialize)]
pub struct ParticipantsResponse {
    pub participants: Vec<ParticipantInfo>,
}

#[derive(Debug, Serialize)]
pub struct TranscriptListResponse {
    pub transcripts: Vec<TranscriptSummary>,
}

/// Error body
#[derive(Debug, Serialize)]
pub struct ErrorResponse {
    pub error: String,
}

impl ErrorResponse {
    pub fn new(error: impl Into<String>) -> Self {
        Self {
            error: error.into(),
        }
    }
}
