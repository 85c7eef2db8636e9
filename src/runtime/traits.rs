//! Trait abstractions for runtime I/O
//!
//! These traits enable testing the executor with mock implementations.

use crate::db::Database;
use crate::llm::{LlmError, LlmMessage, LlmRequest, MessageRole, ModelRegistry, TextStream};
use crate::participants::{ParticipantRegistry, RegistryError};
use crate::state_machine::state::HUMAN;
use crate::state_machine::{ConversationState, Message, MessageRole as Author};
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::Serialize;
use std::sync::Arc;
use thiserror::Error;

/// Why a participant could not produce a reply
#[derive(Debug, Error)]
pub enum GenerationError {
    #[error(transparent)]
    Registry(#[from] RegistryError),
    #[error(transparent)]
    Llm(#[from] LlmError),
}

/// Everything a generator needs to produce one participant's reply
#[derive(Debug, Clone)]
pub struct ReplyRequest {
    pub participant: String,
    pub topic: Option<String>,
    /// Transcript so far, oldest first
    pub history: Vec<Message>,
}

/// Finished conversation handed to the archive
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct TranscriptRecord {
    pub topic: Option<String>,
    pub participants: Vec<String>,
    pub messages: Vec<Message>,
    pub started_at: DateTime<Utc>,
    pub ended_at: DateTime<Utc>,
}

impl TranscriptRecord {
    pub fn from_state(state: &ConversationState) -> Self {
        Self {
            topic: state.topic.clone(),
            participants: state.participants.clone(),
            messages: state.messages.clone(),
            started_at: state.started_at,
            ended_at: state.ended_at.unwrap_or_else(Utc::now),
        }
    }
}

/// Produces participant replies
#[async_trait]
pub trait ReplyGenerator: Send + Sync {
    /// Model identifier announced in `ai_thinking_start`
    fn model_for(&self, participant: &str) -> Result<String, GenerationError>;

    /// Open a reply stream for the requested participant
    async fn stream_reply(&self, request: &ReplyRequest) -> Result<TextStream, GenerationError>;
}

/// Archive for finished conversations
#[async_trait]
pub trait TranscriptSink: Send + Sync {
    /// Store the transcript, returning its id
    async fn archive(&self, record: &TranscriptRecord) -> Result<String, String>;
}

// ============================================================================
// Arc implementations for trait objects
// ============================================================================

#[async_trait]
impl<T: ReplyGenerator + ?Sized> ReplyGenerator for Arc<T> {
    fn model_for(&self, participant: &str) -> Result<String, GenerationError> {
        (**self).model_for(participant)
    }

    async fn stream_reply(&self, request: &ReplyRequest) -> Result<TextStream, GenerationError> {
        (**self).stream_reply(request).await
    }
}

#[async_trait]
impl<T: TranscriptSink + ?Sized> TranscriptSink for Arc<T> {
    async fn archive(&self, record: &TranscriptRecord) -> Result<String, String> {
        (**self).archive(record).await
    }
}

// ============================================================================
// Production Adapters
// ============================================================================

/// Adapter generating replies through the configured LLM providers
pub struct RegistryGenerator {
    participants: Arc<ParticipantRegistry>,
    models: Arc<ModelRegistry>,
}

impl RegistryGenerator {
    pub fn new(participants: Arc<ParticipantRegistry>, models: Arc<ModelRegistry>) -> Self {
        Self {
            participants,
            models,
        }
    }
}

#[async_trait]
impl ReplyGenerator for RegistryGenerator {
    fn model_for(&self, participant: &str) -> Result<String, GenerationError> {
        Ok(self.participants.get(participant)?.model.clone())
    }

    async fn stream_reply(&self, request: &ReplyRequest) -> Result<TextStream, GenerationError> {
        let config = self.participants.get(&request.participant)?;
        let service = self.models.get(config.provider, &config.model)?;

        let llm_request = LlmRequest {
            system: config.system_prompt.clone(),
            messages: render_history(
                &request.history,
                &request.participant,
                request.topic.as_deref(),
            ),
            max_tokens: config.max_tokens,
            temperature: config.temperature,
        };

        Ok(service.stream(&llm_request).await?)
    }
}

/// Render the shared transcript from one speaker's point of view.
///
/// The speaker's own turns become assistant turns; everyone else's become
/// user turns prefixed with the author's name. Consecutive same-role turns
/// are merged so providers that require alternation accept the history.
/// Error placeholders are left out.
pub fn render_history(history: &[Message], speaker: &str, topic: Option<&str>) -> Vec<LlmMessage> {
    let mut rendered: Vec<LlmMessage> = Vec::new();

    let mut push = |role: MessageRole, text: String| match rendered.last_mut() {
        Some(last) if last.role == role => {
            last.text.push_str("\n\n");
            last.text.push_str(&text);
        }
        _ => rendered.push(LlmMessage { role, text }),
    };

    for message in history.iter().filter(|m| !m.is_error) {
        match message.role {
            Author::Participant if message.participant == speaker => {
                push(MessageRole::Assistant, message.content.clone());
            }
            Author::Participant => {
                push(
                    MessageRole::User,
                    format!("{}: {}", message.participant, message.content),
                );
            }
            Author::Human => {
                push(MessageRole::User, format!("{HUMAN}: {}", message.content));
            }
        }
    }

    if let Some(topic) = topic.filter(|_| history.len() < 2) {
        push(MessageRole::User, format!("Topic for discussion: {topic}"));
    }

    if rendered.first().map_or(true, |m| m.role == MessageRole::Assistant) {
        rendered.insert(0, LlmMessage::user("Please share your perspective."));
    }

    rendered
}

/// Adapter archiving transcripts into the database
#[derive(Clone)]
pub struct DatabaseTranscripts {
    db: Database,
}

impl DatabaseTranscripts {
    pub fn new(db: Database) -> Self {
        Self { db }
    }
}

#[async_trait]
impl TranscriptSink for DatabaseTranscripts {
    async fn archive(&self, record: &TranscriptRecord) -> Result<String, String> {
        let db = self.db.clone();
        let record = record.clone();
        tokio::task::spawn_blocking(move || db.save_transcript(&record))
            .await
            .map_err(|e| format!("Archive task failed: {e}"))?
            .map_err(|e| e.to_string())
    }
}
