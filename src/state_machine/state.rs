//! Conversation state types

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::time::Duration;

/// Author tag used for human interjections
pub const HUMAN: &str = "Human";

/// Default hard cap on completed turns
pub const DEFAULT_MAX_TURNS: u32 = 15;

/// Default ceiling on how long a paused conversation may wait
pub const DEFAULT_PAUSE_TIMEOUT: Duration = Duration::from_secs(300);

// ============================================================================
// Messages
// ============================================================================

/// Who produced a message
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MessageRole {
    Human,
    Participant,
}

impl MessageRole {
    pub fn as_str(self) -> &'static str {
        match self {
            MessageRole::Human => "human",
            MessageRole::Participant => "participant",
        }
    }

    pub fn parse(value: &str) -> Option<Self> {
        match value {
            "human" => Some(MessageRole::Human),
            "participant" => Some(MessageRole::Participant),
            _ => None,
        }
    }
}

/// One entry in the conversation transcript
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Message {
    pub role: MessageRole,
    /// Speaker name; `Human` for human input
    pub participant: String,
    pub content: String,
    /// Placeholder produced because generation failed
    #[serde(default)]
    pub is_error: bool,
    pub created_at: DateTime<Utc>,
}

impl Message {
    pub fn human(content: impl Into<String>) -> Self {
        Self {
            role: MessageRole::Human,
            participant: HUMAN.to_string(),
            content: content.into(),
            is_error: false,
            created_at: Utc::now(),
        }
    }

    pub fn reply(participant: impl Into<String>, content: impl Into<String>) -> Self {
        Self {
            role: MessageRole::Participant,
            participant: participant.into(),
            content: content.into(),
            is_error: false,
            created_at: Utc::now(),
        }
    }

    /// Stand-in reply that keeps the conversation moving after a failed turn
    pub fn error_placeholder(participant: &str) -> Self {
        Self {
            role: MessageRole::Participant,
            participant: participant.to_string(),
            content: format!("[{participant} encountered an error and cannot respond at this time]"),
            is_error: true,
            created_at: Utc::now(),
        }
    }
}

// ============================================================================
// Conversation State
// ============================================================================

/// Lifecycle phase of the turn loop
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Phase {
    Scheduling,
    PauseCheck,
    Generating,
    PostProcess,
    EndTurn,
    Ended,
}

/// Limits applied to every conversation
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ConversationLimits {
    pub max_turns: u32,
    pub pause_timeout: Duration,
}

impl Default for ConversationLimits {
    fn default() -> Self {
        Self {
            max_turns: DEFAULT_MAX_TURNS,
            pause_timeout: DEFAULT_PAUSE_TIMEOUT,
        }
    }
}

/// Mutable state of the one live conversation
#[derive(Debug, Clone, Serialize)]
pub struct ConversationState {
    pub messages: Vec<Message>,
    pub participants: Vec<String>,
    pub current_speaker: Option<String>,
    pub turn_count: u32,
    pub conversation_active: bool,
    pub conversation_paused: bool,
    pub round_robin_pointer: usize,
    pub preferred_next_speaker: Option<String>,
    pub preferred_bias_remaining: u32,
    pub topic: Option<String>,
    pub started_at: DateTime<Utc>,
    /// Set once, when `conversation_end` has been emitted
    pub ended_at: Option<DateTime<Utc>>,
}

impl ConversationState {
    /// Fresh state for a new conversation. The topic, when present, seeds the
    /// transcript with an opening human prompt.
    pub fn new(participants: Vec<String>, topic: Option<String>) -> Self {
        let messages = topic
            .as_deref()
            .map(|t| vec![Message::human(format!("Let's discuss: {t}"))])
            .unwrap_or_default();

        Self {
            messages,
            participants,
            current_speaker: None,
            turn_count: 0,
            conversation_active: true,
            conversation_paused: false,
            round_robin_pointer: 0,
            preferred_next_speaker: None,
            preferred_bias_remaining: 0,
            topic,
            started_at: Utc::now(),
            ended_at: None,
        }
    }

    /// Whether `conversation_end` has already gone out
    pub fn is_finalized(&self) -> bool {
        self.ended_at.is_some()
    }

    /// Record a one-turn preference for the next speaker
    pub fn set_preference(&mut self, speaker: String) {
        self.preferred_next_speaker = Some(speaker);
        self.preferred_bias_remaining = 1;
    }

    pub fn snapshot(&self) -> StatusSnapshot {
        StatusSnapshot {
            active: self.conversation_active,
            paused: self.conversation_paused,
            participants: self.participants.clone(),
            topic: self.topic.clone(),
            turn_count: self.turn_count,
            current_speaker: self.current_speaker.clone(),
            total_messages: self.messages.len(),
        }
    }
}

/// Point-in-time view of a conversation, safe to hand outside the lock
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct StatusSnapshot {
    pub active: bool,
    pub paused: bool,
    pub participants: Vec<String>,
    pub topic: Option<String>,
    pub turn_count: u32,
    pub current_speaker: Option<String>,
    pub total_messages: usize,
}

impl StatusSnapshot {
    /// Status reported when no conversation exists
    pub fn idle() -> Self {
        Self {
            active: false,
            paused: false,
            participants: Vec::new(),
            topic: None,
            turn_count: 0,
            current_speaker: None,
            total_messages: 0,
        }
    }
}
