//! Domain events emitted by the conversation loop

use serde::Serialize;

/// Ordered record of a state transition, before wire translation.
///
/// Serializes as `{"type": "<kind>", "data": {...}}` so the raw payload can be
/// forwarded verbatim for kinds the wire format has no dedicated shape for.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "type", content = "data", rename_all = "snake_case")]
pub enum DomainEvent {
    ConversationStart {
        topic: Option<String>,
        participants: Vec<String>,
    },
    ConversationStatus {
        active: bool,
        paused: bool,
        participants: Vec<String>,
        topic: Option<String>,
    },
    SpeakerScheduled {
        participant: String,
        turn: u32,
    },
    ConversationPaused {
        message: String,
    },
    ConversationResumed {
        message: String,
    },
    ConversationTimeout {
        message: String,
    },
    AiThinkingStart {
        participant: String,
        model: String,
    },
    AiResponseStart {
        participant: String,
    },
    AiResponseStream {
        participant: String,
        /// The new chunk
        content: String,
        /// Everything received so far this turn
        full_content: String,
    },
    AiResponseComplete {
        participant: String,
        content: String,
    },
    AiResponseError {
        participant: String,
        error: String,
        turn: u32,
    },
    HumanMessageAdded {
        content: String,
    },
    TurnComplete {
        turn: u32,
        total_messages: usize,
    },
    ConversationEnd {
        message: String,
        participants: Vec<String>,
        topic: Option<String>,
    },
}

impl DomainEvent {
    /// Snake-case kind name, as used in logs and the generic wire event
    pub fn kind(&self) -> &'static str {
        match self {
            DomainEvent::ConversationStart { .. } => "conversation_start",
            DomainEvent::ConversationStatus { .. } => "conversation_status",
            DomainEvent::SpeakerScheduled { .. } => "speaker_scheduled",
            DomainEvent::ConversationPaused { .. } => "conversation_paused",
            DomainEvent::ConversationResumed { .. } => "conversation_resumed",
            DomainEvent::ConversationTimeout { .. } => "conversation_timeout",
            DomainEvent::AiThinkingStart { .. } => "ai_thinking_start",
            DomainEvent::AiResponseStart { .. } => "ai_response_start",
            DomainEvent::AiResponseStream { .. } => "ai_response_stream",
            DomainEvent::AiResponseComplete { .. } => "ai_response_complete",
            DomainEvent::AiResponseError { .. } => "ai_response_error",
            DomainEvent::HumanMessageAdded { .. } => "human_message_added",
            DomainEvent::TurnComplete { .. } => "turn_complete",
            DomainEvent::ConversationEnd { .. } => "conversation_end",
        }
    }

    /// Participant the event concerns, if any
    pub fn participant(&self) -> Option<&str> {
        match self {
            DomainEvent::SpeakerScheduled { participant, .. }
            | DomainEvent::AiThinkingStart { participant, .. }
            | DomainEvent::AiResponseStart { participant }
            | DomainEvent::AiResponseStream { participant, .. }
            | DomainEvent::AiResponseComplete { participant, .. }
            | DomainEvent::AiResponseError { participant, .. } => Some(participant),
            _ => None,
        }
    }

    pub fn paused() -> Self {
        DomainEvent::ConversationPaused {
            message: "Conversation is paused - waiting for resume".to_string(),
        }
    }

    pub fn resumed() -> Self {
        DomainEvent::ConversationResumed {
            message: "Conversation resumed".to_string(),
        }
    }

    pub fn timed_out() -> Self {
        DomainEvent::ConversationTimeout {
            message: "Conversation auto-ended due to extended pause".to_string(),
        }
    }
}
