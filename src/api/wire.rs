//! Translation of domain events into the streaming wire format
//!
//! Every wire event serializes as `{"type": "...", "data": {...}}`, one per
//! SSE message.

use crate::state_machine::DomainEvent;
use serde::Serialize;
use serde_json::Value;

/// Event as delivered to stream clients
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "type", content = "data")]
pub enum WireEvent {
    #[serde(rename = "conversation-start")]
    ConversationStart {
        topic: Option<String>,
        participants: Vec<String>,
    },
    #[serde(rename = "conversation_status")]
    ConversationStatus {
        active: bool,
        paused: bool,
        participants: Vec<String>,
        topic: Option<String>,
    },
    #[serde(rename = "speaker-change")]
    SpeakerChange { participant: String, turn: u32 },
    #[serde(rename = "thinking-start")]
    ThinkingStart { participant: String, model: String },
    #[serde(rename = "text-start")]
    TextStart { participant: String },
    #[serde(rename = "text-delta", rename_all = "camelCase")]
    TextDelta {
        text_delta: String,
        participant: String,
    },
    #[serde(rename = "text-done", rename_all = "camelCase")]
    TextDone {
        participant: String,
        content: String,
        finish_reason: &'static str,
    },
    #[serde(rename = "user-message")]
    UserMessage { content: String },
    #[serde(rename = "turn-complete", rename_all = "camelCase")]
    TurnComplete { turn: u32, total_messages: usize },
    #[serde(rename = "error")]
    Error { error: String, participant: String },
    #[serde(rename = "conversation-end")]
    ConversationEnd {
        message: String,
        participants: Vec<String>,
        topic: Option<String>,
    },
    /// Lifecycle notices without a dedicated shape; the domain payload rides
    /// along untouched
    #[serde(rename = "conversation-event", rename_all = "camelCase")]
    ConversationEvent {
        event_type: &'static str,
        participant: Option<String>,
        data: Value,
    },
}

impl WireEvent {
    /// The stream for a subscriber ends after this event
    pub fn is_terminal(&self) -> bool {
        matches!(self, WireEvent::ConversationEnd { .. })
    }

    pub fn kind(&self) -> &'static str {
        match self {
            WireEvent::ConversationStart { .. } => "conversation-start",
            WireEvent::ConversationStatus { .. } => "conversation_status",
            WireEvent::SpeakerChange { .. } => "speaker-change",
            WireEvent::ThinkingStart { .. } => "thinking-start",
            WireEvent::TextStart { .. } => "text-start",
            WireEvent::TextDelta { .. } => "text-delta",
            WireEvent::TextDone { .. } => "text-done",
            WireEvent::UserMessage { .. } => "user-message",
            WireEvent::TurnComplete { .. } => "turn-complete",
            WireEvent::Error { .. } => "error",
            WireEvent::ConversationEnd { .. } => "conversation-end",
            WireEvent::ConversationEvent { .. } => "conversation-event",
        }
    }
}

/// Per-subscriber translator.
///
/// Tracks who is speaking and the text of the reply in progress. Both are
/// conveniences for clients; the conversation state stays authoritative.
#[derive(Debug, Default)]
pub struct WireAdapter {
    speaker: Option<String>,
    buffer: String,
}

impl WireAdapter {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn current_speaker(&self) -> Option<&str> {
        self.speaker.as_deref()
    }

    /// Text streamed so far for the reply in progress
    pub fn buffered_text(&self) -> &str {
        &self.buffer
    }

    pub fn convert(&mut self, event: &DomainEvent) -> WireEvent {
        match event {
            DomainEvent::ConversationStart {
                topic,
                participants,
            } => WireEvent::ConversationStart {
                topic: topic.clone(),
                participants: participants.clone(),
            },
            DomainEvent::ConversationStatus {
                active,
                paused,
                participants,
                topic,
            } => WireEvent::ConversationStatus {
                active: *active,
                paused: *paused,
                participants: participants.clone(),
                topic: topic.clone(),
            },
            DomainEvent::SpeakerScheduled { participant, turn } => {
                self.speaker = Some(participant.clone());
                WireEvent::SpeakerChange {
                    participant: participant.clone(),
                    turn: *turn,
                }
            }
            DomainEvent::AiThinkingStart { participant, model } => WireEvent::ThinkingStart {
                participant: participant.clone(),
                model: model.clone(),
            },
            DomainEvent::AiResponseStart { participant } => {
                self.buffer.clear();
                WireEvent::TextStart {
                    participant: participant.clone(),
                }
            }
            DomainEvent::AiResponseStream {
                participant,
                content,
                ..
            } => {
                self.buffer.push_str(content);
                WireEvent::TextDelta {
                    text_delta: content.clone(),
                    participant: participant.clone(),
                }
            }
            DomainEvent::AiResponseComplete {
                participant,
                content,
            } => {
                self.buffer.clear();
                WireEvent::TextDone {
                    participant: participant.clone(),
                    content: content.clone(),
                    finish_reason: "stop",
                }
            }
            DomainEvent::HumanMessageAdded { content } => WireEvent::UserMessage {
                content: content.clone(),
            },
            DomainEvent::TurnComplete {
                turn,
                total_messages,
            } => WireEvent::TurnComplete {
                turn: *turn,
                total_messages: *total_messages,
            },
            DomainEvent::AiResponseError {
                participant, error, ..
            } => {
                self.buffer.clear();
                WireEvent::Error {
                    error: error.clone(),
                    participant: participant.clone(),
                }
            }
            DomainEvent::ConversationEnd {
                message,
                participants,
                topic,
            } => {
                self.speaker = None;
                WireEvent::ConversationEnd {
                    message: message.clone(),
                    participants: participants.clone(),
                    topic: topic.clone(),
                }
            }
            DomainEvent::ConversationPaused { .. }
            | DomainEvent::ConversationResumed { .. }
            | DomainEvent::ConversationTimeout { .. } => WireEvent::ConversationEvent {
                event_type: event.kind(),
                participant: None,
                data: raw_payload(event),
            },
        }
    }
}

/// The `data` half of the domain event's own serialization
fn raw_payload(event: &DomainEvent) -> Value {
    match serde_json::to_value(event) {
        Ok(Value::Object(mut map)) => map.remove("data").unwrap_or(Value::Null),
        _ => Value::Null,
    }
}
