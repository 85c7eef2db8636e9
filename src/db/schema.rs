//! Database schema and types

use crate::state_machine::Message;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// SQL schema for initialization
pub const SCHEMA: &str = r"
CREATE TABLE IF NOT EXISTS transcripts (
    id TEXT PRIMARY KEY,
    topic TEXT,
    participants_json TEXT NOT NULL,
    started_at TEXT NOT NULL,
    created_at TEXT NOT NULL
);

CREATE INDEX IF NOT EXISTS idx_transcripts_created ON transcripts(created_at DESC);

CREATE TABLE IF NOT EXISTS transcript_messages (
    transcript_id TEXT NOT NULL,
    seq INTEGER NOT NULL,
    role TEXT NOT NULL,
    participant TEXT NOT NULL,
    content TEXT NOT NULL,
    is_error BOOLEAN NOT NULL DEFAULT 0,
    created_at TEXT NOT NULL,

    PRIMARY KEY (transcript_id, seq),
    FOREIGN KEY (transcript_id) REFERENCES transcripts(id) ON DELETE CASCADE
);
";

/// Archived conversation, without its messages
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TranscriptSummary {
    pub id: String,
    pub topic: Option<String>,
    pub participants: Vec<String>,
    pub started_at: DateTime<Utc>,
    /// When the conversation ended and was archived
    pub created_at: DateTime<Utc>,
    pub message_count: usize,
}

/// Archived conversation with its full transcript
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Transcript {
    #[serde(flatten)]
    pub summary: TranscriptSummary,
    pub messages: Vec<Message>,
}

/// Transcript id derived from the moment the conversation ended
pub fn transcript_id(ended_at: DateTime<Utc>) -> String {
    format!("conversation-{}", ended_at.format("%Y%m%dT%H%M%SZ"))
}
