//! Transcript archive
//!
//! Finished conversations are written to SQLite and can be listed and read
//! back through the API.

mod schema;

pub use schema::*;

use crate::runtime::TranscriptRecord;
use crate::state_machine::{Message, MessageRole};
use chrono::{DateTime, Utc};
use rusqlite::{params, Connection, OptionalExtension, Transaction};
use std::path::Path;
use std::sync::{Arc, Mutex};
use thiserror::Error;

#[derive(Error, Debug)]
pub enum DbError {
    #[error("Database error: {0}")]
    Sqlite(#[from] rusqlite::Error),
    #[error("Transcript not found: {0}")]
    TranscriptNotFound(String),
    #[error("Corrupt transcript {id}: {reason}")]
    Corrupt { id: String, reason: String },
    #[error("Failed to create database directory: {0}")]
    Io(#[from] std::io::Error),
}

pub type DbResult<T> = Result<T, DbError>;

/// Thread-safe database handle
#[derive(Clone)]
pub struct Database {
    conn: Arc<Mutex<Connection>>,
}

impl Database {
    /// Open or create database at the given path
    pub fn open<P: AsRef<Path>>(path: P) -> DbResult<Self> {
        if let Some(parent) = path.as_ref().parent().filter(|p| !p.as_os_str().is_empty()) {
            std::fs::create_dir_all(parent)?;
        }
        Self::init(Connection::open(path)?)
    }

    /// Open an in-memory database (for testing)
    #[allow(dead_code)] // Used in tests
    pub fn open_in_memory() -> DbResult<Self> {
        Self::init(Connection::open_in_memory()?)
    }

    fn init(conn: Connection) -> DbResult<Self> {
        conn.execute_batch("PRAGMA foreign_keys = ON;")?;
        conn.execute_batch(SCHEMA)?;
        Ok(Self {
            conn: Arc::new(Mutex::new(conn)),
        })
    }

    // ==================== Transcript Operations ====================

    /// Archive a finished conversation, returning its id.
    ///
    /// Ids come from the end time; a second transcript ending in the same
    /// second gets a `-2`, `-3`, ... suffix.
    pub fn save_transcript(&self, record: &TranscriptRecord) -> DbResult<String> {
        let mut conn = self.conn.lock().unwrap();
        let tx = conn.transaction()?;

        let id = unused_id(&tx, &transcript_id(record.ended_at))?;
        let participants = serde_json::to_string(&record.participants).map_err(|e| {
            DbError::Corrupt {
                id: id.clone(),
                reason: e.to_string(),
            }
        })?;

        tx.execute(
            "INSERT INTO transcripts (id, topic, participants_json, started_at, created_at)
             VALUES (?1, ?2, ?3, ?4, ?5)",
            params![
                id,
                record.topic,
                participants,
                record.started_at.to_rfc3339(),
                record.ended_at.to_rfc3339()
            ],
        )?;

        {
            let mut stmt = tx.prepare(
                "INSERT INTO transcript_messages
                    (transcript_id, seq, role, participant, content, is_error, created_at)
                 VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7)",
            )?;
            for (seq, message) in record.messages.iter().enumerate() {
                stmt.execute(params![
                    id,
                    seq,
                    message.role.as_str(),
                    message.participant,
                    message.content,
                    message.is_error,
                    message.created_at.to_rfc3339()
                ])?;
            }
        }

        tx.commit()?;
        Ok(id)
    }

    /// Archived transcripts, newest first
    pub fn list_transcripts(&self) -> DbResult<Vec<TranscriptSummary>> {
        let conn = self.conn.lock().unwrap();
        let mut stmt = conn.prepare(
            "SELECT t.id, t.topic, t.participants_json, t.started_at, t.created_at,
                    (SELECT COUNT(*) FROM transcript_messages m WHERE m.transcript_id = t.id)
             FROM transcripts t
             ORDER BY t.created_at DESC, t.id DESC",
        )?;

        let summaries = stmt
            .query_map([], summary_row)?
            .map(|row| row?.into_summary())
            .collect::<DbResult<Vec<_>>>()?;
        Ok(summaries)
    }

    /// One archived transcript with its messages
    pub fn get_transcript(&self, id: &str) -> DbResult<Transcript> {
        let conn = self.conn.lock().unwrap();
        let summary = conn
            .query_row(
                "SELECT t.id, t.topic, t.participants_json, t.started_at, t.created_at,
                        (SELECT COUNT(*) FROM transcript_messages m WHERE m.transcript_id = t.id)
                 FROM transcripts t WHERE t.id = ?1",
                params![id],
                summary_row,
            )
            .optional()?
            .ok_or_else(|| DbError::TranscriptNotFound(id.to_string()))?
            .into_summary()?;

        let mut stmt = conn.prepare(
            "SELECT role, participant, content, is_error, created_at
             FROM transcript_messages WHERE transcript_id = ?1 ORDER BY seq",
        )?;
        let messages = stmt
            .query_map(params![id], |row| {
                Ok((
                    row.get::<_, String>(0)?,
                    Message {
                        role: MessageRole::Participant,
                        participant: row.get(1)?,
                        content: row.get(2)?,
                        is_error: row.get(3)?,
                        created_at: parse_datetime(&row.get::<_, String>(4)?),
                    },
                ))
            })?
            .map(|row| {
                let (role, mut message) = row?;
                message.role = MessageRole::parse(&role).ok_or_else(|| DbError::Corrupt {
                    id: id.to_string(),
                    reason: format!("unknown role {role:?}"),
                })?;
                Ok(message)
            })
            .collect::<DbResult<Vec<_>>>()?;

        Ok(Transcript { summary, messages })
    }
}

/// Summary columns before the participant list is decoded
struct SummaryRow {
    id: String,
    topic: Option<String>,
    participants_json: String,
    started_at: String,
    created_at: String,
    message_count: usize,
}

impl SummaryRow {
    fn into_summary(self) -> DbResult<TranscriptSummary> {
        let participants =
            serde_json::from_str(&self.participants_json).map_err(|e| DbError::Corrupt {
                id: self.id.clone(),
                reason: e.to_string(),
            })?;
        Ok(TranscriptSummary {
            id: self.id,
            topic: self.topic,
            participants,
            started_at: parse_datetime(&self.started_at),
            created_at: parse_datetime(&self.created_at),
            message_count: self.message_count,
        })
    }
}

fn summary_row(row: &rusqlite::Row<'_>) -> rusqlite::Result<SummaryRow> {
    Ok(SummaryRow {
        id: row.get(0)?,
        topic: row.get(1)?,
        participants_json: row.get(2)?,
        started_at: row.get(3)?,
        created_at: row.get(4)?,
        message_count: row.get(5)?,
    })
}

/// First of `base`, `base-2`, `base-3`, ... not yet taken
fn unused_id(tx: &Transaction<'_>, base: &str) -> DbResult<String> {
    let taken = |id: &str| -> rusqlite::Result<bool> {
        tx.query_row("SELECT 1 FROM transcripts WHERE id = ?1", params![id], |_| Ok(()))
            .optional()
            .map(|row| row.is_some())
    };

    if !taken(base)? {
        return Ok(base.to_string());
    }
    let mut n = 2;
    loop {
        let candidate = format!("{base}-{n}");
        if !taken(&candidate)? {
            return Ok(candidate);
        }
        n += 1;
    }
}

fn parse_datetime(s: &str) -> DateTime<Utc> {
    DateTime::parse_from_rfc3339(s).map_or_else(|_| Utc::now(), |dt| dt.with_timezone(&Utc))
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{Duration, TimeZone};

    fn record(ended_at: DateTime<Utc>) -> TranscriptRecord {
        TranscriptRecord {
            topic: Some("tea".to_string()),
            participants: vec!["Alice".to_string(), "Bob".to_string()],
            messages: vec![
                Message::human("Let's discuss: tea"),
                Message::reply("Alice", "@Bob green or black?"),
                Message::error_placeholder("Bob"),
            ],
            started_at: ended_at - Duration::minutes(3),
            ended_at,
        }
    }

    #[test]
    fn test_save_and_get_transcript() {
        let db = Database::open_in_memory().unwrap();
        let at = Utc.with_ymd_and_hms(2025, 1, 2, 3, 4, 5).unwrap();

        let id = db.save_transcript(&record(at)).unwrap();
        assert_eq!(id, "conversation-20250102T030405Z");

        let transcript = db.get_transcript(&id).unwrap();
        assert_eq!(transcript.summary.topic.as_deref(), Some("tea"));
        assert_eq!(transcript.summary.participants, vec!["Alice", "Bob"]);
        assert_eq!(transcript.summary.created_at, at);
        assert_eq!(transcript.summary.message_count, 3);

        let original = record(at).messages;
        assert_eq!(transcript.messages.len(), 3);
        assert_eq!(transcript.messages[0].role, MessageRole::Human);
        assert_eq!(transcript.messages[1].content, original[1].content);
        assert!(transcript.messages[2].is_error);
        assert_eq!(transcript.messages[2].participant, "Bob");
    }

    #[test]
    fn test_colliding_ids_get_suffix() {
        let db = Database::open_in_memory().unwrap();
        let at = Utc.with_ymd_and_hms(2025, 1, 2, 3, 4, 5).unwrap();

        let first = db.save_transcript(&record(at)).unwrap();
        let second = db.save_transcript(&record(at)).unwrap();
        let third = db.save_transcript(&record(at)).unwrap();

        assert_eq!(first, "conversation-20250102T030405Z");
        assert_eq!(second, "conversation-20250102T030405Z-2");
        assert_eq!(third, "conversation-20250102T030405Z-3");
    }

    #[test]
    fn test_list_newest_first() {
        let db = Database::open_in_memory().unwrap();
        let early = Utc.with_ymd_and_hms(2025, 1, 1, 0, 0, 0).unwrap();
        let late = Utc.with_ymd_and_hms(2025, 6, 1, 0, 0, 0).unwrap();

        db.save_transcript(&record(early)).unwrap();
        db.save_transcript(&record(late)).unwrap();

        let list = db.list_transcripts().unwrap();
        assert_eq!(list.len(), 2);
        assert_eq!(list[0].created_at, late);
        assert_eq!(list[1].created_at, early);
        assert!(list.iter().all(|s| s.message_count == 3));
    }

    #[test]
    fn test_missing_transcript() {
        let db = Database::open_in_memory().unwrap();
        assert!(matches!(
            db.get_transcript("conversation-nope"),
            Err(DbError::TranscriptNotFound(_))
        ));
        assert!(db.list_transcripts().unwrap().is_empty());
    }

    #[test]
    fn test_empty_transcript() {
        let db = Database::open_in_memory().unwrap();
        let mut empty = record(Utc::now());
        empty.messages.clear();
        empty.topic = None;

        let id = db.save_transcript(&empty).unwrap();
        let transcript = db.get_transcript(&id).unwrap();
        assert_eq!(transcript.summary.topic, None);
        assert!(transcript.messages.is_empty());
    }

    #[test]
    fn test_persists_on_disk() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("nested").join("transcripts.db");
        let at = Utc.with_ymd_and_hms(2025, 1, 2, 3, 4, 5).unwrap();

        let id = {
            let db = Database::open(&path).unwrap();
            db.save_transcript(&record(at)).unwrap()
        };

        let reopened = Database::open(&path).unwrap();
        assert_eq!(reopened.get_transcript(&id).unwrap().messages.len(), 3);
    }
}
