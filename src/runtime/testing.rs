//! Mock implementations for testing
//!
//! These mocks enable integration testing without real I/O.

use super::traits::*;
use super::{SessionManager, Subscription};
use crate::llm::{LlmError, TextStream};
use crate::participants::RegistryError;
use crate::state_machine::{ConversationLimits, DomainEvent};
use async_trait::async_trait;
use futures::StreamExt;
use std::collections::{HashSet, VecDeque};
use std::sync::{Arc, Mutex};
use std::time::Duration;
use tokio::sync::Notify;

// ============================================================================
// Mock Reply Generator
// ============================================================================

/// Scripted behaviour for one generation
#[derive(Debug, Clone)]
pub enum MockReply {
    /// Stream these chunks, then finish
    Chunks(Vec<String>),
    /// Fail before any chunk arrives
    OpenError(LlmError),
    /// Stream some chunks, then break
    StreamError(Vec<String>, LlmError),
    /// Never produce anything (until cancelled)
    Hang,
}

impl MockReply {
    pub fn text(text: &str) -> Self {
        MockReply::Chunks(vec![text.to_string()])
    }
}

/// Mock generator that plays back queued replies
pub struct MockGenerator {
    replies: Mutex<VecDeque<MockReply>>,
    unknown: HashSet<String>,
    chunk_delay: Duration,
    /// Record of all requests made
    pub requests: Mutex<Vec<ReplyRequest>>,
    /// Notified when a reply stream is requested
    pub reply_started: Arc<Notify>,
}

impl MockGenerator {
    pub fn new() -> Self {
        Self {
            replies: Mutex::new(VecDeque::new()),
            unknown: HashSet::new(),
            chunk_delay: Duration::ZERO,
            requests: Mutex::new(Vec::new()),
            reply_started: Arc::new(Notify::new()),
        }
    }

    /// Queue the next reply; once the queue is empty replies default to
    /// `"{participant} has thoughts"`
    pub fn queue(&self, reply: MockReply) {
        self.replies.lock().unwrap().push_back(reply);
    }

    /// Treat `name` as missing from the registry
    pub fn with_unknown(mut self, name: &str) -> Self {
        self.unknown.insert(name.to_string());
        self
    }

    pub fn with_chunk_delay(mut self, delay: Duration) -> Self {
        self.chunk_delay = delay;
        self
    }

    /// Speakers in request order
    pub fn speakers(&self) -> Vec<String> {
        self.requests
            .lock()
            .unwrap()
            .iter()
            .map(|r| r.participant.clone())
            .collect()
    }
}

impl Default for MockGenerator {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl ReplyGenerator for MockGenerator {
    fn model_for(&self, participant: &str) -> Result<String, GenerationError> {
        if self.unknown.contains(participant) {
            return Err(RegistryError::UnknownParticipant(participant.to_string()).into());
        }
        Ok(format!("mock-{}", participant.to_lowercase()))
    }

    async fn stream_reply(&self, request: &ReplyRequest) -> Result<TextStream, GenerationError> {
        self.requests.lock().unwrap().push(request.clone());
        self.reply_started.notify_one();

        let reply = self
            .replies
            .lock()
            .unwrap()
            .pop_front()
            .unwrap_or_else(|| MockReply::Chunks(vec![
                request.participant.clone(),
                " has thoughts".to_string(),
            ]));

        let (chunks, tail) = match reply {
            MockReply::Chunks(chunks) => (chunks, None),
            MockReply::OpenError(e) => return Err(e.into()),
            MockReply::StreamError(chunks, e) => (chunks, Some(e)),
            MockReply::Hang => {
                return Ok(Box::pin(futures::stream::pending::<Result<String, LlmError>>()))
            }
        };

        let delay = self.chunk_delay;
        let stream = futures::stream::iter(chunks)
            .then(move |chunk| async move {
                tokio::time::sleep(delay).await;
                Ok(chunk)
            })
            .chain(futures::stream::iter(tail.map(Err)));

        Ok(Box::pin(stream))
    }
}

// ============================================================================
// In-Memory Transcript Archive
// ============================================================================

/// Archive that keeps transcripts in memory
#[derive(Default)]
pub struct MemoryTranscripts {
    records: Mutex<Vec<TranscriptRecord>>,
    fail: bool,
}

impl MemoryTranscripts {
    pub fn failing() -> Self {
        Self {
            records: Mutex::new(Vec::new()),
            fail: true,
        }
    }

    pub fn records(&self) -> Vec<TranscriptRecord> {
        self.records.lock().unwrap().clone()
    }
}

#[async_trait]
impl TranscriptSink for MemoryTranscripts {
    async fn archive(&self, record: &TranscriptRecord) -> Result<String, String> {
        if self.fail {
            return Err("archive unavailable".to_string());
        }
        let mut records = self.records.lock().unwrap();
        records.push(record.clone());
        Ok(format!("memory-{}", records.len()))
    }
}

// ============================================================================
// Test Harness
// ============================================================================

/// How long a test waits for any single event before failing
pub const EVENT_TIMEOUT: Duration = Duration::from_secs(5);

/// Session manager wired to mocks, with a subscription opened up front
pub struct TestHarness {
    pub manager: Arc<SessionManager>,
    pub generator: Arc<MockGenerator>,
    pub transcripts: Arc<MemoryTranscripts>,
    pub events: Subscription,
}

impl TestHarness {
    pub fn new(generator: MockGenerator, limits: ConversationLimits) -> Self {
        Self::with_archive(generator, MemoryTranscripts::default(), limits)
    }

    pub fn with_archive(
        generator: MockGenerator,
        transcripts: MemoryTranscripts,
        limits: ConversationLimits,
    ) -> Self {
        let generator = Arc::new(generator);
        let transcripts = Arc::new(transcripts);
        let manager = Arc::new(SessionManager::new(
            generator.clone(),
            transcripts.clone(),
            vec!["A".to_string(), "B".to_string(), "C".to_string()],
            limits,
            super::EventHub::new(1024),
        ));
        let events = manager.subscribe();

        Self {
            manager,
            generator,
            transcripts,
            events,
        }
    }

    /// Limits small enough for tests to run to the end quickly
    pub fn limits(max_turns: u32, pause_timeout: Duration) -> ConversationLimits {
        ConversationLimits {
            max_turns,
            pause_timeout,
        }
    }

    pub async fn next_event(&mut self) -> DomainEvent {
        tokio::time::timeout(EVENT_TIMEOUT, self.events.recv())
            .await
            .expect("timed out waiting for event")
            .expect("subscription closed")
    }

    /// Collect events up to and including the first of `kind`
    pub async fn events_until(&mut self, kind: &str) -> Vec<DomainEvent> {
        let mut seen = Vec::new();
        loop {
            let event = self.next_event().await;
            let done = event.kind() == kind;
            seen.push(event);
            if done {
                return seen;
            }
        }
    }

    /// Everything already delivered, without waiting
    pub fn drain(&mut self) -> Vec<DomainEvent> {
        std::iter::from_fn(|| self.events.try_recv()).collect()
    }
}

/// Kinds of `events`, in order
pub fn kinds(events: &[DomainEvent]) -> Vec<&'static str> {
    events.iter().map(DomainEvent::kind).collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn request(participant: &str) -> ReplyRequest {
        ReplyRequest {
            participant: participant.to_string(),
            topic: None,
            history: vec![],
        }
    }

    #[tokio::test]
    async fn test_mock_generator_plays_queue_then_default() {
        let mock = MockGenerator::new();
        mock.queue(MockReply::Chunks(vec!["a".to_string(), "b".to_string()]));

        let first: Vec<_> = mock.stream_reply(&request("A")).await.unwrap().collect().await;
        assert_eq!(first.len(), 2);

        let second: Vec<String> = mock
            .stream_reply(&request("B"))
            .await
            .unwrap()
            .map(|r| r.unwrap())
            .collect()
            .await;
        assert_eq!(second.concat(), "B has thoughts");
        assert_eq!(mock.speakers(), vec!["A", "B"]);
    }

    #[tokio::test]
    async fn test_mock_generator_errors() {
        let mock = MockGenerator::new().with_unknown("Z");
        assert!(mock.model_for("Z").is_err());
        assert_eq!(mock.model_for("A").unwrap(), "mock-a");

        mock.queue(MockReply::OpenError(LlmError::network("down")));
        assert!(mock.stream_reply(&request("A")).await.is_err());

        mock.queue(MockReply::StreamError(vec!["x".to_string()], LlmError::stream("cut")));
        let items: Vec<_> = mock.stream_reply(&request("A")).await.unwrap().collect().await;
        assert!(items[0].is_ok());
        assert!(items[1].is_err());
    }

    #[tokio::test]
    async fn test_memory_transcripts() {
        let sink = MemoryTranscripts::default();
        let record = TranscriptRecord {
            topic: None,
            participants: vec![],
            messages: vec![],
            started_at: chrono::Utc::now(),
            ended_at: chrono::Utc::now(),
        };
        assert_eq!(sink.archive(&record).await.unwrap(), "memory-1");
        assert_eq!(sink.records().len(), 1);
        assert!(MemoryTranscripts::failing().archive(&record).await.is_err());
    }
}
