//! Runtime for executing conversations
//!
//! The [`SessionManager`] owns the one live conversation session and the
//! process-wide event hub. Commands from the API land here; the turn loop
//! itself runs on a spawned [`ConversationRuntime`] task.

mod executor;
pub mod hub;
mod session;
pub mod traits;

#[cfg(test)]
pub mod testing;

pub use executor::ConversationRuntime;
pub use hub::{EventHub, Subscription};
pub use session::{ConversationSession, STOPPED_MESSAGE};
pub use traits::*;

use crate::state_machine::{ConversationLimits, ConversationState, StatusSnapshot};
use std::collections::HashSet;
use std::sync::Arc;
use thiserror::Error;
use tokio::sync::{Mutex, RwLock};
use tokio::task::JoinHandle;

/// Type alias for production runtime with shared trait objects
pub type SharedRuntime = ConversationRuntime<Arc<dyn ReplyGenerator>, Arc<dyn TranscriptSink>>;

/// A command that cannot be applied in the current state
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum CommandError {
    #[error("No active conversation")]
    NotActive,
    #[error("A conversation is already running")]
    AlreadyRunning,
    #[error("Message content must not be empty")]
    EmptyMessage,
    #[error("At least one participant is required")]
    NoParticipants,
    #[error("Unknown participant: {0}")]
    UnknownParticipant(String),
    #[error("Participant listed twice: {0}")]
    DuplicateParticipant(String),
}

impl CommandError {
    /// Whether the command conflicts with conversation state rather than
    /// carrying bad input
    pub fn is_conflict(&self) -> bool {
        matches!(self, CommandError::NotActive | CommandError::AlreadyRunning)
    }
}

/// Owner of the single live conversation
pub struct SessionManager {
    generator: Arc<dyn ReplyGenerator>,
    transcripts: Arc<dyn TranscriptSink>,
    /// Roster used when a start request names no participants
    default_roster: Vec<String>,
    limits: ConversationLimits,
    hub: EventHub,
    current: RwLock<Option<Arc<ConversationSession>>>,
    driver: Mutex<Option<JoinHandle<()>>>,
}

impl SessionManager {
    pub fn new(
        generator: Arc<dyn ReplyGenerator>,
        transcripts: Arc<dyn TranscriptSink>,
        default_roster: Vec<String>,
        limits: ConversationLimits,
        hub: EventHub,
    ) -> Self {
        Self {
            generator,
            transcripts,
            default_roster,
            limits,
            hub,
            current: RwLock::new(None),
            driver: Mutex::new(None),
        }
    }

    /// Join the event stream. Subscriptions outlive individual conversations.
    pub fn subscribe(&self) -> Subscription {
        self.hub.subscribe()
    }

    pub fn hub(&self) -> &EventHub {
        &self.hub
    }

    async fn current(&self) -> Option<Arc<ConversationSession>> {
        self.current.read().await.clone()
    }

    async fn require_current(&self) -> Result<Arc<ConversationSession>, CommandError> {
        self.current().await.ok_or(CommandError::NotActive)
    }

    fn validate_roster(&self, participants: Option<Vec<String>>) -> Result<Vec<String>, CommandError> {
        let participants = participants.unwrap_or_else(|| self.default_roster.clone());
        if participants.is_empty() {
            return Err(CommandError::NoParticipants);
        }

        let mut seen = HashSet::new();
        for name in &participants {
            if !seen.insert(name.as_str()) {
                return Err(CommandError::DuplicateParticipant(name.clone()));
            }
            if self.generator.model_for(name).is_err() {
                return Err(CommandError::UnknownParticipant(name.clone()));
            }
        }

        Ok(participants)
    }

    /// Start a new conversation, replacing an ended one.
    pub async fn start(
        &self,
        topic: Option<String>,
        participants: Option<Vec<String>>,
    ) -> Result<StatusSnapshot, CommandError> {
        let participants = self.validate_roster(participants)?;
        let topic = topic
            .map(|t| t.trim().to_string())
            .filter(|t| !t.is_empty());

        let mut current = self.current.write().await;
        if let Some(existing) = current.as_ref() {
            if !existing.is_finalized().await {
                return Err(CommandError::AlreadyRunning);
            }
        }

        tracing::info!(
            topic = topic.as_deref().unwrap_or_default(),
            participants = ?participants,
            "Starting conversation"
        );
        let state = ConversationState::new(participants, topic);
        let session = Arc::new(ConversationSession::new(state, self.hub.clone(), self.limits));
        session.announce_start().await;

        let runtime: SharedRuntime =
            ConversationRuntime::new(session.clone(), self.generator.clone(), self.transcripts.clone());
        let handle = tokio::spawn(runtime.run());

        let snapshot = session.snapshot().await;
        *current = Some(session);
        *self.driver.lock().await = Some(handle);
        Ok(snapshot)
    }

    pub async fn pause(&self) -> Result<StatusSnapshot, CommandError> {
        self.require_current().await?.pause().await
    }

    pub async fn resume(&self) -> Result<StatusSnapshot, CommandError> {
        self.require_current().await?.resume().await
    }

    pub async fn add_human_message(&self, content: &str) -> Result<StatusSnapshot, CommandError> {
        self.require_current().await?.add_human_message(content).await
    }

    /// Stop the live conversation and archive its transcript.
    ///
    /// The ended session stays in place until [`Self::clear_state`].
    pub async fn stop(&self) -> Result<StatusSnapshot, CommandError> {
        let session = self.require_current().await?;
        let (snapshot, record) = session.stop(STOPPED_MESSAGE).await?;
        executor::archive(&self.transcripts, &record).await;
        Ok(snapshot)
    }

    /// Stop the live conversation and discard it in one step.
    ///
    /// The `current` slot stays write-locked from the stop until the session is
    /// removed, so a start racing this call can never be the one cleared.
    pub async fn stop_and_clear(&self) -> Result<StatusSnapshot, CommandError> {
        let (snapshot, record) = {
            let mut current = self.current.write().await;
            let session = current.as_ref().ok_or(CommandError::NotActive)?;
            let stopped = session.stop(STOPPED_MESSAGE).await?;
            if let Some(session) = current.take() {
                tracing::info!(session = %session.id(), "Conversation state cleared");
            }
            stopped
        };

        executor::archive(&self.transcripts, &record).await;
        Ok(snapshot)
    }

    pub async fn status(&self) -> StatusSnapshot {
        match self.current().await {
            Some(session) => session.snapshot().await,
            None => StatusSnapshot::idle(),
        }
    }

    /// Discard the session. A conversation still running is stopped first.
    pub async fn clear_state(&self) {
        let Some(session) = self.current.write().await.take() else {
            return;
        };

        if !session.is_finalized().await {
            if let Ok((_, record)) = session.stop(STOPPED_MESSAGE).await {
                executor::archive(&self.transcripts, &record).await;
            }
        }
        tracing::info!(session = %session.id(), "Conversation state cleared");
    }

    /// Wait for the most recent driver task to exit
    pub async fn join_driver(&self) {
        let handle = self.driver.lock().await.take();
        if let Some(handle) = handle {
            if let Err(e) = handle.await {
                tracing::error!(error = %e, "Conversation driver panicked");
            }
        }
    }
}
