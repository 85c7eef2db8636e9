//! The live conversation session
//!
//! Owns the conversation state behind an async mutex. Every mutation and every
//! event publication happens while that lock is held, by the driver task and
//! by external commands alike, so all subscribers observe events in exactly
//! the order the transitions happened.

use super::hub::EventHub;
use super::traits::TranscriptRecord;
use super::CommandError;
use crate::state_machine::{
    transition, ConversationLimits, ConversationState, DomainEvent, StatusSnapshot,
};
use tokio::sync::{watch, Mutex, MutexGuard};
use tokio_util::sync::CancellationToken;

/// End message used when a user stops the conversation
pub const STOPPED_MESSAGE: &str = "Conversation stopped";

pub struct ConversationSession {
    id: String,
    state: Mutex<ConversationState>,
    /// Mirrors `conversation_paused`; the driver waits on it while paused
    pause_tx: watch::Sender<bool>,
    /// Fired by stop to abandon any in-flight generation
    cancel: CancellationToken,
    hub: EventHub,
    limits: ConversationLimits,
}

impl ConversationSession {
    pub fn new(state: ConversationState, hub: EventHub, limits: ConversationLimits) -> Self {
        let (pause_tx, _) = watch::channel(state.conversation_paused);
        Self {
            id: uuid::Uuid::new_v4().to_string(),
            state: Mutex::new(state),
            pause_tx,
            cancel: CancellationToken::new(),
            hub,
            limits,
        }
    }

    pub fn id(&self) -> &str {
        &self.id
    }

    pub fn limits(&self) -> &ConversationLimits {
        &self.limits
    }

    pub(super) fn cancel_token(&self) -> &CancellationToken {
        &self.cancel
    }

    pub(super) fn pause_signal(&self) -> watch::Receiver<bool> {
        self.pause_tx.subscribe()
    }

    pub(super) async fn lock(&self) -> MutexGuard<'_, ConversationState> {
        self.state.lock().await
    }

    /// Publish an event. Callers hold the state lock.
    pub(super) fn emit(&self, event: DomainEvent) {
        let delivered = self.hub.publish(&event);
        tracing::debug!(
            session = %self.id,
            event = event.kind(),
            participant = event.participant().unwrap_or_default(),
            delivered,
            "Event published"
        );
    }

    /// Announce the new conversation
    pub(super) async fn announce_start(&self) {
        let state = self.lock().await;
        self.emit(transition::start_event(&state));
        self.emit(transition::status_event(&state));
    }

    /// Run finalisation under the held lock. Returns the transcript to
    /// archive when this call was the one that ended the conversation.
    pub(super) fn finalize_locked(
        &self,
        state: &mut ConversationState,
        message: &str,
    ) -> Option<TranscriptRecord> {
        let [end, status] = transition::finalize(state, message)?;
        tracing::info!(
            session = %self.id,
            turns = state.turn_count,
            messages = state.messages.len(),
            reason = %message,
            "Conversation ended"
        );
        self.emit(end);
        self.emit(status);
        self.pause_tx.send_replace(false);
        Some(TranscriptRecord::from_state(state))
    }

    pub async fn snapshot(&self) -> StatusSnapshot {
        self.lock().await.snapshot()
    }

    pub async fn is_finalized(&self) -> bool {
        self.lock().await.is_finalized()
    }

    pub async fn pause(&self) -> Result<StatusSnapshot, CommandError> {
        let mut state = self.lock().await;
        if !state.conversation_active {
            return Err(CommandError::NotActive);
        }

        state.conversation_paused = true;
        self.pause_tx.send_replace(true);
        tracing::info!(session = %self.id, turn = state.turn_count, "Conversation paused");
        self.emit(transition::status_event(&state));
        Ok(state.snapshot())
    }

    pub async fn resume(&self) -> Result<StatusSnapshot, CommandError> {
        let mut state = self.lock().await;
        if !state.conversation_active {
            return Err(CommandError::NotActive);
        }

        state.conversation_paused = false;
        self.pause_tx.send_replace(false);
        tracing::info!(session = %self.id, turn = state.turn_count, "Conversation resumed");
        self.emit(transition::status_event(&state));
        Ok(state.snapshot())
    }

    pub async fn add_human_message(&self, content: &str) -> Result<StatusSnapshot, CommandError> {
        let content = content.trim();
        if content.is_empty() {
            return Err(CommandError::EmptyMessage);
        }

        let mut state = self.lock().await;
        if !state.conversation_active {
            return Err(CommandError::NotActive);
        }

        let event = transition::add_human_message(&mut state, content.to_string());
        tracing::info!(
            session = %self.id,
            preferred = state.preferred_next_speaker.as_deref().unwrap_or_default(),
            "Human message added"
        );
        self.emit(event);
        Ok(state.snapshot())
    }

    /// Stop the conversation: finalise it with `reason` as the end message and
    /// cancel any in-flight generation.
    ///
    /// Returns the final status and the transcript to archive.
    pub async fn stop(&self, reason: &str) -> Result<(StatusSnapshot, TranscriptRecord), CommandError> {
        let mut state = self.lock().await;
        if !(state.conversation_active || state.conversation_paused) {
            return Err(CommandError::NotActive);
        }

        let record = self
            .finalize_locked(&mut state, reason)
            .ok_or(CommandError::NotActive)?;
        self.cancel.cancel();
        Ok((state.snapshot(), record))
    }
}

impl Drop for ConversationSession {
    fn drop(&mut self) {
        self.cancel.cancel();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn session() -> (ConversationSession, super::super::hub::Subscription) {
        let hub = EventHub::new(32);
        let sub = hub.subscribe();
        let state = ConversationState::new(
            vec!["A".to_string(), "B".to_string()],
            Some("t".to_string()),
        );
        (
            ConversationSession::new(state, hub, ConversationLimits::default()),
            sub,
        )
    }

    #[tokio::test]
    async fn test_pause_and_resume_toggle_signal() {
        let (session, mut sub) = session();
        let signal = session.pause_signal();

        let status = session.pause().await.unwrap();
        assert!(status.paused);
        assert!(*signal.borrow());
        assert_eq!(sub.try_recv().unwrap().kind(), "conversation_status");

        let status = session.resume().await.unwrap();
        assert!(!status.paused);
        assert!(!*signal.borrow());
    }

    #[tokio::test]
    async fn test_stop_emits_end_then_status_once() {
        let (session, mut sub) = session();

        let (status, record) = session.stop(STOPPED_MESSAGE).await.unwrap();
        assert!(!status.active);
        assert!(!status.paused);
        assert_eq!(record.topic.as_deref(), Some("t"));
        assert!(session.cancel_token().is_cancelled());

        assert_eq!(sub.try_recv().unwrap().kind(), "conversation_end");
        assert_eq!(sub.try_recv().unwrap().kind(), "conversation_status");
        assert_eq!(sub.try_recv(), None);

        assert_eq!(session.stop(STOPPED_MESSAGE).await.unwrap_err(), CommandError::NotActive);
        assert_eq!(sub.try_recv(), None);
    }

    #[tokio::test]
    async fn test_commands_rejected_after_end() {
        let (session, _sub) = session();
        session.stop(STOPPED_MESSAGE).await.unwrap();

        assert_eq!(session.pause().await.unwrap_err(), CommandError::NotActive);
        assert_eq!(session.resume().await.unwrap_err(), CommandError::NotActive);
        assert_eq!(
            session.add_human_message("hi").await.unwrap_err(),
            CommandError::NotActive
        );
    }

    #[tokio::test]
    async fn test_blank_human_message_rejected() {
        let (session, mut sub) = session();
        assert_eq!(
            session.add_human_message("   ").await.unwrap_err(),
            CommandError::EmptyMessage
        );
        assert_eq!(sub.try_recv(), None);

        let status = session.add_human_message(" @B your turn ").await.unwrap();
        assert_eq!(status.total_messages, 2);
        assert_eq!(
            sub.try_recv(),
            Some(DomainEvent::HumanMessageAdded {
                content: "@B your turn".to_string()
            })
        );
    }
}
