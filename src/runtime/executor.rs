//! Conversation runtime executor
//!
//! Drives one conversation through its turn loop until it ends or is stopped.

use super::session::ConversationSession;
use super::traits::{ReplyGenerator, ReplyRequest, TranscriptRecord, TranscriptSink};
use crate::state_machine::{transition, ConversationState, DomainEvent, Message, Phase};
use futures::StreamExt;
use std::sync::Arc;
use tokio::sync::{watch, MutexGuard};

/// End message used when a paused conversation times out
const TIMEOUT_END_MESSAGE: &str = "Conversation auto-ended due to extended pause";

/// How a generation attempt finished
enum Generated {
    Reply(String),
    Failed(String),
    /// Stop fired mid-generation; nothing is recorded
    Cancelled,
}

/// Generic conversation runtime that can work with any generator and archive
pub struct ConversationRuntime<G, A>
where
    G: ReplyGenerator + 'static,
    A: TranscriptSink + 'static,
{
    session: Arc<ConversationSession>,
    generator: G,
    transcripts: A,
    pause_rx: watch::Receiver<bool>,
    /// Author and content of the turn awaiting post-processing
    last_reply: Option<(String, String)>,
    end_message: String,
}

impl<G, A> ConversationRuntime<G, A>
where
    G: ReplyGenerator + 'static,
    A: TranscriptSink + 'static,
{
    pub fn new(session: Arc<ConversationSession>, generator: G, transcripts: A) -> Self {
        let pause_rx = session.pause_signal();
        let end_message = format!(
            "Conversation reached the {}-turn limit",
            session.limits().max_turns
        );
        Self {
            session,
            generator,
            transcripts,
            pause_rx,
            last_reply: None,
            end_message,
        }
    }

    pub async fn run(mut self) {
        tracing::info!(session = %self.session.id(), "Starting conversation runtime");

        let mut phase = Phase::Scheduling;
        loop {
            if self.session.cancel_token().is_cancelled() {
                break;
            }

            let next = match phase {
                Phase::Scheduling => self.schedule().await,
                Phase::PauseCheck => self.pause_check().await,
                Phase::Generating => self.generate().await,
                Phase::PostProcess => self.post_process().await,
                Phase::EndTurn => self.end_turn().await,
                Phase::Ended => {
                    self.finish().await;
                    None
                }
            };

            match next {
                Some(p) => phase = p,
                None => break,
            }
        }

        tracing::info!(session = %self.session.id(), "Conversation runtime stopped");
    }

    async fn schedule(&mut self) -> Option<Phase> {
        let mut state = live_state(&self.session).await?;
        if !state.conversation_active {
            return Some(Phase::Ended);
        }

        match transition::schedule_next(&mut state) {
            Some(event) => {
                tracing::debug!(
                    participant = event.participant().unwrap_or_default(),
                    turn = state.turn_count,
                    "Speaker scheduled"
                );
                self.session.emit(event);
                Some(Phase::PauseCheck)
            }
            None => {
                tracing::error!("No participants to schedule");
                self.end_message = "Conversation has no participants".to_string();
                Some(Phase::Ended)
            }
        }
    }

    async fn pause_check(&mut self) -> Option<Phase> {
        {
            let state = live_state(&self.session).await?;
            if !state.conversation_paused {
                return Some(Phase::Generating);
            }
            self.session.emit(DomainEvent::paused());
        }

        let limit = self.session.limits().pause_timeout;
        let waited = tokio::select! {
            () = self.session.cancel_token().cancelled() => return None,
            waited = tokio::time::timeout(limit, wait_for_resume(&mut self.pause_rx)) => waited,
        };

        let mut state = live_state(&self.session).await?;
        match waited {
            Ok(true) => {
                self.session.emit(DomainEvent::resumed());
                Some(Phase::Generating)
            }
            // Sender gone: the session is being torn down
            Ok(false) => None,
            Err(_) if !state.conversation_paused => {
                self.session.emit(DomainEvent::resumed());
                Some(Phase::Generating)
            }
            Err(_) => {
                tracing::info!(
                    timeout_secs = limit.as_secs(),
                    "Pause timed out, ending conversation"
                );
                let event = transition::pause_timed_out(&mut state);
                self.session.emit(event);
                // Finalise under the same guard so no stop can slip in between
                let record = self.session.finalize_locked(&mut state, TIMEOUT_END_MESSAGE);
                drop(state);
                if let Some(record) = record {
                    archive(&self.transcripts, &record).await;
                }
                None
            }
        }
    }

    async fn generate(&mut self) -> Option<Phase> {
        let (speaker, request) = {
            let state = live_state(&self.session).await?;
            let speaker = state.current_speaker.clone()?;

            match self.generator.model_for(&speaker) {
                Ok(model) => {
                    self.session.emit(DomainEvent::AiThinkingStart {
                        participant: speaker.clone(),
                        model,
                    });
                    self.session.emit(DomainEvent::AiResponseStart {
                        participant: speaker.clone(),
                    });
                }
                Err(e) => {
                    drop(state);
                    return self.record_failure(&speaker, e.to_string()).await;
                }
            }

            let request = ReplyRequest {
                participant: speaker.clone(),
                topic: state.topic.clone(),
                history: state.messages.clone(),
            };
            (speaker, request)
        };

        match self.stream_reply(&speaker, &request).await {
            Generated::Reply(content) => {
                let mut state = live_state(&self.session).await?;
                tracing::info!(
                    participant = %speaker,
                    turn = state.turn_count,
                    chars = content.len(),
                    "Reply complete"
                );
                self.session.emit(DomainEvent::AiResponseComplete {
                    participant: speaker.clone(),
                    content: content.clone(),
                });
                transition::record_turn(&mut state, Message::reply(speaker.clone(), content.clone()));
                self.last_reply = Some((speaker, content));
                Some(Phase::PostProcess)
            }
            Generated::Failed(error) => self.record_failure(&speaker, error).await,
            Generated::Cancelled => None,
        }
    }

    /// Stream one reply, publishing each non-empty chunk as it arrives
    async fn stream_reply(&self, speaker: &str, request: &ReplyRequest) -> Generated {
        let cancel = self.session.cancel_token();

        let opened = tokio::select! {
            () = cancel.cancelled() => return Generated::Cancelled,
            opened = self.generator.stream_reply(request) => opened,
        };
        let mut stream = match opened {
            Ok(stream) => stream,
            Err(e) => return Generated::Failed(e.to_string()),
        };

        let mut full_content = String::new();
        loop {
            let chunk = tokio::select! {
                () = cancel.cancelled() => return Generated::Cancelled,
                chunk = stream.next() => chunk,
            };

            match chunk {
                Some(Ok(text)) if text.is_empty() => {}
                Some(Ok(text)) => {
                    let Some(_state) = live_state(&self.session).await else {
                        return Generated::Cancelled;
                    };
                    full_content.push_str(&text);
                    self.session.emit(DomainEvent::AiResponseStream {
                        participant: speaker.to_string(),
                        content: text,
                        full_content: full_content.clone(),
                    });
                }
                Some(Err(e)) => return Generated::Failed(e.to_string()),
                None => return Generated::Reply(full_content),
            }
        }
    }

    /// Error path: announce the failure and record the placeholder turn
    async fn record_failure(&mut self, speaker: &str, error: String) -> Option<Phase> {
        let mut state = live_state(&self.session).await?;
        tracing::warn!(
            participant = %speaker,
            turn = state.turn_count,
            error = %error,
            "Reply generation failed"
        );

        self.session.emit(DomainEvent::AiResponseError {
            participant: speaker.to_string(),
            error,
            turn: state.turn_count,
        });

        let placeholder = Message::error_placeholder(speaker);
        let content = placeholder.content.clone();
        transition::record_turn(&mut state, placeholder);
        self.last_reply = Some((speaker.to_string(), content));
        Some(Phase::PostProcess)
    }

    async fn post_process(&mut self) -> Option<Phase> {
        let mut state = live_state(&self.session).await?;
        let (author, content) = self.last_reply.take().unwrap_or_default();
        let limits = *self.session.limits();
        Some(transition::post_process(&mut state, &author, &content, &limits))
    }

    async fn end_turn(&mut self) -> Option<Phase> {
        let state = live_state(&self.session).await?;
        self.session.emit(transition::end_turn(&state));
        Some(Phase::Scheduling)
    }

    /// Ended: finalise, then archive outside the lock
    async fn finish(&mut self) {
        let record = {
            let mut state = self.session.lock().await;
            self.session.finalize_locked(&mut state, &self.end_message)
        };

        if let Some(record) = record {
            archive(&self.transcripts, &record).await;
        }
    }
}

/// Lock the state unless the conversation has already been finalised.
/// Once `conversation_end` is out the driver emits nothing further.
async fn live_state(session: &ConversationSession) -> Option<MutexGuard<'_, ConversationState>> {
    let state = session.lock().await;
    (!state.is_finalized()).then_some(state)
}

async fn wait_for_resume(pause_rx: &mut watch::Receiver<bool>) -> bool {
    pause_rx.wait_for(|paused| !*paused).await.is_ok()
}

/// Hand a finished transcript to the archive; failures are only logged
pub(super) async fn archive<A: TranscriptSink + ?Sized>(transcripts: &A, record: &TranscriptRecord) {
    match transcripts.archive(record).await {
        Ok(id) => tracing::info!(transcript_id = %id, messages = record.messages.len(), "Transcript archived"),
        Err(e) => tracing::error!(error = %e, "Failed to archive transcript"),
    }
}
