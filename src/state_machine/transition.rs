//! Pure transition steps
//!
//! One function per phase of the turn loop. Each mutates the state it is given
//! and returns the domain events the transition produces. Callers hold the
//! session lock across a step and the publication of its events, which is what
//! keeps emission order identical to transition order.

use super::state::HUMAN;
use super::{
    parse_mention, schedule, ConversationLimits, ConversationState, DomainEvent, Message, Phase,
    ScheduleInput,
};
use chrono::Utc;

/// Scheduling: choose and record the next speaker.
///
/// Returns `None` (state untouched) when the roster is empty.
pub fn schedule_next(state: &mut ConversationState) -> Option<DomainEvent> {
    let decision = schedule(&ScheduleInput {
        pointer: state.round_robin_pointer,
        participants: &state.participants,
        last_speaker: state.current_speaker.as_deref(),
        preferred: state.preferred_next_speaker.as_deref(),
        bias_remaining: state.preferred_bias_remaining,
    })?;

    state.round_robin_pointer = decision.pointer;
    state.preferred_next_speaker = decision.preferred;
    state.preferred_bias_remaining = decision.bias_remaining;
    state.current_speaker = Some(decision.speaker.clone());

    Some(DomainEvent::SpeakerScheduled {
        participant: decision.speaker,
        turn: state.turn_count,
    })
}

/// Generating: commit the turn's single message, successful or placeholder.
pub fn record_turn(state: &mut ConversationState, message: Message) {
    state.messages.push(message);
    state.turn_count += 1;
}

/// PostProcess: pick up any mention in the new content, then decide whether
/// the conversation goes on.
pub fn post_process(
    state: &mut ConversationState,
    author: &str,
    content: &str,
    limits: &ConversationLimits,
) -> Phase {
    apply_mention(state, content, author);

    if state.turn_count >= limits.max_turns || !state.conversation_active {
        Phase::Ended
    } else {
        Phase::EndTurn
    }
}

/// EndTurn
pub fn end_turn(state: &ConversationState) -> DomainEvent {
    DomainEvent::TurnComplete {
        turn: state.turn_count,
        total_messages: state.messages.len(),
    }
}

/// PauseCheck ran out of time.
pub fn pause_timed_out(state: &mut ConversationState) -> DomainEvent {
    state.conversation_active = false;
    DomainEvent::timed_out()
}

/// Human interjection from outside the loop. Never advances the turn.
pub fn add_human_message(state: &mut ConversationState, content: String) -> DomainEvent {
    apply_mention(state, &content, HUMAN);
    state.messages.push(Message::human(content.clone()));
    DomainEvent::HumanMessageAdded { content }
}

/// Set a one-turn preference if `content` mentions someone other than `author`.
pub fn apply_mention(state: &mut ConversationState, content: &str, author: &str) -> Option<String> {
    let mentioned = parse_mention(content, &state.participants, author)?;
    tracing::debug!(author = %author, mentioned = %mentioned, "Mention sets next-speaker preference");
    state.set_preference(mentioned.clone());
    Some(mentioned)
}

pub fn status_event(state: &ConversationState) -> DomainEvent {
    DomainEvent::ConversationStatus {
        active: state.conversation_active,
        paused: state.conversation_paused,
        participants: state.participants.clone(),
        topic: state.topic.clone(),
    }
}

pub fn start_event(state: &ConversationState) -> DomainEvent {
    DomainEvent::ConversationStart {
        topic: state.topic.clone(),
        participants: state.participants.clone(),
    }
}

/// Ended: deactivate and produce `conversation_end` plus the final status.
///
/// Only the first call does anything; later calls return `None`.
pub fn finalize(state: &mut ConversationState, message: &str) -> Option<[DomainEvent; 2]> {
    if state.is_finalized() {
        return None;
    }

    state.conversation_active = false;
    state.conversation_paused = false;
    state.ended_at = Some(Utc::now());

    Some([
        DomainEvent::ConversationEnd {
            message: message.to_string(),
            participants: state.participants.clone(),
            topic: state.topic.clone(),
        },
        status_event(state),
    ])
}
