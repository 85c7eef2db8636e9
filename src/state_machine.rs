//! Core conversation state machine
//!
//! Pure pieces of the turn lifecycle: the conversation state, the domain
//! event taxonomy, speaker scheduling, mention parsing and the per-phase
//! transition steps. The async driver lives in `runtime`.

pub mod event;
pub mod mention;
pub mod scheduler;
pub mod state;
pub(crate) mod transition;

#[cfg(test)]
mod proptests;

pub use event::DomainEvent;
pub use mention::parse_mention;
pub use scheduler::{schedule, ScheduleDecision, ScheduleInput};
pub use state::{ConversationLimits, ConversationState, Message, MessageRole, Phase, StatusSnapshot};
