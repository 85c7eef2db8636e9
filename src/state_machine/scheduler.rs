//! Turn scheduling
//!
//! Round-robin rotation with a one-shot override from a mention. A mention
//! bumps one participant to the front without disturbing the rotation: when
//! the preference wins over the round-robin candidate the pointer stays put,
//! so the bypassed candidate speaks on the following turn.

/// Inputs to a scheduling decision
#[derive(Debug, Clone, Copy)]
pub struct ScheduleInput<'a> {
    pub pointer: usize,
    pub participants: &'a [String],
    pub last_speaker: Option<&'a str>,
    pub preferred: Option<&'a str>,
    pub bias_remaining: u32,
}

/// Outcome of a scheduling decision
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ScheduleDecision {
    pub speaker: String,
    pub pointer: usize,
    pub preferred: Option<String>,
    pub bias_remaining: u32,
}

/// Pick the next speaker.
///
/// Returns `None` for an empty roster; the caller leaves its state untouched.
pub fn schedule(input: &ScheduleInput<'_>) -> Option<ScheduleDecision> {
    let count = input.participants.len();
    if count == 0 {
        return None;
    }

    let pointer = input.pointer % count;
    let candidate = &input.participants[pointer];
    let advanced = (pointer + 1) % count;

    let valid_preference = input.preferred.filter(|preferred| {
        input.bias_remaining > 0
            && input.participants.iter().any(|p| p == preferred)
            && input.last_speaker != Some(*preferred)
    });

    let Some(preferred) = valid_preference else {
        return Some(ScheduleDecision {
            speaker: candidate.clone(),
            pointer: advanced,
            preferred: None,
            bias_remaining: 0,
        });
    };

    let bias_remaining = input.bias_remaining - 1;
    let remaining_preference = (bias_remaining > 0).then(|| preferred.to_string());

    if preferred == candidate {
        Some(ScheduleDecision {
            speaker: candidate.clone(),
            pointer: advanced,
            preferred: remaining_preference,
            bias_remaining,
        })
    } else {
        Some(ScheduleDecision {
            speaker: preferred.to_string(),
            pointer,
            preferred: remaining_preference,
            bias_remaining,
        })
    }
}
