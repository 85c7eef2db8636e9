//! Property-based tests for the state machine
//!
//! These tests verify key invariants hold across all possible inputs.

use super::state::HUMAN;
use super::transition::*;
use super::*;
use proptest::prelude::*;

// ============================================================================
// Arbitrary Generators
// ============================================================================

fn arb_roster() -> impl Strategy<Value = Vec<String>> {
    prop::collection::hash_set("[A-Z][a-z]{2,6}", 1..6)
        .prop_map(|names| names.into_iter().collect())
}

/// Roster plus a valid scheduler position within it
fn arb_position() -> impl Strategy<Value = (Vec<String>, usize, Option<usize>, Option<usize>)> {
    arb_roster().prop_flat_map(|roster| {
        let n = roster.len();
        (
            Just(roster),
            0..n,
            prop::option::of(0..n),
            prop::option::of(0..n),
        )
    })
}

/// One step of activity between scheduling decisions
#[derive(Debug, Clone)]
enum Step {
    /// Participant reply, optionally mentioning someone by roster index
    Reply(Option<usize>),
    /// Human interjection, optionally mentioning someone by roster index
    Human(Option<usize>),
}

fn arb_step() -> impl Strategy<Value = Step> {
    prop_oneof![
        3 => prop::option::of(0usize..8).prop_map(Step::Reply),
        1 => prop::option::of(0usize..8).prop_map(Step::Human),
    ]
}

fn mention_text(roster: &[String], idx: Option<usize>) -> String {
    match idx {
        Some(i) => format!("what do you think, @{}?", roster[i % roster.len()]),
        None => "no opinion to share".to_string(),
    }
}

// ============================================================================
// Scheduler Properties
// ============================================================================

proptest! {
    #![proptest_config(ProptestConfig::with_cases(500))]

    /// Without a preference the schedule is pure round-robin.
    #[test]
    fn prop_no_preference_is_round_robin((roster, pointer, last, _) in arb_position()) {
        let last = last.map(|i| roster[i].clone());
        let decision = schedule(&ScheduleInput {
            pointer,
            participants: &roster,
            last_speaker: last.as_deref(),
            preferred: None,
            bias_remaining: 0,
        }).unwrap();

        prop_assert_eq!(&decision.speaker, &roster[pointer]);
        prop_assert_eq!(decision.pointer, (pointer + 1) % roster.len());
        prop_assert_eq!(decision.preferred, None);
    }

    /// The pointer stays in range and only ever stands still or moves by one.
    #[test]
    fn prop_pointer_moves_at_most_one((roster, pointer, last, pref) in arb_position(), bias in 0u32..3) {
        let last = last.map(|i| roster[i].clone());
        let pref = pref.map(|i| roster[i].clone());
        let decision = schedule(&ScheduleInput {
            pointer,
            participants: &roster,
            last_speaker: last.as_deref(),
            preferred: pref.as_deref(),
            bias_remaining: bias,
        }).unwrap();

        prop_assert!(decision.pointer < roster.len());
        prop_assert!(
            decision.pointer == pointer || decision.pointer == (pointer + 1) % roster.len()
        );
        prop_assert!(roster.contains(&decision.speaker));
    }

    /// A valid preference always wins and is consumed by bias-1 decisions.
    #[test]
    fn prop_valid_preference_wins((roster, pointer, last, pref) in arb_position()) {
        let last = last.map(|i| roster[i].clone());
        let pref = pref.map(|i| roster[i].clone());
        prop_assume!(pref.is_some() && pref != last);

        let decision = schedule(&ScheduleInput {
            pointer,
            participants: &roster,
            last_speaker: last.as_deref(),
            preferred: pref.as_deref(),
            bias_remaining: 1,
        }).unwrap();

        prop_assert_eq!(Some(&decision.speaker), pref.as_ref());
        prop_assert_eq!(decision.preferred, None);
        prop_assert_eq!(decision.bias_remaining, 0);
    }

    /// Zero bias never carries a preference forward.
    #[test]
    fn prop_zero_bias_clears_preference((roster, pointer, last, pref) in arb_position(), bias in 0u32..4) {
        let last = last.map(|i| roster[i].clone());
        let pref = pref.map(|i| roster[i].clone());
        let decision = schedule(&ScheduleInput {
            pointer,
            participants: &roster,
            last_speaker: last.as_deref(),
            preferred: pref.as_deref(),
            bias_remaining: bias,
        }).unwrap();

        if decision.bias_remaining == 0 {
            prop_assert_eq!(decision.preferred, None);
        }
    }
}

// ============================================================================
// Turn Loop Properties
// ============================================================================

proptest! {
    #![proptest_config(ProptestConfig::with_cases(200))]

    /// Driving the pure steps with arbitrary replies and interjections keeps
    /// every state invariant intact.
    #[test]
    fn prop_turn_loop_invariants(roster in arb_roster(), steps in prop::collection::vec(arb_step(), 1..40)) {
        let limits = ConversationLimits { max_turns: 100, ..ConversationLimits::default() };
        let mut state = ConversationState::new(roster.clone(), Some("topic".to_string()));
        let mut previous_turns = 0;

        for step in steps {
            match step {
                Step::Reply(idx) => {
                    let event = schedule_next(&mut state).unwrap();
                    let speaker = state.current_speaker.clone().unwrap();
                    prop_assert_eq!(event.participant(), Some(speaker.as_str()));

                    let text = mention_text(&roster, idx);
                    record_turn(&mut state, Message::reply(speaker.clone(), text.clone()));
                    prop_assert_eq!(post_process(&mut state, &speaker, &text, &limits), Phase::EndTurn);

                    // a speaker never prefers themselves
                    prop_assert_ne!(state.preferred_next_speaker.as_deref(), Some(speaker.as_str()));
                }
                Step::Human(idx) => {
                    let before = state.turn_count;
                    add_human_message(&mut state, mention_text(&roster, idx));
                    prop_assert_eq!(state.turn_count, before);
                    prop_assert_eq!(&state.messages.last().unwrap().participant, HUMAN);
                }
            }

            prop_assert!(state.turn_count >= previous_turns);
            previous_turns = state.turn_count;
            prop_assert!(state.round_robin_pointer < roster.len());
            if state.preferred_bias_remaining == 0 {
                prop_assert_eq!(&state.preferred_next_speaker, &None);
            }
            if let Some(pref) = &state.preferred_next_speaker {
                prop_assert!(roster.contains(pref));
            }
        }
    }

    /// Plain rotation with no mentions visits everyone in roster order.
    #[test]
    fn prop_rotation_visits_roster_in_order(roster in arb_roster(), rounds in 1usize..4) {
        let mut state = ConversationState::new(roster.clone(), None);
        let mut spoken = Vec::new();

        for _ in 0..roster.len() * rounds {
            schedule_next(&mut state);
            spoken.push(state.current_speaker.clone().unwrap());
        }

        let expected: Vec<String> = roster.iter().cycle().take(roster.len() * rounds).cloned().collect();
        prop_assert_eq!(spoken, expected);
    }

    /// A mention bumps one speaker ahead and the bypassed candidate speaks next.
    #[test]
    fn prop_mention_defers_candidate_by_one(roster in arb_roster(), target in 0usize..8) {
        prop_assume!(roster.len() >= 3);
        let limits = ConversationLimits::default();
        let mut state = ConversationState::new(roster.clone(), None);

        schedule_next(&mut state);
        let first = state.current_speaker.clone().unwrap();
        let candidate = roster[state.round_robin_pointer].clone();
        let target = roster[target % roster.len()].clone();
        prop_assume!(target != first && target != candidate);

        let text = format!("@{target} over to you");
        record_turn(&mut state, Message::reply(first.clone(), text.clone()));
        post_process(&mut state, &first, &text, &limits);

        schedule_next(&mut state);
        prop_assert_eq!(state.current_speaker.as_ref(), Some(&target));
        schedule_next(&mut state);
        prop_assert_eq!(state.current_speaker.as_ref(), Some(&candidate));
    }

    /// Finalisation happens once, whatever order the triggers arrive in.
    #[test]
    fn prop_finalize_is_idempotent(roster in arb_roster(), calls in 1usize..5, timed_out in any::<bool>()) {
        let mut state = ConversationState::new(roster, None);
        if timed_out {
            pause_timed_out(&mut state);
        }

        let emitted = (0..calls).filter_map(|_| finalize(&mut state, "done")).count();
        prop_assert_eq!(emitted, 1);
        prop_assert!(!state.conversation_active);
        prop_assert!(!state.conversation_paused);
    }
}

// ============================================================================
// Mention Parser Properties
// ============================================================================

proptest! {
    /// The author is never returned, and any result is a roster member.
    #[test]
    fn prop_mention_never_self(roster in arb_roster(), author_idx in 0usize..8, text in "[ @a-zA-Z,.!?]{0,80}") {
        let author = roster[author_idx % roster.len()].clone();
        if let Some(found) = parse_mention(&text, &roster, &author) {
            prop_assert_ne!(&found, &author);
            prop_assert!(roster.contains(&found));
        }
    }

    /// Arbitrary input never panics.
    #[test]
    fn prop_mention_total(text in ".*") {
        let roster = vec!["Alice".to_string(), "Bob".to_string()];
        let _ = parse_mention(&text, &roster, "Alice");
    }
}
