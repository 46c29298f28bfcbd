//! Property-based tests for the state machine
//!
//! These tests verify key invariants hold across all possible inputs.

use super::state::*;
use super::transition::*;
use super::*;
use crate::llm::{LlmError, LlmResponse, ToolCallRequest};
use proptest::prelude::*;

// ============================================================================
// Test Helpers
// ============================================================================

fn test_context(max_turns: usize) -> ConvContext {
    ConvContext::seeded(max_turns, "system", Vec::new(), "hello")
}

/// Results answering `calls` in order, as the runtime produces them
fn outcomes_for(calls: &[ToolCallRequest], output: &str) -> Vec<ToolOutcome> {
    calls
        .iter()
        .map(|c| ToolOutcome::new(c.id.clone(), output))
        .collect()
}

// ============================================================================
// Arbitrary Generators
// ============================================================================

fn arb_tool_call() -> impl Strategy<Value = ToolCallRequest> {
    ("[a-z]{8}", "[a-z_]{1,10}", prop_oneof![
        Just("{}".to_string()),
        Just(r#"{"x":1}"#.to_string()),
        Just("{not json".to_string()),
    ])
        .prop_map(|(id, name, args)| ToolCallRequest::new(id, name, args))
}

fn arb_response() -> impl Strategy<Value = LlmResponse> {
    prop_oneof![
        "[a-zA-Z ]{1,30}".prop_map(LlmResponse::text),
        Just(LlmResponse::text("")),
        proptest::collection::vec(arb_tool_call(), 1..4).prop_map(LlmResponse::tool_calls),
    ]
}

fn arb_llm_error() -> impl Strategy<Value = LlmError> {
    prop_oneof![
        Just(LlmError::network("timeout")),
        Just(LlmError::rate_limit("slow down")),
        Just(LlmError::server_error("502")),
        Just(LlmError::auth("bad key")),
    ]
}

/// What the completion endpoint does on one turn
#[derive(Debug, Clone)]
enum Reply {
    Respond(LlmResponse),
    Fail(LlmError),
}

fn arb_reply() -> impl Strategy<Value = Reply> {
    prop_oneof![
        4 => arb_response().prop_map(Reply::Respond),
        1 => arb_llm_error().prop_map(Reply::Fail),
    ]
}

fn arb_event() -> impl Strategy<Value = Event> {
    prop_oneof![
        Just(Event::Start),
        arb_response().prop_map(|response| Event::LlmResponse { response }),
        arb_llm_error().prop_map(|error| Event::LlmError { error }),
        proptest::collection::vec(("[a-z]{8}", "[a-z ]{0,10}"), 0..3).prop_map(|pairs| {
            Event::ToolsComplete {
                results: pairs
                    .into_iter()
                    .map(|(id, out)| ToolOutcome::new(id, out))
                    .collect(),
            }
        }),
    ]
}

/// Drive a run the way the runtime does, feeding scripted replies.
/// Returns the terminal state and the number of completion requests.
fn drive(max_turns: usize, replies: &[Reply]) -> (ConvState, usize, ConvContext) {
    let mut ctx = test_context(max_turns);
    let mut state = ConvState::ReadyToCallLlm;
    let mut queue = vec![Event::Start];
    let mut replies = replies.iter().cloned();
    let mut requests = 0;

    while let Some(event) = queue.pop() {
        let result = transition(&state, &mut ctx, event).expect("runtime-shaped events are valid");
        state = result.new_state;
        for effect in result.effects {
            match effect {
                Effect::RequestLlm => {
                    requests += 1;
                    queue.push(match replies.next() {
                        Some(Reply::Respond(response)) => Event::LlmResponse { response },
                        Some(Reply::Fail(error)) => Event::LlmError { error },
                        None => Event::LlmResponse {
                            response: LlmResponse::text("fallback"),
                        },
                    });
                }
                Effect::ExecuteTools { calls } => {
                    queue.push(Event::ToolsComplete {
                        results: outcomes_for(&calls, "result"),
                    });
                }
            }
        }
    }
    (state, requests, ctx)
}

proptest! {
    #![proptest_config(ProptestConfig::with_cases(500))]

    // Invariant 1: completion requests never exceed the turn budget
    #[test]
    fn prop_requests_bounded_by_max_turns(
        max_turns in 1usize..6,
        replies in proptest::collection::vec(arb_reply(), 0..10)
    ) {
        let (state, requests, ctx) = drive(max_turns, &replies);
        prop_assert!(requests <= max_turns, "{} requests with max {}", requests, max_turns);
        prop_assert!(ctx.current_turn <= max_turns);
        prop_assert!(state.is_terminal(), "Run stopped in {:?}", state);
    }

    // Invariant 2: a model that always asks for tools exhausts the budget
    #[test]
    fn prop_endless_tool_use_hits_turn_limit(
        max_turns in 1usize..6,
        calls in proptest::collection::vec(arb_tool_call(), 1..3)
    ) {
        let replies = vec![Reply::Respond(LlmResponse::tool_calls(calls)); max_turns + 2];
        let (state, requests, _) = drive(max_turns, &replies);
        prop_assert_eq!(requests, max_turns);
        let hit_limit = matches!(
            state,
            ConvState::Error { error: RunError::MaxTurnsExceeded { max_turns: m } } if m == max_turns
        );
        prop_assert!(hit_limit, "Expected turn limit, got {:?}", state);
    }

    // Invariant 3: terminal states reject every event
    #[test]
    fn prop_terminal_states_absorb(event in arb_event(), output in "[a-z]{1,10}") {
        let mut ctx = test_context(3);
        let done = ConvState::Done { output };
        prop_assert!(transition(&done, &mut ctx, event.clone()).is_err());

        let error = ConvState::Error { error: RunError::MaxTurnsExceeded { max_turns: 3 } };
        prop_assert!(transition(&error, &mut ctx, event).is_err());
    }

    // Invariant 4: the first recorded error is never replaced
    #[test]
    fn prop_last_error_set_once(events in proptest::collection::vec(arb_event(), 0..20)) {
        let mut ctx = test_context(3);
        let mut state = ConvState::ReadyToCallLlm;
        let mut first_error: Option<String> = None;

        for event in events {
            if let Ok(result) = transition(&state, &mut ctx, event) {
                state = result.new_state;
            }
            if let Some(err) = &ctx.last_error {
                let current = err.to_string();
                match &first_error {
                    Some(first) => prop_assert_eq!(first, &current),
                    None => first_error = Some(current),
                }
            }
            if let ConvState::Error { error } = &state {
                prop_assert_eq!(Some(error.to_string()), first_error.clone());
            }
        }
    }

    // Invariant 5: each tool batch appends exactly one tool message per call, in order
    #[test]
    fn prop_tool_messages_follow_call_order(calls in proptest::collection::vec(arb_tool_call(), 1..5)) {
        let mut ctx = test_context(5);
        ctx.current_turn = 1;
        let before = ctx.messages.len();
        let state = ConvState::ExecutingTools { calls: calls.clone() };

        let result = transition(&state, &mut ctx, Event::ToolsComplete { results: outcomes_for(&calls, "ok") });
        prop_assert!(result.is_ok());

        let ids: Vec<_> = ctx.messages[before..]
            .iter()
            .filter_map(|m| m.tool_call_id.clone())
            .collect();
        let expected: Vec<_> = calls.iter().map(|c| c.id.clone()).collect();
        prop_assert_eq!(ids, expected);
    }

    // Invariant 6: Done always carries non-empty output
    #[test]
    fn prop_done_output_non_empty(replies in proptest::collection::vec(arb_reply(), 0..6)) {
        let (state, _, _) = drive(5, &replies);
        if let ConvState::Done { output } = state {
            prop_assert!(!output.is_empty());
        }
    }
}
