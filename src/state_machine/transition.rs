//! Pure state transition function
//!
//! Given the same state, context and event, `transition` always produces the
//! same result and performs no I/O. The only mutation is to the run's own
//! context (history, turn counter, recorded error).

use super::{ConvContext, ConvState, Effect, Event, RunError, ToolOutcome};
use crate::llm::{ChatMessage, LlmResponse};
use thiserror::Error;

/// Result of a state transition
#[derive(Debug)]
pub struct TransitionResult {
    pub new_state: ConvState,
    pub effects: Vec<Effect>,
}

impl TransitionResult {
    pub fn new(state: ConvState) -> Self {
        Self {
            new_state: state,
            effects: vec![],
        }
    }

    pub fn with_effect(mut self, effect: Effect) -> Self {
        self.effects.push(effect);
        self
    }

}

/// Errors that can occur during transition
#[derive(Debug, Error)]
pub enum TransitionError {
    #[error("Conversation already finished ({0})")]
    AlreadyFinished(&'static str),
    #[error("Invalid transition: {0}")]
    InvalidTransition(String),
}

/// Pure transition function
pub fn transition(
    state: &ConvState,
    ctx: &mut ConvContext,
    event: Event,
) -> Result<TransitionResult, TransitionError> {
    match (state, event) {
        // Terminal states accept nothing
        (ConvState::Done { .. } | ConvState::Error { .. }, _) => {
            Err(TransitionError::AlreadyFinished(state.name()))
        }

        // ============================================================
        // Completion round trip
        // ============================================================

        (ConvState::ReadyToCallLlm, Event::Start) => Ok(request_llm(ctx)),

        // Response with tool calls -> ExecutingTools
        (ConvState::ReadyToCallLlm, Event::LlmResponse { response }) if response.has_tool_calls() => {
            let calls = response.tool_calls.clone();
            ctx.messages.push(ChatMessage::assistant_tool_calls(
                response.content.clone().unwrap_or_default(),
                calls.clone(),
            ));
            ctx.last_response = Some(response);

            Ok(TransitionResult::new(ConvState::ExecutingTools {
                calls: calls.clone(),
            })
            .with_effect(Effect::execute_tools(calls)))
        }

        // Plain response -> Done
        (ConvState::ReadyToCallLlm, Event::LlmResponse { response }) => {
            ctx.last_response = Some(response);
            Ok(finish(ctx))
        }

        (ConvState::ReadyToCallLlm, Event::LlmError { error }) => Ok(fail(ctx, RunError::Llm(error))),

        // ============================================================
        // Tool results
        // ============================================================

        // Every batch goes back to the model, even if every call failed
        (ConvState::ExecutingTools { calls }, Event::ToolsComplete { results }) => {
            check_results_match(calls, &results)?;
            ctx.messages.extend(
                results
                    .into_iter()
                    .map(|r| ChatMessage::tool(r.tool_call_id, r.output)),
            );
            Ok(request_llm(ctx))
        }

        (state, event) => Err(TransitionError::InvalidTransition(format!(
            "{} in state {}",
            event.name(),
            state.name()
        ))),
    }
}

/// Turn guard, evaluated before every completion request
fn request_llm(ctx: &mut ConvContext) -> TransitionResult {
    if ctx.current_turn >= ctx.max_turns {
        return fail(
            ctx,
            RunError::MaxTurnsExceeded {
                max_turns: ctx.max_turns,
            },
        );
    }
    ctx.current_turn += 1;
    TransitionResult::new(ConvState::ReadyToCallLlm).with_effect(Effect::RequestLlm)
}

/// Enter `Done`, or `Error` if the last response cannot end the run
fn finish(ctx: &mut ConvContext) -> TransitionResult {
    let output = match ctx.last_response.as_ref().map(final_output) {
        Some(Ok(output)) => output,
        Some(Err(reason)) => return fail(ctx, RunError::Inconsistent(reason)),
        None => {
            return fail(
                ctx,
                RunError::Inconsistent("no completion response recorded".to_string()),
            )
        }
    };
    ctx.messages.push(ChatMessage::assistant(output.clone()));
    TransitionResult::new(ConvState::Done { output })
}

fn final_output(response: &LlmResponse) -> Result<String, String> {
    if response.has_tool_calls() {
        return Err(format!(
            "final response still has {} pending tool call(s)",
            response.tool_calls.len()
        ));
    }
    response
        .final_text()
        .map(str::to_string)
        .ok_or_else(|| "completion returned no content".to_string())
}

fn fail(ctx: &mut ConvContext, error: RunError) -> TransitionResult {
    let error = ctx.record_error(error);
    TransitionResult::new(ConvState::Error { error })
}

fn check_results_match(
    calls: &[crate::llm::ToolCallRequest],
    results: &[ToolOutcome],
) -> Result<(), TransitionError> {
    let matches = calls.len() == results.len()
        && calls
            .iter()
            .zip(results)
            .all(|(call, result)| call.id == result.tool_call_id);
    if matches {
        Ok(())
    } else {
        Err(TransitionError::InvalidTransition(format!(
            "expected results for {} call(s) in request order, got {}",
            calls.len(),
            results.len()
        )))
    }
}
