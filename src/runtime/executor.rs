//! Conversation runtime executor
//!
//! Drives one run from `Start` to a terminal state: feed an event to the
//! pure transition function, execute the effects it asks for, and turn the
//! effect outcomes back into events.

use super::dispatch::dispatch_all;
use crate::llm::{ChatMessage, LlmRequest, LlmService};
use crate::registry::ToolRegistry;
use crate::state_machine::{transition, ConvContext, ConvState, Effect, Event, RunError};
use crate::system_prompt::build_system_prompt;
use std::sync::Arc;

/// Shared, read-only orchestration core. Each `run` owns its own context.
pub struct ConversationRuntime {
    llm: Arc<dyn LlmService>,
    registry: Arc<ToolRegistry>,
    system_prompt: String,
    max_turns: usize,
}

/// What a successful run produced
#[derive(Debug)]
pub struct RunOutput {
    pub output: String,
    /// Completion requests made
    pub turns: usize,
    /// Full history, system prompt first
    pub messages: Vec<ChatMessage>,
}

impl ConversationRuntime {
    pub fn new(
        llm: Arc<dyn LlmService>,
        registry: Arc<ToolRegistry>,
        configured_prompt: Option<&str>,
        max_turns: usize,
    ) -> Self {
        let system_prompt = build_system_prompt(configured_prompt, registry.prompt_fragments());
        Self {
            llm,
            registry,
            system_prompt,
            max_turns,
        }
    }

    pub fn system_prompt(&self) -> &str {
        &self.system_prompt
    }

    /// Answer `input`, with `prior` replayed between the system prompt and it
    pub async fn run(
        &self,
        session_id: &str,
        input: &str,
        prior: Vec<ChatMessage>,
    ) -> Result<RunOutput, RunError> {
        tracing::info!(session_id, model = self.llm.model_id(), "Starting run");

        let mut ctx = ConvContext::seeded(self.max_turns, &self.system_prompt, prior, input);
        let mut state = ConvState::ReadyToCallLlm;
        let mut events = vec![Event::Start];

        // Process events in a loop - no recursion
        while let Some(event) = events.pop() {
            let event_name = event.name();
            let result = transition(&state, &mut ctx, event).map_err(|e| {
                tracing::error!(session_id, event = event_name, error = %e, "Rejected transition");
                RunError::Inconsistent(e.to_string())
            })?;

            tracing::debug!(
                session_id,
                event = event_name,
                from = state.name(),
                to = result.new_state.name(),
                terminal = result.new_state.is_terminal(),
                turn = ctx.current_turn,
                "Transition"
            );
            state = result.new_state;

            for effect in result.effects {
                let next = self.execute_effect(session_id, effect, &ctx).await;
                events.push(next);
            }
        }

        match state {
            ConvState::Done { output } => {
                tracing::info!(session_id, turns = ctx.current_turn, "Run completed");
                Ok(RunOutput {
                    output,
                    turns: ctx.current_turn,
                    messages: ctx.messages,
                })
            }
            ConvState::Error { error } => {
                tracing::error!(session_id, turns = ctx.current_turn, error = %error, "Run failed");
                Err(error)
            }
            other => Err(RunError::Inconsistent(format!(
                "run stopped in non-terminal state {}",
                other.name()
            ))),
        }
    }

    async fn execute_effect(&self, session_id: &str, effect: Effect, ctx: &ConvContext) -> Event {
        match effect {
            Effect::RequestLlm => {
                let request = LlmRequest {
                    messages: ctx.messages.clone(),
                    tools: self.registry.catalog().to_vec(),
                };
                match self.llm.complete(&request).await {
                    Ok(response) => Event::LlmResponse { response },
                    Err(error) => Event::LlmError { error },
                }
            }
            Effect::ExecuteTools { calls } => {
                tracing::info!(session_id, count = calls.len(), "Executing tool calls");
                let results = dispatch_all(&self.registry, &calls).await;
                Event::ToolsComplete { results }
            }
        }
    }
}
