//! Conversation state types

use crate::llm::{ChatMessage, LlmError, LlmResponse, ToolCallRequest};
use thiserror::Error;

/// Conversation state
#[derive(Debug, Clone)]
pub enum ConvState {
    /// Next step is a completion request (initial state)
    ReadyToCallLlm,

    /// The model asked for these calls; results are pending
    ExecutingTools { calls: Vec<ToolCallRequest> },

    /// Terminal: the model produced final content
    Done { output: String },

    /// Terminal: the run failed
    Error { error: RunError },
}

impl ConvState {
    pub fn is_terminal(&self) -> bool {
        matches!(self, ConvState::Done { .. } | ConvState::Error { .. })
    }

    pub fn name(&self) -> &'static str {
        match self {
            ConvState::ReadyToCallLlm => "ready_to_call_llm",
            ConvState::ExecutingTools { .. } => "executing_tools",
            ConvState::Done { .. } => "done",
            ConvState::Error { .. } => "error",
        }
    }
}

/// Errors that end a run
#[derive(Debug, Clone, Error)]
pub enum RunError {
    #[error("maximum interaction turns exceeded: {max_turns}")]
    MaxTurnsExceeded { max_turns: usize },
    #[error("completion request failed: {0}")]
    Llm(LlmError),
    #[error("internal consistency error: {0}")]
    Inconsistent(String),
}

/// Per-run context, owned by exactly one run
#[derive(Debug, Clone)]
pub struct ConvContext {
    pub messages: Vec<ChatMessage>,
    pub last_response: Option<LlmResponse>,
    pub current_turn: usize,
    pub max_turns: usize,
    /// First fatal error of the run; never replaced once set
    pub last_error: Option<RunError>,
}

impl ConvContext {
    pub fn new(max_turns: usize) -> Self {
        Self {
            messages: Vec::new(),
            last_response: None,
            current_turn: 0,
            max_turns,
            last_error: None,
        }
    }

    /// Seed history: system prompt (if any), replayed turns, then the request
    pub fn seeded(
        max_turns: usize,
        system_prompt: &str,
        prior: impl IntoIterator<Item = ChatMessage>,
        input: &str,
    ) -> Self {
        let mut ctx = Self::new(max_turns);
        if !system_prompt.is_empty() {
            ctx.messages.push(ChatMessage::system(system_prompt));
        }
        ctx.messages.extend(prior);
        ctx.messages.push(ChatMessage::user(input));
        ctx
    }

    /// Record a fatal error, keeping the first one
    pub fn record_error(&mut self, error: RunError) -> RunError {
        self.last_error.get_or_insert(error).clone()
    }
}
