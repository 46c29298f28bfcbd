//! Events that drive a conversation

use crate::llm::{LlmError, LlmResponse};

/// Events that trigger state transitions
#[derive(Debug, Clone)]
pub enum Event {
    /// Run begins
    Start,

    // Completion events
    LlmResponse { response: LlmResponse },
    LlmError { error: LlmError },

    /// Every call of the current batch has produced output, in request order
    ToolsComplete { results: Vec<ToolOutcome> },
}

impl Event {
    pub fn name(&self) -> &'static str {
        match self {
            Event::Start => "start",
            Event::LlmResponse { .. } => "llm_response",
            Event::LlmError { .. } => "llm_error",
            Event::ToolsComplete { .. } => "tools_complete",
        }
    }
}

/// Output of one tool call, already reduced to text for the model
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ToolOutcome {
    pub tool_call_id: String,
    pub output: String,
}

impl ToolOutcome {
    pub fn new(tool_call_id: impl Into<String>, output: impl Into<String>) -> Self {
        Self {
            tool_call_id: tool_call_id.into(),
            output: output.into(),
        }
    }
}
