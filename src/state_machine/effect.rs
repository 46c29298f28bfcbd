//! Effects produced by state transitions

use crate::llm::ToolCallRequest;

/// Effects to be executed after a state transition
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Effect {
    /// Send the current history and tool catalog to the completion endpoint
    RequestLlm,

    /// Run these calls one at a time, in order
    ExecuteTools { calls: Vec<ToolCallRequest> },
}

impl Effect {
    pub fn execute_tools(calls: Vec<ToolCallRequest>) -> Self {
        Effect::ExecuteTools { calls }
    }
}
