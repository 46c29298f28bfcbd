//! API request and response types

use serde::{Deserialize, Serialize};

/// Inference request
#[derive(Debug, Deserialize)]
pub struct InferenceRequest {
    /// Generated when absent
    #[serde(default)]
    pub session_id: Option<String>,
    pub input: String,
}

/// Inference response
#[derive(Debug, Serialize, Deserialize)]
pub struct InferenceResponse {
    pub session_id: String,
    pub output: String,
}

/// One entry of the tool catalog
#[derive(Debug, Serialize, Deserialize)]
pub struct ToolSummary {
    pub name: String,
    pub description: String,
}

/// Response for the tool listing
#[derive(Debug, Serialize, Deserialize)]
pub struct ToolsResponse {
    pub tools: Vec<ToolSummary>,
    pub servers: usize,
    pub prompt_fragments: usize,
}

/// Error response
#[derive(Debug, Serialize, Deserialize)]
pub struct ErrorResponse {
    pub error: String,
}

impl ErrorResponse {
    pub fn new(message: impl Into<String>) -> Self {
        Self {
            error: message.into(),
        }
    }
}
