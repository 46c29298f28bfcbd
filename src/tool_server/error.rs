//! Tool server error types

use std::time::Duration;
use thiserror::Error;

#[derive(Debug, Clone, Error)]
pub enum ToolServerError {
    #[error("failed to connect to {server}: {message}")]
    Connect { server: String, message: String },
    #[error("server error {code}: {message}")]
    Server { code: i64, message: String },
    #[error("protocol error: {0}")]
    Protocol(String),
    #[error("transport error: {0}")]
    Transport(String),
    #[error("request timed out after {0:?}")]
    Timeout(Duration),
    #[error("connection closed")]
    Closed,
}

impl ToolServerError {
    pub fn connect(server: impl Into<String>, message: impl Into<String>) -> Self {
        Self::Connect {
            server: server.into(),
            message: message.into(),
        }
    }
}

impl From<serde_json::Error> for ToolServerError {
    fn from(e: serde_json::Error) -> Self {
        Self::Protocol(e.to_string())
    }
}

impl From<std::io::Error> for ToolServerError {
    fn from(e: std::io::Error) -> Self {
        Self::Transport(e.to_string())
    }
}

impl From<reqwest::Error> for ToolServerError {
    fn from(e: reqwest::Error) -> Self {
        Self::Transport(e.to_string())
    }
}
