//! Message transport seam shared by the three connection flavors

use super::ToolServerError;
use async_trait::async_trait;
use reqwest::header::{HeaderMap, HeaderName, HeaderValue};
use serde_json::Value;
use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};

/// Moves JSON-RPC messages to and from one tool server
#[async_trait]
pub trait RpcTransport: Send + Sync {
    /// Send a request and wait for the matching reply's `result`
    async fn request(&self, method: &str, params: Option<Value>) -> Result<Value, ToolServerError>;

    /// Send a notification; no reply is expected
    async fn notify(&self, method: &str, params: Option<Value>) -> Result<(), ToolServerError>;

    /// Release the underlying process, socket or session
    async fn shutdown(&self) -> Result<(), ToolServerError>;
}

/// Monotonic request ids, starting at 1
#[derive(Debug)]
pub struct RequestIds(AtomicU64);

impl RequestIds {
    pub fn new() -> Self {
        Self(AtomicU64::new(1))
    }

    pub fn next(&self) -> u64 {
        self.0.fetch_add(1, Ordering::Relaxed)
    }
}

impl Default for RequestIds {
    fn default() -> Self {
        Self::new()
    }
}

/// Convert configured header pairs into a `HeaderMap`
pub fn header_map(server: &str, headers: &HashMap<String, String>) -> Result<HeaderMap, ToolServerError> {
    let mut map = HeaderMap::new();
    for (name, value) in headers {
        let name = HeaderName::from_bytes(name.as_bytes())
            .map_err(|e| ToolServerError::connect(server, format!("invalid header name {name}: {e}")))?;
        let value = HeaderValue::from_str(value)
            .map_err(|e| ToolServerError::connect(server, format!("invalid value for header {name}: {e}")))?;
        map.insert(name, value);
    }
    Ok(map)
}
