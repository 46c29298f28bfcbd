//! JSON-RPC envelopes and the tool protocol payloads carried inside them

use super::ToolServerError;
use serde::{Deserialize, Serialize};
use serde_json::{json, Map, Value};

pub const JSONRPC_VERSION: &str = "2.0";
pub const PROTOCOL_VERSION: &str = "2024-11-05";

/// Output used when a failed call carries no text at all
pub const GENERIC_TOOL_FAILURE: &str = "tool execution failed";

#[derive(Debug, Serialize)]
pub struct JsonRpcRequest<'a> {
    pub jsonrpc: &'static str,
    pub id: u64,
    pub method: &'a str,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub params: Option<Value>,
}

impl<'a> JsonRpcRequest<'a> {
    pub fn new(id: u64, method: &'a str, params: Option<Value>) -> Self {
        Self {
            jsonrpc: JSONRPC_VERSION,
            id,
            method,
            params,
        }
    }
}

#[derive(Debug, Serialize)]
pub struct JsonRpcNotification<'a> {
    pub jsonrpc: &'static str,
    pub method: &'a str,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub params: Option<Value>,
}

impl<'a> JsonRpcNotification<'a> {
    pub fn new(method: &'a str, params: Option<Value>) -> Self {
        Self {
            jsonrpc: JSONRPC_VERSION,
            method,
            params,
        }
    }
}

/// Any inbound message. Server-initiated requests and notifications also
/// parse into this shape; they carry a `method` and are ignored by callers.
#[derive(Debug, Deserialize)]
pub struct JsonRpcResponse {
    #[serde(default)]
    pub id: Option<Value>,
    #[serde(default)]
    pub method: Option<String>,
    #[serde(default)]
    pub result: Option<Value>,
    #[serde(default)]
    pub error: Option<JsonRpcError>,
}

impl JsonRpcResponse {
    /// Numeric id of a reply; `None` for notifications and server requests
    pub fn reply_id(&self) -> Option<u64> {
        if self.method.is_some() {
            return None;
        }
        match self.id.as_ref()? {
            Value::Number(n) => n.as_u64(),
            Value::String(s) => s.parse().ok(),
            _ => None,
        }
    }

    /// Unwrap the payload, turning an `error` member into a server error
    pub fn into_result(self) -> Result<Value, ToolServerError> {
        if let Some(error) = self.error {
            return Err(ToolServerError::Server {
                code: error.code,
                message: error.message,
            });
        }
        self.result
            .ok_or_else(|| ToolServerError::Protocol("response has neither result nor error".to_string()))
    }
}

#[derive(Debug, Deserialize)]
pub struct JsonRpcError {
    pub code: i64,
    pub message: String,
}

pub fn initialize_params(client_name: &str, client_version: &str) -> Value {
    json!({
        "protocolVersion": PROTOCOL_VERSION,
        "capabilities": {},
        "clientInfo": {
            "name": client_name,
            "version": client_version,
        }
    })
}

/// Capabilities announced by the server during the handshake
#[derive(Debug, Clone, Default, Deserialize)]
pub struct ServerCapabilities {
    #[serde(default)]
    pub tools: Option<Value>,
    #[serde(default)]
    pub prompts: Option<Value>,
}

impl ServerCapabilities {
    pub fn supports_prompts(&self) -> bool {
        self.prompts.as_ref().is_some_and(|p| !p.is_null())
    }
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct InitializeResult {
    #[serde(default)]
    pub capabilities: ServerCapabilities,
    #[serde(default)]
    pub server_info: Option<ServerInfo>,
}

#[derive(Debug, Deserialize)]
pub struct ServerInfo {
    pub name: String,
    #[serde(default)]
    pub version: Option<String>,
}

/// A tool as listed by a server, before schema normalization
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ToolInfo {
    pub name: String,
    #[serde(default)]
    pub description: Option<String>,
    #[serde(default)]
    pub input_schema: Option<Value>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ListToolsResult {
    #[serde(default)]
    pub tools: Vec<ToolInfo>,
    #[serde(default)]
    pub next_cursor: Option<String>,
}

#[derive(Debug, Deserialize)]
pub struct PromptInfo {
    pub name: String,
    #[serde(default)]
    pub arguments: Option<Vec<Value>>,
}

impl PromptInfo {
    pub fn takes_no_arguments(&self) -> bool {
        self.arguments.as_ref().is_none_or(Vec::is_empty)
    }
}

#[derive(Debug, Deserialize)]
pub struct ListPromptsResult {
    #[serde(default)]
    pub prompts: Vec<PromptInfo>,
}

#[derive(Debug, Deserialize)]
pub struct GetPromptResult {
    #[serde(default)]
    pub messages: Vec<PromptMessage>,
}

impl GetPromptResult {
    /// Text of the first assistant message that carries text content
    pub fn first_assistant_text(&self) -> Option<&str> {
        self.messages
            .iter()
            .filter(|m| m.role == "assistant")
            .find_map(|m| text_of(&m.content))
    }
}

#[derive(Debug, Deserialize)]
pub struct PromptMessage {
    pub role: String,
    pub content: Value,
}

/// Text of a content part, if it is a non-empty `text` part
fn text_of(part: &Value) -> Option<&str> {
    if part.get("type").and_then(Value::as_str) != Some("text") {
        return None;
    }
    part.get("text").and_then(Value::as_str).filter(|t| !t.is_empty())
}

/// Result of `tools/call`
#[derive(Debug, Clone)]
pub struct ToolResult {
    pub is_error: bool,
    pub content: Vec<Value>,
    raw: Value,
}

impl ToolResult {
    pub fn from_value(raw: Value) -> Result<Self, ToolServerError> {
        let Value::Object(map) = &raw else {
            return Err(ToolServerError::Protocol("tool result is not an object".to_string()));
        };
        let is_error = map.get("isError").and_then(Value::as_bool).unwrap_or(false);
        let content = match map.get("content") {
            Some(Value::Array(parts)) => parts.clone(),
            _ => Vec::new(),
        };
        Ok(Self {
            is_error,
            content,
            raw,
        })
    }

    /// Build a successful text result
    #[cfg(test)]
    pub fn text(text: impl Into<String>) -> Self {
        Self::with_text(false, text.into())
    }

    /// Build an error result carrying text
    #[cfg(test)]
    pub fn error_text(text: impl Into<String>) -> Self {
        Self::with_text(true, text.into())
    }

    #[cfg(test)]
    fn with_text(is_error: bool, text: String) -> Self {
        let part = json!({"type": "text", "text": text});
        let raw = json!({"content": [part.clone()], "isError": is_error});
        Self {
            is_error,
            content: vec![part],
            raw,
        }
    }

    pub fn first_text(&self) -> Option<&str> {
        self.content.iter().find_map(text_of)
    }

    /// The string handed back to the model for this result.
    ///
    /// Never empty: the first text part, else a generic failure for error
    /// results, else the whole result serialized.
    pub fn into_output(self) -> String {
        if let Some(text) = self.first_text() {
            return text.to_string();
        }
        if self.is_error {
            return GENERIC_TOOL_FAILURE.to_string();
        }
        serde_json::to_string(&self.raw).unwrap_or_else(|_| self.raw.to_string())
    }
}

/// Parameters for `tools/call`
pub fn call_params(name: &str, arguments: Map<String, Value>) -> Value {
    json!({
        "name": name,
        "arguments": Value::Object(arguments),
    })
}
