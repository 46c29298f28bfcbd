//! Mock implementations for testing
//!
//! These mocks enable integration testing without real I/O.

use crate::config::{ToolServerConfig, TransportConfig};
use crate::llm::{LlmError, LlmRequest, LlmResponse, LlmService};
use crate::tool_server::{Connector, ServerCapabilities, ToolConnection, ToolInfo, ToolResult, ToolServerError};
use async_trait::async_trait;
use serde_json::{json, Map, Value};
use std::collections::{HashMap, VecDeque};
use std::sync::{Arc, Mutex};

// ============================================================================
// Mock LLM Service
// ============================================================================

/// Mock completion service that returns queued responses
pub struct MockLlmService {
    responses: Mutex<VecDeque<Result<LlmResponse, LlmError>>>,
    model_id: String,
    /// Record of all requests made
    pub requests: Mutex<Vec<LlmRequest>>,
}

impl MockLlmService {
    pub fn new(model_id: impl Into<String>) -> Self {
        Self {
            responses: Mutex::new(VecDeque::new()),
            model_id: model_id.into(),
            requests: Mutex::new(Vec::new()),
        }
    }

    /// Queue a successful response
    pub fn queue_response(&self, response: LlmResponse) {
        self.responses.lock().unwrap().push_back(Ok(response));
    }

    /// Queue an error response
    pub fn queue_error(&self, error: LlmError) {
        self.responses.lock().unwrap().push_back(Err(error));
    }

    /// Get recorded requests
    pub fn recorded_requests(&self) -> Vec<LlmRequest> {
        self.requests.lock().unwrap().clone()
    }
}

#[async_trait]
impl LlmService for MockLlmService {
    async fn complete(&self, request: &LlmRequest) -> Result<LlmResponse, LlmError> {
        self.requests.lock().unwrap().push(request.clone());
        self.responses
            .lock()
            .unwrap()
            .pop_front()
            .unwrap_or_else(|| Err(LlmError::network("No mock response queued")))
    }

    fn model_id(&self) -> &str {
        &self.model_id
    }
}

// ============================================================================
// Mock Tool Connection
// ============================================================================

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Failure {
    None,
    Connect,
    Handshake,
    List,
}

/// Mock tool server with canned tool results
pub struct MockToolConnection {
    name: String,
    tools: Vec<ToolInfo>,
    results: HashMap<String, Result<ToolResult, ToolServerError>>,
    prompt: Option<String>,
    prompt_capability: bool,
    failure: Failure,
    invocations: Mutex<Vec<(String, Value)>>,
    closes: Mutex<usize>,
}

impl MockToolConnection {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            tools: Vec::new(),
            results: HashMap::new(),
            prompt: None,
            prompt_capability: false,
            failure: Failure::None,
            invocations: Mutex::new(Vec::new()),
            closes: Mutex::new(0),
        }
    }

    /// Add a tool that always returns `result`
    pub fn with_tool(mut self, tool: impl Into<String>, result: ToolResult) -> Self {
        let tool = tool.into();
        self.tools.push(ToolInfo {
            name: tool.clone(),
            description: Some(format!("Mock {tool}")),
            input_schema: Some(json!({ "type": "object", "properties": {} })),
        });
        self.results.insert(tool, Ok(result));
        self
    }

    /// Add a tool whose invocation fails at the transport level
    pub fn with_failing_tool(mut self, tool: impl Into<String>, error: ToolServerError) -> Self {
        let tool = tool.into();
        self.tools.push(ToolInfo {
            name: tool.clone(),
            description: None,
            input_schema: None,
        });
        self.results.insert(tool, Err(error));
        self
    }

    /// Offer a system-prompt fragment (and advertise prompt support)
    pub fn with_prompt(mut self, fragment: impl Into<String>) -> Self {
        self.prompt = Some(fragment.into());
        self.prompt_capability = true;
        self
    }

    pub fn without_prompt_capability(mut self) -> Self {
        self.prompt_capability = false;
        self
    }

    pub fn failing_connect(mut self) -> Self {
        self.failure = Failure::Connect;
        self
    }

    pub fn failing_handshake(mut self) -> Self {
        self.failure = Failure::Handshake;
        self
    }

    pub fn failing_list(mut self) -> Self {
        self.failure = Failure::List;
        self
    }

    /// Recorded `(tool, arguments)` pairs
    pub fn invocations(&self) -> Vec<(String, Value)> {
        self.invocations.lock().unwrap().clone()
    }

    pub fn close_count(&self) -> usize {
        *self.closes.lock().unwrap()
    }
}

#[async_trait]
impl ToolConnection for MockToolConnection {
    fn name(&self) -> &str {
        &self.name
    }

    async fn handshake(&self) -> Result<ServerCapabilities, ToolServerError> {
        if self.failure == Failure::Handshake {
            return Err(ToolServerError::Protocol("mock handshake failure".to_string()));
        }
        Ok(ServerCapabilities {
            tools: Some(json!({})),
            prompts: self.prompt_capability.then(|| json!({})),
        })
    }

    async fn list_tools(&self) -> Result<Vec<ToolInfo>, ToolServerError> {
        if self.failure == Failure::List {
            return Err(ToolServerError::Server {
                code: -32601,
                message: "Method not found".to_string(),
            });
        }
        Ok(self.tools.clone())
    }

    async fn prompt_fragment(&self) -> Option<String> {
        self.prompt.clone()
    }

    async fn invoke(&self, tool: &str, arguments: Map<String, Value>) -> Result<ToolResult, ToolServerError> {
        self.invocations
            .lock()
            .unwrap()
            .push((tool.to_string(), Value::Object(arguments)));
        match self.results.get(tool) {
            Some(result) => result.clone(),
            None => Err(ToolServerError::Server {
                code: -32602,
                message: format!("Unknown tool: {tool}"),
            }),
        }
    }

    async fn close(&self) {
        *self.closes.lock().unwrap() += 1;
    }
}

// ============================================================================
// Mock Connector
// ============================================================================

/// Connector handing out mock connections by configured name
#[derive(Default)]
pub struct MockConnector {
    connections: Vec<Arc<MockToolConnection>>,
}

impl MockConnector {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with(mut self, conn: MockToolConnection) -> Self {
        self.connections.push(Arc::new(conn));
        self
    }

    /// One configuration entry per connection, in the order added
    pub fn configs(&self) -> Vec<ToolServerConfig> {
        self.connections
            .iter()
            .map(|conn| ToolServerConfig {
                name: conn.name.clone(),
                transport: TransportConfig::Stdio {
                    command: "mock".to_string(),
                    args: vec![],
                    env: HashMap::new(),
                },
            })
            .collect()
    }

    pub fn connection(&self, name: &str) -> Arc<MockToolConnection> {
        self.connections
            .iter()
            .find(|conn| conn.name == name)
            .cloned()
            .unwrap_or_else(|| panic!("no mock connection named {name}"))
    }
}

#[async_trait]
impl Connector for MockConnector {
    async fn connect(&self, config: &ToolServerConfig) -> Result<Arc<dyn ToolConnection>, ToolServerError> {
        let conn = self.connection(&config.name);
        if conn.failure == Failure::Connect {
            return Err(ToolServerError::connect(&config.name, "mock connect failure"));
        }
        Ok(conn)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::llm::ChatMessage;

    #[tokio::test]
    async fn test_mock_llm_service() {
        let mock = MockLlmService::new("test-model");
        mock.queue_response(LlmResponse::text("Hello"));

        let request = LlmRequest {
            messages: vec![ChatMessage::user("hi")],
            tools: vec![],
        };

        let response = mock.complete(&request).await.unwrap();
        assert_eq!(response.final_text(), Some("Hello"));

        // Second call should fail (no more responses)
        let result = mock.complete(&request).await;
        assert!(result.is_err());
        assert_eq!(mock.recorded_requests().len(), 2);
    }

    #[tokio::test]
    async fn test_mock_tool_connection() {
        let conn = MockToolConnection::new("srv")
            .with_tool("echo", ToolResult::text("pong"))
            .with_failing_tool("down", ToolServerError::Closed);

        let result = conn.invoke("echo", Map::new()).await.unwrap();
        assert_eq!(result.into_output(), "pong");
        assert!(matches!(conn.invoke("down", Map::new()).await, Err(ToolServerError::Closed)));
        assert!(conn.invoke("nope", Map::new()).await.is_err());
        assert_eq!(conn.invocations().len(), 3);
    }
}
