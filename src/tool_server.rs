//! Connections to external tool servers
//!
//! Everything above this module sees a tool server only through
//! [`ToolConnection`]. Which transport carries the messages is decided once,
//! by [`TransportConnector`], from the configuration tag.

mod connection;
mod error;
mod http;
pub mod protocol;
mod sse;
mod stdio;
mod transport;

pub use connection::McpConnection;
pub use error::ToolServerError;
pub use protocol::{ServerCapabilities, ToolInfo, ToolResult};
pub use transport::RpcTransport;

use crate::config::{ToolServerConfig, TransportConfig};
use async_trait::async_trait;
use serde_json::{Map, Value};
use std::sync::Arc;
use std::time::Duration;

/// One live tool server
#[async_trait]
pub trait ToolConnection: Send + Sync {
    /// Configured name, used in logs
    fn name(&self) -> &str;

    async fn handshake(&self) -> Result<ServerCapabilities, ToolServerError>;

    /// Enumerate tools. A failure here leaves the connection usable.
    async fn list_tools(&self) -> Result<Vec<ToolInfo>, ToolServerError>;

    /// System-prompt text from the first zero-argument prompt whose messages
    /// include assistant text. Any failure degrades to `None`.
    async fn prompt_fragment(&self) -> Option<String>;

    async fn invoke(&self, tool: &str, arguments: Map<String, Value>) -> Result<ToolResult, ToolServerError>;

    async fn close(&self);
}

/// Opens connections from configuration entries
#[async_trait]
pub trait Connector: Send + Sync {
    async fn connect(&self, config: &ToolServerConfig) -> Result<Arc<dyn ToolConnection>, ToolServerError>;
}

/// Connector that opens real transports
pub struct TransportConnector {
    timeout: Duration,
}

impl TransportConnector {
    pub fn new(timeout: Duration) -> Self {
        Self { timeout }
    }
}

#[async_trait]
impl Connector for TransportConnector {
    async fn connect(&self, config: &ToolServerConfig) -> Result<Arc<dyn ToolConnection>, ToolServerError> {
        let name = config.name.as_str();
        let transport: Box<dyn RpcTransport> = match &config.transport {
            TransportConfig::Sse { url, headers } => {
                Box::new(sse::SseTransport::connect(name, url, headers, self.timeout).await?)
            }
            TransportConfig::StreamableHttp { url, headers } => {
                Box::new(http::StreamableHttpTransport::new(name, url, headers, self.timeout)?)
            }
            TransportConfig::Stdio { command, args, env } => {
                Box::new(stdio::StdioTransport::spawn(name, command, args, env, self.timeout)?)
            }
        };
        tracing::debug!(server = name, transport = config.transport.kind(), "Connected to tool server");
        Ok(Arc::new(McpConnection::new(name, transport)))
    }
}
