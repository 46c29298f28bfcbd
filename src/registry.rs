//! Tool registry built once at startup
//!
//! Servers are processed strictly in configuration order, so when two
//! servers expose the same tool name the first one keeps it. After
//! [`ToolRegistry::build`] returns the registry is never mutated and is
//! shared behind an `Arc`.

use crate::config::ToolServerConfig;
use crate::llm::ToolDefinition;
use crate::tool_server::{Connector, ToolConnection, ToolInfo};
use serde_json::{json, Value};
use std::collections::HashMap;
use std::sync::Arc;

pub struct ToolRegistry {
    routes: HashMap<String, Arc<dyn ToolConnection>>,
    catalog: Vec<ToolDefinition>,
    prompt_fragments: Vec<String>,
    connections: Vec<Arc<dyn ToolConnection>>,
}

impl ToolRegistry {
    /// A registry with no connections
    pub fn empty() -> Self {
        Self {
            routes: HashMap::new(),
            catalog: Vec::new(),
            prompt_fragments: Vec::new(),
            connections: Vec::new(),
        }
    }

    /// Connect to every configured server in order. Failures are logged and
    /// the entry skipped; this never fails as a whole.
    pub async fn build(configs: &[ToolServerConfig], connector: &dyn Connector) -> Self {
        let mut registry = Self::empty();

        for config in configs {
            let server = config.name.as_str();

            let conn = match connector.connect(config).await {
                Ok(conn) => conn,
                Err(e) => {
                    tracing::error!(server, error = %e, "Failed to connect to tool server, skipping");
                    continue;
                }
            };

            let capabilities = match conn.handshake().await {
                Ok(caps) => caps,
                Err(e) => {
                    tracing::error!(server, error = %e, "Tool server handshake failed, skipping");
                    conn.close().await;
                    continue;
                }
            };

            if capabilities.supports_prompts() {
                if let Some(fragment) = conn.prompt_fragment().await {
                    registry.prompt_fragments.push(fragment);
                }
            }

            match conn.list_tools().await {
                Ok(tools) => registry.register(&conn, tools),
                Err(e) => {
                    tracing::warn!(server, error = %e, "Tool discovery failed; connection kept");
                }
            }

            registry.connections.push(conn);
        }

        tracing::info!(
            servers = registry.connections.len(),
            tools = registry.catalog.len(),
            prompt_fragments = registry.prompt_fragments.len(),
            "Tool registry ready"
        );
        registry
    }

    fn register(&mut self, conn: &Arc<dyn ToolConnection>, tools: Vec<ToolInfo>) {
        let server = conn.name();
        for tool in tools {
            if let Some(owner) = self.routes.get(&tool.name) {
                tracing::warn!(
                    tool = %tool.name,
                    server,
                    owner = owner.name(),
                    "Duplicate tool name, keeping first registration"
                );
                continue;
            }
            tracing::debug!(tool = %tool.name, server, "Registered tool");
            self.catalog.push(ToolDefinition {
                name: tool.name.clone(),
                description: tool.description.unwrap_or_default(),
                input_schema: normalize_schema(tool.input_schema),
            });
            self.routes.insert(tool.name, Arc::clone(conn));
        }
    }

    /// Connection owning `tool`
    pub fn lookup(&self, tool: &str) -> Option<&Arc<dyn ToolConnection>> {
        self.routes.get(tool)
    }

    /// Tool catalog in registration order
    pub fn catalog(&self) -> &[ToolDefinition] {
        &self.catalog
    }

    /// Discovered system-prompt fragments in configuration order
    pub fn prompt_fragments(&self) -> &[String] {
        &self.prompt_fragments
    }

    /// True when no tool at all has been registered
    pub fn is_empty(&self) -> bool {
        self.routes.is_empty()
    }

    pub fn connection_count(&self) -> usize {
        self.connections.len()
    }

    pub async fn close_all(&self) {
        for conn in &self.connections {
            conn.close().await;
        }
    }
}

fn empty_object_schema() -> Value {
    json!({ "type": "object", "properties": {} })
}

/// Always hand the model a non-empty object schema
fn normalize_schema(schema: Option<Value>) -> Value {
    match schema {
        Some(Value::Object(map)) if !map.is_empty() => Value::Object(map),
        // Some servers send the schema as a JSON string
        Some(Value::String(raw)) => match serde_json::from_str::<Value>(&raw) {
            Ok(Value::Object(map)) if !map.is_empty() => Value::Object(map),
            _ => empty_object_schema(),
        },
        _ => empty_object_schema(),
    }
}
