//! Protocol-level operations on top of any [`RpcTransport`]

use super::protocol::{
    call_params, initialize_params, GetPromptResult, InitializeResult, ListPromptsResult,
    ListToolsResult, ServerCapabilities, ToolInfo, ToolResult,
};
use super::transport::RpcTransport;
use super::{ToolConnection, ToolServerError};
use async_trait::async_trait;
use serde_json::{json, Map, Value};

const CLIENT_NAME: &str = "switchboard";

/// A tool server reached through one transport
pub struct McpConnection {
    name: String,
    transport: Box<dyn RpcTransport>,
}

impl McpConnection {
    pub fn new(name: impl Into<String>, transport: Box<dyn RpcTransport>) -> Self {
        Self {
            name: name.into(),
            transport,
        }
    }

    async fn find_prompt_fragment(&self) -> Result<Option<String>, ToolServerError> {
        let listed: ListPromptsResult =
            serde_json::from_value(self.transport.request("prompts/list", Some(json!({}))).await?)?;

        for prompt in listed.prompts.iter().filter(|p| p.takes_no_arguments()) {
            let got = match self.get_prompt(&prompt.name).await {
                Ok(got) => got,
                Err(e) => {
                    tracing::warn!(server = %self.name, prompt = %prompt.name, error = %e, "Failed to get prompt");
                    continue;
                }
            };
            if let Some(text) = got.first_assistant_text() {
                tracing::debug!(server = %self.name, prompt = %prompt.name, "Found system prompt fragment");
                return Ok(Some(text.to_string()));
            }
        }
        Ok(None)
    }

    async fn get_prompt(&self, name: &str) -> Result<GetPromptResult, ToolServerError> {
        let raw = self
            .transport
            .request("prompts/get", Some(json!({ "name": name })))
            .await?;
        Ok(serde_json::from_value(raw)?)
    }
}

#[async_trait]
impl ToolConnection for McpConnection {
    fn name(&self) -> &str {
        &self.name
    }

    async fn handshake(&self) -> Result<ServerCapabilities, ToolServerError> {
        let params = initialize_params(CLIENT_NAME, env!("CARGO_PKG_VERSION"));
        let raw = self.transport.request("initialize", Some(params)).await?;
        let init: InitializeResult = serde_json::from_value(raw)?;
        self.transport.notify("notifications/initialized", None).await?;

        if let Some(info) = &init.server_info {
            tracing::info!(
                server = %self.name,
                remote_name = %info.name,
                remote_version = info.version.as_deref().unwrap_or("unknown"),
                tools = init.capabilities.tools.is_some(),
                prompts = init.capabilities.supports_prompts(),
                "Tool server handshake complete"
            );
        }
        Ok(init.capabilities)
    }

    async fn list_tools(&self) -> Result<Vec<ToolInfo>, ToolServerError> {
        let mut tools = Vec::new();
        let mut cursor: Option<String> = None;
        loop {
            let params = match &cursor {
                Some(c) => json!({ "cursor": c }),
                None => json!({}),
            };
            let page: ListToolsResult =
                serde_json::from_value(self.transport.request("tools/list", Some(params)).await?)?;
            tools.extend(page.tools);
            match page.next_cursor {
                Some(next) if Some(&next) != cursor.as_ref() => cursor = Some(next),
                _ => break,
            }
        }
        Ok(tools)
    }

    async fn prompt_fragment(&self) -> Option<String> {
        match self.find_prompt_fragment().await {
            Ok(fragment) => fragment,
            Err(e) => {
                tracing::warn!(server = %self.name, error = %e, "Prompt discovery failed");
                None
            }
        }
    }

    async fn invoke(&self, tool: &str, arguments: Map<String, Value>) -> Result<ToolResult, ToolServerError> {
        let raw = self
            .transport
            .request("tools/call", Some(call_params(tool, arguments)))
            .await?;
        ToolResult::from_value(raw)
    }

    async fn close(&self) {
        if let Err(e) = self.transport.shutdown().await {
            tracing::warn!(server = %self.name, error = %e, "Failed to close tool server");
        }
    }
}
