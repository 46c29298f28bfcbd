//! Streamable HTTP transport: every message is a POST, replies come back as
//! plain JSON or as an event stream on the same response

use super::protocol::{JsonRpcNotification, JsonRpcRequest, JsonRpcResponse};
use super::transport::{header_map, RequestIds, RpcTransport};
use super::ToolServerError;
use async_trait::async_trait;
use eventsource_stream::Eventsource;
use futures::StreamExt;
use reqwest::header::{HeaderMap, ACCEPT, CONTENT_TYPE};
use reqwest::{Client, Response};
use serde::Serialize;
use serde_json::Value;
use std::collections::HashMap;
use std::time::Duration;
use tokio::sync::Mutex;

const SESSION_HEADER: &str = "mcp-session-id";
const ACCEPT_BOTH: &str = "application/json, text/event-stream";

pub struct StreamableHttpTransport {
    server: String,
    client: Client,
    url: String,
    headers: HeaderMap,
    ids: RequestIds,
    session_id: Mutex<Option<String>>,
    timeout: Duration,
}

impl StreamableHttpTransport {
    pub fn new(
        server: &str,
        url: &str,
        headers: &HashMap<String, String>,
        timeout: Duration,
    ) -> Result<Self, ToolServerError> {
        let headers = header_map(server, headers)?;
        let client = Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|e| ToolServerError::connect(server, format!("failed to create HTTP client: {e}")))?;

        Ok(Self {
            server: server.to_string(),
            client,
            url: url.to_string(),
            headers,
            ids: RequestIds::new(),
            session_id: Mutex::new(None),
            timeout,
        })
    }

    async fn post(&self, body: &impl Serialize) -> Result<Response, ToolServerError> {
        let mut builder = self
            .client
            .post(&self.url)
            .headers(self.headers.clone())
            .header(ACCEPT, ACCEPT_BOTH)
            .json(body);
        if let Some(session) = self.session_id.lock().await.clone() {
            builder = builder.header(SESSION_HEADER, session);
        }

        let response = builder.send().await.map_err(|e| self.send_error(e))?;

        if let Some(session) = response
            .headers()
            .get(SESSION_HEADER)
            .and_then(|v| v.to_str().ok())
        {
            let mut current = self.session_id.lock().await;
            if current.as_deref() != Some(session) {
                tracing::debug!(server = %self.server, session, "Tool server assigned session");
                *current = Some(session.to_string());
            }
        }

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(ToolServerError::Transport(format!("HTTP {status}: {body}")));
        }
        Ok(response)
    }

    fn send_error(&self, e: reqwest::Error) -> ToolServerError {
        if e.is_timeout() {
            ToolServerError::Timeout(self.timeout)
        } else {
            e.into()
        }
    }

    async fn read_reply(&self, response: Response, id: u64) -> Result<Value, ToolServerError> {
        let is_stream = response
            .headers()
            .get(CONTENT_TYPE)
            .and_then(|v| v.to_str().ok())
            .is_some_and(|ct| ct.starts_with("text/event-stream"));

        if !is_stream {
            let message: JsonRpcResponse = response.json().await.map_err(|e| self.send_error(e))?;
            if message.reply_id() != Some(id) {
                return Err(ToolServerError::Protocol(format!(
                    "expected reply to request {id}, got {:?}",
                    message.id
                )));
            }
            return message.into_result();
        }

        let mut events = Box::pin(response.bytes_stream().eventsource());
        while let Some(event) = events.next().await {
            let event = event.map_err(|e| ToolServerError::Transport(e.to_string()))?;
            match serde_json::from_str::<JsonRpcResponse>(&event.data) {
                Ok(message) if message.reply_id() == Some(id) => return message.into_result(),
                Ok(_) => {}
                Err(_) => {
                    tracing::debug!(server = %self.server, event = %event.event, "Skipping non-JSON event");
                }
            }
        }
        Err(ToolServerError::Closed)
    }
}

#[async_trait]
impl RpcTransport for StreamableHttpTransport {
    async fn request(&self, method: &str, params: Option<Value>) -> Result<Value, ToolServerError> {
        let id = self.ids.next();
        let response = self.post(&JsonRpcRequest::new(id, method, params)).await?;
        self.read_reply(response, id).await
    }

    async fn notify(&self, method: &str, params: Option<Value>) -> Result<(), ToolServerError> {
        self.post(&JsonRpcNotification::new(method, params)).await?;
        Ok(())
    }

    async fn shutdown(&self) -> Result<(), ToolServerError> {
        let Some(session) = self.session_id.lock().await.take() else {
            return Ok(());
        };
        let result = self
            .client
            .delete(&self.url)
            .headers(self.headers.clone())
            .header(SESSION_HEADER, &session)
            .send()
            .await;
        if let Err(e) = result {
            tracing::debug!(server = %self.server, error = %e, "Session teardown failed");
        }
        Ok(())
    }
}
