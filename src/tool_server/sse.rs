//! Persistent event-stream transport.
//!
//! A GET opens a long-lived stream. The server's first `endpoint` event names
//! the URL that requests are sent to with `POST`; replies arrive on the stream
//! and are routed to waiting callers by request id.

use super::protocol::{JsonRpcNotification, JsonRpcRequest, JsonRpcResponse};
use super::transport::{header_map, RequestIds, RpcTransport};
use super::ToolServerError;
use async_trait::async_trait;
use eventsource_stream::Eventsource;
use futures::{Stream, StreamExt};
use reqwest::header::{HeaderMap, ACCEPT};
use reqwest::{Client, Url};
use serde::Serialize;
use serde_json::Value;
use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::{oneshot, Mutex};
use tokio::task::JoinHandle;

type Pending = Arc<Mutex<HashMap<u64, oneshot::Sender<JsonRpcResponse>>>>;

pub struct SseTransport {
    server: String,
    client: Client,
    endpoint: Url,
    headers: HeaderMap,
    ids: RequestIds,
    pending: Pending,
    reader: JoinHandle<()>,
    timeout: Duration,
}

impl SseTransport {
    pub async fn connect(
        server: &str,
        url: &str,
        headers: &HashMap<String, String>,
        timeout: Duration,
    ) -> Result<Self, ToolServerError> {
        let headers = header_map(server, headers)?;
        let base = Url::parse(url).map_err(|e| ToolServerError::connect(server, format!("invalid url {url}: {e}")))?;
        // No client-wide timeout: it would cut the long-lived stream
        let client = Client::builder()
            .build()
            .map_err(|e| ToolServerError::connect(server, format!("failed to create HTTP client: {e}")))?;

        let open = async {
            let response = client
                .get(base.clone())
                .headers(headers.clone())
                .header(ACCEPT, "text/event-stream")
                .send()
                .await
                .map_err(|e| ToolServerError::connect(server, e.to_string()))?;
            let status = response.status();
            if !status.is_success() {
                return Err(ToolServerError::connect(server, format!("HTTP {status} opening event stream")));
            }
            let mut events = Box::pin(response.bytes_stream().eventsource());
            let endpoint = wait_for_endpoint(&mut events, &base)
                .await
                .map_err(|e| ToolServerError::connect(server, e.to_string()))?;
            Ok::<_, ToolServerError>((endpoint, events))
        };
        // The limit covers both the response headers and the endpoint event
        let (endpoint, events) = tokio::time::timeout(timeout, open)
            .await
            .map_err(|_| ToolServerError::connect(server, format!("no endpoint event within {timeout:?}")))??;
        tracing::debug!(server, endpoint = %endpoint, "Event stream ready");

        let pending: Pending = Arc::default();
        let reader = tokio::spawn(route_replies(server.to_string(), events, pending.clone()));

        Ok(Self {
            server: server.to_string(),
            client,
            endpoint,
            headers,
            ids: RequestIds::new(),
            pending,
            reader,
            timeout,
        })
    }

    async fn post(&self, body: &impl Serialize) -> Result<(), ToolServerError> {
        let response = self
            .client
            .post(self.endpoint.clone())
            .headers(self.headers.clone())
            .timeout(self.timeout)
            .json(body)
            .send()
            .await
            .map_err(|e| {
                if e.is_timeout() {
                    ToolServerError::Timeout(self.timeout)
                } else {
                    e.into()
                }
            })?;
        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(ToolServerError::Transport(format!("HTTP {status}: {body}")));
        }
        Ok(())
    }
}

async fn wait_for_endpoint<S, E>(events: &mut S, base: &Url) -> Result<Url, ToolServerError>
where
    S: Stream<Item = Result<eventsource_stream::Event, E>> + Unpin,
    E: std::fmt::Display,
{
    while let Some(event) = events.next().await {
        let event = event.map_err(|e| ToolServerError::Transport(e.to_string()))?;
        if event.event == "endpoint" {
            return base
                .join(event.data.trim())
                .map_err(|e| ToolServerError::Protocol(format!("invalid endpoint {}: {e}", event.data)));
        }
    }
    Err(ToolServerError::Closed)
}

/// Forward each reply on the stream to whoever is waiting for its id
async fn route_replies<S, E>(server: String, mut events: S, pending: Pending)
where
    S: Stream<Item = Result<eventsource_stream::Event, E>> + Unpin,
    E: std::fmt::Display,
{
    while let Some(event) = events.next().await {
        let event = match event {
            Ok(event) => event,
            Err(e) => {
                tracing::warn!(server = %server, error = %e, "Event stream error");
                break;
            }
        };
        let Ok(message) = serde_json::from_str::<JsonRpcResponse>(&event.data) else {
            tracing::debug!(server = %server, event = %event.event, "Skipping non-JSON event");
            continue;
        };
        let Some(id) = message.reply_id() else {
            continue;
        };
        if let Some(waiter) = pending.lock().await.remove(&id) {
            let _ = waiter.send(message);
        } else {
            tracing::debug!(server = %server, id, "Reply for unknown request");
        }
    }
    // Dropping the senders wakes every waiter with a closed error
    pending.lock().await.clear();
    tracing::debug!(server = %server, "Event stream ended");
}

#[async_trait]
impl RpcTransport for SseTransport {
    async fn request(&self, method: &str, params: Option<Value>) -> Result<Value, ToolServerError> {
        if self.reader.is_finished() {
            return Err(ToolServerError::Closed);
        }
        let id = self.ids.next();
        let (tx, rx) = oneshot::channel();
        self.pending.lock().await.insert(id, tx);

        if let Err(e) = self.post(&JsonRpcRequest::new(id, method, params)).await {
            self.pending.lock().await.remove(&id);
            return Err(e);
        }

        match tokio::time::timeout(self.timeout, rx).await {
            Ok(Ok(message)) => message.into_result(),
            Ok(Err(_)) => Err(ToolServerError::Closed),
            Err(_) => {
                self.pending.lock().await.remove(&id);
                Err(ToolServerError::Timeout(self.timeout))
            }
        }
    }

    async fn notify(&self, method: &str, params: Option<Value>) -> Result<(), ToolServerError> {
        self.post(&JsonRpcNotification::new(method, params)).await
    }

    async fn shutdown(&self) -> Result<(), ToolServerError> {
        self.reader.abort();
        self.pending.lock().await.clear();
        tracing::debug!(server = %self.server, "Event stream closed");
        Ok(())
    }
}

impl Drop for SseTransport {
    fn drop(&mut self) {
        self.reader.abort();
    }
}
