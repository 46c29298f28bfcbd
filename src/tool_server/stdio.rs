//! Child-process transport: newline-delimited JSON over stdin/stdout

use super::protocol::{JsonRpcNotification, JsonRpcRequest, JsonRpcResponse};
use super::transport::{RequestIds, RpcTransport};
use super::ToolServerError;
use async_trait::async_trait;
use serde::Serialize;
use serde_json::Value;
use std::collections::HashMap;
use std::process::Stdio;
use std::time::Duration;
use tokio::io::{AsyncBufReadExt, AsyncWriteExt, BufReader};
use tokio::process::{Child, ChildStdin, ChildStdout, Command};
use tokio::sync::Mutex;

struct StdioIo {
    stdin: ChildStdin,
    stdout: BufReader<ChildStdout>,
}

pub struct StdioTransport {
    server: String,
    ids: RequestIds,
    /// Held for a whole request/reply exchange so replies are never interleaved
    io: Mutex<StdioIo>,
    child: Mutex<Child>,
    timeout: Duration,
}

impl StdioTransport {
    pub fn spawn(
        server: &str,
        command: &str,
        args: &[String],
        env: &HashMap<String, String>,
        timeout: Duration,
    ) -> Result<Self, ToolServerError> {
        let mut child = Command::new(command)
            .args(args)
            .envs(env)
            .stdin(Stdio::piped())
            .stdout(Stdio::piped())
            .stderr(Stdio::inherit())
            .kill_on_drop(true)
            .spawn()
            .map_err(|e| ToolServerError::connect(server, format!("failed to spawn {command}: {e}")))?;

        let stdin = child
            .stdin
            .take()
            .ok_or_else(|| ToolServerError::connect(server, "child stdin unavailable"))?;
        let stdout = child
            .stdout
            .take()
            .ok_or_else(|| ToolServerError::connect(server, "child stdout unavailable"))?;

        tracing::debug!(server, command, pid = ?child.id(), "Spawned tool server process");

        Ok(Self {
            server: server.to_string(),
            ids: RequestIds::new(),
            io: Mutex::new(StdioIo {
                stdin,
                stdout: BufReader::new(stdout),
            }),
            child: Mutex::new(child),
            timeout,
        })
    }

    async fn write_message(io: &mut StdioIo, message: &impl Serialize) -> Result<(), ToolServerError> {
        let mut line = serde_json::to_string(message)?;
        line.push('\n');
        io.stdin.write_all(line.as_bytes()).await?;
        io.stdin.flush().await?;
        Ok(())
    }

    /// Read lines until the reply for `id` shows up
    async fn read_reply(server: &str, io: &mut StdioIo, id: u64) -> Result<Value, ToolServerError> {
        let mut line = String::new();
        loop {
            line.clear();
            if io.stdout.read_line(&mut line).await? == 0 {
                return Err(ToolServerError::Closed);
            }
            let trimmed = line.trim();
            if trimmed.is_empty() {
                continue;
            }
            match serde_json::from_str::<JsonRpcResponse>(trimmed) {
                Ok(message) if message.reply_id() == Some(id) => return message.into_result(),
                Ok(message) => {
                    tracing::debug!(server, method = ?message.method, "Skipping unrelated message");
                }
                Err(_) => {
                    tracing::debug!(server, line = trimmed, "Skipping non-JSON output");
                }
            }
        }
    }
}

#[async_trait]
impl RpcTransport for StdioTransport {
    async fn request(&self, method: &str, params: Option<Value>) -> Result<Value, ToolServerError> {
        let id = self.ids.next();
        let request = JsonRpcRequest::new(id, method, params);
        let mut io = self.io.lock().await;

        let exchange = async {
            Self::write_message(&mut io, &request).await?;
            Self::read_reply(&self.server, &mut io, id).await
        };
        tokio::time::timeout(self.timeout, exchange)
            .await
            .map_err(|_| ToolServerError::Timeout(self.timeout))?
    }

    async fn notify(&self, method: &str, params: Option<Value>) -> Result<(), ToolServerError> {
        let notification = JsonRpcNotification::new(method, params);
        let mut io = self.io.lock().await;
        tokio::time::timeout(self.timeout, Self::write_message(&mut io, &notification))
            .await
            .map_err(|_| ToolServerError::Timeout(self.timeout))?
    }

    async fn shutdown(&self) -> Result<(), ToolServerError> {
        let mut child = self.child.lock().await;
        if child.try_wait()?.is_none() {
            child.kill().await?;
        }
        tracing::debug!(server = %self.server, "Tool server process stopped");
        Ok(())
    }
}
