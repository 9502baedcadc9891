//! A JSON-RPC client for one MCP server.
//!
//! The client is transport-agnostic: anything that implements
//! [`AsyncRead`]/[`AsyncWrite`] can carry the newline-delimited JSON stream.
//! [`McpClient::spawn`] wires it to a child process's stdio, which is how real
//! servers are reached; tests use an in-memory duplex pipe.
//!
//! A background task reads every incoming line and routes responses to the
//! waiting request by id. Requests the server sends to us are answered
//! (`ping`) or rejected with `METHOD_NOT_FOUND`.

use std::collections::HashMap;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::time::Duration;

use serde_json::{Value, json};
use tokio::io::{AsyncBufReadExt, AsyncRead, AsyncWrite, AsyncWriteExt, BufReader};
use tokio::process::{Child, Command};
use tokio::sync::{Mutex, oneshot};
use tokio::task::JoinHandle;

use crate::config::McpServerConfig;
use crate::error::{McpError, Result};
use crate::protocol::{
    CLIENT_NAME, CLIENT_VERSION, CallToolResult, JsonRpcRequest, JsonRpcResponse,
    ListToolsResult, MCP_PROTOCOL_VERSION, METHOD_NOT_FOUND, McpToolDefinition,
};

/// Default per-request timeout in seconds.
pub const DEFAULT_TIMEOUT_SECS: u64 = 60;

/// How long `close` waits for a child to exit on its own before killing it.
const SHUTDOWN_GRACE: Duration = Duration::from_secs(2);

type Writer = Arc<Mutex<Box<dyn AsyncWrite + Send + Unpin>>>;
type Pending = Arc<Mutex<HashMap<u64, oneshot::Sender<JsonRpcResponse>>>>;

/// A live connection to a single MCP server.
pub struct McpClient {
    server: String,
    writer: Writer,
    pending: Pending,
    closed: Arc<AtomicBool>,
    next_id: AtomicU64,
    timeout: Duration,
    reader: JoinHandle<()>,
    child: Mutex<Option<Child>>,
}

impl McpClient {
    /// Attach a client to an already-open transport.
    pub fn connect<R, W>(server: impl Into<String>, reader: R, writer: W) -> Self
    where
        R: AsyncRead + Send + Unpin + 'static,
        W: AsyncWrite + Send + Unpin + 'static,
    {
        let server = server.into();
        let writer: Writer = Arc::new(Mutex::new(Box::new(writer)));
        let pending: Pending = Arc::new(Mutex::new(HashMap::new()));
        let closed = Arc::new(AtomicBool::new(false));

        let reader = tokio::spawn(read_loop(
            server.clone(),
            reader,
            Arc::clone(&writer),
            Arc::clone(&pending),
            Arc::clone(&closed),
        ));

        Self {
            server,
            writer,
            pending,
            closed,
            next_id: AtomicU64::new(1),
            timeout: Duration::from_secs(DEFAULT_TIMEOUT_SECS),
            reader,
            child: Mutex::new(None),
        }
    }

    /// Launch the configured command and connect to its stdio.
    pub fn spawn(server: impl Into<String>, config: &McpServerConfig) -> Result<Self> {
        let server = server.into();

        let mut child = Command::new(&config.command)
            .args(&config.args)
            .envs(&config.env)
            .stdin(std::process::Stdio::piped())
            .stdout(std::process::Stdio::piped())
            .stderr(std::process::Stdio::piped())
            .kill_on_drop(true)
            .spawn()
            .map_err(|e| {
                if e.kind() == std::io::ErrorKind::NotFound {
                    McpError::CommandNotFound {
                        server: server.clone(),
                        command: config.command.clone(),
                    }
                } else {
                    McpError::SpawnFailed {
                        server: server.clone(),
                        reason: e.to_string(),
                    }
                }
            })?;

        let missing = |pipe: &str| McpError::SpawnFailed {
            server: server.clone(),
            reason: format!("{pipe} was not captured"),
        };
        let stdin = child.stdin.take().ok_or_else(|| missing("stdin"))?;
        let stdout = child.stdout.take().ok_or_else(|| missing("stdout"))?;

        if let Some(stderr) = child.stderr.take() {
            let name = server.clone();
            tokio::spawn(async move {
                let mut lines = BufReader::new(stderr).lines();
                while let Ok(Some(line)) = lines.next_line().await {
                    tracing::debug!(server = %name, "{line}");
                }
            });
        }

        tracing::info!(
            server = %server,
            command = %config.command,
            pid = child.id().unwrap_or_default(),
            "mcp server started"
        );

        let mut client = Self::connect(server, stdout, stdin);
        client.child = Mutex::new(Some(child));
        Ok(client)
    }

    /// Override the per-request timeout.
    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    /// The server name this client was registered under.
    pub fn server(&self) -> &str {
        &self.server
    }

    /// Perform the `initialize` handshake.
    pub async fn initialize(&self) -> Result<Value> {
        let result = self
            .request(
                "initialize",
                Some(json!({
                    "protocolVersion": MCP_PROTOCOL_VERSION,
                    "capabilities": {},
                    "clientInfo": { "name": CLIENT_NAME, "version": CLIENT_VERSION }
                })),
            )
            .await?;

        let protocol = result
            .get("protocolVersion")
            .and_then(serde_json::Value::as_str)
            .unwrap_or("?");
        tracing::debug!(server = %self.server, protocol, "mcp handshake complete");

        self.notify("notifications/initialized", None).await?;
        Ok(result)
    }

    /// List every tool the server exposes, following pagination cursors.
    pub async fn list_tools(&self) -> Result<Vec<McpToolDefinition>> {
        let mut tools = Vec::new();
        let mut cursor: Option<String> = None;

        loop {
            let params = cursor.as_ref().map(|c| json!({ "cursor": c }));
            let page: ListToolsResult =
                serde_json::from_value(self.request("tools/list", params).await?)?;
            tools.extend(page.tools);
            match page.next_cursor {
                Some(next) if !next.is_empty() => cursor = Some(next),
                _ => break,
            }
        }

        tracing::debug!(server = %self.server, count = tools.len(), "mcp tools listed");
        Ok(tools)
    }

    /// Invoke a tool and return its raw result.
    pub async fn call_tool(&self, name: &str, arguments: Value) -> Result<CallToolResult> {
        let result = self
            .request(
                "tools/call",
                Some(json!({ "name": name, "arguments": arguments })),
            )
            .await?;
        serde_json::from_value(result).map_err(|e| McpError::InvalidResponse {
            reason: format!("tools/call result: {e}"),
        })
    }

    /// Close the transport and reap the child process, if any.
    pub async fn close(&self) {
        self.closed.store(true, Ordering::SeqCst);
        {
            let mut writer = self.writer.lock().await;
            let _ = writer.shutdown().await;
        }

        if let Some(mut child) = self.child.lock().await.take() {
            match tokio::time::timeout(SHUTDOWN_GRACE, child.wait()).await {
                Ok(_) => {}
                Err(_) => {
                    tracing::debug!(server = %self.server, "mcp server did not exit, killing");
                    let _ = child.kill().await;
                }
            }
        }

        self.reader.abort();
        self.pending.lock().await.clear();
        tracing::info!(server = %self.server, "mcp server closed");
    }

    async fn request(&self, method: &str, params: Option<Value>) -> Result<Value> {
        let id = self.next_id.fetch_add(1, Ordering::Relaxed);
        let (tx, rx) = oneshot::channel();
        self.pending.lock().await.insert(id, tx);

        if self.closed.load(Ordering::SeqCst) {
            self.pending.lock().await.remove(&id);
            return Err(McpError::ConnectionClosed);
        }

        let line = serde_json::to_string(&JsonRpcRequest::new(id, method, params))?;
        if let Err(e) = write_line(&self.writer, &line).await {
            self.pending.lock().await.remove(&id);
            return Err(e);
        }

        match tokio::time::timeout(self.timeout, rx).await {
            Err(_) => {
                self.pending.lock().await.remove(&id);
                Err(McpError::Timeout {
                    method: method.to_string(),
                    seconds: self.timeout.as_secs(),
                })
            }
            Ok(Err(_)) => Err(McpError::ConnectionClosed),
            Ok(Ok(response)) => match response.error {
                Some(err) => Err(McpError::Rpc {
                    code: err.code,
                    message: err.message,
                }),
                None => Ok(response.result.unwrap_or(Value::Null)),
            },
        }
    }

    async fn notify(&self, method: &str, params: Option<Value>) -> Result<()> {
        let line = serde_json::to_string(&JsonRpcRequest::notification(method, params))?;
        write_line(&self.writer, &line).await
    }
}

impl Drop for McpClient {
    fn drop(&mut self) {
        self.reader.abort();
    }
}

async fn write_line(writer: &Writer, line: &str) -> Result<()> {
    let mut writer = writer.lock().await;
    writer.write_all(line.as_bytes()).await?;
    writer.write_all(b"\n").await?;
    writer.flush().await?;
    Ok(())
}

async fn read_loop<R>(
    server: String,
    reader: R,
    writer: Writer,
    pending: Pending,
    closed: Arc<AtomicBool>,
) where
    R: AsyncRead + Send + Unpin + 'static,
{
    let mut lines = BufReader::new(reader).lines();

    loop {
        let line = match lines.next_line().await {
            Ok(Some(line)) => line,
            Ok(None) => break,
            Err(e) => {
                tracing::warn!(server = %server, error = %e, "mcp transport read failed");
                break;
            }
        };
        let trimmed = line.trim();
        if trimmed.is_empty() {
            continue;
        }

        let message: JsonRpcResponse = match serde_json::from_str(trimmed) {
            Ok(m) => m,
            Err(e) => {
                tracing::debug!(server = %server, error = %e, "ignoring non-json line from mcp server");
                continue;
            }
        };

        if let Some(id) = message.response_id() {
            match pending.lock().await.remove(&id) {
                Some(tx) => {
                    let _ = tx.send(message);
                }
                None => tracing::debug!(server = %server, id, "response for unknown request"),
            }
            continue;
        }

        // Server-initiated traffic.
        let Some(method) = message.method.as_deref() else {
            continue;
        };
        let Some(id) = message.id.clone() else {
            tracing::debug!(server = %server, method, "mcp notification");
            continue;
        };
        let reply = if method == "ping" {
            json!({ "jsonrpc": "2.0", "id": id, "result": {} })
        } else {
            json!({
                "jsonrpc": "2.0",
                "id": id,
                "error": { "code": METHOD_NOT_FOUND, "message": format!("method not found: {method}") }
            })
        };
        if let Err(e) = write_line(&writer, &reply.to_string()).await {
            tracing::debug!(server = %server, error = %e, "failed to answer server request");
        }
    }

    closed.store(true, Ordering::SeqCst);
    pending.lock().await.clear();
    tracing::debug!(server = %server, "mcp reader finished");
}
