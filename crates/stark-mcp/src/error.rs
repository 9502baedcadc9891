//! MCP client error types.

/// Errors raised while talking to an MCP server.
#[derive(Debug, thiserror::Error)]
pub enum McpError {
    /// The configured command could not be found on this machine.
    #[error("mcp server `{server}`: command not found: {command}")]
    CommandNotFound { server: String, command: String },

    /// Spawning or piping the child process failed.
    #[error("mcp server `{server}` failed to start: {reason}")]
    SpawnFailed { server: String, reason: String },

    /// An I/O error on the transport.
    #[error("mcp transport io error: {0}")]
    Io(#[from] std::io::Error),

    /// The server answered with a JSON-RPC error object.
    #[error("mcp rpc error {code}: {message}")]
    Rpc { code: i64, message: String },

    /// The server did not answer within the request timeout.
    #[error("mcp request `{method}` timed out after {seconds}s")]
    Timeout { method: String, seconds: u64 },

    /// The transport was closed before a response arrived.
    #[error("mcp connection closed")]
    ConnectionClosed,

    /// The server returned a payload we could not interpret.
    #[error("invalid mcp response: {reason}")]
    InvalidResponse { reason: String },

    /// Two servers advertise the same tool name.
    #[error("tool `{tool_name}` is exposed by both `{first}` and `{second}`")]
    DuplicateTool {
        tool_name: String,
        first: String,
        second: String,
    },

    /// No connected server exposes the requested tool.
    #[error("no mcp server named `{server}`")]
    UnknownServer { server: String },

    /// JSON (de)serialization failed.
    #[error("json error: {0}")]
    Json(#[from] serde_json::Error),
}

/// Convenience alias used throughout the MCP crate.
pub type Result<T> = std::result::Result<T, McpError>;
