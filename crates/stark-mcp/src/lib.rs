//! # stark-mcp
//!
//! Client side of the Model Context Protocol for Stark agents.
//!
//! An agent may bind any number of MCP servers by name. For each run the
//! agent runtime asks [`McpManager::connect_all`] to launch those servers,
//! perform the handshake and discover their tools, then routes tool calls
//! through [`McpManager::call_tool`] and tears everything down with
//! [`McpManager::close_all`].
//!
//! ```text
//!   McpManager ──► McpClient (server "files") ──stdio──► child process
//!              └─► McpClient (server "git")   ──stdio──► child process
//! ```
//!
//! ## Modules
//!
//! - [`client`] -- JSON-RPC request/response correlation over any async pipe.
//! - [`manager`] -- per-run set of clients and the tool index.
//! - [`protocol`] -- wire types and constants.
//! - [`config`] -- server launch descriptors.
//! - [`error`] -- error types.

pub mod client;
pub mod config;
pub mod error;
pub mod manager;
pub mod protocol;

pub use client::{DEFAULT_TIMEOUT_SECS, McpClient};
pub use config::McpServerConfig;
pub use error::{McpError, Result};
pub use manager::{McpManager, McpTool};
pub use protocol::{CallToolResult, EMPTY_RESULT_TEXT, McpContent, McpToolDefinition};
