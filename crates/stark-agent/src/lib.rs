//! Agent execution engine for Stark.
//!
//! This crate turns one user input into a sequence of model calls, tool-call
//! resolutions and sub-agent delegations, and assembles the outcome into a
//! [`RunResult`] that includes the results of every nested run.
//!
//! ## Architecture
//!
//! ```text
//! ┌──────────┐     ┌─────────────────┐     ┌──────────────┐
//! │  Runner  │────>│ IterationEngine │────>│ ModelGateway │
//! │ (façade) │     │  (model loop)   │     │ (HTTP / SSE) │
//! └────┬─────┘     └───────┬─────────┘     └──────────────┘
//!      │                   │
//!  StreamEvents      ┌─────┴──────┐
//!                    │  ToolSet   │──── local functions
//!                    │ (resolver) │──── MCP servers (stark-mcp)
//!                    └─────┬──────┘
//!                          │
//!                  sub-agent delegation
//!                (nested IterationEngine)
//! ```
//!
//! ## Modules
//!
//! - [`agent`] -- Agent definitions and their validation.
//! - [`tools`] -- Tool kinds, the per-agent tool set, and the MCP seam.
//! - [`llm`] -- The model gateway, provider clients, and wire types.
//! - [`runtime`] -- The iteration loop, delegation, run results and events.
//! - [`runner`] -- Blocking, awaitable and streaming entry points.
//! - [`config`] -- TOML agent definitions and provider settings.
//! - [`error`] -- Agent error types.

pub mod agent;
pub mod config;
pub mod error;
pub mod llm;
pub mod runner;
pub mod runtime;
pub mod tools;

pub use agent::{AgentSpec, AgentSpecBuilder, DEFAULT_MAX_ITERATIONS};
pub use config::{AgentDefinition, load_agent_file, provider_router, provider_settings};
pub use error::{AgentError, Result};
pub use llm::{
    ChunkStream, LlmClient, LlmClientConfig, LlmProvider, Message, ModelChunk, ModelGateway,
    ModelRequest, ModelResponse, ProviderRouter, Role, ToolCall, ToolDefinition,
};
pub use runner::Runner;
pub use runtime::result::RunResult;
pub use runtime::{IterationData, RunStream, StreamEvent, SubAgentRecord};
pub use stark_mcp::McpServerConfig;
pub use tools::{
    FnTool, LocalTool, McpConnector, McpSession, StdioConnector, ToolCallResult, ToolCapability,
    ToolOutput, ToolSet,
};
