//! Agent error types.
//!
//! All agent subsystems surface errors through [`AgentError`]. Only two kinds
//! ever abort a run: configuration errors (detected before the first model
//! call) and backend errors. Tool failures are folded into the conversation
//! as failed tool results and never reach the caller as an `Err`.

/// Unified error type for the agent runtime.
#[derive(Debug, thiserror::Error)]
pub enum AgentError {
    // -- Configuration errors ------------------------------------------------
    /// Two tools visible to one agent share a name.
    #[error("agent `{agent}`: duplicate tool name `{tool_name}`")]
    DuplicateToolName { agent: String, tool_name: String },

    /// A sub-agent has no description for its parent's model to go on.
    #[error("sub-agent `{agent}` needs a non-empty description")]
    MissingSubAgentDescription { agent: String },

    /// An agent appears twice along one delegation path.
    #[error("delegation cycle: {}", path.join(" -> "))]
    DelegationCycle { path: Vec<String> },

    /// A local tool's parameter schema is not valid JSON Schema.
    #[error("tool `{tool_name}` has an invalid parameter schema: {reason}")]
    InvalidToolSchema { tool_name: String, reason: String },

    /// Configuration validation or loading failed.
    #[error("config error: {reason}")]
    ConfigError { reason: String },

    // -- LLM errors ----------------------------------------------------------
    /// An HTTP request to the LLM provider failed.
    #[error("llm request failed: {reason}")]
    LlmRequestFailed { reason: String },

    /// The LLM response could not be parsed into the expected format.
    #[error("llm response parse error: {reason}")]
    LlmParseFailed { reason: String },

    /// The streaming SSE connection was interrupted or produced invalid data.
    #[error("llm stream error: {reason}")]
    LlmStreamError { reason: String },

    /// No gateway is registered for the requested provider.
    #[error("no model configured for provider: {provider}")]
    NoModelConfigured { provider: String },

    /// The API key is missing for a provider that requires one.
    #[error("missing api key for provider: {provider}")]
    MissingApiKey { provider: String },

    // -- Tool errors ---------------------------------------------------------
    /// A tool call referenced by the model does not exist for this agent.
    #[error("unknown tool: {tool_name}")]
    UnknownTool { tool_name: String },

    /// A tool invocation failed.
    #[error("tool execution failed for `{tool_name}`: {reason}")]
    ToolExecutionFailed { tool_name: String, reason: String },

    // -- Upstream crate errors -----------------------------------------------
    /// An error from the MCP client.
    #[error("mcp error: {0}")]
    Mcp(#[from] stark_mcp::McpError),

    /// JSON serialization or deserialization failed.
    #[error("json error: {0}")]
    Json(#[from] serde_json::Error),

    // -- Generic -------------------------------------------------------------
    /// Catch-all for unexpected internal errors.
    #[error("internal agent error: {0}")]
    Internal(String),
}

impl AgentError {
    /// Whether this error stems from how the agent was configured rather
    /// than from anything that happened while it ran.
    pub fn is_configuration(&self) -> bool {
        match self {
            Self::DuplicateToolName { .. }
            | Self::MissingSubAgentDescription { .. }
            | Self::DelegationCycle { .. }
            | Self::InvalidToolSchema { .. }
            | Self::ConfigError { .. } => true,
            Self::Mcp(e) => matches!(e, stark_mcp::McpError::DuplicateTool { .. }),
            _ => false,
        }
    }
}

/// Convenience alias used throughout the agent crate.
pub type Result<T> = std::result::Result<T, AgentError>;

impl From<reqwest::Error> for AgentError {
    fn from(err: reqwest::Error) -> Self {
        Self::LlmRequestFailed {
            reason: err.to_string(),
        }
    }
}
