//! Tool resolution.
//!
//! Three kinds of tool share one calling convention: in-process functions,
//! tools hosted by MCP servers, and sub-agents exposed as tools. Each is
//! described by a [`ToolDescriptor`] whose [`ToolKind`] tag is inspected
//! exactly once, when a call is dispatched. Whatever the kind, an invocation
//! ends up as a [`ToolCallResult`] with a text payload and a success flag.

pub mod function;
pub mod mcp;
pub mod registry;

use std::sync::Arc;

use serde::{Deserialize, Serialize};

use crate::agent::AgentSpec;
use crate::llm::types::{Message, ToolCall, ToolDefinition};

pub use function::{FnTool, LocalTool};
pub use mcp::{McpConnector, McpSession, StdioConnector};
pub use registry::{SUB_AGENT_TOOL_PREFIX, ToolSet, sub_agent_tool_name};

/// Outcome of a single invocation: result text, or failure text.
pub type ToolOutput = std::result::Result<String, String>;

/// What a tool is backed by.
#[derive(Clone)]
pub enum ToolKind {
    Function(Arc<dyn LocalTool>),
    Mcp {
        server: String,
        session: Arc<dyn McpSession>,
    },
    SubAgent(Arc<AgentSpec>),
}

/// Coarse capability tag, mostly for logs and listings.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ToolCapability {
    LocalFunction,
    Mcp,
    SubAgent,
}

impl ToolKind {
    pub fn capability(&self) -> ToolCapability {
        match self {
            Self::Function(_) => ToolCapability::LocalFunction,
            Self::Mcp { .. } => ToolCapability::Mcp,
            Self::SubAgent(_) => ToolCapability::SubAgent,
        }
    }
}

/// One tool visible to an agent.
#[derive(Clone)]
pub struct ToolDescriptor {
    pub definition: ToolDefinition,
    pub kind: ToolKind,
}

impl ToolDescriptor {
    pub fn name(&self) -> &str {
        &self.definition.name
    }

    pub fn capability(&self) -> ToolCapability {
        self.kind.capability()
    }
}

impl std::fmt::Debug for ToolDescriptor {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ToolDescriptor")
            .field("name", &self.definition.name)
            .field("capability", &self.capability())
            .finish()
    }
}

/// The resolved result of one tool call.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ToolCallResult {
    /// Matches the originating [`ToolCall::id`].
    pub tool_call_id: String,
    pub tool_name: String,
    /// Text handed back to the model.
    pub content: String,
    pub success: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

impl ToolCallResult {
    pub fn from_output(call: &ToolCall, output: ToolOutput) -> Self {
        match output {
            Ok(content) => Self {
                tool_call_id: call.id.clone(),
                tool_name: call.name.clone(),
                content,
                success: true,
                error: None,
            },
            Err(error) => Self {
                tool_call_id: call.id.clone(),
                tool_name: call.name.clone(),
                content: format!("Error: {error}"),
                success: false,
                error: Some(error),
            },
        }
    }

    /// The tool turn appended to the conversation.
    pub fn to_message(&self) -> Message {
        Message::tool_result(&self.tool_call_id, &self.content, !self.success)
    }
}
