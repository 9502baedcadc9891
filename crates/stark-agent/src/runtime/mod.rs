//! Run execution: the iteration engine, sub-agent delegation, and the
//! events a streamed run publishes.

pub(crate) mod delegation;
pub(crate) mod engine;
pub mod events;
pub mod result;

use std::sync::Arc;

use uuid::Uuid;

use crate::agent::AgentSpec;
use crate::error::Result;
use crate::llm::gateway::ModelGateway;
use crate::llm::types::Message;
use crate::tools::{McpConnector, McpSession, ToolSet};

use delegation::DelegationPath;
use engine::IterationEngine;
use events::EventSink;
use result::RunResult;

pub use events::{RunStream, StreamEvent};
pub use result::{IterationData, SubAgentRecord};

/// Shared by every engine of one top-level run, nested ones included.
pub(crate) struct RunContext {
    pub gateway: Arc<dyn ModelGateway>,
    pub connector: Arc<dyn McpConnector>,
    /// Only ever logged.
    pub run_id: Uuid,
}

/// Run one agent: connect its MCP servers, build its tool set, drive the
/// loop, and close the servers again whatever the outcome.
pub(crate) async fn execute_agent(
    ctx: &RunContext,
    agent: &AgentSpec,
    input: Vec<Message>,
    path: &DelegationPath,
    events: &EventSink,
) -> Result<RunResult> {
    let session = if agent.mcp_servers.is_empty() {
        None
    } else {
        Some(ctx.connector.connect(&agent.name, &agent.mcp_servers).await?)
    };

    let outcome = run_with_session(ctx, agent, session.as_ref(), input, path, events).await;

    if let Some(session) = session {
        session.close().await;
        tracing::debug!(agent = %agent.name, "mcp servers closed");
    }
    outcome
}

async fn run_with_session(
    ctx: &RunContext,
    agent: &AgentSpec,
    session: Option<&Arc<dyn McpSession>>,
    input: Vec<Message>,
    path: &DelegationPath,
    events: &EventSink,
) -> Result<RunResult> {
    let tools = ToolSet::build(agent, session)?;
    IterationEngine {
        ctx,
        agent,
        tools: &tools,
        path,
        events,
    }
    .execute(input)
    .await
}
