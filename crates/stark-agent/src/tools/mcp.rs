//! MCP-hosted tools.
//!
//! The engine never touches processes or JSON-RPC. It asks an
//! [`McpConnector`] for a session covering an agent's servers, reads the
//! discovered tools from it, forwards calls, and closes it when the run ends.

use std::collections::BTreeMap;
use std::sync::Arc;

use async_trait::async_trait;
use serde_json::Value;
use stark_mcp::{McpManager, McpServerConfig, McpTool};

use crate::error::Result;
use crate::tools::ToolOutput;

/// Live connections to the MCP servers of one agent run.
#[async_trait]
pub trait McpSession: Send + Sync {
    /// Every tool discovered across the session's servers.
    fn tools(&self) -> Vec<McpTool>;

    /// Call `tool` on `server`; `Err` carries the failure text for the model.
    async fn call_tool(&self, server: &str, tool: &str, arguments: Value) -> ToolOutput;

    /// Tear the session down. Must be safe to call after failures.
    async fn close(&self);
}

/// Opens sessions for an agent's server bindings.
#[async_trait]
pub trait McpConnector: Send + Sync {
    async fn connect(
        &self,
        agent: &str,
        servers: &BTreeMap<String, McpServerConfig>,
    ) -> Result<Arc<dyn McpSession>>;
}

/// Launches each server as a child process speaking MCP over stdio.
#[derive(Debug, Clone, Copy, Default)]
pub struct StdioConnector;

#[async_trait]
impl McpConnector for StdioConnector {
    async fn connect(
        &self,
        agent: &str,
        servers: &BTreeMap<String, McpServerConfig>,
    ) -> Result<Arc<dyn McpSession>> {
        tracing::debug!(agent, servers = servers.len(), "connecting mcp servers");
        let manager = McpManager::connect_all(servers).await?;
        Ok(Arc::new(manager))
    }
}

#[async_trait]
impl McpSession for McpManager {
    fn tools(&self) -> Vec<McpTool> {
        McpManager::tools(self).to_vec()
    }

    async fn call_tool(&self, server: &str, tool: &str, arguments: Value) -> ToolOutput {
        match McpManager::call_tool(self, server, tool, arguments).await {
            Ok(result) if result.is_error() => Err(result.text()),
            Ok(result) => Ok(result.text()),
            Err(e) => Err(e.to_string()),
        }
    }

    async fn close(&self) {
        self.close_all().await;
    }
}

/// Forward one call, logging failures.
pub(crate) async fn invoke(
    session: &dyn McpSession,
    server: &str,
    tool: &str,
    arguments: Value,
) -> ToolOutput {
    let out = session.call_tool(server, tool, arguments).await;
    if let Err(e) = &out {
        tracing::warn!(server, tool, error = %e, "mcp tool call failed");
    }
    out
}
