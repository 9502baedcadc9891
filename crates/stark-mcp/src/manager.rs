//! Owns one [`McpClient`] per configured server and indexes their tools.

use std::collections::BTreeMap;

use serde_json::Value;

use crate::client::McpClient;
use crate::config::McpServerConfig;
use crate::error::{McpError, Result};
use crate::protocol::{CallToolResult, McpToolDefinition};

/// A tool together with the server that hosts it.
#[derive(Debug, Clone, PartialEq)]
pub struct McpTool {
    pub server: String,
    pub definition: McpToolDefinition,
}

/// The set of MCP sessions opened for one agent run.
pub struct McpManager {
    clients: BTreeMap<String, McpClient>,
    tools: Vec<McpTool>,
}

impl McpManager {
    /// A manager with no servers.
    pub fn empty() -> Self {
        Self {
            clients: BTreeMap::new(),
            tools: Vec::new(),
        }
    }

    /// Spawn, initialise and list the tools of every server, in name order.
    ///
    /// Servers whose command is not installed are skipped with a warning.
    /// Any other failure closes the sessions opened so far and is returned.
    pub async fn connect_all(servers: &BTreeMap<String, McpServerConfig>) -> Result<Self> {
        let mut clients = Vec::with_capacity(servers.len());

        for (name, config) in servers {
            let client = match McpClient::spawn(name, config) {
                Ok(client) => client,
                Err(McpError::CommandNotFound { server, command }) => {
                    tracing::warn!(server = %server, command = %command, "mcp server command not found, skipping");
                    continue;
                }
                Err(e) => {
                    close_clients(&clients).await;
                    return Err(e);
                }
            };

            if let Err(e) = client.initialize().await {
                client.close().await;
                close_clients(&clients).await;
                return Err(e);
            }
            clients.push(client);
        }

        Self::from_clients(clients).await
    }

    /// Build a manager over clients that have already completed the handshake.
    pub async fn from_clients(clients: Vec<McpClient>) -> Result<Self> {
        let mut tools: Vec<McpTool> = Vec::new();
        let mut owners: BTreeMap<String, String> = BTreeMap::new();

        for client in &clients {
            let listed = match client.list_tools().await {
                Ok(listed) => listed,
                Err(e) => {
                    close_clients(&clients).await;
                    return Err(e);
                }
            };

            for definition in listed {
                if let Some(first) = owners.get(&definition.name) {
                    let err = McpError::DuplicateTool {
                        tool_name: definition.name.clone(),
                        first: first.clone(),
                        second: client.server().to_string(),
                    };
                    close_clients(&clients).await;
                    return Err(err);
                }
                owners.insert(definition.name.clone(), client.server().to_string());
                tools.push(McpTool {
                    server: client.server().to_string(),
                    definition,
                });
            }
        }

        tracing::info!(
            servers = clients.len(),
            tools = tools.len(),
            "mcp servers connected"
        );

        let clients = clients
            .into_iter()
            .map(|c| (c.server().to_string(), c))
            .collect();
        Ok(Self { clients, tools })
    }

    /// Every discovered tool, grouped by server in name order.
    pub fn tools(&self) -> &[McpTool] {
        &self.tools
    }

    /// Names of the connected servers.
    pub fn servers(&self) -> impl Iterator<Item = &str> {
        self.clients.keys().map(String::as_str)
    }

    pub async fn call_tool(
        &self,
        server: &str,
        tool_name: &str,
        arguments: Value,
    ) -> Result<CallToolResult> {
        let client = self
            .clients
            .get(server)
            .ok_or_else(|| McpError::UnknownServer {
                server: server.to_string(),
            })?;
        client.call_tool(tool_name, arguments).await
    }

    /// Close every session.
    pub async fn close_all(&self) {
        for client in self.clients.values() {
            client.close().await;
        }
    }
}

async fn close_clients(clients: &[McpClient]) {
    for client in clients {
        client.close().await;
    }
}
