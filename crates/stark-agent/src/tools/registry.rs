use std::collections::HashMap;
use std::sync::Arc;

use serde_json::json;

use crate::agent::AgentSpec;
use crate::error::{AgentError, Result};
use crate::llm::types::ToolDefinition;
use crate::tools::{McpSession, ToolDescriptor, ToolKind};

/// Prefix of the tool names under which sub-agents are offered.
pub const SUB_AGENT_TOOL_PREFIX: &str = "sub_agent__";

/// The tool name a parent sees for `agent_name`.
pub fn sub_agent_tool_name(agent_name: &str) -> String {
    format!("{SUB_AGENT_TOOL_PREFIX}{agent_name}")
}

pub(crate) fn sub_agent_definition(agent: &AgentSpec) -> ToolDefinition {
    ToolDefinition::new(
        sub_agent_tool_name(&agent.name),
        agent.description.clone(),
        json!({
            "type": "object",
            "properties": {
                "input": {
                    "type": "string",
                    "description": format!("The task or question to hand to {}.", agent.name)
                }
            }
        }),
    )
}

/// Every tool one agent can see during a run, in the order offered to the
/// model: local functions, then sub-agents, then MCP tools.
#[derive(Debug, Clone, Default)]
pub struct ToolSet {
    descriptors: Vec<ToolDescriptor>,
    index: HashMap<String, usize>,
}

impl ToolSet {
    /// Assemble the tool set for `agent`, including tools discovered on an
    /// already-connected MCP session.
    ///
    /// A name used twice is a configuration error.
    pub fn build(agent: &AgentSpec, mcp: Option<&Arc<dyn McpSession>>) -> Result<Self> {
        let mut set = Self::default();

        for tool in &agent.function_tools {
            set.insert(
                &agent.name,
                ToolDescriptor {
                    definition: tool.definition(),
                    kind: ToolKind::Function(Arc::clone(tool)),
                },
            )?;
        }

        for sub in &agent.sub_agents {
            set.insert(
                &agent.name,
                ToolDescriptor {
                    definition: sub_agent_definition(sub),
                    kind: ToolKind::SubAgent(Arc::clone(sub)),
                },
            )?;
        }

        if let Some(session) = mcp {
            for tool in session.tools() {
                let definition = ToolDefinition::new(
                    tool.definition.name,
                    tool.definition.description.unwrap_or_default(),
                    tool.definition.input_schema,
                );
                set.insert(
                    &agent.name,
                    ToolDescriptor {
                        definition,
                        kind: ToolKind::Mcp {
                            server: tool.server,
                            session: Arc::clone(session),
                        },
                    },
                )?;
            }
        }

        Ok(set)
    }

    fn insert(&mut self, agent: &str, descriptor: ToolDescriptor) -> Result<()> {
        let name = descriptor.name().to_string();
        if self.index.contains_key(&name) {
            return Err(AgentError::DuplicateToolName {
                agent: agent.to_string(),
                tool_name: name,
            });
        }
        self.index.insert(name, self.descriptors.len());
        self.descriptors.push(descriptor);
        Ok(())
    }

    /// Look up a tool by the name the model used.
    pub fn resolve(&self, name: &str) -> Option<&ToolDescriptor> {
        self.index.get(name).map(|&i| &self.descriptors[i])
    }

    /// Schemas to send with each model request.
    pub fn definitions(&self) -> Vec<ToolDefinition> {
        self.descriptors.iter().map(|d| d.definition.clone()).collect()
    }

    pub fn iter(&self) -> impl Iterator<Item = &ToolDescriptor> {
        self.descriptors.iter()
    }

    pub fn len(&self) -> usize {
        self.descriptors.len()
    }

    pub fn is_empty(&self) -> bool {
        self.descriptors.is_empty()
    }
}
