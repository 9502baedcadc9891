//! Agent definitions.
//!
//! An [`AgentSpec`] is immutable once built. Parents hold their sub-agents
//! behind `Arc`, so a definition tree can be shared freely between runs and
//! threads.

use std::collections::{BTreeMap, HashSet};
use std::sync::Arc;

use stark_mcp::McpServerConfig;

use crate::error::{AgentError, Result};
use crate::tools::registry::sub_agent_definition;
use crate::tools::LocalTool;

/// Default bound on model calls per run.
pub const DEFAULT_MAX_ITERATIONS: u32 = 10;

/// Provider used when the definition does not name one.
pub const DEFAULT_PROVIDER: &str = "openai";

/// A declarative agent: instructions, model, tools and sub-agents.
#[derive(Clone)]
pub struct AgentSpec {
    pub name: String,
    /// Shown to a parent's model when this agent is offered as a tool.
    pub description: String,
    /// Installed as the leading system turn of every run.
    pub instructions: String,
    pub model: String,
    /// Key into the gateway's provider routing.
    pub provider: String,
    pub function_tools: Vec<Arc<dyn LocalTool>>,
    /// MCP server name -> launch descriptor.
    pub mcp_servers: BTreeMap<String, McpServerConfig>,
    pub sub_agents: Vec<Arc<AgentSpec>>,
    /// `None` leaves the provider default and dispatches sequentially.
    pub parallel_tool_calls: Option<bool>,
    pub max_iterations: u32,
    pub max_output_tokens: Option<u32>,
    pub trace_id: Option<String>,
}

impl AgentSpec {
    pub fn builder(name: impl Into<String>) -> AgentSpecBuilder {
        AgentSpecBuilder::new(name)
    }

    /// Whether tool calls from one turn are dispatched concurrently.
    pub fn dispatches_in_parallel(&self) -> bool {
        self.parallel_tool_calls == Some(true)
    }

    /// Check every configuration invariant of this agent and, recursively,
    /// of its sub-agents.
    pub fn validate(&self) -> Result<()> {
        let mut path = Vec::new();
        self.validate_at(&mut path)
    }

    fn validate_at(&self, path: &mut Vec<String>) -> Result<()> {
        if path.iter().any(|seen| seen == &self.name) {
            let mut cycle = path.clone();
            cycle.push(self.name.clone());
            return Err(AgentError::DelegationCycle { path: cycle });
        }

        if self.name.trim().is_empty() {
            return Err(config_error("agent name must not be empty"));
        }
        if !self
            .name
            .chars()
            .all(|c| c.is_ascii_alphanumeric() || c == '_' || c == '-')
        {
            return Err(config_error(format!(
                "agent name `{}` may only contain ASCII letters, digits, `_` and `-`",
                self.name
            )));
        }
        if self.model.trim().is_empty() {
            return Err(config_error(format!("agent `{}` has no model", self.name)));
        }
        if self.max_iterations == 0 {
            return Err(config_error(format!(
                "agent `{}`: max_iterations must be at least 1",
                self.name
            )));
        }

        let mut names = HashSet::new();
        for tool in &self.function_tools {
            let definition = tool.definition();
            check_schema(&definition.name, &definition.input_schema)?;
            if !names.insert(definition.name.clone()) {
                return Err(AgentError::DuplicateToolName {
                    agent: self.name.clone(),
                    tool_name: definition.name,
                });
            }
        }

        for sub in &self.sub_agents {
            if sub.description.trim().is_empty() {
                return Err(AgentError::MissingSubAgentDescription {
                    agent: sub.name.clone(),
                });
            }
            let tool_name = sub_agent_definition(sub).name;
            if !names.insert(tool_name.clone()) {
                return Err(AgentError::DuplicateToolName {
                    agent: self.name.clone(),
                    tool_name,
                });
            }
        }

        path.push(self.name.clone());
        for sub in &self.sub_agents {
            sub.validate_at(path)?;
        }
        path.pop();

        Ok(())
    }
}

impl std::fmt::Debug for AgentSpec {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let tools: Vec<String> = self
            .function_tools
            .iter()
            .map(|t| t.definition().name)
            .collect();
        f.debug_struct("AgentSpec")
            .field("name", &self.name)
            .field("model", &self.model)
            .field("provider", &self.provider)
            .field("function_tools", &tools)
            .field("mcp_servers", &self.mcp_servers.keys().collect::<Vec<_>>())
            .field("sub_agents", &self.sub_agents)
            .field("parallel_tool_calls", &self.parallel_tool_calls)
            .field("max_iterations", &self.max_iterations)
            .finish_non_exhaustive()
    }
}

fn config_error(reason: impl Into<String>) -> AgentError {
    AgentError::ConfigError {
        reason: reason.into(),
    }
}

fn check_schema(tool_name: &str, schema: &serde_json::Value) -> Result<()> {
    jsonschema::JSONSchema::compile(schema)
        .map(|_| ())
        .map_err(|e| AgentError::InvalidToolSchema {
            tool_name: tool_name.to_string(),
            reason: e.to_string(),
        })
}

// ---------------------------------------------------------------------------
// Builder
// ---------------------------------------------------------------------------

/// Builds and validates an [`AgentSpec`].
pub struct AgentSpecBuilder {
    spec: AgentSpec,
}

impl AgentSpecBuilder {
    fn new(name: impl Into<String>) -> Self {
        Self {
            spec: AgentSpec {
                name: name.into(),
                description: String::new(),
                instructions: String::new(),
                model: String::new(),
                provider: DEFAULT_PROVIDER.to_string(),
                function_tools: Vec::new(),
                mcp_servers: BTreeMap::new(),
                sub_agents: Vec::new(),
                parallel_tool_calls: None,
                max_iterations: DEFAULT_MAX_ITERATIONS,
                max_output_tokens: None,
                trace_id: None,
            },
        }
    }

    pub fn description(mut self, description: impl Into<String>) -> Self {
        self.spec.description = description.into();
        self
    }

    pub fn instructions(mut self, instructions: impl Into<String>) -> Self {
        self.spec.instructions = instructions.into();
        self
    }

    pub fn model(mut self, model: impl Into<String>) -> Self {
        self.spec.model = model.into();
        self
    }

    pub fn provider(mut self, provider: impl Into<String>) -> Self {
        self.spec.provider = provider.into();
        self
    }

    pub fn tool(self, tool: impl LocalTool + 'static) -> Self {
        self.tool_arc(Arc::new(tool))
    }

    pub fn tool_arc(mut self, tool: Arc<dyn LocalTool>) -> Self {
        self.spec.function_tools.push(tool);
        self
    }

    pub fn mcp_server(mut self, name: impl Into<String>, config: McpServerConfig) -> Self {
        self.spec.mcp_servers.insert(name.into(), config);
        self
    }

    pub fn sub_agent(self, agent: AgentSpec) -> Self {
        self.sub_agent_arc(Arc::new(agent))
    }

    pub fn sub_agent_arc(mut self, agent: Arc<AgentSpec>) -> Self {
        self.spec.sub_agents.push(agent);
        self
    }

    pub fn parallel_tool_calls(mut self, enabled: bool) -> Self {
        self.spec.parallel_tool_calls = Some(enabled);
        self
    }

    pub fn max_iterations(mut self, max_iterations: u32) -> Self {
        self.spec.max_iterations = max_iterations;
        self
    }

    pub fn max_output_tokens(mut self, max_output_tokens: u32) -> Self {
        self.spec.max_output_tokens = Some(max_output_tokens);
        self
    }

    pub fn trace_id(mut self, trace_id: impl Into<String>) -> Self {
        self.spec.trace_id = Some(trace_id.into());
        self
    }

    /// Validate and return the spec.
    pub fn build(self) -> Result<AgentSpec> {
        self.spec.validate()?;
        Ok(self.spec)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::tools::FnTool;
    use serde_json::json;

    fn noop(name: &str, schema: serde_json::Value) -> FnTool {
        FnTool::new(name, "noop", schema, |_| async { Ok(String::new()) })
    }

    fn leaf(name: &str) -> AgentSpec {
        AgentSpec::builder(name)
            .description(format!("{name} helper"))
            .model("m")
            .build()
            .unwrap()
    }

    #[test]
    fn defaults() {
        let spec = AgentSpec::builder("a").model("m").build().unwrap();
        assert_eq!(spec.max_iterations, DEFAULT_MAX_ITERATIONS);
        assert_eq!(spec.provider, "openai");
        assert_eq!(spec.parallel_tool_calls, None);
        assert!(!spec.dispatches_in_parallel());
    }

    #[test]
    fn rejects_missing_model_and_zero_iterations() {
        let err = AgentSpec::builder("a").build().unwrap_err();
        assert!(matches!(err, AgentError::ConfigError { .. }));

        let err = AgentSpec::builder("a").model("m").max_iterations(0).build().unwrap_err();
        assert!(err.to_string().contains("max_iterations"));
    }

    #[test]
    fn rejects_names_unfit_for_tool_names() {
        let err = AgentSpec::builder("Pizza Agent").model("m").build().unwrap_err();
        assert!(err.is_configuration());
        assert!(AgentSpec::builder("Pizza-Agent").model("m").build().is_ok());
    }

    #[test]
    fn sub_agent_needs_description() {
        let bare = AgentSpec::builder("bare").model("m").build().unwrap();
        let err = AgentSpec::builder("root")
            .model("m")
            .sub_agent(bare)
            .build()
            .unwrap_err();
        assert!(matches!(err, AgentError::MissingSubAgentDescription { agent } if agent == "bare"));
    }

    #[test]
    fn duplicate_tool_names_are_rejected() {
        let err = AgentSpec::builder("root")
            .model("m")
            .tool(noop("search", json!({"type": "object"})))
            .tool(noop("search", json!({"type": "object"})))
            .build()
            .unwrap_err();
        assert!(matches!(err, AgentError::DuplicateToolName { tool_name, .. } if tool_name == "search"));

        let err = AgentSpec::builder("root")
            .model("m")
            .sub_agent(leaf("x"))
            .sub_agent(leaf("x"))
            .build()
            .unwrap_err();
        assert!(matches!(err, AgentError::DuplicateToolName { tool_name, .. } if tool_name == "sub_agent__x"));
    }

    #[test]
    fn invalid_schema_is_rejected() {
        let err = AgentSpec::builder("root")
            .model("m")
            .tool(noop("bad", json!({"type": "not-a-type"})))
            .build()
            .unwrap_err();
        assert!(matches!(err, AgentError::InvalidToolSchema { tool_name, .. } if tool_name == "bad"));
    }

    #[test]
    fn repeated_name_on_a_delegation_path_is_a_cycle() {
        // root -> middle -> root (a different spec that reuses the name)
        let inner_root = leaf("root");
        let middle = AgentSpec::builder("middle")
            .description("middle layer")
            .model("m")
            .sub_agent(inner_root)
            .build()
            .unwrap();
        let err = AgentSpec::builder("root")
            .model("m")
            .sub_agent(middle)
            .build()
            .unwrap_err();
        match err {
            AgentError::DelegationCycle { path } => {
                assert_eq!(path, vec!["root", "middle", "root"]);
            }
            other => panic!("unexpected error: {other}"),
        }
    }

    #[test]
    fn same_name_on_sibling_branches_is_fine() {
        let a = AgentSpec::builder("a")
            .description("a")
            .model("m")
            .sub_agent(leaf("shared"))
            .build()
            .unwrap();
        let b = AgentSpec::builder("b")
            .description("b")
            .model("m")
            .sub_agent(leaf("shared"))
            .build()
            .unwrap();
        assert!(AgentSpec::builder("root").model("m").sub_agent(a).sub_agent(b).build().is_ok());
    }
}
