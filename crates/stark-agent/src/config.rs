//! Agent definition files and provider settings.
//!
//! Agents are declared in TOML:
//!
//! ```toml
//! name = "planner"
//! model = "gpt-4o-mini"
//! instructions = "Plan the trip."
//! parallel_tool_calls = true
//!
//! [mcp_servers.fs]
//! command = "mcp-server-filesystem"
//! args = ["/tmp"]
//!
//! [[sub_agents]]
//! name = "weather"
//! description = "Looks up forecasts."
//! model = "gpt-4o-mini"
//! ```
//!
//! Provider credentials come from the environment through an injected lookup
//! function, so resolution never reads process state directly.

use std::collections::{BTreeMap, BTreeSet};
use std::path::Path;
use std::sync::Arc;

use serde::{Deserialize, Serialize};
use stark_mcp::McpServerConfig;

use crate::agent::{AgentSpec, DEFAULT_MAX_ITERATIONS, DEFAULT_PROVIDER};
use crate::error::{AgentError, Result};
use crate::llm::{LlmClient, LlmClientConfig, ModelGateway, ProviderRouter};

/// The serialized form of an agent and its sub-agents.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct AgentDefinition {
    pub name: String,
    #[serde(default)]
    pub description: String,
    #[serde(default)]
    pub instructions: String,
    pub model: String,
    #[serde(default = "default_provider")]
    pub provider: String,
    #[serde(default = "default_max_iterations")]
    pub max_iterations: u32,
    #[serde(default)]
    pub max_output_tokens: Option<u32>,
    #[serde(default)]
    pub parallel_tool_calls: Option<bool>,
    #[serde(default)]
    pub trace_id: Option<String>,
    #[serde(default)]
    pub mcp_servers: BTreeMap<String, McpServerConfig>,
    #[serde(default)]
    pub sub_agents: Vec<AgentDefinition>,
}

fn default_provider() -> String {
    DEFAULT_PROVIDER.to_string()
}

fn default_max_iterations() -> u32 {
    DEFAULT_MAX_ITERATIONS
}

impl AgentDefinition {
    pub fn from_toml_str(source: &str) -> Result<Self> {
        toml::from_str(source).map_err(|e| AgentError::ConfigError {
            reason: format!("invalid agent definition: {e}"),
        })
    }

    /// Convert into a validated [`AgentSpec`], sub-agents included.
    pub fn to_spec(&self) -> Result<AgentSpec> {
        let mut builder = AgentSpec::builder(&self.name)
            .description(&self.description)
            .instructions(&self.instructions)
            .model(&self.model)
            .provider(&self.provider)
            .max_iterations(self.max_iterations);

        if let Some(tokens) = self.max_output_tokens {
            builder = builder.max_output_tokens(tokens);
        }
        if let Some(parallel) = self.parallel_tool_calls {
            builder = builder.parallel_tool_calls(parallel);
        }
        if let Some(trace_id) = &self.trace_id {
            builder = builder.trace_id(trace_id);
        }
        for (name, server) in &self.mcp_servers {
            builder = builder.mcp_server(name, server.clone());
        }
        for sub in &self.sub_agents {
            builder = builder.sub_agent_arc(Arc::new(sub.to_spec()?));
        }

        builder.build()
    }
}

/// Read and validate an agent definition file.
pub fn load_agent_file(path: impl AsRef<Path>) -> Result<AgentSpec> {
    let path = path.as_ref();
    let source = std::fs::read_to_string(path).map_err(|e| AgentError::ConfigError {
        reason: format!("failed to read {}: {e}", path.display()),
    })?;
    let spec = AgentDefinition::from_toml_str(&source)?.to_spec()?;
    tracing::debug!(path = %path.display(), agent = %spec.name, "loaded agent definition");
    Ok(spec)
}

// ---------------------------------------------------------------------------
// Provider settings
// ---------------------------------------------------------------------------

/// Resolve the client settings for `provider` from environment-style
/// variables read through `lookup`. Empty values count as unset.
pub fn provider_settings<F>(provider: &str, lookup: F) -> Result<LlmClientConfig>
where
    F: Fn(&str) -> Option<String>,
{
    let get = |key: &str| lookup(key).filter(|v| !v.trim().is_empty());
    let prefix = env_prefix(provider);
    let key_var = format!("{prefix}_API_KEY");
    let url_var = format!("{prefix}_BASE_URL");

    let api_key = get(&key_var).ok_or_else(|| AgentError::MissingApiKey {
        provider: provider.to_string(),
    })?;
    let base_url = get(&url_var);

    let config = match provider {
        "openai" => {
            let config = LlmClientConfig::openai(api_key);
            match base_url {
                Some(url) => config.with_base_url(url),
                None => config,
            }
        }
        "anthropic" => {
            let config = LlmClientConfig::anthropic(api_key);
            match base_url {
                Some(url) => config.with_base_url(url),
                None => config,
            }
        }
        "litellm" => LlmClientConfig::litellm(api_key, base_url.ok_or_else(|| missing(&url_var))?),
        _ => LlmClientConfig::openai_compatible(api_key, base_url.ok_or_else(|| missing(&url_var))?),
    };
    Ok(config)
}

fn missing(var: &str) -> AgentError {
    AgentError::ConfigError {
        reason: format!("{var} must be set"),
    }
}

/// `my-proxy` -> `MY_PROXY`.
fn env_prefix(provider: &str) -> String {
    provider
        .chars()
        .map(|c| {
            if c.is_ascii_alphanumeric() {
                c.to_ascii_uppercase()
            } else {
                '_'
            }
        })
        .collect()
}

/// Every provider named anywhere in the agent tree.
pub fn providers_used(agent: &AgentSpec) -> BTreeSet<String> {
    let mut out = BTreeSet::new();
    collect_providers(agent, &mut out);
    out
}

fn collect_providers(agent: &AgentSpec, out: &mut BTreeSet<String>) {
    out.insert(agent.provider.clone());
    for sub in &agent.sub_agents {
        collect_providers(sub, out);
    }
}

/// A router with one HTTP client per provider the agent tree uses.
pub fn provider_router<F>(agent: &AgentSpec, lookup: F) -> Result<ProviderRouter>
where
    F: Fn(&str) -> Option<String>,
{
    let mut router = ProviderRouter::new();
    for provider in providers_used(agent) {
        let client = LlmClient::new(provider_settings(&provider, &lookup)?)?;
        tracing::debug!(provider = %provider, "registered provider");
        router = router.register(provider, Arc::new(client) as Arc<dyn ModelGateway>);
    }
    Ok(router)
}
