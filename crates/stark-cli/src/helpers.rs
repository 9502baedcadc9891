//! Shared helper functions used across CLI subcommands.

use std::io::IsTerminal;
use std::path::Path;

use anyhow::{Context, Result, bail};
use stark_agent::{AgentSpec, Message, ToolCapability, ToolSet};
use tracing_subscriber::EnvFilter;

// ---------------------------------------------------------------------------
// Tracing
// ---------------------------------------------------------------------------

/// Initialize the tracing subscriber with the given default log level.
/// Logs go to stderr so stdout carries only results.
pub fn init_tracing(default_level: &str) {
    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_level));

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .with_writer(std::io::stderr)
        .with_ansi(std::io::stderr().is_terminal())
        .compact()
        .init();
}

/// Environment lookup handed to provider resolution.
pub fn env_var(key: &str) -> Option<String> {
    std::env::var(key).ok()
}

// ---------------------------------------------------------------------------
// Input
// ---------------------------------------------------------------------------

/// Build the input conversation from `--input` or `--messages`.
pub fn load_input(input: Option<&str>, messages: Option<&Path>) -> Result<Vec<Message>> {
    match (input, messages) {
        (Some(text), _) => Ok(vec![Message::user(text)]),
        (None, Some(path)) => {
            let raw = std::fs::read_to_string(path)
                .with_context(|| format!("failed to read {}", path.display()))?;
            let messages: Vec<Message> = serde_json::from_str(&raw)
                .with_context(|| format!("{} is not a JSON array of messages", path.display()))?;
            if messages.is_empty() {
                bail!("{} holds no messages", path.display());
            }
            Ok(messages)
        }
        (None, None) => bail!("either --input or --messages is required"),
    }
}

// ---------------------------------------------------------------------------
// Agent tree
// ---------------------------------------------------------------------------

/// Render the agent tree with each agent's local tools, sub-agent tools
/// and MCP servers.
pub fn describe_tree(agent: &AgentSpec) -> Result<String> {
    let mut out = String::new();
    describe(agent, 0, &mut out)?;
    Ok(out)
}

fn describe(agent: &AgentSpec, depth: usize, out: &mut String) -> Result<()> {
    let indent = "  ".repeat(depth);
    out.push_str(&format!(
        "{indent}{} ({}/{}, max {} iterations)\n",
        agent.name, agent.provider, agent.model, agent.max_iterations
    ));

    let tools = ToolSet::build(agent, None)?;
    for tool in tools.iter() {
        let kind = match tool.capability() {
            ToolCapability::LocalFunction => "function",
            ToolCapability::SubAgent => "sub-agent",
            ToolCapability::Mcp => "mcp",
        };
        out.push_str(&format!("{indent}  - {} [{kind}]\n", tool.name()));
    }
    for (name, server) in &agent.mcp_servers {
        out.push_str(&format!("{indent}  * mcp server {name}: {}\n", server.command));
    }

    for sub in &agent.sub_agents {
        describe(sub, depth + 1, out)?;
    }
    Ok(())
}
