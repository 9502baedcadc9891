//! Sub-agent delegation.
//!
//! A sub-agent tool call runs a fresh engine for the sub-agent, to
//! completion, and hands its final answer back to the parent as the tool's
//! text result. The nested run is returned alongside so the parent can fold
//! it into its own [`RunResult`].

use futures::future::BoxFuture;
use serde_json::Value;
use std::sync::Arc;

use crate::agent::AgentSpec;
use crate::error::{AgentError, Result};
use crate::llm::types::{Message, ToolCall};
use crate::runtime::engine::Dispatched;
use crate::runtime::events::EventSink;
use crate::runtime::result::{RunResult, SubAgentRecord};
use crate::runtime::{RunContext, execute_agent};
use crate::tools::ToolCallResult;

/// Agent names from the top-level agent down to the one currently running.
#[derive(Debug, Clone, PartialEq, Eq)]
pub(crate) struct DelegationPath(Vec<String>);

impl DelegationPath {
    pub(crate) fn root(agent: &str) -> Self {
        Self(vec![agent.to_string()])
    }

    /// Extend the path by `agent`, refusing to revisit a name already on it.
    pub(crate) fn child(&self, agent: &str) -> Result<Self> {
        let mut names = self.0.clone();
        names.push(agent.to_string());
        if self.0.iter().any(|n| n == agent) {
            return Err(AgentError::DelegationCycle { path: names });
        }
        Ok(Self(names))
    }

    pub(crate) fn names(&self) -> &[String] {
        &self.0
    }

    /// Zero for the top-level agent.
    pub(crate) fn depth(&self) -> usize {
        self.0.len().saturating_sub(1)
    }
}

/// What a delegation produced for the parent to fold in. `run` is absent
/// when the nested run failed.
pub(crate) struct Delegation {
    pub record: SubAgentRecord,
    pub run: Option<RunResult>,
}

/// Run `agent` as a tool call of the agent at `path`.
///
/// Configuration errors in the nested run abort the whole run; any other
/// failure is handed back to the parent's model as a failed result.
/// Boxed because delegation recurses through the engine.
pub(crate) fn delegate<'a>(
    ctx: &'a RunContext,
    agent: &'a Arc<AgentSpec>,
    call: &'a ToolCall,
    arguments: Value,
    history: &'a [Message],
    path: &'a DelegationPath,
) -> BoxFuture<'a, Result<Dispatched>> {
    Box::pin(async move {
        let child_path = path.child(&agent.name)?;
        let seed = seed_conversation(&arguments, history);

        tracing::info!(
            run_id = %ctx.run_id,
            agent = %agent.name,
            parent = %path.names().last().map(String::as_str).unwrap_or_default(),
            depth = child_path.depth(),
            call_id = %call.id,
            "delegating to sub-agent"
        );

        match execute_agent(ctx, agent, seed, &child_path, &EventSink::none()).await {
            Ok(run) => {
                let text = run.final_output().map(str::to_string).unwrap_or_else(|| {
                    format!(
                        "Sub-agent `{}` produced no final answer within {} iterations.",
                        agent.name, run.iterations
                    )
                });
                let record = SubAgentRecord {
                    agent_name: agent.name.clone(),
                    path: child_path.names().to_vec(),
                    tool_call_id: call.id.clone(),
                    success: true,
                    iterations: run.iterations,
                    max_iterations_reached: run.max_iterations_reached,
                    output: Some(text.clone()),
                    error: None,
                };
                Ok(Dispatched {
                    result: ToolCallResult::from_output(call, Ok(text)),
                    delegation: Some(Delegation {
                        record,
                        run: Some(run),
                    }),
                })
            }
            Err(e) if e.is_configuration() => Err(e),
            Err(e) => {
                tracing::warn!(agent = %agent.name, call_id = %call.id, error = %e, "sub-agent run failed");
                let error = format!("sub-agent `{}` failed: {e}", agent.name);
                let record = SubAgentRecord {
                    agent_name: agent.name.clone(),
                    path: child_path.names().to_vec(),
                    tool_call_id: call.id.clone(),
                    success: false,
                    iterations: 0,
                    max_iterations_reached: false,
                    output: None,
                    error: Some(error.clone()),
                };
                Ok(Dispatched {
                    result: ToolCallResult::from_output(call, Err(error)),
                    delegation: Some(Delegation { record, run: None }),
                })
            }
        }
    })
}

/// The nested conversation: the delegated `input`, or when that is absent
/// or blank, the parent's plain text turns.
pub(crate) fn seed_conversation(arguments: &Value, history: &[Message]) -> Vec<Message> {
    match arguments.get("input").and_then(Value::as_str) {
        Some(input) if !input.trim().is_empty() => vec![Message::user(input)],
        _ => history
            .iter()
            .filter(|m| m.is_text_turn())
            .cloned()
            .collect(),
    }
}
