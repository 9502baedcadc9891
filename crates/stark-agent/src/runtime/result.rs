use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use crate::llm::types::{Message, Role};

/// The outcome of one agent run.
///
/// Nested runs of sub-agents are kept twice: as a flat, depth-first list of
/// [`SubAgentRecord`]s covering every delegation anywhere below this agent,
/// and as a map from each *direct* sub-agent's name to its own `RunResult`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RunResult {
    pub agent_name: String,
    /// The final conversation, system turn included.
    pub result: Vec<Message>,
    /// Model calls made.
    pub iterations: u32,
    /// Set when the run stopped because it hit `max_iterations`.
    pub max_iterations_reached: bool,
    pub sub_agent_result: Vec<SubAgentRecord>,
    /// Latest run per direct sub-agent.
    pub sub_agents_response: BTreeMap<String, RunResult>,
}

impl RunResult {
    /// Text of the last plain assistant turn, if the run produced one.
    pub fn final_output(&self) -> Option<&str> {
        self.result
            .iter()
            .rev()
            .find(|m| m.role == Role::Assistant && m.tool_calls.is_empty())
            .map(|m| m.content.as_str())
    }

    pub fn last_message(&self) -> Option<&Message> {
        self.result.last()
    }
}

/// One sub-agent invocation anywhere in the delegation tree.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SubAgentRecord {
    pub agent_name: String,
    /// Agent names from the top-level agent down to this one.
    pub path: Vec<String>,
    /// The parent's tool call that started this run.
    pub tool_call_id: String,
    pub success: bool,
    /// Model calls the run consumed. A failed run reports no count, so this
    /// is zero whenever `success` is false.
    pub iterations: u32,
    pub max_iterations_reached: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub output: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

/// Payload of the `ITERATION_END` event.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct IterationData {
    pub iterations: u32,
    pub has_tool_calls: bool,
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::llm::types::ToolCall;

    fn result(messages: Vec<Message>) -> RunResult {
        RunResult {
            agent_name: "a".into(),
            result: messages,
            iterations: 1,
            max_iterations_reached: false,
            sub_agent_result: Vec::new(),
            sub_agents_response: BTreeMap::new(),
        }
    }

    #[test]
    fn final_output_skips_tool_turns() {
        let r = result(vec![
            Message::user("hi"),
            Message::assistant("first"),
            Message::assistant_tool_calls("thinking", vec![ToolCall::new("c", "t", "{}")]),
            Message::tool_result("c", "done", false),
        ]);
        assert_eq!(r.final_output(), Some("first"));
        assert_eq!(result(vec![Message::user("hi")]).final_output(), None);
    }
}
