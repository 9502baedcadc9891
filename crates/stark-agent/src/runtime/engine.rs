//! The iteration loop.
//!
//! One [`IterationEngine`] drives one agent's conversation: call the model,
//! dispatch any requested tools, append their results in request order, and
//! repeat until the model answers with plain content or the iteration cap is
//! hit. The same loop serves all three run modes; the only difference is
//! whether the [`EventSink`] is connected.

use std::collections::BTreeMap;

use futures::StreamExt;
use futures::future::join_all;

use crate::agent::AgentSpec;
use crate::error::{AgentError, Result};
use crate::llm::gateway::{ModelChunk, ModelRequest};
use crate::llm::types::{Message, ModelResponse, Role, ToolCall};
use crate::runtime::delegation::{self, Delegation, DelegationPath};
use crate::runtime::events::{EventSink, StreamEvent};
use crate::runtime::result::{IterationData, RunResult, SubAgentRecord};
use crate::runtime::RunContext;
use crate::tools::{ToolCallResult, ToolKind, ToolSet, function, mcp};

/// A dispatched call: its result, plus the nested run if it was a delegation.
pub(crate) struct Dispatched {
    pub result: ToolCallResult,
    pub delegation: Option<Delegation>,
}

impl Dispatched {
    pub(crate) fn plain(result: ToolCallResult) -> Self {
        Self {
            result,
            delegation: None,
        }
    }
}

pub(crate) struct IterationEngine<'a> {
    pub ctx: &'a RunContext,
    pub agent: &'a AgentSpec,
    pub tools: &'a ToolSet,
    pub path: &'a DelegationPath,
    pub events: &'a EventSink,
}

impl IterationEngine<'_> {
    /// Run the loop to completion over `input`.
    pub(crate) async fn execute(&self, input: Vec<Message>) -> Result<RunResult> {
        let agent = self.agent;
        let mut conversation = install_instructions(input, &agent.instructions);
        let definitions = self.tools.definitions();

        let mut iterations = 0u32;
        let mut max_iterations_reached = false;
        let mut records: Vec<SubAgentRecord> = Vec::new();
        let mut responses: BTreeMap<String, RunResult> = BTreeMap::new();

        tracing::info!(
            run_id = %self.ctx.run_id,
            agent = %agent.name,
            depth = self.path.depth(),
            max_iterations = agent.max_iterations,
            tool_count = definitions.len(),
            "starting agent run"
        );

        loop {
            if iterations >= agent.max_iterations {
                tracing::warn!(
                    run_id = %self.ctx.run_id,
                    agent = %agent.name,
                    iterations,
                    "reached max iterations"
                );
                max_iterations_reached = true;
                break;
            }
            iterations += 1;
            self.events.emit(StreamEvent::IterationStart(iterations));
            tracing::debug!(agent = %agent.name, iteration = iterations, "iteration start");

            let request = ModelRequest {
                model: agent.model.clone(),
                provider: agent.provider.clone(),
                messages: conversation.clone(),
                tools: definitions.clone(),
                parallel_tool_calls: agent.parallel_tool_calls,
                max_tokens: agent.max_output_tokens,
                trace_id: agent.trace_id.clone(),
            };
            let response = self.call_model(&request).await?;

            if !response.has_tool_calls() {
                tracing::info!(
                    run_id = %self.ctx.run_id,
                    agent = %agent.name,
                    iteration = iterations,
                    response_len = response.content.len(),
                    "agent produced final answer"
                );
                conversation.push(response.into_message());
                self.events.emit(StreamEvent::IterationEnd(IterationData {
                    iterations,
                    has_tool_calls: false,
                }));
                break;
            }

            let calls = response.tool_calls.clone();
            tracing::info!(
                agent = %agent.name,
                iteration = iterations,
                tool_calls = calls.len(),
                parallel = agent.dispatches_in_parallel(),
                "dispatching tool calls"
            );
            conversation.push(response.into_message());
            self.events.emit(StreamEvent::ToolCalls(calls.clone()));

            let dispatched = self.dispatch(&calls, &conversation).await?;
            for outcome in dispatched {
                self.events.emit(StreamEvent::ToolResponse(outcome.result.clone()));
                conversation.push(outcome.result.to_message());
                if let Some(delegation) = outcome.delegation {
                    records.push(delegation.record);
                    if let Some(run) = delegation.run {
                        records.extend(run.sub_agent_result.iter().cloned());
                        responses.insert(run.agent_name.clone(), run);
                    }
                }
            }

            self.events.emit(StreamEvent::IterationEnd(IterationData {
                iterations,
                has_tool_calls: true,
            }));
        }

        Ok(RunResult {
            agent_name: agent.name.clone(),
            result: conversation,
            iterations,
            max_iterations_reached,
            sub_agent_result: records,
            sub_agents_response: responses,
        })
    }

    /// One model call. When streaming, content is forwarded chunk by chunk
    /// and the completion marker carries the structured response.
    async fn call_model(&self, request: &ModelRequest) -> Result<ModelResponse> {
        if !self.events.is_streaming() {
            return self.ctx.gateway.complete(request).await;
        }

        let mut chunks = self.ctx.gateway.complete_stream(request).await?;
        let mut done = None;
        while let Some(chunk) = chunks.next().await {
            match chunk? {
                ModelChunk::Content(text) => self.events.emit(StreamEvent::ContentChunk(text)),
                ModelChunk::Done(response) => {
                    done = Some(response);
                    break;
                }
            }
        }

        let response = done.ok_or_else(|| AgentError::LlmStreamError {
            reason: "model stream ended without a completion marker".into(),
        })?;
        self.events
            .emit(StreamEvent::ModelStreamCompleted(response.clone()));
        Ok(response)
    }

    /// Dispatch every call of one turn. Results come back in request order
    /// whatever the completion order.
    async fn dispatch(&self, calls: &[ToolCall], history: &[Message]) -> Result<Vec<Dispatched>> {
        if self.agent.dispatches_in_parallel() && calls.len() > 1 {
            join_all(calls.iter().map(|call| self.dispatch_one(call, history)))
                .await
                .into_iter()
                .collect()
        } else {
            let mut out = Vec::with_capacity(calls.len());
            for call in calls {
                out.push(self.dispatch_one(call, history).await?);
            }
            Ok(out)
        }
    }

    /// Resolve and invoke one call. Only configuration errors surfacing from
    /// a nested run are fatal; every other failure becomes a failed result.
    async fn dispatch_one(&self, call: &ToolCall, history: &[Message]) -> Result<Dispatched> {
        let Some(descriptor) = self.tools.resolve(&call.name) else {
            tracing::warn!(agent = %self.agent.name, tool = %call.name, call_id = %call.id, "unknown tool");
            let error = AgentError::UnknownTool {
                tool_name: call.name.clone(),
            };
            return Ok(Dispatched::plain(ToolCallResult::from_output(
                call,
                Err(error.to_string()),
            )));
        };

        let arguments = call.parsed_arguments();
        tracing::debug!(
            agent = %self.agent.name,
            tool = %call.name,
            call_id = %call.id,
            capability = ?descriptor.capability(),
            "executing tool"
        );

        match &descriptor.kind {
            ToolKind::Function(tool) => {
                let output = function::invoke(tool.as_ref(), arguments).await;
                if let Err(e) = &output {
                    tracing::warn!(tool = %call.name, error = %e, "tool execution failed");
                }
                Ok(Dispatched::plain(ToolCallResult::from_output(call, output)))
            }
            ToolKind::Mcp { server, session } => {
                let output = mcp::invoke(session.as_ref(), server, &descriptor.definition.name, arguments).await;
                Ok(Dispatched::plain(ToolCallResult::from_output(call, output)))
            }
            ToolKind::SubAgent(sub) => {
                delegation::delegate(self.ctx, sub, call, arguments, history, self.path).await
            }
        }
    }
}

/// Install `instructions` as the leading system turn.
pub(crate) fn install_instructions(mut messages: Vec<Message>, instructions: &str) -> Vec<Message> {
    if instructions.is_empty() {
        return messages;
    }
    match messages.first_mut() {
        Some(first) if first.role == Role::System => first.content = instructions.to_string(),
        _ => messages.insert(0, Message::system(instructions)),
    }
    messages
}
