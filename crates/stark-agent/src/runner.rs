//! The public entry points.

use std::sync::Arc;

use uuid::Uuid;

use crate::agent::AgentSpec;
use crate::error::{AgentError, Result};
use crate::llm::gateway::ModelGateway;
use crate::llm::types::Message;
use crate::runtime::delegation::DelegationPath;
use crate::runtime::events::{EventSink, RunStream, StreamEvent};
use crate::runtime::result::RunResult;
use crate::runtime::{RunContext, execute_agent};
use crate::tools::{McpConnector, StdioConnector};

/// Runs an agent against a model gateway.
///
/// `run`, `run_async` and `run_stream` share one engine and produce the same
/// [`RunResult`] for the same input and a deterministic backend. A runner
/// holds no per-run state and may be reused and shared.
#[derive(Clone)]
pub struct Runner {
    agent: Arc<AgentSpec>,
    gateway: Arc<dyn ModelGateway>,
    connector: Arc<dyn McpConnector>,
}

impl Runner {
    /// MCP servers are launched as child processes unless another connector
    /// is set with [`Runner::with_mcp_connector`].
    pub fn new(agent: impl Into<Arc<AgentSpec>>, gateway: Arc<dyn ModelGateway>) -> Self {
        Self {
            agent: agent.into(),
            gateway,
            connector: Arc::new(StdioConnector),
        }
    }

    pub fn with_mcp_connector(mut self, connector: Arc<dyn McpConnector>) -> Self {
        self.connector = connector;
        self
    }

    pub fn agent(&self) -> &AgentSpec {
        &self.agent
    }

    /// Run to completion on the calling thread.
    ///
    /// Builds a private single-threaded runtime, so it must not be called
    /// from inside an async context; use [`Runner::run_async`] there.
    pub fn run(&self, input: Vec<Message>) -> Result<RunResult> {
        if tokio::runtime::Handle::try_current().is_ok() {
            return Err(AgentError::Internal(
                "Runner::run called inside an async runtime; use run_async".into(),
            ));
        }
        let runtime = tokio::runtime::Builder::new_current_thread()
            .enable_all()
            .build()
            .map_err(|e| AgentError::Internal(format!("failed to build runtime: {e}")))?;
        runtime.block_on(self.run_async(input))
    }

    /// Run to completion.
    pub async fn run_async(&self, input: Vec<Message>) -> Result<RunResult> {
        self.execute(input, &EventSink::none()).await
    }

    /// Run in the background and stream its events.
    ///
    /// The run is spawned on the current tokio runtime. The stream ends with
    /// `AGENT_RUN_END`, or with a single error item if the run failed or no
    /// runtime was available to spawn it on.
    pub fn run_stream(&self, input: Vec<Message>) -> RunStream {
        if tokio::runtime::Handle::try_current().is_err() {
            return RunStream::failed(AgentError::Internal(
                "Runner::run_stream called outside a tokio runtime; use run".into(),
            ));
        }
        let (sink, rx) = EventSink::channel();
        let runner = self.clone();
        let task = tokio::spawn(async move {
            match runner.execute(input, &sink).await {
                Ok(result) => sink.emit(StreamEvent::AgentRunEnd(Box::new(result))),
                Err(e) => sink.fail(e),
            }
        });
        RunStream::new(rx, task)
    }

    async fn execute(&self, input: Vec<Message>, events: &EventSink) -> Result<RunResult> {
        self.agent.validate()?;

        let ctx = RunContext {
            gateway: Arc::clone(&self.gateway),
            connector: Arc::clone(&self.connector),
            run_id: Uuid::now_v7(),
        };
        let path = DelegationPath::root(&self.agent.name);

        let outcome = execute_agent(&ctx, &self.agent, input, &path, events).await;
        match &outcome {
            Ok(result) => tracing::info!(
                run_id = %ctx.run_id,
                agent = %self.agent.name,
                iterations = result.iterations,
                max_iterations_reached = result.max_iterations_reached,
                sub_agent_runs = result.sub_agent_result.len(),
                "run finished"
            ),
            Err(e) => tracing::error!(run_id = %ctx.run_id, agent = %self.agent.name, error = %e, "run failed"),
        }
        outcome
    }
}

impl std::fmt::Debug for Runner {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Runner")
            .field("agent", &self.agent.name)
            .finish_non_exhaustive()
    }
}
