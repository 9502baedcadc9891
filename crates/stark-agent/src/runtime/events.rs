//! Lifecycle events of a streamed run.
//!
//! Per iteration the engine emits, in order: `ITERATION_START`,
//! `CONTENT_CHUNK`*, `MODEL_STREAM_COMPLETED`, `TOOL_CALLS` (only when the
//! model asked for tools), one `TOOL_RESPONSE` per call in request order, and
//! `ITERATION_END`. A single `AGENT_RUN_END` closes the stream.

use std::pin::Pin;
use std::task::{Context, Poll};

use futures::{Stream, StreamExt};
use serde::Serialize;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;

use crate::error::{AgentError, Result};
use crate::llm::types::{ModelResponse, ToolCall};
use crate::runtime::result::{IterationData, RunResult};
use crate::tools::ToolCallResult;

/// One event of a streamed run.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "event", content = "data", rename_all = "SCREAMING_SNAKE_CASE")]
pub enum StreamEvent {
    IterationStart(u32),
    ContentChunk(String),
    ToolCalls(Vec<ToolCall>),
    ToolResponse(ToolCallResult),
    IterationEnd(IterationData),
    ModelStreamCompleted(ModelResponse),
    AgentRunEnd(Box<RunResult>),
}

impl StreamEvent {
    /// Wire name of the event kind.
    pub fn kind(&self) -> &'static str {
        match self {
            Self::IterationStart(_) => "ITERATION_START",
            Self::ContentChunk(_) => "CONTENT_CHUNK",
            Self::ToolCalls(_) => "TOOL_CALLS",
            Self::ToolResponse(_) => "TOOL_RESPONSE",
            Self::IterationEnd(_) => "ITERATION_END",
            Self::ModelStreamCompleted(_) => "MODEL_STREAM_COMPLETED",
            Self::AgentRunEnd(_) => "AGENT_RUN_END",
        }
    }

    /// The payload rendered as text: numbers and strings verbatim,
    /// everything else as JSON.
    pub fn data_dump(&self) -> String {
        let json = |value: serde_json::Result<String>| value.unwrap_or_default();
        match self {
            Self::IterationStart(n) => n.to_string(),
            Self::ContentChunk(text) => text.clone(),
            Self::ToolCalls(calls) => json(serde_json::to_string(calls)),
            Self::ToolResponse(result) => json(serde_json::to_string(result)),
            Self::IterationEnd(data) => json(serde_json::to_string(data)),
            Self::ModelStreamCompleted(response) => json(serde_json::to_string(response)),
            Self::AgentRunEnd(result) => json(serde_json::to_string(result)),
        }
    }
}

// ---------------------------------------------------------------------------
// EventSink
// ---------------------------------------------------------------------------

type EventSender = mpsc::UnboundedSender<Result<StreamEvent>>;

/// Where the engine publishes events. Blocking and awaitable runs use a
/// disconnected sink, so emitting is free and the engine code is shared.
#[derive(Clone, Default)]
pub(crate) struct EventSink(Option<EventSender>);

impl EventSink {
    pub(crate) fn none() -> Self {
        Self(None)
    }

    pub(crate) fn channel() -> (Self, mpsc::UnboundedReceiver<Result<StreamEvent>>) {
        let (tx, rx) = mpsc::unbounded_channel();
        (Self(Some(tx)), rx)
    }

    /// Whether anyone listens. Selects the streaming model call.
    pub(crate) fn is_streaming(&self) -> bool {
        self.0.is_some()
    }

    pub(crate) fn emit(&self, event: StreamEvent) {
        if let Some(tx) = &self.0 {
            // A dropped receiver only means nobody is watching any more.
            let _ = tx.send(Ok(event));
        }
    }

    pub(crate) fn fail(&self, error: AgentError) {
        if let Some(tx) = &self.0 {
            let _ = tx.send(Err(error));
        }
    }
}

// ---------------------------------------------------------------------------
// RunStream
// ---------------------------------------------------------------------------

/// The event stream returned by [`crate::Runner::run_stream`].
///
/// Ends after `AGENT_RUN_END`, or after a single `Err` item if the run
/// failed. Dropping the stream aborts the run.
pub struct RunStream {
    rx: mpsc::UnboundedReceiver<Result<StreamEvent>>,
    task: Option<JoinHandle<()>>,
}

impl RunStream {
    pub(crate) fn new(rx: mpsc::UnboundedReceiver<Result<StreamEvent>>, task: JoinHandle<()>) -> Self {
        Self {
            rx,
            task: Some(task),
        }
    }

    /// A stream that yields `error` and ends.
    pub(crate) fn failed(error: AgentError) -> Self {
        let (sink, rx) = EventSink::channel();
        sink.fail(error);
        Self { rx, task: None }
    }

    /// Drain the stream and return the final result.
    pub async fn into_result(mut self) -> Result<RunResult> {
        while let Some(item) = self.next().await {
            if let StreamEvent::AgentRunEnd(result) = item? {
                return Ok(*result);
            }
        }
        Err(AgentError::Internal(
            "event stream ended without AGENT_RUN_END".into(),
        ))
    }
}

impl Stream for RunStream {
    type Item = Result<StreamEvent>;

    fn poll_next(mut self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Option<Self::Item>> {
        self.rx.poll_recv(cx)
    }
}

impl Drop for RunStream {
    fn drop(&mut self) {
        if let Some(task) = &self.task {
            task.abort();
        }
    }
}
