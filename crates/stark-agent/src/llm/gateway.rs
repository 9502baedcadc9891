//! The model backend seam.
//!
//! The iteration engine only ever talks to a [`ModelGateway`]. A gateway
//! answers a [`ModelRequest`] either in one piece ([`ModelGateway::complete`])
//! or as a finite stream of [`ModelChunk`]s that always ends with a
//! [`ModelChunk::Done`] marker carrying the same structured outcome the
//! non-streaming call would have produced.

use std::collections::HashMap;
use std::pin::Pin;
use std::sync::Arc;

use async_trait::async_trait;
use futures::Stream;
use serde::Serialize;

use crate::error::{AgentError, Result};
use crate::llm::types::{Message, ModelResponse, ToolDefinition};

/// Everything the backend needs for one model call.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ModelRequest {
    /// Provider-specific model identifier.
    pub model: String,

    /// Which registered provider serves this request.
    pub provider: String,

    /// The full conversation so far.
    pub messages: Vec<Message>,

    /// Tools the model may call.
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub tools: Vec<ToolDefinition>,

    /// Forwarded to the provider only when set.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub parallel_tool_calls: Option<bool>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub max_tokens: Option<u32>,

    /// Opaque trace identifier attached to the request metadata.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub trace_id: Option<String>,
}

/// One item of a streamed completion.
///
/// Only text is forwarded incrementally. Tool-call fragments are assembled
/// by the provider accumulators and arrive whole in [`ModelChunk::Done`], so
/// `TOOL_CALLS` is emitted once per turn with complete arguments.
#[derive(Debug, Clone, PartialEq)]
pub enum ModelChunk {
    /// A fragment of assistant text.
    Content(String),
    /// Completion marker with the assembled response.
    Done(ModelResponse),
}

/// A finite stream of chunks.
pub type ChunkStream = Pin<Box<dyn Stream<Item = Result<ModelChunk>> + Send>>;

/// A language-model backend.
#[async_trait]
pub trait ModelGateway: Send + Sync {
    /// Run one completion to the end.
    async fn complete(&self, request: &ModelRequest) -> Result<ModelResponse>;

    /// Run one completion as a chunk stream.
    ///
    /// The default implementation wraps [`ModelGateway::complete`]: it emits
    /// the whole content as one chunk (if non-empty) and then the marker.
    async fn complete_stream(&self, request: &ModelRequest) -> Result<ChunkStream> {
        let response = self.complete(request).await?;
        let mut chunks = Vec::with_capacity(2);
        if !response.content.is_empty() {
            chunks.push(Ok(ModelChunk::Content(response.content.clone())));
        }
        chunks.push(Ok(ModelChunk::Done(response)));
        Ok(Box::pin(futures::stream::iter(chunks)))
    }
}

// ---------------------------------------------------------------------------
// ProviderRouter
// ---------------------------------------------------------------------------

/// Routes each request to the gateway registered for its provider name.
///
/// There is no global "current provider": the name travels with the agent
/// definition and the router is an ordinary value.
#[derive(Clone, Default)]
pub struct ProviderRouter {
    gateways: HashMap<String, Arc<dyn ModelGateway>>,
}

impl ProviderRouter {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register (or replace) the gateway for `provider`.
    pub fn register(mut self, provider: impl Into<String>, gateway: Arc<dyn ModelGateway>) -> Self {
        self.gateways.insert(provider.into(), gateway);
        self
    }

    pub fn providers(&self) -> impl Iterator<Item = &str> {
        self.gateways.keys().map(String::as_str)
    }

    fn route(&self, request: &ModelRequest) -> Result<&Arc<dyn ModelGateway>> {
        self.gateways
            .get(&request.provider)
            .ok_or_else(|| AgentError::NoModelConfigured {
                provider: request.provider.clone(),
            })
    }
}

#[async_trait]
impl ModelGateway for ProviderRouter {
    async fn complete(&self, request: &ModelRequest) -> Result<ModelResponse> {
        self.route(request)?.complete(request).await
    }

    async fn complete_stream(&self, request: &ModelRequest) -> Result<ChunkStream> {
        self.route(request)?.complete_stream(request).await
    }
}
