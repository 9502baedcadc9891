//! Shared test doubles: a scripted model gateway and an in-memory MCP seam.

#![allow(dead_code)]

use std::collections::{BTreeMap, HashMap, VecDeque};
use std::sync::Mutex;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

use async_trait::async_trait;
use serde_json::{Value, json};
use stark_agent::llm::ChunkStream;
use stark_agent::{
    AgentError, McpConnector, McpSession, ModelChunk, ModelGateway, ModelRequest, ModelResponse,
    Result, ToolCall, ToolOutput,
};
use stark_mcp::{McpServerConfig, McpTool, McpToolDefinition};

// ═══════════════════════════════════════════════════════════════════════
//  Scripted gateway
// ═══════════════════════════════════════════════════════════════════════

type Step = std::result::Result<ModelResponse, String>;

#[derive(Default)]
struct Script {
    steps: VecDeque<Step>,
    /// Keep answering with the last step instead of running dry.
    repeat_last: bool,
}

/// A deterministic gateway that answers from a per-model script and records
/// every request it receives.
#[derive(Default)]
pub struct ScriptedGateway {
    scripts: Mutex<HashMap<String, Script>>,
    requests: Mutex<Vec<ModelRequest>>,
}

impl ScriptedGateway {
    pub fn new() -> Self {
        Self::default()
    }

    /// Queue `responses` for requests made with `model`.
    pub fn script(self, model: &str, responses: Vec<ModelResponse>) -> Self {
        self.push(model, responses.into_iter().map(Ok).collect(), false)
    }

    /// Answer every request for `model` with `response`.
    pub fn repeat(self, model: &str, response: ModelResponse) -> Self {
        self.push(model, vec![Ok(response)], true)
    }

    /// Fail the next request for `model`.
    pub fn fail(self, model: &str, reason: &str) -> Self {
        self.push(model, vec![Err(reason.to_string())], false)
    }

    fn push(self, model: &str, steps: Vec<Step>, repeat_last: bool) -> Self {
        {
            let mut scripts = self.scripts.lock().unwrap();
            let script = scripts.entry(model.to_string()).or_default();
            script.steps.extend(steps);
            script.repeat_last = repeat_last;
        }
        self
    }

    pub fn into_arc(self) -> Arc<Self> {
        Arc::new(self)
    }

    pub fn requests(&self) -> Vec<ModelRequest> {
        self.requests.lock().unwrap().clone()
    }

    pub fn requests_for(&self, model: &str) -> Vec<ModelRequest> {
        self.requests()
            .into_iter()
            .filter(|r| r.model == model)
            .collect()
    }

    fn next(&self, request: &ModelRequest) -> Result<ModelResponse> {
        self.requests.lock().unwrap().push(request.clone());
        let mut scripts = self.scripts.lock().unwrap();
        let script = scripts.entry(request.model.clone()).or_default();
        let step = if script.repeat_last && script.steps.len() == 1 {
            script.steps.front().cloned()
        } else {
            script.steps.pop_front()
        };
        match step {
            Some(Ok(response)) => Ok(response),
            Some(Err(reason)) => Err(AgentError::LlmRequestFailed { reason }),
            None => Err(AgentError::LlmRequestFailed {
                reason: format!("script for `{}` exhausted", request.model),
            }),
        }
    }
}

#[async_trait]
impl ModelGateway for ScriptedGateway {
    async fn complete(&self, request: &ModelRequest) -> Result<ModelResponse> {
        self.next(request)
    }

    /// Streams content word by word, then the completion marker.
    async fn complete_stream(&self, request: &ModelRequest) -> Result<ChunkStream> {
        let response = self.next(request)?;
        let mut chunks: Vec<Result<ModelChunk>> = response
            .content
            .split_inclusive(' ')
            .map(|piece| Ok(ModelChunk::Content(piece.to_string())))
            .collect();
        chunks.push(Ok(ModelChunk::Done(response)));
        Ok(Box::pin(futures::stream::iter(chunks)))
    }
}

// ═══════════════════════════════════════════════════════════════════════
//  Response helpers
// ═══════════════════════════════════════════════════════════════════════

pub fn text(content: &str) -> ModelResponse {
    ModelResponse::text(content)
}

/// A response requesting one call per `(id, tool, arguments)`.
pub fn calls(requests: &[(&str, &str, Value)]) -> ModelResponse {
    ModelResponse::tool_calls(
        requests
            .iter()
            .map(|(id, name, args)| ToolCall::new(*id, *name, args.to_string()))
            .collect(),
    )
}

pub fn call(id: &str, tool: &str, args: Value) -> ModelResponse {
    calls(&[(id, tool, args)])
}

// ═══════════════════════════════════════════════════════════════════════
//  In-memory MCP
// ═══════════════════════════════════════════════════════════════════════

/// Counts connects and closes across every session it hands out.
#[derive(Default)]
pub struct FakeConnector {
    tools: Vec<&'static str>,
    pub connects: Arc<Mutex<Vec<String>>>,
    pub closes: Arc<AtomicUsize>,
}

impl FakeConnector {
    pub fn with_tools(tools: Vec<&'static str>) -> Self {
        Self {
            tools,
            ..Self::default()
        }
    }

    pub fn connected_agents(&self) -> Vec<String> {
        self.connects.lock().unwrap().clone()
    }

    pub fn close_count(&self) -> usize {
        self.closes.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl McpConnector for FakeConnector {
    async fn connect(
        &self,
        agent: &str,
        servers: &BTreeMap<String, McpServerConfig>,
    ) -> Result<Arc<dyn McpSession>> {
        self.connects.lock().unwrap().push(agent.to_string());
        let server = servers.keys().next().cloned().unwrap_or_default();
        Ok(Arc::new(FakeSession {
            server,
            tools: self.tools.clone(),
            closes: Arc::clone(&self.closes),
        }))
    }
}

struct FakeSession {
    server: String,
    tools: Vec<&'static str>,
    closes: Arc<AtomicUsize>,
}

#[async_trait]
impl McpSession for FakeSession {
    fn tools(&self) -> Vec<McpTool> {
        self.tools
            .iter()
            .map(|name| McpTool {
                server: self.server.clone(),
                definition: McpToolDefinition {
                    name: (*name).to_string(),
                    description: Some(format!("{name} via {}", self.server)),
                    input_schema: json!({"type": "object"}),
                },
            })
            .collect()
    }

    async fn call_tool(&self, server: &str, tool: &str, arguments: Value) -> ToolOutput {
        if tool == "broken" {
            return Err("server refused".into());
        }
        Ok(format!("{server}/{tool}: {arguments}"))
    }

    async fn close(&self) {
        self.closes.fetch_add(1, Ordering::SeqCst);
    }
}

pub fn mcp_server() -> McpServerConfig {
    McpServerConfig::new("fake-mcp")
}
