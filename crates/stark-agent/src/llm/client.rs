//! HTTP model gateway.
//!
//! Speaks the **Anthropic Messages API** and the **OpenAI Chat Completions
//! API** (including OpenAI-compatible endpoints such as a LiteLLM proxy,
//! Ollama or vLLM), both in one-shot and SSE streaming mode.

use std::time::Duration;

use async_trait::async_trait;
use futures::{Stream, StreamExt};
use reqwest::header::{AUTHORIZATION, CONTENT_TYPE, HeaderMap, HeaderValue};
use serde_json::{Value, json};

use crate::error::{AgentError, Result};
use crate::llm::gateway::{ChunkStream, ModelChunk, ModelGateway, ModelRequest};
use crate::llm::streaming::{AnthropicStreamAccumulator, SseAccumulator};
use crate::llm::streaming_openai::OpenAiStreamAccumulator;
use crate::llm::types::{Message, ModelResponse, Role, ToolCall, ToolDefinition};

// ---------------------------------------------------------------------------
// Constants
// ---------------------------------------------------------------------------

/// Default Anthropic API base URL.
pub const ANTHROPIC_BASE_URL: &str = "https://api.anthropic.com";

/// Default OpenAI API base URL.
pub const OPENAI_BASE_URL: &str = "https://api.openai.com/v1";

/// Anthropic API version header value.
const ANTHROPIC_VERSION: &str = "2023-06-01";

/// Anthropic requires `max_tokens`; used when the agent sets no cap.
const DEFAULT_MAX_TOKENS: u32 = 4096;

const REQUEST_TIMEOUT: Duration = Duration::from_secs(120);

// ---------------------------------------------------------------------------
// Configuration
// ---------------------------------------------------------------------------

/// Which wire format an endpoint speaks.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LlmProvider {
    /// Anthropic Messages API.
    Anthropic,
    /// OpenAI Chat Completions API (also covers OpenAI-compatible endpoints).
    OpenAI,
}

impl LlmProvider {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Anthropic => "anthropic",
            Self::OpenAI => "openai",
        }
    }
}

/// Connection settings for one provider endpoint.
#[derive(Debug, Clone)]
pub struct LlmClientConfig {
    pub provider: LlmProvider,
    pub api_key: String,
    pub base_url: String,
    /// Token cap used when the request carries none.
    pub max_tokens: u32,
    /// Attach `metadata.trace_id` to request bodies. Only proxies that
    /// understand the field (LiteLLM) should enable this.
    pub send_trace_metadata: bool,
}

impl LlmClientConfig {
    /// Configuration for the Anthropic API.
    pub fn anthropic(api_key: impl Into<String>) -> Self {
        Self {
            provider: LlmProvider::Anthropic,
            api_key: api_key.into(),
            base_url: ANTHROPIC_BASE_URL.to_owned(),
            max_tokens: DEFAULT_MAX_TOKENS,
            send_trace_metadata: false,
        }
    }

    /// Configuration for the OpenAI API.
    pub fn openai(api_key: impl Into<String>) -> Self {
        Self::openai_compatible(api_key, OPENAI_BASE_URL)
    }

    /// Configuration for any OpenAI-compatible endpoint.
    pub fn openai_compatible(api_key: impl Into<String>, base_url: impl Into<String>) -> Self {
        Self {
            provider: LlmProvider::OpenAI,
            api_key: api_key.into(),
            base_url: base_url.into(),
            max_tokens: DEFAULT_MAX_TOKENS,
            send_trace_metadata: false,
        }
    }

    /// Configuration for a LiteLLM proxy, which forwards trace metadata.
    pub fn litellm(api_key: impl Into<String>, base_url: impl Into<String>) -> Self {
        Self {
            send_trace_metadata: true,
            ..Self::openai_compatible(api_key, base_url)
        }
    }

    pub fn with_base_url(mut self, base_url: impl Into<String>) -> Self {
        self.base_url = base_url.into();
        self
    }
}

// ---------------------------------------------------------------------------
// Client
// ---------------------------------------------------------------------------

/// A [`ModelGateway`] backed by a provider's HTTP API.
#[derive(Debug, Clone)]
pub struct LlmClient {
    config: LlmClientConfig,
    http: reqwest::Client,
}

impl LlmClient {
    pub fn new(config: LlmClientConfig) -> Result<Self> {
        if config.api_key.is_empty() {
            return Err(AgentError::MissingApiKey {
                provider: config.provider.as_str().into(),
            });
        }

        let http = reqwest::Client::builder()
            .timeout(REQUEST_TIMEOUT)
            .build()
            .map_err(|e| AgentError::LlmRequestFailed {
                reason: format!("failed to build HTTP client: {e}"),
            })?;

        Ok(Self { config, http })
    }

    pub fn provider(&self) -> LlmProvider {
        self.config.provider
    }

    fn build_body(&self, request: &ModelRequest, stream: bool) -> Value {
        let mut body = match self.config.provider {
            LlmProvider::Anthropic => build_anthropic_request_body(request, self.config.max_tokens),
            LlmProvider::OpenAI => build_openai_request_body(request),
        };
        if stream {
            body["stream"] = json!(true);
        }
        if self.config.send_trace_metadata {
            if let Some(trace_id) = &request.trace_id {
                body["metadata"] = json!({ "trace_id": trace_id });
            }
        }
        body
    }

    fn headers(&self) -> Result<HeaderMap> {
        let mut headers = HeaderMap::new();
        let invalid = |e: reqwest::header::InvalidHeaderValue| AgentError::LlmRequestFailed {
            reason: format!("invalid API key header: {e}"),
        };

        match self.config.provider {
            LlmProvider::Anthropic => {
                headers.insert(
                    "x-api-key",
                    HeaderValue::from_str(&self.config.api_key).map_err(invalid)?,
                );
                headers.insert(
                    "anthropic-version",
                    HeaderValue::from_static(ANTHROPIC_VERSION),
                );
            }
            LlmProvider::OpenAI => {
                headers.insert(
                    AUTHORIZATION,
                    HeaderValue::from_str(&format!("Bearer {}", self.config.api_key))
                        .map_err(invalid)?,
                );
            }
        }
        headers.insert(CONTENT_TYPE, HeaderValue::from_static("application/json"));
        Ok(headers)
    }

    fn endpoint(&self) -> String {
        let base = self.config.base_url.trim_end_matches('/');
        match self.config.provider {
            LlmProvider::Anthropic => format!("{base}/v1/messages"),
            LlmProvider::OpenAI => format!("{base}/chat/completions"),
        }
    }

    /// POST the body and fail on a non-success status.
    async fn send(&self, body: &Value) -> Result<reqwest::Response> {
        let url = self.endpoint();
        tracing::debug!(
            url = %url,
            model = %body["model"],
            provider = self.config.provider.as_str(),
            "sending LLM request"
        );

        let resp = self
            .http
            .post(&url)
            .headers(self.headers()?)
            .json(body)
            .send()
            .await?;

        let status = resp.status();
        if !status.is_success() {
            let text = resp.text().await.unwrap_or_default();
            return Err(AgentError::LlmRequestFailed {
                reason: format!("API returned {status}: {text}"),
            });
        }
        Ok(resp)
    }
}

#[async_trait]
impl ModelGateway for LlmClient {
    async fn complete(&self, request: &ModelRequest) -> Result<ModelResponse> {
        let body = self.build_body(request, false);
        let resp = self.send(&body).await?;

        let text = resp
            .text()
            .await
            .map_err(|e| AgentError::LlmRequestFailed {
                reason: format!("failed to read response body: {e}"),
            })?;
        let v: Value = serde_json::from_str(&text).map_err(|e| AgentError::LlmParseFailed {
            reason: format!("invalid JSON response: {e}"),
        })?;

        match self.config.provider {
            LlmProvider::Anthropic => parse_anthropic_response(&v),
            LlmProvider::OpenAI => parse_openai_response(&v),
        }
    }

    async fn complete_stream(&self, request: &ModelRequest) -> Result<ChunkStream> {
        let body = self.build_body(request, true);
        let resp = self.send(&body).await?;

        Ok(match self.config.provider {
            LlmProvider::Anthropic => Box::pin(sse_chunks(resp, AnthropicStreamAccumulator::new())),
            LlmProvider::OpenAI => Box::pin(sse_chunks(resp, OpenAiStreamAccumulator::new())),
        })
    }
}

/// Turn an SSE response body into content chunks plus the completion marker.
///
/// Lines are split on raw bytes so multi-byte characters straddling network
/// chunks survive. A body that ends without the provider's stop event still
/// completes from what was accumulated.
#[allow(tail_expr_drop_order)]
fn sse_chunks<A>(resp: reqwest::Response, mut acc: A) -> impl Stream<Item = Result<ModelChunk>> + Send
where
    A: SseAccumulator + 'static,
{
    async_stream::try_stream! {
        let mut bytes = resp.bytes_stream();
        let mut buffer: Vec<u8> = Vec::new();

        'read: while let Some(chunk) = bytes.next().await {
            let chunk = chunk.map_err(|e| AgentError::LlmStreamError {
                reason: format!("stream read error: {e}"),
            })?;
            buffer.extend_from_slice(&chunk);

            while let Some(pos) = buffer.iter().position(|b| *b == b'\n') {
                let raw: Vec<u8> = buffer.drain(..=pos).collect();
                let line = std::str::from_utf8(&raw).map_err(|e| AgentError::LlmStreamError {
                    reason: format!("invalid UTF-8 in stream: {e}"),
                })?;
                if let Some(text) = acc.feed_line(line)? {
                    yield ModelChunk::Content(text);
                }
                if acc.is_done() {
                    break 'read;
                }
            }
        }

        if !acc.is_done() && !buffer.is_empty() {
            let line = String::from_utf8_lossy(&buffer).into_owned();
            if let Some(text) = acc.feed_line(&line)? {
                yield ModelChunk::Content(text);
            }
        }

        yield ModelChunk::Done(acc.finish());
    }
}

// ===========================================================================
// Anthropic format conversion
// ===========================================================================

/// Build the JSON body for the Anthropic Messages API.
pub fn build_anthropic_request_body(request: &ModelRequest, default_max_tokens: u32) -> Value {
    let (system_text, messages) = messages_to_anthropic(&request.messages);

    let mut body = json!({
        "model": request.model,
        "max_tokens": request.max_tokens.unwrap_or(default_max_tokens),
        "messages": messages,
    });

    if let Some(system) = system_text {
        body["system"] = json!(system);
    }

    if !request.tools.is_empty() {
        body["tools"] = tools_to_anthropic(&request.tools);
        if request.parallel_tool_calls == Some(false) {
            body["tool_choice"] = json!({ "type": "auto", "disable_parallel_tool_use": true });
        }
    }

    body
}

/// Split system turns out (Anthropic takes them as a top-level field) and
/// convert the rest. Consecutive tool results are merged into one user turn
/// because the API expects every result for a tool-use turn in the next
/// message.
fn messages_to_anthropic(messages: &[Message]) -> (Option<String>, Vec<Value>) {
    let mut system: Option<String> = None;
    let mut wire: Vec<Value> = Vec::with_capacity(messages.len());
    let mut pending_results: Vec<Value> = Vec::new();

    let flush = |wire: &mut Vec<Value>, pending: &mut Vec<Value>| {
        if !pending.is_empty() {
            wire.push(json!({ "role": "user", "content": std::mem::take(pending) }));
        }
    };

    for msg in messages {
        if msg.role != Role::Tool {
            flush(&mut wire, &mut pending_results);
        }
        match msg.role {
            Role::System => match &mut system {
                Some(existing) => {
                    existing.push('\n');
                    existing.push_str(&msg.content);
                }
                None => system = Some(msg.content.clone()),
            },
            Role::User => wire.push(json!({ "role": "user", "content": msg.content })),
            Role::Assistant if msg.tool_calls.is_empty() => {
                wire.push(json!({ "role": "assistant", "content": msg.content }));
            }
            Role::Assistant => {
                let mut content: Vec<Value> = Vec::new();
                if !msg.content.is_empty() {
                    content.push(json!({ "type": "text", "text": msg.content }));
                }
                for tc in &msg.tool_calls {
                    content.push(json!({
                        "type": "tool_use",
                        "id": tc.id,
                        "name": tc.name,
                        "input": tc.parsed_arguments(),
                    }));
                }
                wire.push(json!({ "role": "assistant", "content": content }));
            }
            Role::Tool => {
                let mut block = json!({
                    "type": "tool_result",
                    "tool_use_id": msg.tool_call_id,
                    "content": msg.content,
                });
                if msg.is_error {
                    block["is_error"] = json!(true);
                }
                pending_results.push(block);
            }
        }
    }
    flush(&mut wire, &mut pending_results);

    (system, wire)
}

fn tools_to_anthropic(tools: &[ToolDefinition]) -> Value {
    tools
        .iter()
        .map(|t| {
            json!({
                "name": t.name,
                "description": t.description,
                "input_schema": t.input_schema,
            })
        })
        .collect()
}

/// Parse a non-streaming Anthropic Messages API response.
pub fn parse_anthropic_response(v: &Value) -> Result<ModelResponse> {
    let content = v["content"]
        .as_array()
        .ok_or_else(|| AgentError::LlmParseFailed {
            reason: "missing `content` array in response".into(),
        })?;

    let mut response = ModelResponse::default();
    for block in content {
        match block["type"].as_str() {
            Some("text") => {
                if let Some(t) = block["text"].as_str() {
                    response.content.push_str(t);
                }
            }
            Some("tool_use") => match block["name"].as_str() {
                Some(name) if !name.is_empty() => response.tool_calls.push(ToolCall::new(
                    block["id"].as_str().unwrap_or_default(),
                    name,
                    block["input"].to_string(),
                )),
                _ => tracing::warn!("dropping tool_use block without a name"),
            },
            _ => {}
        }
    }
    Ok(response)
}

// ===========================================================================
// OpenAI format conversion
// ===========================================================================

/// Build the JSON body for the OpenAI Chat Completions API.
pub fn build_openai_request_body(request: &ModelRequest) -> Value {
    let mut body = json!({
        "model": request.model,
        "messages": messages_to_openai(&request.messages),
    });

    if let Some(max_tokens) = request.max_tokens {
        body["max_tokens"] = json!(max_tokens);
    }

    if !request.tools.is_empty() {
        body["tools"] = tools_to_openai(&request.tools);
        if let Some(parallel) = request.parallel_tool_calls {
            body["parallel_tool_calls"] = json!(parallel);
        }
    }

    body
}

/// Convert messages to the OpenAI wire format: system turns stay inline,
/// tool calls go under `assistant.tool_calls`, and tool results use
/// `role: "tool"`.
pub fn messages_to_openai(messages: &[Message]) -> Vec<Value> {
    messages
        .iter()
        .map(|msg| match msg.role {
            Role::System => json!({ "role": "system", "content": msg.content }),
            Role::User => json!({ "role": "user", "content": msg.content }),
            Role::Assistant if msg.tool_calls.is_empty() => {
                json!({ "role": "assistant", "content": msg.content })
            }
            Role::Assistant => {
                let tool_calls: Vec<Value> = msg
                    .tool_calls
                    .iter()
                    .map(|tc| {
                        json!({
                            "id": tc.id,
                            "type": "function",
                            "function": { "name": tc.name, "arguments": tc.arguments },
                        })
                    })
                    .collect();
                let mut m = json!({ "role": "assistant", "tool_calls": tool_calls });
                if !msg.content.is_empty() {
                    m["content"] = json!(msg.content);
                }
                m
            }
            Role::Tool => json!({
                "role": "tool",
                "tool_call_id": msg.tool_call_id,
                "content": msg.content,
            }),
        })
        .collect()
}

/// OpenAI wraps each tool in `{"type": "function", "function": {...}}`.
pub fn tools_to_openai(tools: &[ToolDefinition]) -> Value {
    tools
        .iter()
        .map(|t| {
            json!({
                "type": "function",
                "function": {
                    "name": t.name,
                    "description": t.description,
                    "parameters": t.input_schema,
                }
            })
        })
        .collect()
}

/// Parse a non-streaming OpenAI Chat Completions response.
pub fn parse_openai_response(v: &Value) -> Result<ModelResponse> {
    let message = &v["choices"][0]["message"];
    if message.is_null() {
        return Err(AgentError::LlmParseFailed {
            reason: "missing `choices[0].message` in response".into(),
        });
    }

    let tool_calls = message["tool_calls"]
        .as_array()
        .map(|calls| {
            calls
                .iter()
                .filter_map(|tc| {
                    let func = &tc["function"];
                    // Same rule as the streaming accumulator: a call without
                    // a name cannot be resolved and is dropped.
                    let name = func["name"].as_str().filter(|n| !n.is_empty())?;
                    let arguments = match &func["arguments"] {
                        Value::String(s) => s.clone(),
                        Value::Null => String::new(),
                        other => other.to_string(),
                    };
                    Some(ToolCall::new(
                        tc["id"].as_str().unwrap_or_default(),
                        name,
                        arguments,
                    ))
                })
                .collect()
        })
        .unwrap_or_default();

    Ok(ModelResponse {
        content: message["content"].as_str().unwrap_or_default().to_owned(),
        tool_calls,
    })
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;

    fn request(messages: Vec<Message>) -> ModelRequest {
        ModelRequest {
            model: "test-model".into(),
            provider: "openai".into(),
            messages,
            tools: Vec::new(),
            parallel_tool_calls: None,
            max_tokens: None,
            trace_id: None,
        }
    }

    fn read_file_tool() -> ToolDefinition {
        ToolDefinition::new(
            "read_file",
            "Read a file",
            json!({
                "type": "object",
                "properties": { "path": { "type": "string" } },
                "required": ["path"]
            }),
        )
    }

    // -- Anthropic -----------------------------------------------------------

    #[test]
    fn anthropic_body_splits_system() {
        let mut req = request(vec![Message::system("You are helpful."), Message::user("Hello")]);
        req.max_tokens = Some(1024);
        let body = build_anthropic_request_body(&req, DEFAULT_MAX_TOKENS);

        assert_eq!(body["model"], "test-model");
        assert_eq!(body["system"], "You are helpful.");
        assert_eq!(body["max_tokens"], 1024);
        assert!(body.get("stream").is_none());
        let messages = body["messages"].as_array().unwrap();
        assert_eq!(messages.len(), 1);
        assert_eq!(messages[0]["role"], "user");
        assert_eq!(messages[0]["content"], "Hello");
    }

    #[test]
    fn anthropic_body_defaults_max_tokens_and_disables_parallel() {
        let mut req = request(vec![Message::user("Read file.txt")]);
        req.tools = vec![read_file_tool()];
        req.parallel_tool_calls = Some(false);
        let body = build_anthropic_request_body(&req, 2048);

        assert_eq!(body["max_tokens"], 2048);
        assert_eq!(body["tools"][0]["name"], "read_file");
        assert_eq!(body["tools"][0]["input_schema"]["required"][0], "path");
        assert_eq!(body["tool_choice"]["disable_parallel_tool_use"], true);
    }

    #[test]
    fn anthropic_merges_consecutive_tool_results() {
        let req = request(vec![
            Message::user("Read two files"),
            Message::assistant_tool_calls(
                "",
                vec![
                    ToolCall::new("tc_01", "read_file", r#"{"path":"a"}"#),
                    ToolCall::new("tc_02", "read_file", r#"{"path":"b"}"#),
                ],
            ),
            Message::tool_result("tc_01", "contents a", false),
            Message::tool_result("tc_02", "no such file", true),
        ]);
        let body = build_anthropic_request_body(&req, DEFAULT_MAX_TOKENS);
        let messages = body["messages"].as_array().unwrap();

        assert_eq!(messages.len(), 3);
        assert_eq!(messages[1]["content"][0]["type"], "tool_use");
        assert_eq!(messages[1]["content"][0]["input"]["path"], "a");
        let results = messages[2]["content"].as_array().unwrap();
        assert_eq!(messages[2]["role"], "user");
        assert_eq!(results.len(), 2);
        assert_eq!(results[0]["tool_use_id"], "tc_01");
        assert!(results[0].get("is_error").is_none());
        assert_eq!(results[1]["is_error"], true);
    }

    #[test]
    fn parse_anthropic_text_and_tool_use() {
        let v = json!({
            "content": [
                {"type": "text", "text": "Let me check."},
                {"type": "tool_use", "id": "toolu_1", "name": "read_file", "input": {"path": "x"}}
            ]
        });
        let response = parse_anthropic_response(&v).unwrap();
        assert_eq!(response.content, "Let me check.");
        assert_eq!(response.tool_calls.len(), 1);
        assert_eq!(response.tool_calls[0].parsed_arguments(), json!({"path": "x"}));

        assert!(parse_anthropic_response(&json!({})).is_err());
    }

    // -- OpenAI --------------------------------------------------------------

    #[test]
    fn openai_body_forwards_parallel_flag_only_when_set() {
        let mut req = request(vec![Message::user("hi")]);
        req.tools = vec![read_file_tool()];

        let body = build_openai_request_body(&req);
        assert!(body.get("parallel_tool_calls").is_none());
        assert!(body.get("max_tokens").is_none());
        assert_eq!(body["tools"][0]["type"], "function");
        assert_eq!(body["tools"][0]["function"]["parameters"]["type"], "object");

        req.parallel_tool_calls = Some(true);
        req.max_tokens = Some(256);
        let body = build_openai_request_body(&req);
        assert_eq!(body["parallel_tool_calls"], true);
        assert_eq!(body["max_tokens"], 256);
    }

    #[test]
    fn openai_messages_round_trip_tool_turns() {
        let wire = messages_to_openai(&[
            Message::system("sys"),
            Message::assistant_tool_calls("", vec![ToolCall::new("call_1", "add", r#"{"a":1}"#)]),
            Message::tool_result("call_1", "2", false),
        ]);
        assert_eq!(wire[0]["role"], "system");
        assert_eq!(wire[1]["tool_calls"][0]["function"]["arguments"], r#"{"a":1}"#);
        assert!(wire[1].get("content").is_none());
        assert_eq!(wire[2]["role"], "tool");
        assert_eq!(wire[2]["tool_call_id"], "call_1");
    }

    #[test]
    fn parse_openai_responses() {
        let text = json!({"choices": [{"message": {"role": "assistant", "content": "hello"}}]});
        assert_eq!(parse_openai_response(&text).unwrap(), ModelResponse::text("hello"));

        let calls = json!({"choices": [{"message": {
            "role": "assistant",
            "content": null,
            "tool_calls": [{"id": "call_1", "type": "function", "function": {"name": "add", "arguments": "{\"a\": 1}"}}]
        }}]});
        let response = parse_openai_response(&calls).unwrap();
        assert_eq!(response.content, "");
        assert_eq!(response.tool_calls, vec![ToolCall::new("call_1", "add", "{\"a\": 1}")]);

        assert!(parse_openai_response(&json!({"choices": []})).is_err());
    }

    #[test]
    fn nameless_tool_calls_are_dropped_in_both_modes() {
        let blocking = parse_openai_response(&json!({"choices": [{"message": {
            "role": "assistant",
            "content": null,
            "tool_calls": [
                {"id": "call_1", "type": "function", "function": {"name": "", "arguments": "{}"}},
                {"id": "call_2", "type": "function", "function": {"name": "add", "arguments": "{}"}}
            ]
        }}]}))
        .unwrap();

        let mut acc = OpenAiStreamAccumulator::new();
        acc.feed_line(r#"data: {"choices":[{"index":0,"delta":{"tool_calls":[{"index":0,"id":"call_1","function":{"name":"","arguments":"{}"}}]}}]}"#).unwrap();
        acc.feed_line(r#"data: {"choices":[{"index":0,"delta":{"tool_calls":[{"index":1,"id":"call_2","function":{"name":"add","arguments":"{}"}}]},"finish_reason":"tool_calls"}]}"#).unwrap();
        acc.feed_line("data: [DONE]").unwrap();
        let streamed = acc.finish();

        assert_eq!(blocking.tool_calls, vec![ToolCall::new("call_2", "add", "{}")]);
        assert_eq!(streamed, blocking);

        let anthropic = parse_anthropic_response(&json!({"content": [
            {"type": "tool_use", "id": "toolu_1", "input": {}},
            {"type": "tool_use", "id": "toolu_2", "name": "add", "input": {}}
        ]}))
        .unwrap();
        assert_eq!(anthropic.tool_calls, vec![ToolCall::new("toolu_2", "add", "{}")]);
    }

    #[test]
    fn trace_metadata_only_for_litellm() {
        let mut req = request(vec![Message::user("hi")]);
        req.trace_id = Some("trace-1".into());

        let openai = LlmClient::new(LlmClientConfig::openai("k")).unwrap();
        assert!(openai.build_body(&req, false).get("metadata").is_none());

        let proxy = LlmClient::new(LlmClientConfig::litellm("k", "http://localhost:4000")).unwrap();
        let body = proxy.build_body(&req, true);
        assert_eq!(body["metadata"]["trace_id"], "trace-1");
        assert_eq!(body["stream"], true);
        assert_eq!(proxy.endpoint(), "http://localhost:4000/chat/completions");
    }

    #[test]
    fn empty_api_key_returns_error() {
        let err = LlmClient::new(LlmClientConfig::anthropic("")).unwrap_err();
        assert!(matches!(err, AgentError::MissingApiKey { provider } if provider == "anthropic"));
    }
}
