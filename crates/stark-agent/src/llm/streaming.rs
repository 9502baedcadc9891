//! SSE stream parsing for the Anthropic Messages API.
//!
//! The Anthropic streaming format sends `event:` and `data:` lines in
//! standard SSE format. [`SseParser`] turns those lines into typed
//! [`SseEvent`]s and [`AnthropicStreamAccumulator`] folds the events into a
//! [`ModelResponse`].

use serde_json::Value;

use crate::error::{AgentError, Result};
use crate::llm::types::{ModelResponse, ToolCall};

/// Something that consumes raw SSE lines and eventually yields a response.
///
/// Implemented once per provider wire format so the HTTP client can drive
/// any of them with the same byte loop.
pub trait SseAccumulator: Send {
    /// Feed one line. Returns a text delta when the line carried one.
    fn feed_line(&mut self, line: &str) -> Result<Option<String>>;

    /// Whether the provider signalled the end of the message.
    fn is_done(&self) -> bool;

    /// Build the final response from whatever has been accumulated.
    fn finish(self) -> ModelResponse;
}

// ---------------------------------------------------------------------------
// Events
// ---------------------------------------------------------------------------

/// Events emitted during SSE streaming from the Anthropic Messages API.
#[derive(Debug, Clone, PartialEq)]
pub enum SseEvent {
    MessageStart {
        message_id: String,
        model: String,
    },

    /// A new content block has started (`"text"` or `"tool_use"`).
    ContentBlockStart {
        index: u32,
        content_type: String,
        id: Option<String>,
        name: Option<String>,
    },

    ContentBlockDelta {
        index: u32,
        delta: SseDelta,
    },

    ContentBlockStop {
        index: u32,
    },

    /// Carries the stop reason (`"end_turn"`, `"tool_use"`, ...).
    MessageDelta {
        stop_reason: Option<String>,
    },

    MessageStop,

    Ping,

    /// The provider reported an error mid-stream.
    Error {
        message: String,
    },
}

/// Incremental delta within a streaming content block.
#[derive(Debug, Clone, PartialEq)]
pub enum SseDelta {
    TextDelta(String),
    InputJsonDelta(String),
}

// ---------------------------------------------------------------------------
// Parser
// ---------------------------------------------------------------------------

/// Parses raw SSE lines from the Anthropic Messages API stream.
///
/// Keeps the last `event:` type because an event spans two lines.
#[derive(Debug, Default)]
pub struct SseParser {
    current_event_type: Option<String>,
}

impl SseParser {
    pub fn new() -> Self {
        Self::default()
    }

    /// Feed a single line from the SSE stream.
    ///
    /// Returns `Some(event)` once a `data:` line completes an event, `None`
    /// for comments, blank lines and the `event:` line itself.
    pub fn parse_line(&mut self, line: &str) -> Result<Option<SseEvent>> {
        let line = line.trim_end();

        if line.starts_with(':') || line.is_empty() {
            return Ok(None);
        }

        if let Some(event_type) = line.strip_prefix("event:") {
            self.current_event_type = Some(event_type.trim().to_owned());
            return Ok(None);
        }

        if let Some(data) = line.strip_prefix("data:") {
            let data = data.trim_start();
            let event_type = match self.current_event_type.take() {
                Some(t) => t,
                // Some proxies drop the `event:` line; fall back to the
                // payload's own `type` field.
                None => match serde_json::from_str::<Value>(data) {
                    Ok(v) => json_string(&v, "type"),
                    Err(_) => "unknown".into(),
                },
            };
            return self.parse_event(&event_type, data);
        }

        tracing::trace!(line, "ignoring unrecognised SSE line");
        Ok(None)
    }

    fn parse_event(&self, event_type: &str, data: &str) -> Result<Option<SseEvent>> {
        match event_type {
            "message_start" => {
                let v = parse_json(data)?;
                let message = &v["message"];
                Ok(Some(SseEvent::MessageStart {
                    message_id: json_string(message, "id"),
                    model: json_string(message, "model"),
                }))
            }

            "content_block_start" => {
                let v = parse_json(data)?;
                let block = &v["content_block"];
                Ok(Some(SseEvent::ContentBlockStart {
                    index: json_index(&v),
                    content_type: json_string(block, "type"),
                    id: block["id"].as_str().map(String::from),
                    name: block["name"].as_str().map(String::from),
                }))
            }

            "content_block_delta" => {
                let v = parse_json(data)?;
                let delta_obj = &v["delta"];
                let delta = match delta_obj["type"].as_str().unwrap_or_default() {
                    "text_delta" => SseDelta::TextDelta(json_string(delta_obj, "text")),
                    "input_json_delta" => {
                        SseDelta::InputJsonDelta(json_string(delta_obj, "partial_json"))
                    }
                    other => {
                        tracing::debug!(delta_type = other, "ignoring unknown delta type");
                        return Ok(None);
                    }
                };
                Ok(Some(SseEvent::ContentBlockDelta {
                    index: json_index(&v),
                    delta,
                }))
            }

            "content_block_stop" => {
                let v = parse_json(data)?;
                Ok(Some(SseEvent::ContentBlockStop {
                    index: json_index(&v),
                }))
            }

            "message_delta" => {
                let v = parse_json(data)?;
                Ok(Some(SseEvent::MessageDelta {
                    stop_reason: v["delta"]["stop_reason"].as_str().map(String::from),
                }))
            }

            "message_stop" => Ok(Some(SseEvent::MessageStop)),

            "ping" => Ok(Some(SseEvent::Ping)),

            "error" => {
                let v = parse_json(data)?;
                Ok(Some(SseEvent::Error {
                    message: json_string(&v["error"], "message"),
                }))
            }

            _ => {
                if data.trim() == "[DONE]" {
                    Ok(Some(SseEvent::MessageStop))
                } else {
                    tracing::trace!(event_type, "ignoring unknown SSE event type");
                    Ok(None)
                }
            }
        }
    }
}

// ---------------------------------------------------------------------------
// Accumulator
// ---------------------------------------------------------------------------

/// Folds Anthropic stream events into a [`ModelResponse`].
#[derive(Debug, Default)]
pub struct AnthropicStreamAccumulator {
    parser: SseParser,
    text: String,
    tool_calls: Vec<ToolCallBuilder>,
    stop_reason: Option<String>,
    done: bool,
}

#[derive(Debug)]
struct ToolCallBuilder {
    id: String,
    name: String,
    input_json: String,
}

impl AnthropicStreamAccumulator {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn stop_reason(&self) -> Option<&str> {
        self.stop_reason.as_deref()
    }

    /// Apply one parsed event, returning its text delta if any.
    pub fn apply(&mut self, event: SseEvent) -> Result<Option<String>> {
        match event {
            SseEvent::ContentBlockStart {
                content_type,
                id,
                name,
                ..
            } if content_type == "tool_use" => {
                self.tool_calls.push(ToolCallBuilder {
                    id: id.unwrap_or_default(),
                    name: name.unwrap_or_default(),
                    input_json: String::new(),
                });
            }
            SseEvent::ContentBlockDelta { delta, .. } => match delta {
                SseDelta::TextDelta(t) => {
                    self.text.push_str(&t);
                    return Ok(Some(t));
                }
                SseDelta::InputJsonDelta(j) => {
                    if let Some(builder) = self.tool_calls.last_mut() {
                        builder.input_json.push_str(&j);
                    }
                }
            },
            SseEvent::MessageDelta { stop_reason } => self.stop_reason = stop_reason,
            SseEvent::MessageStop => self.done = true,
            SseEvent::Error { message } => {
                return Err(AgentError::LlmStreamError { reason: message });
            }
            _ => {}
        }
        Ok(None)
    }
}

impl SseAccumulator for AnthropicStreamAccumulator {
    fn feed_line(&mut self, line: &str) -> Result<Option<String>> {
        match self.parser.parse_line(line)? {
            Some(event) => self.apply(event),
            None => Ok(None),
        }
    }

    fn is_done(&self) -> bool {
        self.done
    }

    fn finish(self) -> ModelResponse {
        ModelResponse {
            content: self.text,
            tool_calls: self
                .tool_calls
                .into_iter()
                .filter(|b| !b.name.is_empty())
                .map(|b| ToolCall::new(b.id, b.name, b.input_json))
                .collect(),
        }
    }
}

// ---------------------------------------------------------------------------
// Helpers
// ---------------------------------------------------------------------------

/// Parse a JSON string, mapping errors to [`AgentError::LlmParseFailed`].
pub(crate) fn parse_json(data: &str) -> Result<Value> {
    serde_json::from_str(data).map_err(|e| AgentError::LlmParseFailed {
        reason: format!("invalid JSON in SSE data: {e}"),
    })
}

/// Extract a string field, or an empty string if missing.
pub(crate) fn json_string(v: &Value, field: &str) -> String {
    v[field].as_str().unwrap_or_default().to_owned()
}

fn json_index(v: &Value) -> u32 {
    v["index"].as_u64().unwrap_or(0) as u32
}
