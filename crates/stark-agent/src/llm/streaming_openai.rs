//! SSE stream parsing for the OpenAI Chat Completions API.
//!
//! OpenAI streams `data:` lines whose JSON payloads carry
//! `choices[0].delta` objects and ends with a `data: [DONE]` sentinel. Tool
//! calls arrive in fragments correlated by `index`.

use serde_json::Value;

use crate::error::{AgentError, Result};
use crate::llm::streaming::SseAccumulator;
use crate::llm::types::{ModelResponse, ToolCall};

/// Accumulates fragments from an OpenAI SSE stream into a complete response.
#[derive(Debug, Default)]
pub struct OpenAiStreamAccumulator {
    text: String,
    /// In-progress tool calls, positioned by their stream `index`.
    tool_call_builders: Vec<OpenAiToolCallBuilder>,
    finish_reason: Option<String>,
    done: bool,
}

#[derive(Debug, Default)]
struct OpenAiToolCallBuilder {
    id: String,
    name: String,
    arguments: String,
}

impl OpenAiStreamAccumulator {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn finish_reason(&self) -> Option<&str> {
        self.finish_reason.as_deref()
    }
}

impl SseAccumulator for OpenAiStreamAccumulator {
    fn feed_line(&mut self, line: &str) -> Result<Option<String>> {
        let line = line.trim_end();
        if line.is_empty() || line.starts_with(':') {
            return Ok(None);
        }

        // `event:` and other SSE fields carry nothing we need.
        let Some(data) = line.strip_prefix("data:") else {
            return Ok(None);
        };
        let data = data.trim();

        if data == "[DONE]" {
            self.done = true;
            return Ok(None);
        }

        let v: Value = serde_json::from_str(data).map_err(|e| AgentError::LlmParseFailed {
            reason: format!("invalid JSON in OpenAI SSE data: {e}"),
        })?;

        if let Some(message) = v["error"]["message"].as_str() {
            return Err(AgentError::LlmStreamError {
                reason: message.to_owned(),
            });
        }

        let choice = &v["choices"][0];
        if let Some(reason) = choice["finish_reason"].as_str() {
            self.finish_reason = Some(reason.to_owned());
        }

        let delta = &choice["delta"];
        if delta.is_null() {
            return Ok(None);
        }

        if let Some(tool_calls) = delta["tool_calls"].as_array() {
            for tc in tool_calls {
                let index = tc["index"].as_u64().unwrap_or(0) as usize;
                if self.tool_call_builders.len() <= index {
                    self.tool_call_builders
                        .resize_with(index + 1, OpenAiToolCallBuilder::default);
                }
                let builder = &mut self.tool_call_builders[index];

                if let Some(id) = tc["id"].as_str() {
                    builder.id = id.to_owned();
                }
                let func = &tc["function"];
                if let Some(name) = func["name"].as_str() {
                    builder.name.push_str(name);
                }
                if let Some(args) = func["arguments"].as_str() {
                    builder.arguments.push_str(args);
                }
            }
        }

        match delta["content"].as_str() {
            Some(content) if !content.is_empty() => {
                self.text.push_str(content);
                Ok(Some(content.to_owned()))
            }
            _ => Ok(None),
        }
    }

    fn is_done(&self) -> bool {
        self.done
    }

    fn finish(self) -> ModelResponse {
        ModelResponse {
            content: self.text,
            tool_calls: self
                .tool_call_builders
                .into_iter()
                .filter(|b| !b.name.is_empty())
                .map(|b| ToolCall::new(b.id, b.name, b.arguments))
                .collect(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn text_content_accumulation() {
        let mut acc = OpenAiStreamAccumulator::new();

        let delta1 = acc
            .feed_line(r#"data: {"id":"chatcmpl-1","choices":[{"index":0,"delta":{"content":"Hello"}}]}"#)
            .unwrap();
        assert_eq!(delta1, Some("Hello".to_owned()));

        let delta2 = acc
            .feed_line(r#"data: {"id":"chatcmpl-1","choices":[{"index":0,"delta":{"content":" world"}}]}"#)
            .unwrap();
        assert_eq!(delta2, Some(" world".to_owned()));

        assert_eq!(acc.finish(), ModelResponse::text("Hello world"));
    }

    #[test]
    fn done_sentinel_sets_flag() {
        let mut acc = OpenAiStreamAccumulator::new();
        assert!(!acc.is_done());
        assert!(acc.feed_line("data: [DONE]").unwrap().is_none());
        assert!(acc.is_done());
    }

    #[test]
    fn blank_and_comment_lines_ignored() {
        let mut acc = OpenAiStreamAccumulator::new();
        assert!(acc.feed_line("").unwrap().is_none());
        assert!(acc.feed_line(": keepalive").unwrap().is_none());
        assert!(acc.feed_line("event: message").unwrap().is_none());
    }

    #[test]
    fn tool_call_fragments_are_joined() {
        let mut acc = OpenAiStreamAccumulator::new();
        acc.feed_line(r#"data: {"choices":[{"index":0,"delta":{"tool_calls":[{"index":0,"id":"call_abc","function":{"name":"read_file","arguments":""}}]}}]}"#).unwrap();
        acc.feed_line(r#"data: {"choices":[{"index":0,"delta":{"tool_calls":[{"index":0,"function":{"arguments":"{\"path\":"}}]}}]}"#).unwrap();
        acc.feed_line(r#"data: {"choices":[{"index":0,"delta":{"tool_calls":[{"index":0,"function":{"arguments":"\"test.txt\"}"}}]},"finish_reason":"tool_calls"}]}"#).unwrap();
        acc.feed_line("data: [DONE]").unwrap();

        assert_eq!(acc.finish_reason(), Some("tool_calls"));
        let response = acc.finish();
        assert_eq!(
            response.tool_calls,
            vec![ToolCall::new("call_abc", "read_file", r#"{"path":"test.txt"}"#)]
        );
        assert_eq!(response.tool_calls[0].parsed_arguments()["path"], "test.txt");
    }

    #[test]
    fn multiple_tool_calls_keep_index_order() {
        let mut acc = OpenAiStreamAccumulator::new();
        acc.feed_line(r#"data: {"choices":[{"index":0,"delta":{"tool_calls":[{"index":1,"id":"call_2","function":{"name":"write_file","arguments":"{}"}}]}}]}"#).unwrap();
        acc.feed_line(r#"data: {"choices":[{"index":0,"delta":{"tool_calls":[{"index":0,"id":"call_1","function":{"name":"read_file","arguments":"{}"}}]}}]}"#).unwrap();

        let names: Vec<String> = acc.finish().tool_calls.into_iter().map(|c| c.name).collect();
        assert_eq!(names, vec!["read_file", "write_file"]);
    }

    #[test]
    fn empty_stream_returns_empty_text() {
        let response = OpenAiStreamAccumulator::new().finish();
        assert_eq!(response, ModelResponse::default());
    }

    #[test]
    fn invalid_json_returns_error() {
        let mut acc = OpenAiStreamAccumulator::new();
        assert!(acc.feed_line("data: {invalid json}").is_err());
    }
}
