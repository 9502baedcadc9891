//! Model backend layer.
//!
//! - [`types`] -- Conversation turns, tool calls, model responses.
//! - [`gateway`] -- The [`ModelGateway`] seam and provider routing.
//! - [`client`] -- HTTP gateway for Anthropic and OpenAI-compatible APIs.
//! - [`streaming`] -- SSE parser for Anthropic incremental responses.
//! - [`streaming_openai`] -- SSE parser for OpenAI incremental responses.

pub mod client;
pub mod gateway;
pub mod streaming;
pub mod streaming_openai;
pub mod types;

pub use client::{LlmClient, LlmClientConfig, LlmProvider};
pub use gateway::{ChunkStream, ModelChunk, ModelGateway, ModelRequest, ProviderRouter};
pub use types::{Message, ModelResponse, Role, ToolCall, ToolDefinition};
