//! In-process tools.
//!
//! A [`LocalTool`] is called directly with the decoded argument object. Its
//! schema is supplied explicitly alongside the callable and forwarded to the
//! model untouched.

use std::future::Future;
use std::panic::AssertUnwindSafe;
use std::pin::Pin;

use async_trait::async_trait;
use futures::FutureExt;
use serde_json::Value;

use crate::error::Result;
use crate::llm::types::ToolDefinition;
use crate::tools::ToolOutput;

/// A tool implemented in the host process.
#[async_trait]
pub trait LocalTool: Send + Sync {
    /// Name, description and parameter schema shown to the model.
    fn definition(&self) -> ToolDefinition;

    /// Run the tool. The returned text is fed back to the model verbatim.
    async fn call(&self, arguments: Value) -> Result<String>;
}

type BoxedHandler =
    Box<dyn Fn(Value) -> Pin<Box<dyn Future<Output = Result<String>> + Send>> + Send + Sync>;

/// A [`LocalTool`] built from a closure.
///
/// ```ignore
/// let add = FnTool::new("add", "Add two integers", schema, |args| async move {
///     let a = args["a"].as_i64().unwrap_or_default();
///     let b = args["b"].as_i64().unwrap_or_default();
///     Ok((a + b).to_string())
/// });
/// ```
pub struct FnTool {
    definition: ToolDefinition,
    handler: BoxedHandler,
}

impl FnTool {
    pub fn new<F, Fut>(
        name: impl Into<String>,
        description: impl Into<String>,
        input_schema: Value,
        handler: F,
    ) -> Self
    where
        F: Fn(Value) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = Result<String>> + Send + 'static,
    {
        Self {
            definition: ToolDefinition::new(name, description, input_schema),
            handler: Box::new(move |args| Box::pin(handler(args))),
        }
    }
}

#[async_trait]
impl LocalTool for FnTool {
    fn definition(&self) -> ToolDefinition {
        self.definition.clone()
    }

    async fn call(&self, arguments: Value) -> Result<String> {
        (self.handler)(arguments).await
    }
}

/// Invoke a local tool, capturing both errors and panics as a failed output.
pub(crate) async fn invoke(tool: &dyn LocalTool, arguments: Value) -> ToolOutput {
    match AssertUnwindSafe(tool.call(arguments)).catch_unwind().await {
        Ok(Ok(content)) => Ok(content),
        Ok(Err(e)) => Err(e.to_string()),
        Err(panic) => {
            let detail = panic
                .downcast_ref::<&str>()
                .map(|s| s.to_string())
                .or_else(|| panic.downcast_ref::<String>().cloned())
                .unwrap_or_else(|| "unknown panic".into());
            Err(format!("tool panicked: {detail}"))
        }
    }
}
