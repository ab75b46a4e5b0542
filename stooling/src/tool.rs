//! Tool trait contract for registry-managed capabilities.
//!
//! ```rust
//! use serde_json::json;
//! use sprovider::ToolDefinition;
//! use stooling::{FunctionTool, Tool};
//!
//! let tool = FunctionTool::new(
//!     ToolDefinition::new("echo", "Echoes input", json!({"type": "object"})),
//!     |input, _ctx| async move { Ok(input) },
//! );
//!
//! assert_eq!(tool.definition().name, "echo");
//! assert!(!tool.requires_approval());
//! ```

use std::future::Future;
use std::sync::Arc;

use scommon::BoxFuture;
use serde_json::Value;
use sprovider::ToolDefinition;

use crate::{ToolError, ToolExecutionContext};

pub type ToolFuture<'a, T> = BoxFuture<'a, T>;

pub trait Tool: Send + Sync {
    fn definition(&self) -> ToolDefinition;

    /// Whether a human must approve the call before any side effect.
    fn requires_approval(&self) -> bool {
        false
    }

    /// Validates and normalizes model-supplied input before execution.
    fn decode_input(&self, input: Value) -> Result<Value, ToolError> {
        if input.is_object() {
            Ok(input)
        } else {
            Err(ToolError::invalid_arguments("expected JSON object arguments"))
        }
    }

    fn invoke<'a>(
        &'a self,
        input: &'a Value,
        context: &'a ToolExecutionContext,
    ) -> ToolFuture<'a, Result<Value, ToolError>>;

    /// One-line human readable rendering of a call, used in streamed content.
    fn describe_use(&self, input: &Value) -> String {
        format!("{}({input})", self.definition().name)
    }
}

type ToolHandler = dyn Fn(Value, ToolExecutionContext) -> ToolFuture<'static, Result<Value, ToolError>>
    + Send
    + Sync;

pub struct FunctionTool {
    definition: ToolDefinition,
    handler: Arc<ToolHandler>,
    requires_approval: bool,
}

impl FunctionTool {
    pub fn new<F, Fut>(definition: ToolDefinition, handler: F) -> Self
    where
        F: Fn(Value, ToolExecutionContext) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = Result<Value, ToolError>> + Send + 'static,
    {
        let handler: Arc<ToolHandler> =
            Arc::new(move |input, context| Box::pin(handler(input, context)));

        Self {
            definition,
            handler,
            requires_approval: false,
        }
    }

    pub fn requiring_approval(mut self) -> Self {
        self.requires_approval = true;
        self
    }
}

impl Tool for FunctionTool {
    fn definition(&self) -> ToolDefinition {
        self.definition.clone()
    }

    fn requires_approval(&self) -> bool {
        self.requires_approval
    }

    fn invoke<'a>(
        &'a self,
        input: &'a Value,
        context: &'a ToolExecutionContext,
    ) -> ToolFuture<'a, Result<Value, ToolError>> {
        (self.handler)(input.clone(), context.clone())
    }
}
