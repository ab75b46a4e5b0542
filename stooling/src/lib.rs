//! Tool capabilities and the lifecycle of individual tool uses.
//!
//! ```rust
//! use scommon::ThreadId;
//! use serde_json::json;
//! use sprovider::{ToolCall, ToolDefinition};
//! use stooling::{ToolExecutionContext, ToolRegistry, ToolUseStatus};
//!
//! let mut registry = ToolRegistry::new();
//! registry.register_fn(
//!     ToolDefinition::new("echo", "Echoes input", json!({"type": "object"})),
//!     |input, _ctx| async move { Ok(input) },
//! );
//!
//! let tool_use = registry.instantiate(ToolCall {
//!     id: "toolu_1".to_string(),
//!     name: "echo".to_string(),
//!     input: json!({"x": 1}),
//! });
//! assert_eq!(tool_use.status(), ToolUseStatus::NotStarted);
//! assert!(!tool_use.requires_approval());
//!
//! let context = ToolExecutionContext::new(ThreadId::new());
//! assert!(context.metadata.is_empty());
//! ```

mod approval;
mod args;
mod builtin;
mod error;
mod hooks;
mod invocation;
mod registry;
mod status;
mod tool;
mod tool_use;
mod types;

pub mod prelude {
    pub use crate::{
        ApprovalHandler, Tool, ToolError, ToolErrorKind, ToolExecutionContext, ToolFuture,
        ToolInvocation, ToolRegistry, ToolUse, ToolUseStatus,
    };
}

pub use approval::{ApprovalDecision, ApprovalHandler, ApprovalQueue, ApprovalRequest, AutoApprove};
pub use args::{object_args, required_string};
pub use builtin::{
    CURRENT_TIME, CurrentTimeTool, READ_FILE, ReadFileTool, WRITE_FILE, WriteFileTool,
    register_builtin_tools,
};
pub use error::{ToolError, ToolErrorKind};
pub use hooks::{NoopToolRuntimeHooks, ToolRuntimeHooks};
pub use invocation::{ToolInvocation, ToolUseRecord, UnknownToolUse};
pub use registry::ToolRegistry;
pub use status::{ToolOutcome, ToolUseStatus};
pub use tool::{FunctionTool, Tool, ToolFuture};
pub use tool_use::ToolUse;
pub use types::{ToolExecutionContext, ToolExecutionResult};
