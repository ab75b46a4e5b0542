//! Hooks for tool-use lifecycle events.
//!
//! ```rust
//! use stooling::{NoopToolRuntimeHooks, ToolRuntimeHooks};
//!
//! fn assert_hooks_trait(_hooks: &dyn ToolRuntimeHooks) {}
//!
//! let hooks = NoopToolRuntimeHooks;
//! assert_hooks_trait(&hooks);
//! ```

use std::time::Duration;

use serde_json::Value;

use crate::{ToolError, ToolExecutionContext, ToolUse};

pub trait ToolRuntimeHooks: Send + Sync {
    fn on_approval_requested(&self, _tool_use: &ToolUse, _context: &ToolExecutionContext) {}

    fn on_approval_resolved(&self, _tool_use: &ToolUse, _approved: bool) {}

    fn on_execution_start(&self, _tool_use: &ToolUse, _context: &ToolExecutionContext) {}

    fn on_execution_success(
        &self,
        _tool_use: &ToolUse,
        _context: &ToolExecutionContext,
        _output: &Value,
        _elapsed: Duration,
    ) {
    }

    fn on_execution_failure(
        &self,
        _tool_use: &ToolUse,
        _context: &ToolExecutionContext,
        _error: &ToolError,
        _elapsed: Duration,
    ) {
    }
}

#[derive(Debug, Default, Clone, Copy)]
pub struct NoopToolRuntimeHooks;

impl ToolRuntimeHooks for NoopToolRuntimeHooks {}
