//! Tracing-based observability hooks for provider streams, tool uses, and chat turns.
//!
//! ```rust
//! use schat::TurnHooks;
//! use sobserve::TracingObservabilityHooks;
//!
//! fn accepts_turn_hooks(_hooks: &dyn TurnHooks) {}
//!
//! let hooks = TracingObservabilityHooks;
//! accepts_turn_hooks(&hooks);
//! ```

use std::time::Duration;

use schat::{ChatEvent, TurnHooks, TurnOutcome};
use scommon::ThreadId;
use serde_json::Value;
use sprovider::{ProviderError, ProviderHooks, ProviderId, TokenUsage};
use stooling::{ToolError, ToolExecutionContext, ToolRuntimeHooks, ToolUse};

#[derive(Debug, Clone, Copy, Default)]
pub struct TracingObservabilityHooks;

impl ProviderHooks for TracingObservabilityHooks {
    fn on_stream_open(&self, provider: ProviderId, model: &str) {
        tracing::info!(
            phase = "provider",
            event = "stream_open",
            provider = %provider,
            model
        );
    }

    fn on_stream_rejected(&self, provider: ProviderId, model: &str, error: &ProviderError) {
        tracing::error!(
            phase = "provider",
            event = "stream_rejected",
            provider = %provider,
            model,
            error_kind = ?error.kind,
            status_code = error.effective_status(),
            retryable = error.retryable,
            error = %error
        );
    }

    fn on_tool_call_dropped(&self, provider: ProviderId, tool_use_id: &str, reason: &str) {
        tracing::warn!(
            phase = "provider",
            event = "tool_call_dropped",
            provider = %provider,
            tool_use_id,
            reason
        );
    }

    fn on_vendor_error(&self, provider: ProviderId, message: &str, status_code: u16) {
        tracing::error!(
            phase = "provider",
            event = "vendor_error",
            provider = %provider,
            status_code,
            message
        );
    }

    fn on_stream_end(&self, provider: ProviderId, chunks: u64, elapsed: Duration) {
        tracing::info!(
            phase = "provider",
            event = "stream_end",
            provider = %provider,
            chunks,
            elapsed_ms = elapsed.as_millis() as u64
        );
    }
}

impl ToolRuntimeHooks for TracingObservabilityHooks {
    fn on_approval_requested(&self, tool_use: &ToolUse, context: &ToolExecutionContext) {
        tracing::info!(
            phase = "tool",
            event = "approval_requested",
            tool_name = tool_use.tool_name(),
            tool_use_id = tool_use.id(),
            thread_id = %context.thread_id
        );
    }

    fn on_approval_resolved(&self, tool_use: &ToolUse, approved: bool) {
        tracing::info!(
            phase = "tool",
            event = "approval_resolved",
            tool_name = tool_use.tool_name(),
            tool_use_id = tool_use.id(),
            approved
        );
    }

    fn on_execution_start(&self, tool_use: &ToolUse, context: &ToolExecutionContext) {
        tracing::info!(
            phase = "tool",
            event = "execution_start",
            tool_name = tool_use.tool_name(),
            tool_use_id = tool_use.id(),
            thread_id = %context.thread_id
        );
    }

    fn on_execution_success(
        &self,
        tool_use: &ToolUse,
        context: &ToolExecutionContext,
        _output: &Value,
        elapsed: Duration,
    ) {
        tracing::info!(
            phase = "tool",
            event = "execution_success",
            tool_name = tool_use.tool_name(),
            tool_use_id = tool_use.id(),
            thread_id = %context.thread_id,
            elapsed_ms = elapsed.as_millis() as u64
        );
    }

    fn on_execution_failure(
        &self,
        tool_use: &ToolUse,
        context: &ToolExecutionContext,
        error: &ToolError,
        elapsed: Duration,
    ) {
        tracing::error!(
            phase = "tool",
            event = "execution_failure",
            tool_name = tool_use.tool_name(),
            tool_use_id = tool_use.id(),
            thread_id = %context.thread_id,
            elapsed_ms = elapsed.as_millis() as u64,
            error_kind = ?error.kind,
            retryable = error.retryable,
            error = %error
        );
    }
}

impl TurnHooks for TracingObservabilityHooks {
    fn on_turn_start(&self, thread_id: &ThreadId, model: &str, new_messages: usize) {
        tracing::info!(
            phase = "chat",
            event = "turn_start",
            thread_id = %thread_id,
            model,
            new_messages
        );
    }

    fn on_round_start(&self, thread_id: &ThreadId, round: usize) {
        tracing::debug!(phase = "chat", event = "round_start", thread_id = %thread_id, round);
    }

    fn on_event_committed(&self, thread_id: &ThreadId, event: &ChatEvent) {
        tracing::debug!(
            phase = "chat",
            event = "event_committed",
            thread_id = %thread_id,
            event_id = %event.id,
            failure_reason = event.failure_reason()
        );
    }

    fn on_duplicate_event(&self, thread_id: &ThreadId, event_id: &str) {
        tracing::warn!(
            phase = "chat",
            event = "duplicate_event",
            thread_id = %thread_id,
            event_id
        );
    }

    fn on_usage(&self, thread_id: &ThreadId, usage: &TokenUsage) {
        tracing::debug!(
            phase = "chat",
            event = "usage",
            thread_id = %thread_id,
            input_tokens = usage.input_tokens,
            output_tokens = usage.output_tokens
        );
    }

    fn on_turn_end(&self, thread_id: &ThreadId, outcome: TurnOutcome, elapsed: Duration) {
        tracing::info!(
            phase = "chat",
            event = "turn_end",
            thread_id = %thread_id,
            outcome = outcome.as_str(),
            elapsed_ms = elapsed.as_millis() as u64
        );
    }
}
