//! Wrappers that keep a panicking hook from unwinding into a stream or turn.

use std::panic::{AssertUnwindSafe, catch_unwind};
use std::time::Duration;

use schat::{ChatEvent, TurnHooks, TurnOutcome};
use scommon::ThreadId;
use serde_json::Value;
use sprovider::{ProviderError, ProviderHooks, ProviderId, TokenUsage};
use stooling::{ToolError, ToolExecutionContext, ToolRuntimeHooks, ToolUse};

fn guarded(hook: &'static str, call: impl FnOnce()) {
    if catch_unwind(AssertUnwindSafe(call)).is_err() {
        tracing::warn!(phase = "observe", event = "hook_panicked", hook);
    }
}

pub struct SafeProviderHooks<H> {
    inner: H,
}

impl<H> SafeProviderHooks<H> {
    pub fn new(inner: H) -> Self {
        Self { inner }
    }
}

impl<H> ProviderHooks for SafeProviderHooks<H>
where
    H: ProviderHooks,
{
    fn on_stream_open(&self, provider: ProviderId, model: &str) {
        guarded("on_stream_open", || self.inner.on_stream_open(provider, model));
    }

    fn on_stream_rejected(&self, provider: ProviderId, model: &str, error: &ProviderError) {
        guarded("on_stream_rejected", || {
            self.inner.on_stream_rejected(provider, model, error)
        });
    }

    fn on_tool_call_dropped(&self, provider: ProviderId, tool_use_id: &str, reason: &str) {
        guarded("on_tool_call_dropped", || {
            self.inner.on_tool_call_dropped(provider, tool_use_id, reason)
        });
    }

    fn on_vendor_error(&self, provider: ProviderId, message: &str, status_code: u16) {
        guarded("on_vendor_error", || {
            self.inner.on_vendor_error(provider, message, status_code)
        });
    }

    fn on_stream_end(&self, provider: ProviderId, chunks: u64, elapsed: Duration) {
        guarded("on_stream_end", || {
            self.inner.on_stream_end(provider, chunks, elapsed)
        });
    }
}

pub struct SafeToolHooks<H> {
    inner: H,
}

impl<H> SafeToolHooks<H> {
    pub fn new(inner: H) -> Self {
        Self { inner }
    }
}

impl<H> ToolRuntimeHooks for SafeToolHooks<H>
where
    H: ToolRuntimeHooks,
{
    fn on_approval_requested(&self, tool_use: &ToolUse, context: &ToolExecutionContext) {
        guarded("on_approval_requested", || {
            self.inner.on_approval_requested(tool_use, context)
        });
    }

    fn on_approval_resolved(&self, tool_use: &ToolUse, approved: bool) {
        guarded("on_approval_resolved", || {
            self.inner.on_approval_resolved(tool_use, approved)
        });
    }

    fn on_execution_start(&self, tool_use: &ToolUse, context: &ToolExecutionContext) {
        guarded("on_execution_start", || {
            self.inner.on_execution_start(tool_use, context)
        });
    }

    fn on_execution_success(
        &self,
        tool_use: &ToolUse,
        context: &ToolExecutionContext,
        output: &Value,
        elapsed: Duration,
    ) {
        guarded("on_execution_success", || {
            self.inner
                .on_execution_success(tool_use, context, output, elapsed)
        });
    }

    fn on_execution_failure(
        &self,
        tool_use: &ToolUse,
        context: &ToolExecutionContext,
        error: &ToolError,
        elapsed: Duration,
    ) {
        guarded("on_execution_failure", || {
            self.inner
                .on_execution_failure(tool_use, context, error, elapsed)
        });
    }
}

pub struct SafeTurnHooks<H> {
    inner: H,
}

impl<H> SafeTurnHooks<H> {
    pub fn new(inner: H) -> Self {
        Self { inner }
    }
}

impl<H> TurnHooks for SafeTurnHooks<H>
where
    H: TurnHooks,
{
    fn on_turn_start(&self, thread_id: &ThreadId, model: &str, new_messages: usize) {
        guarded("on_turn_start", || {
            self.inner.on_turn_start(thread_id, model, new_messages)
        });
    }

    fn on_round_start(&self, thread_id: &ThreadId, round: usize) {
        guarded("on_round_start", || self.inner.on_round_start(thread_id, round));
    }

    fn on_event_committed(&self, thread_id: &ThreadId, event: &ChatEvent) {
        guarded("on_event_committed", || {
            self.inner.on_event_committed(thread_id, event)
        });
    }

    fn on_duplicate_event(&self, thread_id: &ThreadId, event_id: &str) {
        guarded("on_duplicate_event", || {
            self.inner.on_duplicate_event(thread_id, event_id)
        });
    }

    fn on_usage(&self, thread_id: &ThreadId, usage: &TokenUsage) {
        guarded("on_usage", || self.inner.on_usage(thread_id, usage));
    }

    fn on_turn_end(&self, thread_id: &ThreadId, outcome: TurnOutcome, elapsed: Duration) {
        guarded("on_turn_end", || {
            self.inner.on_turn_end(thread_id, outcome, elapsed)
        });
    }
}
