//! Tracing plus optional metrics behind one hook value.
//!
//! ```rust
//! use sobserve::ObservabilityHooks;
//!
//! let hooks = ObservabilityHooks::new().with_metrics(true);
//! assert!(hooks.metrics_enabled());
//! ```

use std::time::Duration;

use schat::{ChatEvent, TurnHooks, TurnOutcome};
use scommon::ThreadId;
use serde_json::Value;
use sprovider::{ProviderError, ProviderHooks, ProviderId, TokenUsage};
use stooling::{ToolError, ToolExecutionContext, ToolRuntimeHooks, ToolUse};

use crate::{MetricsObservabilityHooks, TracingObservabilityHooks};

#[derive(Debug, Clone, Copy, Default)]
pub struct ObservabilityHooks {
    tracing: TracingObservabilityHooks,
    metrics: Option<MetricsObservabilityHooks>,
}

impl ObservabilityHooks {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_metrics(mut self, enabled: bool) -> Self {
        self.metrics = enabled.then_some(MetricsObservabilityHooks);
        self
    }

    pub fn metrics_enabled(&self) -> bool {
        self.metrics.is_some()
    }
}

impl ProviderHooks for ObservabilityHooks {
    fn on_stream_open(&self, provider: ProviderId, model: &str) {
        self.tracing.on_stream_open(provider, model);
        if let Some(metrics) = &self.metrics {
            metrics.on_stream_open(provider, model);
        }
    }

    fn on_stream_rejected(&self, provider: ProviderId, model: &str, error: &ProviderError) {
        self.tracing.on_stream_rejected(provider, model, error);
        if let Some(metrics) = &self.metrics {
            metrics.on_stream_rejected(provider, model, error);
        }
    }

    fn on_tool_call_dropped(&self, provider: ProviderId, tool_use_id: &str, reason: &str) {
        self.tracing.on_tool_call_dropped(provider, tool_use_id, reason);
        if let Some(metrics) = &self.metrics {
            metrics.on_tool_call_dropped(provider, tool_use_id, reason);
        }
    }

    fn on_vendor_error(&self, provider: ProviderId, message: &str, status_code: u16) {
        self.tracing.on_vendor_error(provider, message, status_code);
        if let Some(metrics) = &self.metrics {
            metrics.on_vendor_error(provider, message, status_code);
        }
    }

    fn on_stream_end(&self, provider: ProviderId, chunks: u64, elapsed: Duration) {
        self.tracing.on_stream_end(provider, chunks, elapsed);
        if let Some(metrics) = &self.metrics {
            metrics.on_stream_end(provider, chunks, elapsed);
        }
    }
}

impl ToolRuntimeHooks for ObservabilityHooks {
    fn on_approval_requested(&self, tool_use: &ToolUse, context: &ToolExecutionContext) {
        self.tracing.on_approval_requested(tool_use, context);
        if let Some(metrics) = &self.metrics {
            metrics.on_approval_requested(tool_use, context);
        }
    }

    fn on_approval_resolved(&self, tool_use: &ToolUse, approved: bool) {
        self.tracing.on_approval_resolved(tool_use, approved);
        if let Some(metrics) = &self.metrics {
            metrics.on_approval_resolved(tool_use, approved);
        }
    }

    fn on_execution_start(&self, tool_use: &ToolUse, context: &ToolExecutionContext) {
        self.tracing.on_execution_start(tool_use, context);
        if let Some(metrics) = &self.metrics {
            metrics.on_execution_start(tool_use, context);
        }
    }

    fn on_execution_success(
        &self,
        tool_use: &ToolUse,
        context: &ToolExecutionContext,
        output: &Value,
        elapsed: Duration,
    ) {
        self.tracing
            .on_execution_success(tool_use, context, output, elapsed);
        if let Some(metrics) = &self.metrics {
            metrics.on_execution_success(tool_use, context, output, elapsed);
        }
    }

    fn on_execution_failure(
        &self,
        tool_use: &ToolUse,
        context: &ToolExecutionContext,
        error: &ToolError,
        elapsed: Duration,
    ) {
        self.tracing
            .on_execution_failure(tool_use, context, error, elapsed);
        if let Some(metrics) = &self.metrics {
            metrics.on_execution_failure(tool_use, context, error, elapsed);
        }
    }
}

impl TurnHooks for ObservabilityHooks {
    fn on_turn_start(&self, thread_id: &ThreadId, model: &str, new_messages: usize) {
        self.tracing.on_turn_start(thread_id, model, new_messages);
        if let Some(metrics) = &self.metrics {
            metrics.on_turn_start(thread_id, model, new_messages);
        }
    }

    fn on_round_start(&self, thread_id: &ThreadId, round: usize) {
        self.tracing.on_round_start(thread_id, round);
        if let Some(metrics) = &self.metrics {
            metrics.on_round_start(thread_id, round);
        }
    }

    fn on_event_committed(&self, thread_id: &ThreadId, event: &ChatEvent) {
        self.tracing.on_event_committed(thread_id, event);
        if let Some(metrics) = &self.metrics {
            metrics.on_event_committed(thread_id, event);
        }
    }

    fn on_duplicate_event(&self, thread_id: &ThreadId, event_id: &str) {
        self.tracing.on_duplicate_event(thread_id, event_id);
        if let Some(metrics) = &self.metrics {
            metrics.on_duplicate_event(thread_id, event_id);
        }
    }

    fn on_usage(&self, thread_id: &ThreadId, usage: &TokenUsage) {
        self.tracing.on_usage(thread_id, usage);
        if let Some(metrics) = &self.metrics {
            metrics.on_usage(thread_id, usage);
        }
    }

    fn on_turn_end(&self, thread_id: &ThreadId, outcome: TurnOutcome, elapsed: Duration) {
        self.tracing.on_turn_end(thread_id, outcome, elapsed);
        if let Some(metrics) = &self.metrics {
            metrics.on_turn_end(thread_id, outcome, elapsed);
        }
    }
}
