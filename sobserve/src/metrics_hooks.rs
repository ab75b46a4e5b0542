//! Metrics-based observability hooks for provider streams, tool uses, and chat turns.
//!
//! ```rust
//! use sobserve::MetricsObservabilityHooks;
//! use sprovider::ProviderHooks;
//!
//! fn accepts_provider_hooks(_hooks: &dyn ProviderHooks) {}
//!
//! let hooks = MetricsObservabilityHooks;
//! accepts_provider_hooks(&hooks);
//! ```

use std::time::Duration;

use schat::{ChatEvent, TurnHooks, TurnOutcome};
use scommon::ThreadId;
use serde_json::Value;
use sprovider::{ProviderError, ProviderHooks, ProviderId, TokenUsage};
use stooling::{ToolError, ToolExecutionContext, ToolRuntimeHooks, ToolUse};

#[derive(Debug, Clone, Copy, Default)]
pub struct MetricsObservabilityHooks;

impl ProviderHooks for MetricsObservabilityHooks {
    fn on_stream_open(&self, provider: ProviderId, model: &str) {
        metrics::counter!(
            "sluice_provider_stream_open_total",
            "provider" => provider.to_string(),
            "model" => model.to_string()
        )
        .increment(1);
    }

    fn on_stream_rejected(&self, provider: ProviderId, _model: &str, error: &ProviderError) {
        metrics::counter!(
            "sluice_provider_stream_rejected_total",
            "provider" => provider.to_string(),
            "error_kind" => format!("{:?}", error.kind)
        )
        .increment(1);
    }

    fn on_tool_call_dropped(&self, provider: ProviderId, _tool_use_id: &str, _reason: &str) {
        metrics::counter!(
            "sluice_provider_tool_call_dropped_total",
            "provider" => provider.to_string()
        )
        .increment(1);
    }

    fn on_vendor_error(&self, provider: ProviderId, _message: &str, status_code: u16) {
        metrics::counter!(
            "sluice_provider_vendor_error_total",
            "provider" => provider.to_string(),
            "status_code" => status_code.to_string()
        )
        .increment(1);
    }

    fn on_stream_end(&self, provider: ProviderId, chunks: u64, elapsed: Duration) {
        metrics::histogram!(
            "sluice_provider_stream_duration_seconds",
            "provider" => provider.to_string()
        )
        .record(elapsed.as_secs_f64());
        metrics::histogram!(
            "sluice_provider_stream_chunks",
            "provider" => provider.to_string()
        )
        .record(chunks as f64);
    }
}

impl ToolRuntimeHooks for MetricsObservabilityHooks {
    fn on_approval_requested(&self, tool_use: &ToolUse, _context: &ToolExecutionContext) {
        metrics::counter!(
            "sluice_tool_approval_requested_total",
            "tool_name" => tool_use.tool_name().to_string()
        )
        .increment(1);
    }

    fn on_approval_resolved(&self, tool_use: &ToolUse, approved: bool) {
        metrics::counter!(
            "sluice_tool_approval_resolved_total",
            "tool_name" => tool_use.tool_name().to_string(),
            "decision" => if approved { "approved" } else { "rejected" }
        )
        .increment(1);
    }

    fn on_execution_start(&self, tool_use: &ToolUse, _context: &ToolExecutionContext) {
        metrics::counter!(
            "sluice_tool_execution_start_total",
            "tool_name" => tool_use.tool_name().to_string()
        )
        .increment(1);
    }

    fn on_execution_success(
        &self,
        tool_use: &ToolUse,
        _context: &ToolExecutionContext,
        _output: &Value,
        elapsed: Duration,
    ) {
        metrics::counter!(
            "sluice_tool_execution_success_total",
            "tool_name" => tool_use.tool_name().to_string()
        )
        .increment(1);
        metrics::histogram!(
            "sluice_tool_execution_duration_seconds",
            "tool_name" => tool_use.tool_name().to_string(),
            "status" => "success"
        )
        .record(elapsed.as_secs_f64());
    }

    fn on_execution_failure(
        &self,
        tool_use: &ToolUse,
        _context: &ToolExecutionContext,
        error: &ToolError,
        elapsed: Duration,
    ) {
        metrics::counter!(
            "sluice_tool_execution_failure_total",
            "tool_name" => tool_use.tool_name().to_string(),
            "error_kind" => format!("{:?}", error.kind)
        )
        .increment(1);
        metrics::histogram!(
            "sluice_tool_execution_duration_seconds",
            "tool_name" => tool_use.tool_name().to_string(),
            "status" => "failure"
        )
        .record(elapsed.as_secs_f64());
    }
}

impl TurnHooks for MetricsObservabilityHooks {
    fn on_turn_start(&self, _thread_id: &ThreadId, model: &str, _new_messages: usize) {
        metrics::counter!("sluice_chat_turn_start_total", "model" => model.to_string())
            .increment(1);
    }

    fn on_round_start(&self, _thread_id: &ThreadId, _round: usize) {
        metrics::counter!("sluice_chat_round_start_total").increment(1);
    }

    fn on_event_committed(&self, _thread_id: &ThreadId, event: &ChatEvent) {
        let failed = if event.failure_reason().is_some() {
            "true"
        } else {
            "false"
        };
        metrics::counter!("sluice_chat_event_committed_total", "failed" => failed).increment(1);
    }

    fn on_duplicate_event(&self, _thread_id: &ThreadId, _event_id: &str) {
        metrics::counter!("sluice_chat_duplicate_event_total").increment(1);
    }

    fn on_usage(&self, _thread_id: &ThreadId, usage: &TokenUsage) {
        metrics::counter!("sluice_chat_input_tokens_total").increment(u64::from(usage.input_tokens));
        metrics::counter!("sluice_chat_output_tokens_total")
            .increment(u64::from(usage.output_tokens));
    }

    fn on_turn_end(&self, _thread_id: &ThreadId, outcome: TurnOutcome, elapsed: Duration) {
        metrics::counter!("sluice_chat_turn_end_total", "outcome" => outcome.as_str())
            .increment(1);
        metrics::histogram!(
            "sluice_chat_turn_duration_seconds",
            "outcome" => outcome.as_str()
        )
        .record(elapsed.as_secs_f64());
    }
}
