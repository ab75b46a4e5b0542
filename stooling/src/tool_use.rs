//! Live tool-use lifecycle object with an observable status channel.
//!
//! The [`ToolUse`] is the only writer of its status; readers subscribe to the
//! `watch` channel and always see the latest state.

use std::fmt::{Debug, Formatter};
use std::sync::Arc;
use std::time::Instant;

use serde_json::Value;
use sprovider::ToolCall;
use tokio::sync::watch;
use tokio_util::sync::CancellationToken;

use crate::{
    ApprovalDecision, ApprovalHandler, ApprovalRequest, Tool, ToolError, ToolExecutionContext,
    ToolExecutionResult, ToolRuntimeHooks, ToolUseRecord, ToolUseStatus,
};

pub struct ToolUse {
    tool_use_id: String,
    tool_name: String,
    input: Value,
    tool: Option<Arc<dyn Tool>>,
    status: watch::Sender<ToolUseStatus>,
    cancel: CancellationToken,
}

impl ToolUse {
    pub fn new(call: ToolCall, tool: Arc<dyn Tool>) -> Self {
        Self::build(call, Some(tool), ToolUseStatus::NotStarted)
    }

    /// A call naming a tool that is not registered; running it fails with `NotFound`.
    pub fn missing(call: ToolCall) -> Self {
        Self::build(call, None, ToolUseStatus::NotStarted)
    }

    pub fn restore(record: ToolUseRecord, tool: Option<Arc<dyn Tool>>) -> Self {
        let call = ToolCall {
            id: record.tool_use_id,
            name: record.tool_name,
            input: record.input,
        };
        Self::build(call, tool, record.status)
    }

    fn build(call: ToolCall, tool: Option<Arc<dyn Tool>>, status: ToolUseStatus) -> Self {
        Self {
            tool_use_id: call.id,
            tool_name: call.name,
            input: call.input,
            tool,
            status: watch::Sender::new(status),
            cancel: CancellationToken::new(),
        }
    }

    pub fn id(&self) -> &str {
        &self.tool_use_id
    }

    pub fn tool_name(&self) -> &str {
        &self.tool_name
    }

    pub fn input(&self) -> &Value {
        &self.input
    }

    pub fn is_registered(&self) -> bool {
        self.tool.is_some()
    }

    pub fn requires_approval(&self) -> bool {
        self.tool
            .as_ref()
            .is_some_and(|tool| tool.requires_approval())
    }

    pub fn describe(&self) -> String {
        match &self.tool {
            Some(tool) => tool.describe_use(&self.input),
            None => format!("{}({})", self.tool_name, self.input),
        }
    }

    pub fn status(&self) -> ToolUseStatus {
        self.status.borrow().clone()
    }

    pub fn subscribe(&self) -> watch::Receiver<ToolUseStatus> {
        self.status.subscribe()
    }

    /// Waits until the status reaches a terminal state.
    pub async fn terminal_status(&self) -> ToolUseStatus {
        let mut receiver = self.subscribe();
        match receiver.wait_for(ToolUseStatus::is_terminal).await {
            Ok(status) => status.clone(),
            Err(_) => self.status(),
        }
    }

    pub fn transition(&self, next: ToolUseStatus) -> Result<(), ToolError> {
        let mut from = "";
        let target = next.label();
        let changed = self.status.send_if_modified(|current| {
            if current.can_transition_to(&next) {
                *current = next;
                true
            } else {
                from = current.label();
                false
            }
        });

        if changed {
            Ok(())
        } else {
            Err(ToolError::other(format!("invalid transition {from} -> {target}"))
                .with_tool_name(self.tool_name.clone())
                .with_tool_use_id(self.tool_use_id.clone()))
        }
    }

    /// Moves the status forward, ignoring transitions a concurrent cancel made stale.
    fn advance(&self, next: ToolUseStatus) -> bool {
        match self.transition(next) {
            Ok(()) => true,
            Err(error) => {
                tracing::debug!(
                    tool_use_id = %self.tool_use_id,
                    reason = %error.message,
                    "tool use transition skipped"
                );
                false
            }
        }
    }

    /// Cancels execution and fails the tool use unless it already finished.
    pub fn cancel(&self) {
        self.cancel.cancel();
        if !self.status().is_terminal() {
            self.advance(ToolUseStatus::failure(self.cancellation_error()));
        }
    }

    /// Fails a tool use whose execution died without reporting a result.
    pub fn fail(&self, error: ToolError) {
        self.cancel.cancel();
        let status = self.status();
        if status.is_terminal() {
            return;
        }
        if status != ToolUseStatus::Running && !self.advance(ToolUseStatus::Running) {
            return;
        }
        self.advance(ToolUseStatus::failure(
            error
                .with_tool_name(self.tool_name.clone())
                .with_tool_use_id(self.tool_use_id.clone()),
        ));
    }

    pub fn cancellation_token(&self) -> CancellationToken {
        self.cancel.clone()
    }

    fn cancellation_error(&self) -> ToolError {
        ToolError::cancelled("tool use cancelled")
            .with_tool_name(self.tool_name.clone())
            .with_tool_use_id(self.tool_use_id.clone())
    }

    pub fn record(&self) -> ToolUseRecord {
        ToolUseRecord {
            tool_name: self.tool_name.clone(),
            tool_use_id: self.tool_use_id.clone(),
            input: self.input.clone(),
            status: self.status(),
        }
    }

    /// The output fed back to the model once the tool use is terminal.
    pub fn execution_result(&self) -> Option<ToolExecutionResult> {
        self.record().execution_result()
    }

    /// Drives the tool use from `not_started` to a terminal status.
    pub async fn run(
        &self,
        approvals: &dyn ApprovalHandler,
        context: &ToolExecutionContext,
        hooks: &dyn ToolRuntimeHooks,
    ) -> ToolUseStatus {
        let Some(tool) = self.tool.clone() else {
            let error = ToolError::not_found(format!("tool '{}' is not registered", self.tool_name))
                .with_tool_name(self.tool_name.clone())
                .with_tool_use_id(self.tool_use_id.clone());
            if self.advance(ToolUseStatus::Running) {
                hooks.on_execution_failure(self, context, &error, Default::default());
                self.advance(ToolUseStatus::failure(error));
            }
            return self.status();
        };

        if tool.requires_approval() {
            if !self.advance(ToolUseStatus::PendingApproval) {
                return self.status();
            }
            hooks.on_approval_requested(self, context);

            let request = ApprovalRequest::new(
                context.thread_id,
                self.tool_use_id.clone(),
                self.tool_name.clone(),
                self.describe(),
                self.input.clone(),
            );
            let decision = tokio::select! {
                biased;
                _ = self.cancel.cancelled() => {
                    approvals.withdraw(&self.tool_use_id);
                    self.cancel();
                    return self.status();
                }
                decision = approvals.request_approval(request) => decision,
            };

            match decision {
                ApprovalDecision::Approved => hooks.on_approval_resolved(self, true),
                ApprovalDecision::Rejected { reason } => {
                    hooks.on_approval_resolved(self, false);
                    self.advance(ToolUseStatus::ApprovalRejected { reason });
                    return self.status();
                }
            }
        }

        if !self.advance(ToolUseStatus::Running) {
            return self.status();
        }
        hooks.on_execution_start(self, context);
        let started = Instant::now();

        let result = match tool.decode_input(self.input.clone()) {
            Ok(input) => tokio::select! {
                biased;
                _ = self.cancel.cancelled() => Err(self.cancellation_error()),
                result = tool.invoke(&input, context) => result,
            },
            Err(error) => Err(error),
        };

        let elapsed = started.elapsed();
        match result {
            Ok(output) => {
                hooks.on_execution_success(self, context, &output, elapsed);
                self.advance(ToolUseStatus::success(output));
            }
            Err(error) => {
                let error = error
                    .with_tool_name(self.tool_name.clone())
                    .with_tool_use_id(self.tool_use_id.clone());
                hooks.on_execution_failure(self, context, &error, elapsed);
                self.advance(ToolUseStatus::failure(error));
            }
        }

        self.status()
    }
}

impl Debug for ToolUse {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ToolUse")
            .field("tool_use_id", &self.tool_use_id)
            .field("tool_name", &self.tool_name)
            .field("registered", &self.tool.is_some())
            .field("status", &self.status.borrow().label())
            .finish()
    }
}
