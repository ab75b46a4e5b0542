//! Approval collaborators that resolve `pending_approval` tool uses.

use std::collections::HashMap;
use std::sync::{Mutex, MutexGuard};

use scommon::{ThreadId, unix_millis};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use tokio::sync::oneshot;

use crate::{ToolError, ToolFuture};

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ApprovalRequest {
    pub thread_id: ThreadId,
    pub tool_use_id: String,
    pub tool_name: String,
    pub summary: String,
    pub input: Value,
    pub requested_at_ms: u64,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "decision", rename_all = "snake_case")]
pub enum ApprovalDecision {
    Approved,
    Rejected { reason: String },
}

pub trait ApprovalHandler: Send + Sync {
    /// Resolves once a decision for `request` is available.
    fn request_approval<'a>(&'a self, request: ApprovalRequest) -> ToolFuture<'a, ApprovalDecision>;

    /// Drops a request whose tool use was cancelled while waiting.
    fn withdraw(&self, _tool_use_id: &str) {}
}

#[derive(Debug, Default, Clone, Copy)]
pub struct AutoApprove;

impl ApprovalHandler for AutoApprove {
    fn request_approval<'a>(&'a self, _request: ApprovalRequest) -> ToolFuture<'a, ApprovalDecision> {
        Box::pin(async { ApprovalDecision::Approved })
    }
}

struct PendingApproval {
    request: ApprovalRequest,
    responder: oneshot::Sender<ApprovalDecision>,
}

/// Holds requests until an external caller approves or rejects them.
#[derive(Default)]
pub struct ApprovalQueue {
    pending: Mutex<HashMap<String, PendingApproval>>,
}

impl ApprovalQueue {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn pending(&self) -> Result<Vec<ApprovalRequest>, ToolError> {
        let mut requests: Vec<_> = self
            .lock()?
            .values()
            .map(|pending| pending.request.clone())
            .collect();
        requests.sort_by_key(|request| request.requested_at_ms);
        Ok(requests)
    }

    pub fn approve(&self, tool_use_id: &str) -> Result<(), ToolError> {
        self.resolve(tool_use_id, ApprovalDecision::Approved)
    }

    pub fn reject(&self, tool_use_id: &str, reason: impl Into<String>) -> Result<(), ToolError> {
        self.resolve(
            tool_use_id,
            ApprovalDecision::Rejected {
                reason: reason.into(),
            },
        )
    }

    fn resolve(&self, tool_use_id: &str, decision: ApprovalDecision) -> Result<(), ToolError> {
        let pending = self.lock()?.remove(tool_use_id).ok_or_else(|| {
            ToolError::not_found(format!("no pending approval for '{tool_use_id}'"))
                .with_tool_use_id(tool_use_id)
        })?;

        if pending.responder.send(decision).is_err() {
            tracing::debug!(tool_use_id, "approval resolved after the tool use went away");
        }
        Ok(())
    }

    fn lock(&self) -> Result<MutexGuard<'_, HashMap<String, PendingApproval>>, ToolError> {
        self.pending
            .lock()
            .map_err(|_| ToolError::other("approval queue lock poisoned"))
    }
}

impl ApprovalHandler for ApprovalQueue {
    fn request_approval<'a>(&'a self, request: ApprovalRequest) -> ToolFuture<'a, ApprovalDecision> {
        Box::pin(async move {
            let (responder, decision) = oneshot::channel();
            let tool_use_id = request.tool_use_id.clone();

            match self.lock() {
                Ok(mut pending) => {
                    pending.insert(tool_use_id, PendingApproval { request, responder });
                }
                Err(error) => {
                    return ApprovalDecision::Rejected {
                        reason: error.message,
                    };
                }
            }

            decision.await.unwrap_or_else(|_| ApprovalDecision::Rejected {
                reason: "approval request withdrawn".to_string(),
            })
        })
    }

    fn withdraw(&self, tool_use_id: &str) {
        if let Ok(mut pending) = self.lock() {
            pending.remove(tool_use_id);
        }
    }
}

impl ApprovalRequest {
    pub fn new(
        thread_id: ThreadId,
        tool_use_id: impl Into<String>,
        tool_name: impl Into<String>,
        summary: impl Into<String>,
        input: Value,
    ) -> Self {
        Self {
            thread_id,
            tool_use_id: tool_use_id.into(),
            tool_name: tool_name.into(),
            summary: summary.into(),
            input,
            requested_at_ms: unix_millis(),
        }
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use serde_json::json;

    use super::*;
    use crate::ToolErrorKind;

    fn request(id: &str) -> ApprovalRequest {
        ApprovalRequest::new(ThreadId::new(), id, "write_file", "write a.txt", json!({}))
    }

    async fn wait_for_pending(queue: &ApprovalQueue, count: usize) {
        while queue.pending().expect("queue lock").len() < count {
            tokio::task::yield_now().await;
        }
    }

    #[tokio::test]
    async fn queued_request_resolves_on_approve() {
        let queue = Arc::new(ApprovalQueue::new());
        let waiter = {
            let queue = Arc::clone(&queue);
            tokio::spawn(async move { queue.request_approval(request("toolu_1")).await })
        };

        wait_for_pending(&queue, 1).await;
        assert_eq!(queue.pending().expect("queue lock")[0].tool_use_id, "toolu_1");
        queue.approve("toolu_1").expect("approval should resolve");

        let decision = waiter.await.expect("waiter should join");
        assert_eq!(decision, ApprovalDecision::Approved);
        assert!(queue.pending().expect("queue lock").is_empty());
    }

    #[tokio::test]
    async fn rejection_carries_reason() {
        let queue = Arc::new(ApprovalQueue::new());
        let waiter = {
            let queue = Arc::clone(&queue);
            tokio::spawn(async move { queue.request_approval(request("toolu_2")).await })
        };

        wait_for_pending(&queue, 1).await;
        queue
            .reject("toolu_2", "not today")
            .expect("rejection should resolve");

        assert_eq!(
            waiter.await.expect("waiter should join"),
            ApprovalDecision::Rejected {
                reason: "not today".to_string()
            }
        );
    }

    #[test]
    fn resolving_unknown_request_is_not_found() {
        let queue = ApprovalQueue::new();
        let error = queue.approve("missing").expect_err("nothing is pending");
        assert_eq!(error.kind, ToolErrorKind::NotFound);
    }

    #[tokio::test]
    async fn auto_approve_always_approves() {
        assert_eq!(
            AutoApprove.request_approval(request("toolu_3")).await,
            ApprovalDecision::Approved
        );
    }
}
