//! Tool-use lifecycle states and the transitions allowed between them.
//!
//! ```rust
//! use stooling::ToolUseStatus;
//!
//! let status = ToolUseStatus::NotStarted;
//! assert!(status.can_transition_to(&ToolUseStatus::Running));
//! assert!(!ToolUseStatus::Running.can_transition_to(&ToolUseStatus::PendingApproval));
//! ```

use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::ToolError;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "result", rename_all = "snake_case")]
pub enum ToolOutcome {
    Success { output: Value },
    Failure { error: ToolError },
}

#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(tag = "state", rename_all = "snake_case")]
pub enum ToolUseStatus {
    #[default]
    NotStarted,
    PendingApproval,
    ApprovalRejected {
        reason: String,
    },
    Running,
    Completed {
        outcome: ToolOutcome,
    },
}

impl ToolUseStatus {
    pub fn success(output: Value) -> Self {
        Self::Completed {
            outcome: ToolOutcome::Success { output },
        }
    }

    pub fn failure(error: ToolError) -> Self {
        Self::Completed {
            outcome: ToolOutcome::Failure { error },
        }
    }

    pub fn is_terminal(&self) -> bool {
        matches!(self, Self::ApprovalRejected { .. } | Self::Completed { .. })
    }

    pub fn can_transition_to(&self, next: &ToolUseStatus) -> bool {
        match (self, next) {
            (Self::NotStarted, Self::Running | Self::PendingApproval) => true,
            (Self::PendingApproval, Self::Running | Self::ApprovalRejected { .. }) => true,
            (Self::Running, Self::Completed { .. }) => true,
            // Only cancellation finishes a use that never ran.
            (Self::NotStarted | Self::PendingApproval, Self::Completed { outcome }) => {
                matches!(outcome, ToolOutcome::Failure { error } if error.is_cancellation())
            }
            _ => false,
        }
    }

    pub fn label(&self) -> &'static str {
        match self {
            Self::NotStarted => "not_started",
            Self::PendingApproval => "pending_approval",
            Self::ApprovalRejected { .. } => "approval_rejected",
            Self::Running => "running",
            Self::Completed {
                outcome: ToolOutcome::Success { .. },
            } => "succeeded",
            Self::Completed {
                outcome: ToolOutcome::Failure { .. },
            } => "failed",
        }
    }
}

#[cfg(test)]
mod tests {
    use serde_json::json;

    use super::*;

    fn all_states() -> Vec<ToolUseStatus> {
        vec![
            ToolUseStatus::NotStarted,
            ToolUseStatus::PendingApproval,
            ToolUseStatus::ApprovalRejected {
                reason: "no".to_string(),
            },
            ToolUseStatus::Running,
            ToolUseStatus::success(json!("ok")),
            ToolUseStatus::failure(ToolError::cancelled("stop")),
        ]
    }

    #[test]
    fn not_started_reaches_only_running_pending_or_cancellation() {
        let from = ToolUseStatus::NotStarted;
        let reachable: Vec<_> = all_states()
            .into_iter()
            .filter(|next| from.can_transition_to(next))
            .map(|next| next.label())
            .collect();
        assert_eq!(reachable, vec!["pending_approval", "running", "failed"]);
    }

    #[test]
    fn pending_approval_reaches_running_rejected_or_cancellation() {
        let from = ToolUseStatus::PendingApproval;
        let reachable: Vec<_> = all_states()
            .into_iter()
            .filter(|next| from.can_transition_to(next))
            .map(|next| next.label())
            .collect();
        assert_eq!(reachable, vec!["approval_rejected", "running", "failed"]);
    }

    #[test]
    fn only_cancellation_fails_a_use_that_never_ran() {
        let failures = [
            ToolError::execution("tool bug"),
            ToolError::not_found("no such tool"),
            ToolError::timeout("slow"),
        ];
        for from in [ToolUseStatus::NotStarted, ToolUseStatus::PendingApproval] {
            for error in failures.clone() {
                assert!(
                    !from.can_transition_to(&ToolUseStatus::failure(error.clone())),
                    "{} -> {:?} must be rejected",
                    from.label(),
                    error.kind
                );
            }
            assert!(from.can_transition_to(&ToolUseStatus::failure(ToolError::cancelled("stop"))));
        }
        assert!(
            ToolUseStatus::Running
                .can_transition_to(&ToolUseStatus::failure(ToolError::execution("tool bug")))
        );
    }

    #[test]
    fn terminal_states_have_no_outgoing_transitions() {
        for terminal in all_states().into_iter().filter(ToolUseStatus::is_terminal) {
            assert!(
                all_states()
                    .iter()
                    .all(|next| !terminal.can_transition_to(next)),
                "{} must be terminal",
                terminal.label()
            );
        }
    }

    #[test]
    fn nothing_transitions_back_to_not_started() {
        assert!(
            all_states()
                .iter()
                .all(|from| !from.can_transition_to(&ToolUseStatus::NotStarted))
        );
    }

    #[test]
    fn status_serializes_with_state_tag() {
        let value = serde_json::to_value(ToolUseStatus::success(json!({"n": 1})))
            .expect("status should serialize");
        assert_eq!(
            value,
            json!({"state": "completed", "outcome": {"result": "success", "output": {"n": 1}}})
        );
    }
}
