//! Observation points for chat turns.
//!
//! ```rust
//! use schat::{NoopTurnHooks, TurnHooks};
//!
//! fn assert_hooks_trait(_hooks: &dyn TurnHooks) {}
//!
//! assert_hooks_trait(&NoopTurnHooks);
//! ```

use std::time::Duration;

use scommon::ThreadId;
use sprovider::TokenUsage;

use crate::ChatEvent;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TurnOutcome {
    Completed,
    Failed,
    Cancelled,
    RoundLimit,
}

impl TurnOutcome {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Completed => "completed",
            Self::Failed => "failed",
            Self::Cancelled => "cancelled",
            Self::RoundLimit => "round_limit",
        }
    }
}

pub trait TurnHooks: Send + Sync {
    fn on_turn_start(&self, _thread_id: &ThreadId, _model: &str, _new_messages: usize) {}

    fn on_round_start(&self, _thread_id: &ThreadId, _round: usize) {}

    fn on_event_committed(&self, _thread_id: &ThreadId, _event: &ChatEvent) {}

    fn on_duplicate_event(&self, _thread_id: &ThreadId, _event_id: &str) {}

    fn on_usage(&self, _thread_id: &ThreadId, _usage: &TokenUsage) {}

    fn on_turn_end(&self, _thread_id: &ThreadId, _outcome: TurnOutcome, _elapsed: Duration) {}
}

#[derive(Debug, Default, Clone, Copy)]
pub struct NoopTurnHooks;

impl TurnHooks for NoopTurnHooks {}
