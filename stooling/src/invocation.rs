//! Serialized tool invocations and the pass-through form for unknown tools.
//!
//! ```rust
//! use stooling::ToolRegistry;
//!
//! let registry = ToolRegistry::new();
//! let raw = r#"{"toolName":"retired","toolUseId":"t1","input":{ "a" : 1 },"status":{"state":"running"}}"#;
//! let invocation = registry.decode("retired", raw).expect("unknown tools still decode");
//!
//! assert!(!invocation.is_known());
//! assert_eq!(invocation.encode().expect("encode"), raw);
//! ```

use std::sync::Arc;

use serde::{Deserialize, Serialize};
use serde_json::{Value, json};

use crate::{ToolError, ToolExecutionResult, ToolOutcome, ToolUse, ToolUseStatus};

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ToolUseRecord {
    pub tool_name: String,
    pub tool_use_id: String,
    pub input: Value,
    #[serde(default)]
    pub status: ToolUseStatus,
}

impl ToolUseRecord {
    pub fn encode(&self) -> Result<String, ToolError> {
        serde_json::to_string(self)
            .map_err(|err| ToolError::other(format!("failed to encode tool use: {err}")))
    }

    pub fn decode(raw: &str) -> Result<Self, ToolError> {
        serde_json::from_str(raw)
            .map_err(|err| ToolError::invalid_arguments(format!("invalid tool use record: {err}")))
    }

    /// Output to feed back to the model; `None` until the status is terminal.
    pub fn execution_result(&self) -> Option<ToolExecutionResult> {
        let output = match &self.status {
            ToolUseStatus::Completed {
                outcome: ToolOutcome::Success { output },
            } => output.clone(),
            ToolUseStatus::Completed {
                outcome: ToolOutcome::Failure { error },
            } => json!({ "error": error.message, "kind": error.kind }),
            ToolUseStatus::ApprovalRejected { reason } => {
                json!({ "error": format!("the user rejected this tool call: {reason}") })
            }
            _ => return None,
        };
        Some(ToolExecutionResult::new(self.tool_use_id.clone(), output))
    }
}

/// An invocation of a tool this binary does not know about.
///
/// It is inert and keeps the original payload byte-for-byte.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UnknownToolUse {
    tool_name: String,
    raw: String,
}

impl UnknownToolUse {
    pub fn new(tool_name: impl Into<String>, raw: impl Into<String>) -> Self {
        Self {
            tool_name: tool_name.into(),
            raw: raw.into(),
        }
    }

    pub fn tool_name(&self) -> &str {
        &self.tool_name
    }

    pub fn raw(&self) -> &str {
        &self.raw
    }

    /// Best-effort id lookup; absent when the payload has no `toolUseId` string.
    pub fn tool_use_id(&self) -> Option<String> {
        serde_json::from_str::<Value>(&self.raw)
            .ok()?
            .get("toolUseId")?
            .as_str()
            .map(str::to_string)
    }

    pub fn start_executing(&self) {}

    pub fn cancel(&self) {}

    pub fn encode(&self) -> String {
        self.raw.clone()
    }
}

#[derive(Debug, Clone)]
pub enum ToolInvocation {
    Known(Arc<ToolUse>),
    Unknown(UnknownToolUse),
}

impl ToolInvocation {
    pub fn is_known(&self) -> bool {
        matches!(self, Self::Known(_))
    }

    pub fn tool_name(&self) -> &str {
        match self {
            Self::Known(tool_use) => tool_use.tool_name(),
            Self::Unknown(unknown) => unknown.tool_name(),
        }
    }

    pub fn cancel(&self) {
        match self {
            Self::Known(tool_use) => tool_use.cancel(),
            Self::Unknown(unknown) => unknown.cancel(),
        }
    }

    pub fn encode(&self) -> Result<String, ToolError> {
        match self {
            Self::Known(tool_use) => tool_use.record().encode(),
            Self::Unknown(unknown) => Ok(unknown.encode()),
        }
    }
}
