//! Tool execution context and result types.

use scommon::{MetadataMap, ThreadId};
use serde_json::Value;
use sprovider::Message;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ToolExecutionContext {
    pub thread_id: ThreadId,
    pub metadata: MetadataMap,
}

impl ToolExecutionContext {
    pub fn new(thread_id: ThreadId) -> Self {
        Self {
            thread_id,
            metadata: MetadataMap::new(),
        }
    }

    pub fn with_metadata(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.metadata.insert(key.into(), value.into());
        self
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct ToolExecutionResult {
    pub tool_use_id: String,
    pub output: Value,
}

impl ToolExecutionResult {
    pub fn new(tool_use_id: impl Into<String>, output: Value) -> Self {
        Self {
            tool_use_id: tool_use_id.into(),
            output,
        }
    }

    /// Renders the output as the `tool` message fed back to the model.
    pub fn into_message(self) -> Message {
        let content = match self.output {
            Value::String(text) => text,
            other => other.to_string(),
        };
        Message::tool_result(self.tool_use_id, content)
    }
}

#[cfg(test)]
mod tests {
    use serde_json::json;
    use sprovider::Role;

    use super::*;

    #[test]
    fn string_outputs_are_not_double_encoded() {
        let message = ToolExecutionResult::new("toolu_1", json!("plain")).into_message();
        assert_eq!(message.role, Role::Tool);
        assert_eq!(message.content, "plain");
        assert_eq!(message.tool_call_id.as_deref(), Some("toolu_1"));

        let message = ToolExecutionResult::new("toolu_2", json!({"ok": true})).into_message();
        assert_eq!(message.content, r#"{"ok":true}"#);
    }
}
