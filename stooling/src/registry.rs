//! Tool registry for lookup by tool definition name.

use std::future::Future;
use std::sync::Arc;

use scommon::Registry;
use serde_json::Value;
use sprovider::{ToolCall, ToolDefinition};

use crate::{
    FunctionTool, Tool, ToolError, ToolExecutionContext, ToolInvocation, ToolUse, ToolUseRecord,
    UnknownToolUse,
};

#[derive(Default)]
pub struct ToolRegistry {
    tools: Registry<String, Arc<dyn Tool>>,
}

impl ToolRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn register<T>(&mut self, tool: T)
    where
        T: Tool + 'static,
    {
        self.register_arc(Arc::new(tool));
    }

    pub fn register_arc(&mut self, tool: Arc<dyn Tool>) {
        let name = tool.definition().name;
        self.tools.insert(name, tool);
    }

    pub fn register_fn<F, Fut>(&mut self, definition: ToolDefinition, handler: F)
    where
        F: Fn(Value, ToolExecutionContext) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = Result<Value, ToolError>> + Send + 'static,
    {
        self.register(FunctionTool::new(definition, handler));
    }

    pub fn get(&self, name: &str) -> Option<Arc<dyn Tool>> {
        self.tools.get(name).cloned()
    }

    pub fn contains(&self, name: &str) -> bool {
        self.tools.contains_key(name)
    }

    pub fn remove(&mut self, name: &str) -> Option<Arc<dyn Tool>> {
        self.tools.remove(name)
    }

    /// Definitions sorted by name so provider requests are stable.
    pub fn definitions(&self) -> Vec<ToolDefinition> {
        let mut definitions: Vec<_> = self.tools.values().map(|tool| tool.definition()).collect();
        definitions.sort_by(|left, right| left.name.cmp(&right.name));
        definitions
    }

    /// Creates the live lifecycle object for a model-requested call.
    pub fn instantiate(&self, call: ToolCall) -> Arc<ToolUse> {
        match self.get(&call.name) {
            Some(tool) => Arc::new(ToolUse::new(call, tool)),
            None => Arc::new(ToolUse::missing(call)),
        }
    }

    /// Decodes a serialized invocation, falling back to a pass-through for unknown names.
    pub fn decode(&self, name: &str, raw: &str) -> Result<ToolInvocation, ToolError> {
        let Some(tool) = self.get(name) else {
            return Ok(ToolInvocation::Unknown(UnknownToolUse::new(name, raw)));
        };

        let mut record = ToolUseRecord::decode(raw)?;
        if record.tool_name != name {
            return Err(ToolError::invalid_arguments(format!(
                "record names tool '{}' but was decoded as '{name}'",
                record.tool_name
            )));
        }
        record.input = tool.decode_input(record.input)?;

        Ok(ToolInvocation::Known(Arc::new(ToolUse::restore(
            record,
            Some(tool),
        ))))
    }

    pub fn len(&self) -> usize {
        self.tools.len()
    }

    pub fn is_empty(&self) -> bool {
        self.tools.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use serde_json::json;

    use super::*;
    use crate::{ToolErrorKind, ToolFuture, ToolUseStatus};

    #[derive(Debug)]
    struct EchoTool;

    impl Tool for EchoTool {
        fn definition(&self) -> ToolDefinition {
            ToolDefinition::new("echo", "Echoes input", json!({"type": "object"}))
        }

        fn invoke<'a>(
            &'a self,
            input: &'a Value,
            _context: &'a ToolExecutionContext,
        ) -> ToolFuture<'a, Result<Value, ToolError>> {
            Box::pin(async move { Ok(input.clone()) })
        }
    }

    #[test]
    fn registry_tracks_registered_tools() {
        let mut registry = ToolRegistry::new();
        assert!(registry.is_empty());

        registry.register(EchoTool);
        assert_eq!(registry.len(), 1);
        assert!(registry.contains("echo"));
        assert_eq!(registry.definitions()[0].name, "echo");

        let removed = registry.remove("echo");
        assert!(removed.is_some());
        assert!(registry.is_empty());
    }

    #[test]
    fn unknown_invocation_round_trips_byte_for_byte() {
        let registry = ToolRegistry::new();
        let raw = "{\"toolName\":\"gone\",  \"toolUseId\":\"t9\",\"input\":{\"z\":1,\"a\":2},\"extra\":[true]}";

        let invocation = registry.decode("gone", raw).expect("decode should fall back");
        match &invocation {
            ToolInvocation::Unknown(unknown) => {
                assert_eq!(unknown.tool_use_id().as_deref(), Some("t9"));
                unknown.start_executing();
                unknown.cancel();
            }
            ToolInvocation::Known(_) => panic!("tool is not registered"),
        }
        assert_eq!(invocation.encode().expect("encode"), raw);
    }

    #[test]
    fn known_invocation_restores_status() {
        let mut registry = ToolRegistry::new();
        registry.register(EchoTool);

        let record = ToolUseRecord {
            tool_name: "echo".to_string(),
            tool_use_id: "t1".to_string(),
            input: json!({"x": 1}),
            status: ToolUseStatus::success(json!({"x": 1})),
        };
        let raw = record.encode().expect("record should encode");

        let invocation = registry.decode("echo", &raw).expect("decode should succeed");
        let ToolInvocation::Known(tool_use) = invocation else {
            panic!("echo is registered");
        };
        assert_eq!(tool_use.record(), record);
    }

    #[test]
    fn known_invocation_with_mismatched_name_is_invalid() {
        let mut registry = ToolRegistry::new();
        registry.register(EchoTool);

        let error = registry
            .decode("echo", r#"{"toolName":"other","toolUseId":"t","input":{}}"#)
            .expect_err("names must agree");
        assert_eq!(error.kind, ToolErrorKind::InvalidArguments);
    }
}
