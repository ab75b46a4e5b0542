//! Vendor adapters converging on the canonical chunk model.

use serde_json::Value;

#[cfg(feature = "provider-anthropic")]
pub mod anthropic;

#[cfg(feature = "provider-openai")]
pub mod openai;

#[cfg(feature = "provider-gemini")]
pub mod gemini;

/// A tool call whose accumulated input could not be decoded.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DroppedToolCall {
    pub tool_use_id: String,
    pub tool_name: String,
    pub reason: String,
}

/// Parses accumulated input JSON and layers it over the call's initial input.
///
/// An empty accumulator counts as `{}`.
pub(crate) fn merge_tool_input(initial: Value, partial_json: &str) -> Result<Value, String> {
    let trimmed = partial_json.trim();
    let parsed = if trimmed.is_empty() {
        Value::Object(Default::default())
    } else {
        serde_json::from_str::<Value>(trimmed).map_err(|err| err.to_string())?
    };

    let Value::Object(overrides) = parsed else {
        return Err("tool input must be a JSON object".to_string());
    };

    let mut merged = match initial {
        Value::Object(map) => map,
        _ => Default::default(),
    };
    merged.extend(overrides);
    Ok(Value::Object(merged))
}

#[cfg(test)]
mod tests {
    use serde_json::json;

    use super::*;

    #[test]
    fn merge_prefers_streamed_fields_over_initial_input() {
        let merged = merge_tool_input(json!({"path": "old", "keep": true}), r#"{"path":"new"}"#)
            .expect("merge should succeed");
        assert_eq!(merged, json!({"path": "new", "keep": true}));

        let empty = merge_tool_input(json!({}), "").expect("empty accumulator is {}");
        assert_eq!(empty, json!({}));

        assert!(merge_tool_input(json!({}), "[1,2]").is_err());
    }
}
