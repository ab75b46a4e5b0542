//! JSON argument helpers for function and trait-based tools.
//!
//! ```rust
//! use serde_json::json;
//! use stooling::{object_args, required_string};
//!
//! let input = json!({"query": "rust"});
//! let args = object_args(&input).expect("object should parse");
//! let query = required_string(args, "query").expect("query should be present");
//! assert_eq!(query, "rust");
//! ```

use serde_json::{Map, Value};

use crate::ToolError;

pub fn object_args(input: &Value) -> Result<&Map<String, Value>, ToolError> {
    input
        .as_object()
        .ok_or_else(|| ToolError::invalid_arguments("expected JSON object arguments"))
}

pub fn required_string<'a>(args: &'a Map<String, Value>, key: &str) -> Result<&'a str, ToolError> {
    args.get(key)
        .and_then(Value::as_str)
        .ok_or_else(|| ToolError::invalid_arguments(format!("missing required string: '{key}'")))
}
