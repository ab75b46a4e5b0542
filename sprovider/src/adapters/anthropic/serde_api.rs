//! Anthropic Messages API payload serde models.

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use crate::{Message, ModelRequest, ProviderError, Role, ToolDefinition};

#[derive(Debug, Serialize)]
pub(crate) struct AnthropicApiRequest {
    pub model: String,
    pub max_tokens: u32,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub system: Option<String>,
    pub messages: Vec<AnthropicApiMessage>,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub tools: Vec<AnthropicApiTool>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub temperature: Option<f32>,
    pub stream: bool,
}

#[derive(Debug, Serialize)]
pub(crate) struct AnthropicApiMessage {
    pub role: &'static str,
    pub content: Vec<AnthropicContentBlock>,
}

#[derive(Debug, Serialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub(crate) enum AnthropicContentBlock {
    Text { text: String },
    ToolUse { id: String, name: String, input: Value },
    ToolResult { tool_use_id: String, content: String },
}

#[derive(Debug, Serialize)]
pub(crate) struct AnthropicApiTool {
    pub name: String,
    pub description: String,
    pub input_schema: Value,
}

impl From<ToolDefinition> for AnthropicApiTool {
    fn from(value: ToolDefinition) -> Self {
        let input_schema = match value.input_schema {
            Value::Object(mut schema) => {
                schema
                    .entry("type")
                    .or_insert_with(|| Value::String("object".to_string()));
                Value::Object(schema)
            }
            _ => {
                let mut schema = Map::new();
                schema.insert("type".to_string(), Value::String("object".to_string()));
                Value::Object(schema)
            }
        };

        Self {
            name: value.name,
            description: value.description,
            input_schema,
        }
    }
}

pub(crate) fn build_api_request(
    request: ModelRequest,
    default_max_tokens: u32,
) -> Result<AnthropicApiRequest, ProviderError> {
    let mut system_parts = Vec::new();
    let mut messages: Vec<AnthropicApiMessage> = Vec::new();

    for message in request.messages {
        if message.role == Role::System {
            system_parts.push(message.content);
            continue;
        }

        let Some((role, blocks)) = message_blocks(message) else {
            continue;
        };

        // consecutive same-role turns must be merged
        match messages.last_mut() {
            Some(last) if last.role == role => last.content.extend(blocks),
            _ => messages.push(AnthropicApiMessage {
                role,
                content: blocks,
            }),
        }
    }

    if messages.is_empty() {
        return Err(ProviderError::invalid_request(
            "Anthropic request requires at least one non-system message",
        ));
    }

    let system = if system_parts.is_empty() {
        None
    } else {
        Some(system_parts.join("\n\n"))
    };

    Ok(AnthropicApiRequest {
        model: request.model,
        max_tokens: request.options.max_tokens.unwrap_or(default_max_tokens),
        system,
        messages,
        tools: request.tools.into_iter().map(AnthropicApiTool::from).collect(),
        temperature: request.options.temperature,
        stream: true,
    })
}

fn message_blocks(message: Message) -> Option<(&'static str, Vec<AnthropicContentBlock>)> {
    match message.role {
        Role::System => None,
        Role::User => Some((
            "user",
            vec![AnthropicContentBlock::Text {
                text: message.content,
            }],
        )),
        Role::Tool => Some((
            "user",
            vec![AnthropicContentBlock::ToolResult {
                tool_use_id: message.tool_call_id.unwrap_or_default(),
                content: message.content,
            }],
        )),
        Role::Assistant => {
            let mut blocks = Vec::new();
            if !message.content.trim().is_empty() {
                blocks.push(AnthropicContentBlock::Text {
                    text: message.content,
                });
            }

            blocks.extend(
                message
                    .tool_calls
                    .into_iter()
                    .map(|call| AnthropicContentBlock::ToolUse {
                        id: call.id,
                        name: call.name,
                        input: call.input,
                    }),
            );

            if blocks.is_empty() {
                None
            } else {
                Some(("assistant", blocks))
            }
        }
    }
}

/// One decoded `data:` payload of an Anthropic message stream.
#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum AnthropicStreamEvent {
    MessageStart {
        message: AnthropicMessageStart,
    },
    ContentBlockStart {
        index: u32,
        content_block: AnthropicBlockStart,
    },
    ContentBlockDelta {
        index: u32,
        delta: AnthropicBlockDelta,
    },
    ContentBlockStop {
        index: u32,
    },
    MessageDelta {
        #[serde(default)]
        usage: Option<AnthropicUsage>,
    },
    MessageStop,
    Ping,
    Error {
        error: AnthropicStreamError,
    },
    #[serde(other)]
    Unknown,
}

impl AnthropicStreamEvent {
    pub fn from_json(payload: &str) -> Result<Self, ProviderError> {
        serde_json::from_str(payload).map_err(|err| {
            ProviderError::transport(format!("malformed Anthropic stream event: {err}"))
        })
    }
}

#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct AnthropicMessageStart {
    pub id: String,
    pub model: String,
    #[serde(default)]
    pub usage: Option<AnthropicUsage>,
}

#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum AnthropicBlockStart {
    Text {
        #[serde(default)]
        text: String,
    },
    ToolUse {
        id: String,
        name: String,
        #[serde(default)]
        input: Value,
    },
    #[serde(other)]
    Other,
}

#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum AnthropicBlockDelta {
    TextDelta { text: String },
    InputJsonDelta { partial_json: String },
    #[serde(other)]
    Other,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Deserialize)]
pub struct AnthropicUsage {
    #[serde(default)]
    pub input_tokens: u32,
    #[serde(default)]
    pub output_tokens: u32,
}

#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct AnthropicStreamError {
    #[serde(rename = "type", default)]
    pub kind: String,
    pub message: String,
}

#[cfg(test)]
mod tests {
    use serde_json::json;

    use super::*;
    use crate::ToolCall;

    #[test]
    fn request_lifts_system_and_merges_tool_results() {
        let request = ModelRequest::new(
            "claude-sonnet-4-5",
            vec![
                Message::new(Role::System, "be terse"),
                Message::new(Role::User, "read both files"),
                Message::assistant_tool_calls(
                    "",
                    vec![
                        ToolCall {
                            id: "toolu_1".to_string(),
                            name: "read_file".to_string(),
                            input: json!({"path": "a.rs"}),
                        },
                        ToolCall {
                            id: "toolu_2".to_string(),
                            name: "read_file".to_string(),
                            input: json!({"path": "b.rs"}),
                        },
                    ],
                ),
                Message::tool_result("toolu_1", "fn a() {}"),
                Message::tool_result("toolu_2", "fn b() {}"),
            ],
        );

        let api = build_api_request(request, 4096).expect("request should convert");
        let value = serde_json::to_value(&api).expect("request should serialize");

        assert_eq!(value["system"], "be terse");
        assert_eq!(value["max_tokens"], 4096);
        assert_eq!(value["messages"].as_array().map(Vec::len), Some(3));
        assert_eq!(value["messages"][1]["content"][1]["type"], "tool_use");
        assert_eq!(value["messages"][2]["role"], "user");
        assert_eq!(value["messages"][2]["content"][1]["tool_use_id"], "toolu_2");
    }

    #[test]
    fn tool_schemas_are_forced_to_objects() {
        let tool = AnthropicApiTool::from(ToolDefinition::new(
            "lookup",
            "Look up",
            json!({"properties": {"q": {"type": "string"}}}),
        ));
        assert_eq!(tool.input_schema["type"], "object");
        assert!(tool.input_schema["properties"]["q"].is_object());
    }

    #[test]
    fn unknown_event_types_decode_as_unknown() {
        let event = AnthropicStreamEvent::from_json(r#"{"type":"future_event","x":1}"#)
            .expect("unknown events should decode");
        assert_eq!(event, AnthropicStreamEvent::Unknown);
    }
}
