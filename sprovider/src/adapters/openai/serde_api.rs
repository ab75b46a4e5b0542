//! OpenAI chat-completions payload serde models and conversion helpers.

use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::{Message, ModelRequest, ProviderError, Role, ToolCall, ToolDefinition};

#[derive(Debug, Serialize)]
pub(crate) struct OpenAiApiRequest {
    pub model: String,
    pub messages: Vec<OpenAiApiMessage>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub tools: Option<Vec<OpenAiApiTool>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub temperature: Option<f32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub max_tokens: Option<u32>,
    pub stream: bool,
    pub stream_options: OpenAiStreamOptions,
}

#[derive(Debug, Serialize)]
pub(crate) struct OpenAiStreamOptions {
    pub include_usage: bool,
}

#[derive(Debug, Serialize)]
pub(crate) struct OpenAiApiMessage {
    pub role: &'static str,
    pub content: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub tool_calls: Option<Vec<OpenAiApiToolCall>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub tool_call_id: Option<String>,
}

impl TryFrom<Message> for OpenAiApiMessage {
    type Error = ProviderError;

    fn try_from(value: Message) -> Result<Self, Self::Error> {
        let tool_calls = if value.tool_calls.is_empty() {
            None
        } else {
            Some(
                value
                    .tool_calls
                    .into_iter()
                    .map(OpenAiApiToolCall::try_from)
                    .collect::<Result<Vec<_>, _>>()?,
            )
        };

        let content = if value.content.is_empty() && tool_calls.is_some() {
            None
        } else {
            Some(value.content)
        };

        Ok(Self {
            role: value.role.as_str(),
            content,
            tool_calls,
            tool_call_id: value.tool_call_id,
        })
    }
}

#[derive(Debug, Serialize)]
pub(crate) struct OpenAiApiToolCall {
    pub id: String,
    pub r#type: &'static str,
    pub function: OpenAiApiFunctionCall,
}

impl TryFrom<ToolCall> for OpenAiApiToolCall {
    type Error = ProviderError;

    fn try_from(value: ToolCall) -> Result<Self, Self::Error> {
        let arguments = serde_json::to_string(&value.input)
            .map_err(|err| ProviderError::invalid_request(err.to_string()))?;

        Ok(Self {
            id: value.id,
            r#type: "function",
            function: OpenAiApiFunctionCall {
                name: value.name,
                arguments,
            },
        })
    }
}

#[derive(Debug, Serialize)]
pub(crate) struct OpenAiApiFunctionCall {
    pub name: String,
    pub arguments: String,
}

#[derive(Debug, Serialize)]
pub(crate) struct OpenAiApiTool {
    pub r#type: &'static str,
    pub function: OpenAiApiFunction,
}

impl From<ToolDefinition> for OpenAiApiTool {
    fn from(value: ToolDefinition) -> Self {
        Self {
            r#type: "function",
            function: OpenAiApiFunction {
                name: value.name,
                description: value.description,
                parameters: value.input_schema,
            },
        }
    }
}

#[derive(Debug, Serialize)]
pub(crate) struct OpenAiApiFunction {
    pub name: String,
    pub description: String,
    pub parameters: Value,
}

pub(crate) fn build_api_request(request: ModelRequest) -> Result<OpenAiApiRequest, ProviderError> {
    let messages = request
        .messages
        .into_iter()
        .filter(|message| {
            message.role != Role::Assistant
                || !message.content.is_empty()
                || !message.tool_calls.is_empty()
        })
        .map(OpenAiApiMessage::try_from)
        .collect::<Result<Vec<_>, _>>()?;

    if messages.is_empty() {
        return Err(ProviderError::invalid_request(
            "OpenAI request requires at least one message",
        ));
    }

    let tools = if request.tools.is_empty() {
        None
    } else {
        Some(request.tools.into_iter().map(OpenAiApiTool::from).collect())
    };

    Ok(OpenAiApiRequest {
        model: request.model,
        messages,
        tools,
        temperature: request.options.temperature,
        max_tokens: request.options.max_tokens,
        stream: true,
        stream_options: OpenAiStreamOptions {
            include_usage: true,
        },
    })
}

/// One decoded `data:` payload of a chat-completions stream.
#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct OpenAiStreamPayload {
    #[serde(default)]
    pub id: String,
    #[serde(default)]
    pub model: String,
    #[serde(default)]
    pub created: u64,
    #[serde(default)]
    pub choices: Vec<OpenAiStreamChoice>,
    #[serde(default)]
    pub usage: Option<OpenAiUsage>,
    #[serde(default)]
    pub error: Option<OpenAiStreamError>,
}

impl OpenAiStreamPayload {
    pub fn from_json(payload: &str) -> Result<Self, ProviderError> {
        serde_json::from_str(payload).map_err(|err| {
            ProviderError::transport(format!("malformed OpenAI stream payload: {err}"))
        })
    }
}

#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct OpenAiStreamChoice {
    #[serde(default)]
    pub delta: OpenAiStreamDelta,
    #[serde(default)]
    pub finish_reason: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Default, Deserialize)]
pub struct OpenAiStreamDelta {
    #[serde(default)]
    pub content: Option<String>,
    #[serde(default)]
    pub tool_calls: Option<Vec<OpenAiDeltaToolCall>>,
}

#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct OpenAiDeltaToolCall {
    #[serde(default)]
    pub index: Option<u32>,
    #[serde(default)]
    pub id: Option<String>,
    #[serde(default)]
    pub function: Option<OpenAiDeltaFunction>,
}

#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct OpenAiDeltaFunction {
    #[serde(default)]
    pub name: Option<String>,
    #[serde(default)]
    pub arguments: Option<String>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
pub struct OpenAiUsage {
    #[serde(default)]
    pub prompt_tokens: u32,
    #[serde(default)]
    pub completion_tokens: u32,
}

#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct OpenAiStreamError {
    pub message: String,
    #[serde(default)]
    pub code: Option<Value>,
}

#[cfg(test)]
mod tests {
    use serde_json::json;

    use super::*;

    #[test]
    fn assistant_tool_calls_serialize_with_string_arguments() {
        let request = ModelRequest::new(
            "gpt-4o-mini",
            vec![
                Message::new(Role::User, "weather?"),
                Message::assistant_tool_calls(
                    "",
                    vec![ToolCall {
                        id: "call_1".to_string(),
                        name: "weather".to_string(),
                        input: json!({"city": "Oslo"}),
                    }],
                ),
                Message::tool_result("call_1", "rain"),
            ],
        );

        let api = build_api_request(request).expect("request should convert");
        let value = serde_json::to_value(&api).expect("request should serialize");

        assert_eq!(value["messages"][1]["content"], Value::Null);
        assert_eq!(
            value["messages"][1]["tool_calls"][0]["function"]["arguments"],
            "{\"city\":\"Oslo\"}"
        );
        assert_eq!(value["messages"][2]["tool_call_id"], "call_1");
        assert_eq!(value["stream_options"]["include_usage"], true);
    }

    #[test]
    fn empty_assistant_turns_are_skipped() {
        let request = ModelRequest::new(
            "gpt-4o-mini",
            vec![
                Message::new(Role::User, "hi"),
                Message::new(Role::Assistant, ""),
            ],
        );
        let api = build_api_request(request).expect("request should convert");
        assert_eq!(api.messages.len(), 1);
    }
}
