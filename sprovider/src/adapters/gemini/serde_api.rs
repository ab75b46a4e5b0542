//! Gemini `streamGenerateContent` payload serde models.

use std::collections::HashMap;

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value, json};

use crate::{Message, ModelRequest, ProviderError, Role, ToolDefinition};

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub(crate) struct GeminiApiRequest {
    pub contents: Vec<GeminiApiContent>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub system_instruction: Option<GeminiApiContent>,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub tools: Vec<GeminiApiTools>,
    #[serde(skip_serializing_if = "GenerationConfig::is_empty")]
    pub generation_config: GenerationConfig,
}

#[derive(Debug, Serialize)]
pub(crate) struct GeminiApiContent {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub role: Option<&'static str>,
    pub parts: Vec<GeminiApiPart>,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub(crate) enum GeminiApiPart {
    Text(String),
    FunctionCall(GeminiFunctionCall),
    FunctionResponse(GeminiFunctionResponse),
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GeminiFunctionCall {
    pub name: String,
    #[serde(default)]
    pub args: Value,
}

#[derive(Debug, Serialize)]
pub(crate) struct GeminiFunctionResponse {
    pub name: String,
    pub response: Value,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub(crate) struct GeminiApiTools {
    pub function_declarations: Vec<GeminiFunctionDeclaration>,
}

#[derive(Debug, Serialize)]
pub(crate) struct GeminiFunctionDeclaration {
    pub name: String,
    pub description: String,
    pub parameters: Value,
}

impl From<ToolDefinition> for GeminiFunctionDeclaration {
    fn from(value: ToolDefinition) -> Self {
        let parameters = match value.input_schema {
            Value::Object(schema) => Value::Object(schema),
            _ => json!({ "type": "object" }),
        };

        Self {
            name: value.name,
            description: value.description,
            parameters,
        }
    }
}

#[derive(Debug, Default, Serialize)]
#[serde(rename_all = "camelCase")]
pub(crate) struct GenerationConfig {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub temperature: Option<f32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub max_output_tokens: Option<u32>,
}

impl GenerationConfig {
    fn is_empty(&self) -> bool {
        self.temperature.is_none() && self.max_output_tokens.is_none()
    }
}

pub(crate) fn build_api_request(request: ModelRequest) -> Result<GeminiApiRequest, ProviderError> {
    let mut system_parts = Vec::new();
    let mut contents: Vec<GeminiApiContent> = Vec::new();
    // functionResponse parts are matched to their call by name, not id.
    let mut call_names: HashMap<String, String> = HashMap::new();

    for message in request.messages {
        if message.role == Role::System {
            system_parts.push(GeminiApiPart::Text(message.content));
            continue;
        }

        let Some((role, parts)) = message_parts(message, &mut call_names) else {
            continue;
        };

        match contents.last_mut() {
            Some(last) if last.role == Some(role) => last.parts.extend(parts),
            _ => contents.push(GeminiApiContent {
                role: Some(role),
                parts,
            }),
        }
    }

    if contents.is_empty() {
        return Err(ProviderError::invalid_request(
            "Gemini request requires at least one non-system message",
        ));
    }

    let system_instruction = if system_parts.is_empty() {
        None
    } else {
        Some(GeminiApiContent {
            role: None,
            parts: system_parts,
        })
    };

    let tools = if request.tools.is_empty() {
        Vec::new()
    } else {
        vec![GeminiApiTools {
            function_declarations: request
                .tools
                .into_iter()
                .map(GeminiFunctionDeclaration::from)
                .collect(),
        }]
    };

    Ok(GeminiApiRequest {
        contents,
        system_instruction,
        tools,
        generation_config: GenerationConfig {
            temperature: request.options.temperature,
            max_output_tokens: request.options.max_tokens,
        },
    })
}

fn message_parts(
    message: Message,
    call_names: &mut HashMap<String, String>,
) -> Option<(&'static str, Vec<GeminiApiPart>)> {
    match message.role {
        Role::System => None,
        Role::User => Some(("user", vec![GeminiApiPart::Text(message.content)])),
        Role::Tool => {
            let call_id = message.tool_call_id.unwrap_or_default();
            let name = call_names.get(&call_id).cloned().unwrap_or(call_id);
            Some((
                "user",
                vec![GeminiApiPart::FunctionResponse(GeminiFunctionResponse {
                    name,
                    response: tool_response(message.content),
                })],
            ))
        }
        Role::Assistant => {
            let mut parts = Vec::new();
            if !message.content.trim().is_empty() {
                parts.push(GeminiApiPart::Text(message.content));
            }

            for call in message.tool_calls {
                call_names.insert(call.id, call.name.clone());
                parts.push(GeminiApiPart::FunctionCall(GeminiFunctionCall {
                    name: call.name,
                    args: call.input,
                }));
            }

            if parts.is_empty() {
                None
            } else {
                Some(("model", parts))
            }
        }
    }
}

/// `functionResponse.response` must be an object; anything else is wrapped.
fn tool_response(content: String) -> Value {
    match serde_json::from_str::<Value>(&content) {
        Ok(Value::Object(object)) => Value::Object(object),
        Ok(other) => json!({ "content": other }),
        Err(_) => {
            let mut object = Map::new();
            object.insert("content".to_string(), Value::String(content));
            Value::Object(object)
        }
    }
}

/// One decoded `data:` payload of a Gemini stream.
#[derive(Debug, Clone, PartialEq, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct GeminiStreamPayload {
    #[serde(default)]
    pub candidates: Vec<GeminiCandidate>,
    #[serde(default)]
    pub usage_metadata: Option<GeminiUsage>,
    #[serde(default)]
    pub model_version: Option<String>,
    #[serde(default)]
    pub response_id: Option<String>,
    #[serde(default)]
    pub error: Option<GeminiStreamError>,
}

impl GeminiStreamPayload {
    pub fn from_json(payload: &str) -> Result<Self, ProviderError> {
        serde_json::from_str(payload).map_err(|err| {
            ProviderError::transport(format!("malformed Gemini stream payload: {err}"))
        })
    }
}

#[derive(Debug, Clone, PartialEq, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct GeminiCandidate {
    #[serde(default)]
    pub content: Option<GeminiCandidateContent>,
    #[serde(default)]
    pub finish_reason: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Default, Deserialize)]
pub struct GeminiCandidateContent {
    #[serde(default)]
    pub parts: Vec<GeminiPart>,
}

#[derive(Debug, Clone, PartialEq, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct GeminiPart {
    #[serde(default)]
    pub text: Option<String>,
    /// Thought summaries are never forwarded as answer text.
    #[serde(default)]
    pub thought: bool,
    #[serde(default)]
    pub function_call: Option<GeminiFunctionCall>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct GeminiUsage {
    #[serde(default)]
    pub prompt_token_count: u32,
    #[serde(default)]
    pub candidates_token_count: u32,
}

#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct GeminiStreamError {
    #[serde(default)]
    pub code: Option<u16>,
    pub message: String,
    #[serde(default)]
    pub status: Option<String>,
}

#[cfg(test)]
mod tests {
    use crate::ToolCall;

    use super::*;

    #[test]
    fn conversation_maps_to_contents_and_function_parts() {
        let mut request = ModelRequest::new(
            "gemini-2.5-flash",
            vec![
                Message::new(Role::System, "be brief"),
                Message::new(Role::User, "weather in Oslo?"),
                Message::assistant_tool_calls(
                    "Checking.",
                    vec![ToolCall {
                        id: "call_0".to_string(),
                        name: "weather".to_string(),
                        input: json!({"city": "Oslo"}),
                    }],
                ),
                Message::tool_result("call_0", r#"{"sky":"rain"}"#),
                Message::tool_result("call_9", "plain text"),
            ],
        );
        request.tools = vec![ToolDefinition::new("weather", "Forecast", Value::Null)];
        request.options.max_tokens = Some(256);

        let api = build_api_request(request).expect("request should convert");
        let value = serde_json::to_value(&api).expect("request should serialize");

        assert_eq!(
            value["systemInstruction"],
            json!({"parts": [{"text": "be brief"}]})
        );
        assert_eq!(value["contents"][0]["role"], "user");
        assert_eq!(value["contents"][1]["role"], "model");
        assert_eq!(
            value["contents"][1]["parts"][1],
            json!({"functionCall": {"name": "weather", "args": {"city": "Oslo"}}})
        );
        assert_eq!(
            value["contents"][2]["parts"],
            json!([
                {"functionResponse": {"name": "weather", "response": {"sky": "rain"}}},
                {"functionResponse": {"name": "call_9", "response": {"content": "plain text"}}}
            ])
        );
        assert_eq!(
            value["tools"][0]["functionDeclarations"][0]["parameters"],
            json!({"type": "object"})
        );
        assert_eq!(value["generationConfig"], json!({"maxOutputTokens": 256}));
    }

    #[test]
    fn system_only_request_is_rejected() {
        let request = ModelRequest::new(
            "gemini-2.5-flash",
            vec![Message::new(Role::System, "rules")],
        );
        let error = build_api_request(request).expect_err("no contents should fail");
        assert!(error.message.contains("non-system"));
    }
}
