//! OpenAI-compatible request and response bodies.

use schat::{ChatRequest, InboundMessage};
use scommon::GenerationOptions;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use sprovider::Role;

use crate::ServerError;

#[derive(Debug, Clone, Deserialize)]
pub struct ChatCompletionRequest {
    pub model: String,
    #[serde(default)]
    pub stream: bool,
    #[serde(default)]
    pub messages: Vec<WireMessage>,
    #[serde(default)]
    pub temperature: Option<f32>,
    #[serde(default, alias = "max_completion_tokens")]
    pub max_tokens: Option<u32>,
    /// Client-declared tools; the gateway's own registry decides what runs.
    #[serde(default)]
    pub tools: Vec<Value>,
}

impl ChatCompletionRequest {
    pub fn into_chat_request(self) -> Result<ChatRequest, ServerError> {
        if !self.tools.is_empty() {
            tracing::debug!(
                phase = "http",
                event = "client_tools_ignored",
                count = self.tools.len()
            );
        }

        let messages = self
            .messages
            .into_iter()
            .map(WireMessage::into_inbound)
            .collect::<Result<Vec<_>, _>>()?;

        let options = GenerationOptions {
            temperature: self.temperature,
            max_tokens: self.max_tokens,
        };

        Ok(ChatRequest::new(self.model, messages).with_options(options))
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct WireMessage {
    pub role: String,
    #[serde(default)]
    pub content: Option<WireContent>,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(untagged)]
pub enum WireContent {
    Text(String),
    Parts(Vec<ContentPart>),
}

#[derive(Debug, Clone, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ContentPart {
    Text { text: String },
    ImageUrl { image_url: Value },
    #[serde(other)]
    Unsupported,
}

impl WireContent {
    /// Text parts joined by newlines; images and unknown parts are skipped.
    pub fn text(&self) -> String {
        match self {
            Self::Text(text) => text.clone(),
            Self::Parts(parts) => parts
                .iter()
                .filter_map(|part| match part {
                    ContentPart::Text { text } => Some(text.as_str()),
                    ContentPart::ImageUrl { .. } | ContentPart::Unsupported => None,
                })
                .collect::<Vec<_>>()
                .join("\n"),
        }
    }
}

impl WireMessage {
    fn into_inbound(self) -> Result<InboundMessage, ServerError> {
        let role = match self.role.as_str() {
            "system" | "developer" => Role::System,
            "user" => Role::User,
            "assistant" => Role::Assistant,
            "tool" => Role::Tool,
            other => {
                return Err(ServerError::bad_request(format!(
                    "unsupported message role '{other}'"
                )));
            }
        };
        let text = self.content.map(|content| content.text()).unwrap_or_default();
        Ok(InboundMessage::new(role, text))
    }
}

/// Streamed choice delta.
///
/// Tool calls run inside the gateway and reach clients as text, so deltas
/// never carry `tool_calls` and no chunk finishes with `"tool_calls"`.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChunkDelta {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub role: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub content: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChunkChoice {
    pub index: u32,
    pub delta: ChunkDelta,
    pub finish_reason: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChatCompletionChunk {
    pub id: String,
    pub object: String,
    pub created: u64,
    pub model: String,
    pub choices: Vec<ChunkChoice>,
}

/// Shared identity of every chunk in one response.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ResponseIdentity {
    pub id: String,
    pub created: u64,
    pub model: String,
}

impl ResponseIdentity {
    pub fn new(model: impl Into<String>) -> Self {
        Self {
            id: format!("chatcmpl-{}", uuid::Uuid::new_v4()),
            created: scommon::unix_seconds(),
            model: model.into(),
        }
    }

    pub fn chunk(&self, delta: ChunkDelta, finish_reason: Option<&str>) -> ChatCompletionChunk {
        ChatCompletionChunk {
            id: self.id.clone(),
            object: "chat.completion.chunk".to_string(),
            created: self.created,
            model: self.model.clone(),
            choices: vec![ChunkChoice {
                index: 0,
                delta,
                finish_reason: finish_reason.map(str::to_string),
            }],
        }
    }

    pub fn completion(&self, content: String) -> ChatCompletion {
        ChatCompletion {
            id: self.id.clone(),
            object: "chat.completion".to_string(),
            created: self.created,
            model: self.model.clone(),
            choices: vec![CompletionChoice {
                index: 0,
                message: CompletionMessage {
                    role: "assistant".to_string(),
                    content,
                },
                finish_reason: "stop".to_string(),
            }],
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CompletionMessage {
    pub role: String,
    pub content: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CompletionChoice {
    pub index: u32,
    pub message: CompletionMessage,
    pub finish_reason: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChatCompletion {
    pub id: String,
    pub object: String,
    pub created: u64,
    pub model: String,
    pub choices: Vec<CompletionChoice>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ModelEntry {
    pub id: String,
    pub object: String,
    pub created: u64,
    pub owned_by: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ModelList {
    pub object: String,
    pub data: Vec<ModelEntry>,
}

#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct ApprovalDecisionBody {
    pub approved: bool,
    #[serde(default)]
    pub reason: Option<String>,
}

#[cfg(test)]
mod tests {
    use serde_json::json;

    use super::*;

    #[test]
    fn content_parts_keep_only_text() {
        let request: ChatCompletionRequest = serde_json::from_value(json!({
            "model": "claude-sonnet",
            "messages": [
                {"role": "developer", "content": "be brief"},
                {"role": "user", "content": [
                    {"type": "text", "text": "what is"},
                    {"type": "image_url", "image_url": {"url": "data:image/png;base64,AAAA"}},
                    {"type": "input_audio", "input_audio": {}},
                    {"type": "text", "text": "this?"}
                ]}
            ]
        }))
        .expect("request should decode");

        assert!(!request.stream);
        let chat = request.into_chat_request().expect("roles should map");
        assert_eq!(chat.messages[0].role, Role::System);
        assert_eq!(chat.messages[1].text, "what is\nthis?");
    }

    #[test]
    fn unknown_roles_are_rejected() {
        let request: ChatCompletionRequest = serde_json::from_value(json!({
            "model": "m",
            "messages": [{"role": "narrator", "content": "once upon a time"}]
        }))
        .expect("request should decode");

        let error = request.into_chat_request().expect_err("role should be rejected");
        assert_eq!(error.status.as_u16(), 400);
    }

    #[test]
    fn chunks_omit_empty_delta_fields() {
        let identity = ResponseIdentity::new("m");
        let chunk = identity.chunk(
            ChunkDelta {
                role: None,
                content: Some("hi\n".to_string()),
            },
            None,
        );
        let value = serde_json::to_value(&chunk).expect("chunk should encode");

        assert_eq!(value["object"], "chat.completion.chunk");
        assert!(value["id"].as_str().is_some_and(|id| id.starts_with("chatcmpl-")));
        assert_eq!(value["choices"][0]["delta"], json!({"content": "hi\n"}));
        assert_eq!(value["choices"][0]["finish_reason"], Value::Null);
    }

    #[test]
    fn chunks_never_carry_tool_calls() {
        let identity = ResponseIdentity::new("m");
        let opening = identity.chunk(
            ChunkDelta {
                role: Some("assistant".to_string()),
                content: Some(String::new()),
            },
            None,
        );
        let closing = identity.chunk(ChunkDelta::default(), Some("stop"));

        for chunk in [opening, closing] {
            let value = serde_json::to_value(&chunk).expect("chunk should encode");
            let delta = value["choices"][0]["delta"]
                .as_object()
                .expect("delta should be an object");
            assert!(!delta.contains_key("tool_calls"));
            assert_ne!(value["choices"][0]["finish_reason"], "tool_calls");
        }
    }
}
