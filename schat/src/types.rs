//! Chat events, thread sessions, and inbound request types.

use scommon::{GenerationOptions, ThreadId, unix_millis};
use serde::{Deserialize, Serialize};
use sprovider::Role;
use stooling::{ToolOutcome, ToolUseRecord, ToolUseStatus};
use uuid::Uuid;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum MessageContent {
    Text {
        text: String,
    },
    ToolUse {
        summary: String,
        #[serde(flatten)]
        record: ToolUseRecord,
    },
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum ChatEventKind {
    Message {
        role: Role,
        content: MessageContent,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        failure_reason: Option<String>,
    },
    Checkpoint {
        label: String,
    },
}

/// One append-only entry of a thread's history.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ChatEvent {
    pub id: String,
    pub created_at_ms: u64,
    #[serde(flatten)]
    pub kind: ChatEventKind,
}

impl ChatEvent {
    pub fn new(kind: ChatEventKind) -> Self {
        Self {
            id: Uuid::new_v4().to_string(),
            created_at_ms: unix_millis(),
            kind,
        }
    }

    pub fn user_text(text: impl Into<String>) -> Self {
        Self::message(Role::User, MessageContent::Text { text: text.into() }, None)
    }

    pub fn assistant_text(text: impl Into<String>) -> Self {
        Self::message(Role::Assistant, MessageContent::Text { text: text.into() }, None)
    }

    pub fn assistant_failure(text: impl Into<String>, reason: impl Into<String>) -> Self {
        Self::message(
            Role::Assistant,
            MessageContent::Text { text: text.into() },
            Some(reason.into()),
        )
    }

    pub fn tool_use(record: ToolUseRecord, summary: impl Into<String>) -> Self {
        Self::message(
            Role::Assistant,
            MessageContent::ToolUse {
                summary: summary.into(),
                record,
            },
            None,
        )
    }

    pub fn checkpoint(label: impl Into<String>) -> Self {
        Self::new(ChatEventKind::Checkpoint {
            label: label.into(),
        })
    }

    fn message(role: Role, content: MessageContent, failure_reason: Option<String>) -> Self {
        Self::new(ChatEventKind::Message {
            role,
            content,
            failure_reason,
        })
    }

    pub fn role(&self) -> Option<Role> {
        match &self.kind {
            ChatEventKind::Message { role, .. } => Some(*role),
            ChatEventKind::Checkpoint { .. } => None,
        }
    }

    pub fn failure_reason(&self) -> Option<&str> {
        match &self.kind {
            ChatEventKind::Message { failure_reason, .. } => failure_reason.as_deref(),
            ChatEventKind::Checkpoint { .. } => None,
        }
    }

    /// Text streamed to API clients; `None` for events they never see.
    pub fn stream_representation(&self) -> Option<String> {
        let ChatEventKind::Message {
            role: Role::Assistant,
            content,
            ..
        } = &self.kind
        else {
            return None;
        };

        let text = match content {
            MessageContent::Text { text } if text.is_empty() => return None,
            MessageContent::Text { text } => text.clone(),
            MessageContent::ToolUse { summary, record } => match &record.status {
                ToolUseStatus::Completed {
                    outcome: ToolOutcome::Failure { error },
                } => format!("{summary} failed: {}", error.message),
                ToolUseStatus::ApprovalRejected { reason } => {
                    format!("{summary} was rejected: {reason}")
                }
                _ => summary.clone(),
            },
        };

        Some(with_trailing_newline(text))
    }
}

fn with_trailing_newline(mut text: String) -> String {
    if !text.ends_with('\n') {
        text.push('\n');
    }
    text
}

/// Durable conversation state for one thread id.
#[derive(Debug, Clone, PartialEq)]
pub struct ThreadSession {
    pub thread_id: ThreadId,
    pub events: Vec<ChatEvent>,
}

impl ThreadSession {
    pub fn new(thread_id: ThreadId, events: Vec<ChatEvent>) -> Self {
        Self { thread_id, events }
    }
}

/// One message of an inbound chat-completions request, reduced to its text.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct InboundMessage {
    pub role: Role,
    pub text: String,
}

impl InboundMessage {
    pub fn new(role: Role, text: impl Into<String>) -> Self {
        Self {
            role,
            text: text.into(),
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct ChatRequest {
    pub model: String,
    pub messages: Vec<InboundMessage>,
    pub options: GenerationOptions,
}

impl ChatRequest {
    pub fn new(model: impl Into<String>, messages: Vec<InboundMessage>) -> Self {
        Self {
            model: model.into(),
            messages,
            options: GenerationOptions::default(),
        }
    }

    pub fn with_options(mut self, options: GenerationOptions) -> Self {
        self.options = options;
        self
    }
}
