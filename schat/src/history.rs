//! Replays a thread's events as the provider conversation.

use serde_json::json;
use sprovider::{Message, Role, ToolCall};
use stooling::{ToolExecutionResult, ToolUseRecord};

use crate::{ChatEvent, ChatEventKind, MessageContent};

/// Converts stored events into provider messages.
///
/// Assistant text and the tool uses that follow it collapse into a single
/// assistant message, followed by one tool result per call. Checkpoints are
/// not part of the conversation.
pub fn conversation_from_events(events: &[ChatEvent]) -> Vec<Message> {
    let mut builder = ConversationBuilder::default();
    for event in events {
        let ChatEventKind::Message { role, content, .. } = &event.kind else {
            continue;
        };

        match (role, content) {
            (Role::Assistant, MessageContent::Text { text }) => builder.assistant_text(text),
            (Role::Assistant, MessageContent::ToolUse { record, .. }) => {
                builder.tool_use(record.clone())
            }
            (role, MessageContent::Text { text }) => builder.push(Message::new(*role, text.clone())),
            (_, MessageContent::ToolUse { .. }) => {}
        }
    }
    builder.finish()
}

#[derive(Default)]
struct ConversationBuilder {
    messages: Vec<Message>,
    text: String,
    tool_uses: Vec<ToolUseRecord>,
}

impl ConversationBuilder {
    fn push(&mut self, message: Message) {
        self.flush();
        self.messages.push(message);
    }

    fn assistant_text(&mut self, text: &str) {
        if !self.tool_uses.is_empty() {
            self.flush();
        }
        if text.is_empty() {
            return;
        }
        if !self.text.is_empty() && !self.text.ends_with('\n') {
            self.text.push('\n');
        }
        self.text.push_str(text);
    }

    fn tool_use(&mut self, record: ToolUseRecord) {
        self.tool_uses.push(record);
    }

    fn flush(&mut self) {
        let text = std::mem::take(&mut self.text);
        let tool_uses = std::mem::take(&mut self.tool_uses);

        if tool_uses.is_empty() {
            if !text.is_empty() {
                self.messages.push(Message::new(Role::Assistant, text));
            }
            return;
        }

        let calls = tool_uses
            .iter()
            .map(|record| ToolCall {
                id: record.tool_use_id.clone(),
                name: record.tool_name.clone(),
                input: record.input.clone(),
            })
            .collect();
        self.messages.push(Message::assistant_tool_calls(text, calls));

        for record in tool_uses {
            let result = record.execution_result().unwrap_or_else(|| {
                ToolExecutionResult::new(
                    record.tool_use_id.clone(),
                    json!({ "error": "the tool call did not complete" }),
                )
            });
            self.messages.push(result.into_message());
        }
    }

    fn finish(mut self) -> Vec<Message> {
        self.flush();
        self.messages
    }
}
