//! Chat-completions delta stream to canonical chunk conversion.

use std::collections::BTreeMap;

use serde_json::Value;

use crate::adapters::{DroppedToolCall, merge_tool_input};
use crate::{CanonicalChunk, ChunkPayload, ChunkSequencer, FinishReason, ResponseStamp};

use super::serde_api::{OpenAiDeltaToolCall, OpenAiStreamPayload};

#[derive(Debug, Default)]
struct PendingToolCall {
    id: String,
    name: String,
    arguments: String,
}

/// Stateful converter for one OpenAI-compatible completion stream.
///
/// Tool calls arrive as indexed argument fragments and are emitted once the
/// choice finishes, or when the stream ends without a finish reason.
#[derive(Debug, Default)]
pub struct OpenAiStreamConverter {
    sequencer: ChunkSequencer,
    stamped: bool,
    text_open: bool,
    tool_calls: BTreeMap<u32, PendingToolCall>,
    emit_tool_call_deltas: bool,
    finished: bool,
    dropped: Vec<DroppedToolCall>,
}

impl OpenAiStreamConverter {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_tool_call_deltas(mut self, enabled: bool) -> Self {
        self.emit_tool_call_deltas = enabled;
        self
    }

    pub fn is_finished(&self) -> bool {
        self.finished
    }

    pub fn take_dropped(&mut self) -> Vec<DroppedToolCall> {
        std::mem::take(&mut self.dropped)
    }

    pub fn convert(&mut self, payload: OpenAiStreamPayload) -> Vec<CanonicalChunk> {
        if self.finished {
            return Vec::new();
        }

        if !self.stamped && !payload.id.is_empty() {
            self.stamped = true;
            self.sequencer.set_stamp(ResponseStamp {
                id: payload.id.clone(),
                model: payload.model.clone(),
                created: payload.created,
            });
        }

        if let Some(error) = payload.error {
            self.finished = true;
            return vec![self.sequencer.next(ChunkPayload::error(
                format!("OpenAI API error: {}", error.message),
                500,
            ))];
        }

        let mut chunks = Vec::new();
        for choice in payload.choices {
            if let Some(content) = choice.delta.content.filter(|content| !content.is_empty()) {
                if !self.text_open {
                    self.text_open = true;
                    chunks.push(self.sequencer.next(ChunkPayload::text_open()));
                }
                chunks.push(self.sequencer.next(ChunkPayload::text(content)));
            }

            for call in choice.delta.tool_calls.unwrap_or_default() {
                chunks.extend(self.accumulate_tool_call(call));
            }

            match choice.finish_reason.as_deref() {
                Some("tool_calls") => {
                    chunks.extend(self.close_text(FinishReason::Stop));
                    chunks.extend(self.flush_tool_calls());
                }
                Some("length") => {
                    chunks.extend(self.close_text(FinishReason::Length));
                    chunks.extend(self.flush_tool_calls());
                }
                Some(_) => {
                    chunks.extend(self.close_text(FinishReason::Stop));
                    chunks.extend(self.flush_tool_calls());
                }
                None => {}
            }
        }

        if let Some(usage) = payload.usage {
            chunks.push(self.sequencer.next(ChunkPayload::Usage {
                input_tokens: usage.prompt_tokens,
                output_tokens: usage.completion_tokens,
            }));
        }

        chunks
    }

    /// Flushes any open text block and pending tool calls at end of stream.
    pub fn finish_stream(&mut self) -> Vec<CanonicalChunk> {
        if self.finished {
            return Vec::new();
        }
        self.finished = true;

        let mut chunks = self.close_text(FinishReason::Stop);
        chunks.extend(self.flush_tool_calls());
        chunks
    }

    fn accumulate_tool_call(&mut self, call: OpenAiDeltaToolCall) -> Vec<CanonicalChunk> {
        let index = call.index.unwrap_or(0);
        // Some compatible servers never send ids; the index keeps calls apart.
        let pending = self
            .tool_calls
            .entry(index)
            .or_insert_with(|| PendingToolCall {
                id: format!("call_{index}"),
                ..PendingToolCall::default()
            });

        if let Some(id) = call.id.filter(|id| !id.is_empty()) {
            pending.id = id;
        }

        let mut fragment = String::new();
        if let Some(function) = call.function {
            if let Some(name) = function.name.filter(|name| !name.is_empty()) {
                pending.name = name;
            }
            if let Some(arguments) = function.arguments {
                pending.arguments.push_str(&arguments);
                fragment = arguments;
            }
        }

        if !self.emit_tool_call_deltas || fragment.is_empty() {
            return Vec::new();
        }

        let payload = ChunkPayload::ToolCallDelta {
            tool_name: pending.name.clone(),
            partial_input_json: fragment,
            tool_use_id: pending.id.clone(),
        };
        vec![self.sequencer.next(payload)]
    }

    fn close_text(&mut self, finish: FinishReason) -> Vec<CanonicalChunk> {
        if !self.text_open {
            return Vec::new();
        }
        self.text_open = false;
        vec![self.sequencer.next(ChunkPayload::text_stop(finish))]
    }

    fn flush_tool_calls(&mut self) -> Vec<CanonicalChunk> {
        let pending = std::mem::take(&mut self.tool_calls);
        let mut chunks = Vec::with_capacity(pending.len());

        for (_, call) in pending {
            match merge_tool_input(Value::Object(Default::default()), &call.arguments) {
                Ok(input) => chunks.push(self.sequencer.next(ChunkPayload::ToolCallRequest {
                    tool_name: call.name,
                    input,
                    tool_use_id: call.id,
                    finish: Some(FinishReason::ToolCalls),
                })),
                Err(reason) => {
                    tracing::warn!(
                        tool_use_id = %call.id,
                        tool_name = %call.name,
                        reason = %reason,
                        "dropping tool call with malformed arguments"
                    );
                    self.dropped.push(DroppedToolCall {
                        tool_use_id: call.id,
                        tool_name: call.name,
                        reason,
                    });
                }
            }
        }

        chunks
    }
}
