//! Gemini candidate stream to canonical chunk conversion.

use serde_json::Value;

use crate::adapters::DroppedToolCall;
use crate::{CanonicalChunk, ChunkPayload, ChunkSequencer, FinishReason, ResponseStamp};

use super::serde_api::{GeminiFunctionCall, GeminiStreamPayload, GeminiUsage};

/// Stateful converter for one Gemini `streamGenerateContent` response.
///
/// Gemini sends whole function calls without ids, so each call gets a
/// `call_{n}` id numbered in stream order. Usage metadata is cumulative and
/// only the last report is emitted, once the stream ends.
#[derive(Debug, Default)]
pub struct GeminiStreamConverter {
    sequencer: ChunkSequencer,
    stamped: bool,
    text_open: bool,
    next_call: usize,
    usage: Option<GeminiUsage>,
    emit_tool_call_deltas: bool,
    finished: bool,
    dropped: Vec<DroppedToolCall>,
}

impl GeminiStreamConverter {
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

    pub fn convert(&mut self, payload: GeminiStreamPayload) -> Vec<CanonicalChunk> {
        if self.finished {
            return Vec::new();
        }

        if !self.stamped {
            self.stamped = true;
            self.sequencer.set_stamp(ResponseStamp {
                id: payload.response_id.clone().unwrap_or_default(),
                model: payload.model_version.clone().unwrap_or_default(),
                created: scommon::unix_seconds(),
            });
        }

        if let Some(error) = payload.error {
            self.finished = true;
            let mut chunks = self.close_text(FinishReason::Stop);
            chunks.push(self.sequencer.next(ChunkPayload::error(
                format!("Gemini API error: {}", error.message),
                error.code.unwrap_or(500),
            )));
            return chunks;
        }

        let mut chunks = Vec::new();
        // Only the first candidate is surfaced.
        if let Some(candidate) = payload.candidates.into_iter().next() {
            let parts = candidate
                .content
                .map(|content| content.parts)
                .unwrap_or_default();

            for part in parts {
                if let Some(call) = part.function_call {
                    chunks.extend(self.close_text(FinishReason::Stop));
                    chunks.extend(self.tool_call(call));
                    continue;
                }

                let Some(text) = part.text.filter(|text| !text.is_empty() && !part.thought) else {
                    continue;
                };
                if !self.text_open {
                    self.text_open = true;
                    chunks.push(self.sequencer.next(ChunkPayload::text_open()));
                }
                chunks.push(self.sequencer.next(ChunkPayload::text(text)));
            }

            match candidate.finish_reason.as_deref() {
                Some("MAX_TOKENS") => chunks.extend(self.close_text(FinishReason::Length)),
                Some(_) => chunks.extend(self.close_text(FinishReason::Stop)),
                None => {}
            }
        }

        if let Some(usage) = payload.usage_metadata {
            self.usage = Some(usage);
        }

        chunks
    }

    /// Closes any open text block and reports the final usage.
    pub fn finish_stream(&mut self) -> Vec<CanonicalChunk> {
        if self.finished {
            return Vec::new();
        }
        self.finished = true;

        let mut chunks = self.close_text(FinishReason::Stop);
        if let Some(usage) = self.usage.take() {
            chunks.push(self.sequencer.next(ChunkPayload::Usage {
                input_tokens: usage.prompt_token_count,
                output_tokens: usage.candidates_token_count,
            }));
        }
        chunks
    }

    fn tool_call(&mut self, call: GeminiFunctionCall) -> Vec<CanonicalChunk> {
        let tool_use_id = format!("call_{}", self.next_call);
        self.next_call += 1;

        let input = match call.args {
            Value::Object(args) => Value::Object(args),
            Value::Null => Value::Object(Default::default()),
            other => {
                let reason = format!("tool input must be a JSON object, got {other}");
                tracing::warn!(
                    tool_use_id = %tool_use_id,
                    tool_name = %call.name,
                    reason = %reason,
                    "dropping tool call with malformed arguments"
                );
                self.dropped.push(DroppedToolCall {
                    tool_use_id,
                    tool_name: call.name,
                    reason,
                });
                return Vec::new();
            }
        };

        let mut chunks = Vec::with_capacity(2);
        if self.emit_tool_call_deltas {
            chunks.push(self.sequencer.next(ChunkPayload::ToolCallDelta {
                tool_name: call.name.clone(),
                partial_input_json: input.to_string(),
                tool_use_id: tool_use_id.clone(),
            }));
        }
        chunks.push(self.sequencer.next(ChunkPayload::ToolCallRequest {
            tool_name: call.name,
            input,
            tool_use_id,
            finish: Some(FinishReason::ToolCalls),
        }));
        chunks
    }

    fn close_text(&mut self, finish: FinishReason) -> Vec<CanonicalChunk> {
        if !self.text_open {
            return Vec::new();
        }
        self.text_open = false;
        vec![self.sequencer.next(ChunkPayload::text_stop(finish))]
    }
}
