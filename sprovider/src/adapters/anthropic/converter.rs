//! Content-block stream to canonical chunk conversion.

use std::collections::HashMap;

use scommon::{unix_millis, unix_seconds};
use serde_json::Value;

use crate::adapters::{DroppedToolCall, merge_tool_input};
use crate::{CanonicalChunk, ChunkPayload, ChunkSequencer, FinishReason, ResponseStamp};

use super::serde_api::{
    AnthropicBlockDelta, AnthropicBlockStart, AnthropicStreamEvent, AnthropicUsage,
};

#[derive(Debug)]
enum BlockState {
    Text {
        opened: bool,
    },
    ToolUse {
        id: String,
        name: String,
        initial_input: Value,
        partial_json: String,
    },
    Other,
}

/// Stateful converter for one Anthropic message stream.
///
/// Text blocks produce one empty assistant "open" chunk on their first delta,
/// one chunk per delta, and a `stop` chunk on block stop. Tool-use blocks
/// accumulate partial JSON and finalize into a single `ToolCallRequest`.
#[derive(Debug, Default)]
pub struct AnthropicStreamConverter {
    sequencer: ChunkSequencer,
    blocks: HashMap<u32, BlockState>,
    usage: AnthropicUsage,
    emit_tool_call_deltas: bool,
    finished: bool,
    dropped: Vec<DroppedToolCall>,
}

impl AnthropicStreamConverter {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_tool_call_deltas(mut self, enabled: bool) -> Self {
        self.emit_tool_call_deltas = enabled;
        self
    }

    /// True after `message_stop` or a vendor error; later events are ignored.
    pub fn is_finished(&self) -> bool {
        self.finished
    }

    pub fn take_dropped(&mut self) -> Vec<DroppedToolCall> {
        std::mem::take(&mut self.dropped)
    }

    pub fn convert(&mut self, event: AnthropicStreamEvent) -> Vec<CanonicalChunk> {
        if self.finished {
            return Vec::new();
        }

        match event {
            AnthropicStreamEvent::MessageStart { message } => {
                if let Some(usage) = message.usage {
                    self.usage.input_tokens = usage.input_tokens;
                }
                self.sequencer.set_stamp(ResponseStamp {
                    id: message.id,
                    model: message.model,
                    created: unix_seconds(),
                });
                Vec::new()
            }
            AnthropicStreamEvent::ContentBlockStart {
                index,
                content_block,
            } => self.start_block(index, content_block),
            AnthropicStreamEvent::ContentBlockDelta { index, delta } => {
                self.apply_delta(index, delta)
            }
            AnthropicStreamEvent::ContentBlockStop { index } => self.stop_block(index),
            AnthropicStreamEvent::MessageDelta { usage } => match usage {
                Some(usage) => {
                    if usage.input_tokens > 0 {
                        self.usage.input_tokens = usage.input_tokens;
                    }
                    self.usage.output_tokens = usage.output_tokens;
                    vec![self.sequencer.next(ChunkPayload::Usage {
                        input_tokens: self.usage.input_tokens,
                        output_tokens: self.usage.output_tokens,
                    })]
                }
                None => Vec::new(),
            },
            AnthropicStreamEvent::MessageStop => {
                self.finished = true;
                Vec::new()
            }
            AnthropicStreamEvent::Ping => vec![self.sequencer.next(ChunkPayload::Ping {
                timestamp: unix_millis(),
            })],
            AnthropicStreamEvent::Error { error } => {
                self.finished = true;
                vec![self.sequencer.next(ChunkPayload::error(
                    format!("Anthropic API error: {}", error.message),
                    500,
                ))]
            }
            AnthropicStreamEvent::Unknown => Vec::new(),
        }
    }

    fn start_block(&mut self, index: u32, block: AnthropicBlockStart) -> Vec<CanonicalChunk> {
        match block {
            AnthropicBlockStart::Text { text } => {
                self.blocks.insert(index, BlockState::Text { opened: false });
                if text.is_empty() {
                    Vec::new()
                } else {
                    self.apply_delta(index, AnthropicBlockDelta::TextDelta { text })
                }
            }
            AnthropicBlockStart::ToolUse { id, name, input } => {
                self.blocks.insert(
                    index,
                    BlockState::ToolUse {
                        id,
                        name,
                        initial_input: input,
                        partial_json: String::new(),
                    },
                );
                Vec::new()
            }
            AnthropicBlockStart::Other => {
                self.blocks.insert(index, BlockState::Other);
                Vec::new()
            }
        }
    }

    fn apply_delta(&mut self, index: u32, delta: AnthropicBlockDelta) -> Vec<CanonicalChunk> {
        match (self.blocks.get_mut(&index), delta) {
            (Some(BlockState::Text { opened }), AnthropicBlockDelta::TextDelta { text }) => {
                let mut chunks = Vec::with_capacity(2);
                if !*opened {
                    *opened = true;
                    chunks.push(self.sequencer.next(ChunkPayload::text_open()));
                }
                chunks.push(self.sequencer.next(ChunkPayload::text(text)));
                chunks
            }
            (
                Some(BlockState::ToolUse {
                    id,
                    name,
                    partial_json,
                    ..
                }),
                AnthropicBlockDelta::InputJsonDelta {
                    partial_json: fragment,
                },
            ) => {
                partial_json.push_str(&fragment);
                if !self.emit_tool_call_deltas {
                    return Vec::new();
                }

                let payload = ChunkPayload::ToolCallDelta {
                    tool_name: name.clone(),
                    partial_input_json: fragment,
                    tool_use_id: id.clone(),
                };
                vec![self.sequencer.next(payload)]
            }
            (_, delta) => {
                tracing::debug!(index, ?delta, "ignoring delta for unknown or mismatched block");
                Vec::new()
            }
        }
    }

    fn stop_block(&mut self, index: u32) -> Vec<CanonicalChunk> {
        match self.blocks.remove(&index) {
            Some(BlockState::Text { .. }) => {
                vec![self.sequencer.next(ChunkPayload::text_stop(FinishReason::Stop))]
            }
            Some(BlockState::ToolUse {
                id,
                name,
                initial_input,
                partial_json,
            }) => match merge_tool_input(initial_input, &partial_json) {
                Ok(input) => vec![self.sequencer.next(ChunkPayload::ToolCallRequest {
                    tool_name: name,
                    input,
                    tool_use_id: id,
                    finish: Some(FinishReason::ToolCalls),
                })],
                Err(reason) => {
                    tracing::warn!(
                        tool_use_id = %id,
                        tool_name = %name,
                        reason = %reason,
                        "dropping tool call with malformed input"
                    );
                    self.dropped.push(DroppedToolCall {
                        tool_use_id: id,
                        tool_name: name,
                        reason,
                    });
                    Vec::new()
                }
            },
            Some(BlockState::Other) | None => Vec::new(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn events(lines: &[&str]) -> Vec<AnthropicStreamEvent> {
        lines
            .iter()
            .map(|line| AnthropicStreamEvent::from_json(line).expect("event should decode"))
            .collect()
    }

    fn convert_all(converter: &mut AnthropicStreamConverter, lines: &[&str]) -> Vec<CanonicalChunk> {
        events(lines)
            .into_iter()
            .flat_map(|event| converter.convert(event))
            .collect()
    }

    #[test]
    fn every_chunk_is_stamped_with_message_identity() {
        let mut converter = AnthropicStreamConverter::new();
        let chunks = convert_all(
            &mut converter,
            &[
                r#"{"type":"message_start","message":{"id":"msg_1","model":"claude-x","usage":{"input_tokens":9}}}"#,
                r#"{"type":"content_block_start","index":0,"content_block":{"type":"text","text":""}}"#,
                r#"{"type":"content_block_delta","index":0,"delta":{"type":"text_delta","text":"hi"}}"#,
            ],
        );

        assert_eq!(chunks.len(), 2);
        assert!(chunks.iter().all(|chunk| chunk.stamp.id == "msg_1"));
        assert!(chunks.iter().all(|chunk| chunk.stamp.model == "claude-x"));
    }

    #[test]
    fn malformed_tool_input_drops_only_that_call() {
        let mut converter = AnthropicStreamConverter::new();
        let chunks = convert_all(
            &mut converter,
            &[
                r#"{"type":"content_block_start","index":0,"content_block":{"type":"tool_use","id":"toolu_bad","name":"lookup","input":{}}}"#,
                r#"{"type":"content_block_delta","index":0,"delta":{"type":"input_json_delta","partial_json":"{\"q\":"}}"#,
                r#"{"type":"content_block_stop","index":0}"#,
                r#"{"type":"content_block_start","index":1,"content_block":{"type":"text","text":""}}"#,
                r#"{"type":"content_block_delta","index":1,"delta":{"type":"text_delta","text":"still here"}}"#,
            ],
        );

        assert_eq!(chunks.len(), 2);
        assert!(!converter.is_finished());
        let dropped = converter.take_dropped();
        assert_eq!(dropped.len(), 1);
        assert_eq!(dropped[0].tool_use_id, "toolu_bad");
    }

    #[test]
    fn vendor_error_ends_the_sequence() {
        let mut converter = AnthropicStreamConverter::new();
        let chunks = convert_all(
            &mut converter,
            &[
                r#"{"type":"error","error":{"type":"overloaded_error","message":"Overloaded"}}"#,
                r#"{"type":"ping"}"#,
            ],
        );

        assert_eq!(chunks.len(), 1);
        assert_eq!(
            chunks[0].payload,
            ChunkPayload::error("Anthropic API error: Overloaded", 500)
        );
        assert!(converter.is_finished());
    }

    #[test]
    fn tool_call_deltas_are_opt_in() {
        let lines = [
            r#"{"type":"content_block_start","index":0,"content_block":{"type":"tool_use","id":"toolu_1","name":"lookup","input":{}}}"#,
            r#"{"type":"content_block_delta","index":0,"delta":{"type":"input_json_delta","partial_json":"{\"q\":\"x\"}"}}"#,
        ];

        let mut quiet = AnthropicStreamConverter::new();
        assert!(convert_all(&mut quiet, &lines).is_empty());

        let mut chatty = AnthropicStreamConverter::new().with_tool_call_deltas(true);
        let chunks = convert_all(&mut chatty, &lines);
        assert_eq!(
            chunks[0].payload,
            ChunkPayload::ToolCallDelta {
                tool_name: "lookup".to_string(),
                partial_input_json: "{\"q\":\"x\"}".to_string(),
                tool_use_id: "toolu_1".to_string(),
            }
        );
    }

    #[test]
    fn usage_is_reported_from_message_delta() {
        let mut converter = AnthropicStreamConverter::new();
        let chunks = convert_all(
            &mut converter,
            &[
                r#"{"type":"message_start","message":{"id":"msg_1","model":"m","usage":{"input_tokens":12,"output_tokens":1}}}"#,
                r#"{"type":"message_delta","delta":{"stop_reason":"end_turn"},"usage":{"output_tokens":30}}"#,
                r#"{"type":"message_stop"}"#,
            ],
        );

        assert_eq!(
            chunks[0].payload,
            ChunkPayload::Usage {
                input_tokens: 12,
                output_tokens: 30
            }
        );
        assert!(converter.is_finished());
    }
}
