//! Canonical chunk contracts and in-memory stream utilities.
//!
//! Every adapter converges on [`CanonicalChunk`], so downstream consumers never
//! see vendor wire formats.
//!
//! ```rust
//! use sprovider::{CanonicalChunk, ChunkPayload, ChunkStream, ResponseStamp, VecChunkStream};
//!
//! let chunk = CanonicalChunk::new(0, ResponseStamp::default(), ChunkPayload::text("hello"));
//! let stream = VecChunkStream::new(vec![Ok(chunk)]);
//! let _boxed: ChunkStream<'static> = Box::pin(stream);
//! ```

use std::collections::VecDeque;
use std::pin::Pin;
use std::task::{Context, Poll};

use futures_core::Stream;
use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::{ProviderError, Role};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FinishReason {
    Stop,
    Length,
    ToolCalls,
}

impl FinishReason {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Stop => "stop",
            Self::Length => "length",
            Self::ToolCalls => "tool_calls",
        }
    }
}

/// Response identity captured at stream start and stamped on every chunk.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct ResponseStamp {
    pub id: String,
    pub model: String,
    pub created: u64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ChunkPayload {
    TextDelta {
        content: String,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        role: Option<Role>,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        finish: Option<FinishReason>,
    },
    ToolCallRequest {
        tool_name: String,
        input: Value,
        tool_use_id: String,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        finish: Option<FinishReason>,
    },
    ToolCallDelta {
        tool_name: String,
        partial_input_json: String,
        tool_use_id: String,
    },
    Error {
        message: String,
        status_code: u16,
    },
    Ping {
        timestamp: u64,
    },
    Usage {
        input_tokens: u32,
        output_tokens: u32,
    },
}

impl ChunkPayload {
    pub fn text(content: impl Into<String>) -> Self {
        Self::TextDelta {
            content: content.into(),
            role: None,
            finish: None,
        }
    }

    /// Empty assistant delta that opens a text block.
    pub fn text_open() -> Self {
        Self::TextDelta {
            content: String::new(),
            role: Some(Role::Assistant),
            finish: None,
        }
    }

    pub fn text_stop(finish: FinishReason) -> Self {
        Self::TextDelta {
            content: String::new(),
            role: None,
            finish: Some(finish),
        }
    }

    pub fn error(message: impl Into<String>, status_code: u16) -> Self {
        Self::Error {
            message: message.into(),
            status_code,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CanonicalChunk {
    /// Position within one provider response. Per stream, not global.
    pub index: u64,
    pub stamp: ResponseStamp,
    pub payload: ChunkPayload,
}

impl CanonicalChunk {
    pub fn new(index: u64, stamp: ResponseStamp, payload: ChunkPayload) -> Self {
        Self {
            index,
            stamp,
            payload,
        }
    }

    pub fn is_error(&self) -> bool {
        matches!(self.payload, ChunkPayload::Error { .. })
    }
}

/// Assigns per-stream indexes and the response stamp to payloads.
#[derive(Debug, Clone, Default)]
pub struct ChunkSequencer {
    next_index: u64,
    stamp: ResponseStamp,
}

impl ChunkSequencer {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn set_stamp(&mut self, stamp: ResponseStamp) {
        self.stamp = stamp;
    }

    pub fn stamp(&self) -> &ResponseStamp {
        &self.stamp
    }

    pub fn next(&mut self, payload: ChunkPayload) -> CanonicalChunk {
        let chunk = CanonicalChunk::new(self.next_index, self.stamp.clone(), payload);
        self.next_index += 1;
        chunk
    }
}

/// Provider stream contract.
///
/// Invariants for consumers:
/// - Chunks arrive in transport order with strictly increasing `index`.
/// - An `Error` payload is the last item of the stream.
/// - `Err` items are mid-stream transport failures and also end the stream.
pub trait CanonicalChunkStream:
    Stream<Item = Result<CanonicalChunk, ProviderError>> + Send
{
}

impl<T> CanonicalChunkStream for T where
    T: Stream<Item = Result<CanonicalChunk, ProviderError>> + Send
{
}

pub type ChunkStream<'a> = Pin<Box<dyn CanonicalChunkStream + 'a>>;

#[derive(Debug)]
pub struct VecChunkStream {
    chunks: VecDeque<Result<CanonicalChunk, ProviderError>>,
}

impl VecChunkStream {
    pub fn new(chunks: Vec<Result<CanonicalChunk, ProviderError>>) -> Self {
        Self {
            chunks: chunks.into(),
        }
    }

    /// Stamps bare payloads with sequential indexes.
    pub fn from_payloads(payloads: Vec<ChunkPayload>) -> Self {
        let mut sequencer = ChunkSequencer::new();
        Self::new(
            payloads
                .into_iter()
                .map(|payload| Ok(sequencer.next(payload)))
                .collect(),
        )
    }
}

impl Stream for VecChunkStream {
    type Item = Result<CanonicalChunk, ProviderError>;

    fn poll_next(
        mut self: Pin<&mut Self>,
        _cx: &mut Context<'_>,
    ) -> Poll<Option<Result<CanonicalChunk, ProviderError>>> {
        Poll::Ready(self.chunks.pop_front())
    }
}
