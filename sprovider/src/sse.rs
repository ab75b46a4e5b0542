//! Incremental `text/event-stream` decoding.
//!
//! ```rust
//! use sprovider::{SseData, SseLineDecoder};
//!
//! let mut decoder = SseLineDecoder::new();
//! let mut items = decoder.push(b"event: ping\ndata: {\"a\"").expect("valid utf-8");
//! items.extend(decoder.push(b":1}\n\ndata: [DONE]\n\n").expect("valid utf-8"));
//!
//! assert_eq!(
//!     items,
//!     vec![SseData::Payload("{\"a\":1}".to_string()), SseData::Done]
//! );
//! ```

use crate::ProviderError;

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SseData {
    Payload(String),
    /// The `[DONE]` sentinel used by OpenAI-style streams.
    Done,
}

/// Splits raw bytes into event payloads.
///
/// Bytes are buffered until a newline so multi-byte characters split across
/// network reads decode correctly. The `data:` lines of one event are joined
/// with `\n` and dispatched at the blank line that ends the event. `event:`,
/// `id:`, and comment lines are skipped; vendor payloads carry their own type
/// tags.
#[derive(Debug, Default)]
pub struct SseLineDecoder {
    buffer: Vec<u8>,
    data: Vec<String>,
}

impl SseLineDecoder {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push(&mut self, bytes: &[u8]) -> Result<Vec<SseData>, ProviderError> {
        self.buffer.extend_from_slice(bytes);
        let mut items = Vec::new();

        while let Some(newline_index) = self.buffer.iter().position(|byte| *byte == b'\n') {
            let line = self.buffer.drain(..=newline_index).collect::<Vec<_>>();
            if let Some(item) = self.decode_line(&line)? {
                items.push(item);
            }
        }

        Ok(items)
    }

    /// Flushes a final line that arrived without a trailing newline, then any
    /// event still waiting for its blank line.
    pub fn finish(&mut self) -> Result<Option<SseData>, ProviderError> {
        let line = std::mem::take(&mut self.buffer);
        if let Some(item) = self.decode_line(&line)? {
            return Ok(Some(item));
        }
        Ok(self.dispatch())
    }

    fn decode_line(&mut self, line: &[u8]) -> Result<Option<SseData>, ProviderError> {
        let line = std::str::from_utf8(line)
            .map_err(|err| ProviderError::transport(format!("invalid utf-8 in stream: {err}")))?
            .trim_end_matches(['\r', '\n']);

        if line.is_empty() {
            return Ok(self.dispatch());
        }

        if let Some(value) = line.strip_prefix("data:") {
            let value = value.strip_prefix(' ').unwrap_or(value);
            self.data.push(value.to_string());
        }
        Ok(None)
    }

    fn dispatch(&mut self) -> Option<SseData> {
        if self.data.is_empty() {
            return None;
        }
        let payload = std::mem::take(&mut self.data).join("\n");
        let payload = payload.trim();

        if payload.is_empty() {
            None
        } else if payload == "[DONE]" {
            Some(SseData::Done)
        } else {
            Some(SseData::Payload(payload.to_string()))
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn multibyte_characters_split_across_reads_decode() {
        let text = "data: {\"t\":\"héllo\"}\n\n".as_bytes();
        let split = text.iter().position(|byte| *byte == 0xc3).expect("é lead byte") + 1;

        let mut decoder = SseLineDecoder::new();
        assert!(decoder.push(&text[..split]).expect("partial").is_empty());
        let items = decoder.push(&text[split..]).expect("rest");

        assert_eq!(items, vec![SseData::Payload("{\"t\":\"héllo\"}".to_string())]);
    }

    #[test]
    fn comments_and_blank_lines_are_skipped() {
        let mut decoder = SseLineDecoder::new();
        let items = decoder
            .push(b": keep-alive\n\nid: 4\r\ndata:\n")
            .expect("valid input");
        assert!(items.is_empty());
    }

    #[test]
    fn multi_line_data_is_joined_into_one_payload() {
        let mut decoder = SseLineDecoder::new();
        let items = decoder
            .push(b"event: message\ndata: {\"text\":\ndata:  \"two lines\"}\n\ndata: next\r\n\r\n")
            .expect("valid input");

        assert_eq!(
            items,
            vec![
                SseData::Payload("{\"text\":\n \"two lines\"}".to_string()),
                SseData::Payload("next".to_string()),
            ]
        );
    }

    #[test]
    fn event_waits_for_its_blank_line() {
        let mut decoder = SseLineDecoder::new();
        assert!(decoder.push(b"data: {\"a\":1}\n").expect("buffered").is_empty());
        assert_eq!(
            decoder.push(b"\n").expect("dispatched"),
            vec![SseData::Payload("{\"a\":1}".to_string())]
        );
    }

    #[test]
    fn finish_flushes_an_event_without_its_blank_line() {
        let mut decoder = SseLineDecoder::new();
        assert!(decoder.push(b"data: {\"b\":2}\n").expect("buffered").is_empty());
        assert_eq!(
            decoder.finish().expect("flush"),
            Some(SseData::Payload("{\"b\":2}".to_string()))
        );
    }

    #[test]
    fn finish_flushes_unterminated_line() {
        let mut decoder = SseLineDecoder::new();
        assert!(decoder.push(b"data: [DONE]").expect("buffered").is_empty());
        assert_eq!(decoder.finish().expect("flush"), Some(SseData::Done));
        assert_eq!(decoder.finish().expect("empty flush"), None);
    }
}
