mod converter;
mod provider;
mod serde_api;

pub use converter::OpenAiStreamConverter;
pub use provider::{OPENAI_BASE_URL, OpenAiProvider};
pub use serde_api::{
    OpenAiDeltaFunction, OpenAiDeltaToolCall, OpenAiStreamChoice, OpenAiStreamDelta,
    OpenAiStreamError, OpenAiStreamPayload, OpenAiUsage,
};
