mod converter;
mod provider;
mod serde_api;

pub use converter::AnthropicStreamConverter;
pub use provider::{ANTHROPIC_BASE_URL, ANTHROPIC_VERSION, AnthropicProvider, DEFAULT_MAX_TOKENS};
pub use serde_api::{
    AnthropicBlockDelta, AnthropicBlockStart, AnthropicMessageStart, AnthropicStreamError,
    AnthropicStreamEvent, AnthropicUsage,
};
