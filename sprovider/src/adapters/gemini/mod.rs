mod converter;
mod provider;
mod serde_api;

pub use converter::GeminiStreamConverter;
pub use provider::{GEMINI_BASE_URL, GeminiProvider};
pub use serde_api::{
    GeminiCandidate, GeminiCandidateContent, GeminiFunctionCall, GeminiPart, GeminiStreamError,
    GeminiStreamPayload, GeminiUsage,
};
