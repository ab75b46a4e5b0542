//! Provider adapters that turn vendor streaming APIs into canonical chunks.
//!
//! ```rust
//! use sprovider::{ChunkPayload, FinishReason, Message, ModelRequest, Role};
//!
//! let request = ModelRequest::builder("claude-sonnet-4-5")
//!     .system("be brief")
//!     .message(Message::new(Role::User, "hello"))
//!     .build()
//!     .expect("request should validate");
//!
//! assert_eq!(request.messages.len(), 2);
//! assert_eq!(
//!     ChunkPayload::text_stop(FinishReason::Stop),
//!     ChunkPayload::TextDelta { content: String::new(), role: None, finish: Some(FinishReason::Stop) }
//! );
//! ```

pub mod adapters;
pub mod chunk;
pub mod credentials;
pub mod error;
pub mod hooks;
pub mod model;
pub mod prelude;
pub mod provider;
pub mod registry;
pub mod sse;
pub mod transport;

pub use chunk::{
    CanonicalChunk, CanonicalChunkStream, ChunkPayload, ChunkSequencer, ChunkStream,
    FinishReason, ResponseStamp, VecChunkStream,
};
pub use credentials::{SecretString, SecureCredentialManager};
pub use error::{ProviderError, ProviderErrorKind};
pub use hooks::{NoopProviderHooks, ProviderHooks};
pub use model::{
    Message, ModelRequest, ModelRequestBuilder, ProviderId, Role, TokenUsage, ToolCall,
    ToolDefinition,
};
pub use provider::{ProviderAdapter, ProviderFuture};
pub use registry::{ModelRoute, ProviderRegistry};
pub use sse::{SseData, SseLineDecoder};
pub use transport::{
    HttpStreamTransport, SsePayloadStream, StreamAuth, StreamRequest, StreamTransport,
};
