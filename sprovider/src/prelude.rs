//! Common `sprovider` imports for downstream crates.

pub use crate::{
    CanonicalChunk, CanonicalChunkStream, ChunkPayload, ChunkStream, FinishReason, Message,
    ModelRequest, ModelRequestBuilder, ProviderAdapter, ProviderError, ProviderErrorKind,
    ProviderHooks, ProviderId, ProviderRegistry, ResponseStamp, Role, SecureCredentialManager,
    ToolCall, ToolDefinition,
};
pub use scommon::{BoxFuture, MetadataMap};
