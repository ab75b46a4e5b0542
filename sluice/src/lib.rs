//! Streaming LLM gateway facade.
//!
//! Re-exports the sluice workspace crates and wires them from a TOML
//! configuration into a ready-to-serve [`AppState`].
//!
//! ```rust
//! use sluice::{SluiceConfig, build_app_state_with_env};
//!
//! let config = SluiceConfig::default();
//! let state = build_app_state_with_env(&config, |_| Some("sk-test".to_string()))
//!     .expect("state should build");
//!
//! assert!(state.approvals.is_none());
//! ```

pub mod config;
pub mod prelude;
pub mod providers;
pub mod runtime;
pub mod telemetry;

pub use schat;
pub use scommon;
pub use sobserve;
pub use sprovider;
pub use sserver;
pub use stooling;

pub use config::{
    ApprovalMode, ConfigError, ConfigErrorKind, ProviderConfig, ProviderKind, ServerConfig,
    SluiceConfig, ToolsConfig,
};
pub use providers::{advertised_models, build_provider_registry};
pub use runtime::{build_app_state, build_app_state_with_env};
pub use telemetry::{DEFAULT_LOG_FILTER, init_tracing};

pub use schat::{
    ChatError, ChatErrorKind, ChatEvent, ChatEventKind, ChatEventStore, ChatPolicy, ChatRequest,
    ChatService, ChatServiceBuilder, EventMerger, InMemoryChatEventStore, InboundMessage,
    JsonlChatEventStore, MessageContent, TurnHandle, TurnSnapshot,
};
pub use scommon::{BoxFuture, GenerationOptions, MetadataMap, ThreadId};
pub use sobserve::ObservabilityHooks;
pub use sprovider::{
    CanonicalChunk, ChunkPayload, FinishReason, Message, ModelRequest, ProviderAdapter,
    ProviderError, ProviderErrorKind, ProviderId, ProviderRegistry, Role, ToolCall,
    ToolDefinition,
};
pub use sserver::{AppState, ModelInfo, ServerError, bind_with_fallback, build_router, serve};
pub use stooling::{
    ApprovalHandler, ApprovalQueue, AutoApprove, FunctionTool, Tool, ToolError, ToolErrorKind,
    ToolRegistry, ToolUseStatus,
};
