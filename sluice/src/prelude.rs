//! Common imports for embedding the gateway.

pub use crate::{
    AppState, ApprovalQueue, ChatEvent, ChatRequest, ChatService, InboundMessage, ProviderAdapter,
    ProviderRegistry, Role, SluiceConfig, ThreadId, Tool, ToolDefinition, ToolRegistry,
    build_app_state, build_router, init_tracing, serve,
};
