//! Chat threads over streaming providers: session resolution, the tool-use
//! turn loop, and cumulative event snapshots.
//!
//! ```rust
//! use schat::{ChatEvent, EventMerger};
//!
//! let first = ChatEvent::assistant_text("hello");
//! let second = ChatEvent::assistant_text("world");
//!
//! let mut merger = EventMerger::new();
//! merger.merge(&[first.clone()]);
//! let fresh = merger.merge(&[first, second.clone()]);
//!
//! assert_eq!(fresh, vec![second]);
//! ```

mod error;
mod history;
mod hooks;
mod merge;
mod multiplexer;
mod service;
mod store;
mod thread;
mod turn;
mod types;

pub mod prelude {
    pub use crate::{
        ChatError, ChatErrorKind, ChatEvent, ChatEventKind, ChatEventStore, ChatPolicy,
        ChatRequest, ChatService, ChatServiceBuilder, EventMerger, InMemoryChatEventStore,
        InboundMessage, JsonlChatEventStore, MessageContent, TurnHandle, TurnSnapshot,
    };
    pub use scommon::{GenerationOptions, ThreadId};
}

pub use error::{ChatError, ChatErrorKind};
pub use history::conversation_from_events;
pub use hooks::{NoopTurnHooks, TurnHooks, TurnOutcome};
pub use merge::EventMerger;
pub use multiplexer::{TurnMultiplexer, TurnSnapshot};
pub use service::{
    ChatPolicy, ChatService, ChatServiceBuilder, DEFAULT_MAX_TOOL_ROUNDS, EventStream,
    SnapshotStream, TurnHandle,
};
pub use store::{ChatEventStore, ChatFuture, InMemoryChatEventStore, JsonlChatEventStore};
pub use thread::{
    THREAD_ID_MARKER, USER_PREAMBLE_MARKER, extract_thread_id, new_user_messages, strip_preamble,
    thread_id_banner,
};
pub use types::{
    ChatEvent, ChatEventKind, ChatRequest, InboundMessage, MessageContent, ThreadSession,
};
