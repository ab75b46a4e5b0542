//! OpenAI-compatible HTTP surface for sluice.
//!
//! `build_router` wires `POST /chat/completions`, `GET /models`, and the
//! approval endpoints over a shared [`AppState`]. Streaming completions are
//! served as server-sent events, one chunk per materialized chat event.
//!
//! ```rust
//! use sserver::{ServerError, ServerErrorKind};
//!
//! let error = ServerError::conflict("thread is busy");
//! assert_eq!(error.kind, ServerErrorKind::Conflict);
//! assert_eq!(error.status.as_u16(), 409);
//! ```

mod error;
mod handlers;
mod routes;
mod sse;
mod state;
mod wire;

use std::io::ErrorKind;

use tokio::net::TcpListener;

pub mod prelude {
    pub use crate::{
        AppState, ModelInfo, ServerError, ServerErrorKind, bind_with_fallback, build_router,
        serve,
    };
}

pub use error::{ServerError, ServerErrorKind};
pub use routes::build_router;
pub use sse::{DONE_SENTINEL, KEEP_ALIVE_INTERVAL, collect_completion, sse_response, turn_chunks};
pub use state::{AppState, ModelInfo};
pub use wire::{
    ApprovalDecisionBody, ChatCompletion, ChatCompletionChunk, ChatCompletionRequest,
    ChunkChoice, ChunkDelta, CompletionChoice, CompletionMessage, ContentPart, ModelEntry,
    ModelList, ResponseIdentity, WireContent, WireMessage,
};

/// Binds the first free port in `start_port..start_port + attempts`.
pub async fn bind_with_fallback(
    host: &str,
    start_port: u16,
    attempts: u16,
) -> Result<(TcpListener, u16), ServerError> {
    let attempts = attempts.max(1);
    for offset in 0..attempts {
        let Some(port) = start_port.checked_add(offset) else {
            break;
        };
        match TcpListener::bind((host, port)).await {
            Ok(listener) => {
                let bound = listener
                    .local_addr()
                    .map(|addr| addr.port())
                    .unwrap_or(port);
                return Ok((listener, bound));
            }
            Err(error) if error.kind() == ErrorKind::AddrInUse => {
                tracing::warn!(phase = "server", event = "port_in_use", host, port);
            }
            Err(error) => {
                return Err(ServerError::internal(format!(
                    "failed to bind {host}:{port}: {error}"
                )));
            }
        }
    }

    Err(ServerError::internal(format!(
        "no free port on {host} in {start_port}..{}",
        start_port.saturating_add(attempts)
    )))
}

/// Serves `state` on an already bound listener until the server stops.
pub async fn serve(listener: TcpListener, state: AppState) -> Result<(), ServerError> {
    if let Ok(addr) = listener.local_addr() {
        tracing::info!(phase = "server", event = "listening", %addr);
    }
    axum::serve(listener, build_router(state))
        .await
        .map_err(|error| ServerError::internal(format!("server stopped: {error}")))
}
