use axum::Router;
use axum::routing::{get, post};

use crate::handlers::{chat_completions, list_approvals, list_models, resolve_approval};
use crate::state::AppState;

pub fn build_router(state: AppState) -> Router {
    Router::new()
        .route("/chat/completions", post(chat_completions))
        .route("/v1/chat/completions", post(chat_completions))
        .route("/models", get(list_models))
        .route("/v1/models", get(list_models))
        .route("/approvals", get(list_approvals))
        .route("/approvals/{tool_use_id}", post(resolve_approval))
        .with_state(state)
}
