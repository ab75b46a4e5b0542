use axum::Json;
use axum::extract::rejection::JsonRejection;
use axum::extract::{Path, State};
use axum::response::{IntoResponse, Response};
use stooling::ApprovalRequest;

use crate::sse::{collect_completion, sse_response};
use crate::state::AppState;
use crate::wire::{
    ApprovalDecisionBody, ChatCompletionRequest, ModelEntry, ModelList, ResponseIdentity,
};
use crate::ServerError;

const DEFAULT_REJECTION_REASON: &str = "rejected by operator";

fn decode<T>(body: Result<Json<T>, JsonRejection>) -> Result<T, ServerError> {
    body.map(|Json(value)| value).map_err(|rejection| {
        ServerError::bad_request(rejection.body_text()).with_code("invalid_json")
    })
}

pub async fn chat_completions(
    State(state): State<AppState>,
    body: Result<Json<ChatCompletionRequest>, JsonRejection>,
) -> Result<Response, ServerError> {
    let request = decode(body)?;
    let streaming = request.stream;
    let identity = ResponseIdentity::new(request.model.clone());
    let turn = state.chat.start_turn(request.into_chat_request()?).await?;

    tracing::info!(
        phase = "http",
        event = "chat_completion",
        thread_id = %turn.thread_id(),
        model = %identity.model,
        stream = streaming,
        joined = turn.joined()
    );

    if streaming {
        Ok(sse_response(identity, turn).into_response())
    } else {
        Ok(Json(collect_completion(identity, turn).await).into_response())
    }
}

pub async fn list_models(State(state): State<AppState>) -> Json<ModelList> {
    let data = state
        .models
        .iter()
        .map(|model| ModelEntry {
            id: model.id.clone(),
            object: "model".to_string(),
            created: 0,
            owned_by: model.owned_by.clone(),
        })
        .collect();

    Json(ModelList {
        object: "list".to_string(),
        data,
    })
}

pub async fn list_approvals(
    State(state): State<AppState>,
) -> Result<Json<Vec<ApprovalRequest>>, ServerError> {
    let Some(approvals) = state.approvals.as_ref() else {
        return Ok(Json(Vec::new()));
    };
    Ok(Json(approvals.pending()?))
}

pub async fn resolve_approval(
    State(state): State<AppState>,
    Path(tool_use_id): Path<String>,
    body: Result<Json<ApprovalDecisionBody>, JsonRejection>,
) -> Result<Json<serde_json::Value>, ServerError> {
    let decision = decode(body)?;
    let approvals = state.approvals.as_ref().ok_or_else(|| {
        ServerError::not_found("approvals are not resolved over HTTP on this server")
    })?;

    if decision.approved {
        approvals.approve(&tool_use_id)?;
    } else {
        let reason = decision
            .reason
            .unwrap_or_else(|| DEFAULT_REJECTION_REASON.to_string());
        approvals.reject(&tool_use_id, reason)?;
    }

    tracing::info!(
        phase = "http",
        event = "approval_resolved",
        tool_use_id = %tool_use_id,
        approved = decision.approved
    );
    Ok(Json(serde_json::json!({
        "tool_use_id": tool_use_id,
        "approved": decision.approved,
    })))
}
