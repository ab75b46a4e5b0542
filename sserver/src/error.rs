//! HTTP-facing errors and their JSON rendering.

use std::error::Error;
use std::fmt::{Display, Formatter};

use axum::Json;
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use schat::{ChatError, ChatErrorKind};
use serde_json::json;
use stooling::{ToolError, ToolErrorKind};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ServerErrorKind {
    BadRequest,
    NotFound,
    Conflict,
    Upstream,
    Unavailable,
    Internal,
}

impl ServerErrorKind {
    pub fn error_type(self) -> &'static str {
        match self {
            Self::BadRequest => "invalid_request_error",
            Self::NotFound => "not_found_error",
            Self::Conflict => "conflict_error",
            Self::Upstream => "upstream_error",
            Self::Unavailable => "unavailable_error",
            Self::Internal => "server_error",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ServerError {
    pub kind: ServerErrorKind,
    pub message: String,
    pub code: Option<String>,
    pub status: StatusCode,
}

impl ServerError {
    pub fn new(kind: ServerErrorKind, message: impl Into<String>) -> Self {
        let status = match kind {
            ServerErrorKind::BadRequest => StatusCode::BAD_REQUEST,
            ServerErrorKind::NotFound => StatusCode::NOT_FOUND,
            ServerErrorKind::Conflict => StatusCode::CONFLICT,
            ServerErrorKind::Upstream => StatusCode::BAD_GATEWAY,
            ServerErrorKind::Unavailable => StatusCode::SERVICE_UNAVAILABLE,
            ServerErrorKind::Internal => StatusCode::INTERNAL_SERVER_ERROR,
        };
        Self {
            kind,
            message: message.into(),
            code: None,
            status,
        }
    }

    pub fn bad_request(message: impl Into<String>) -> Self {
        Self::new(ServerErrorKind::BadRequest, message)
    }

    pub fn not_found(message: impl Into<String>) -> Self {
        Self::new(ServerErrorKind::NotFound, message)
    }

    pub fn conflict(message: impl Into<String>) -> Self {
        Self::new(ServerErrorKind::Conflict, message)
    }

    pub fn upstream(message: impl Into<String>) -> Self {
        Self::new(ServerErrorKind::Upstream, message)
    }

    pub fn unavailable(message: impl Into<String>) -> Self {
        Self::new(ServerErrorKind::Unavailable, message)
    }

    pub fn internal(message: impl Into<String>) -> Self {
        Self::new(ServerErrorKind::Internal, message)
    }

    pub fn with_code(mut self, code: impl Into<String>) -> Self {
        self.code = Some(code.into());
        self
    }

    pub fn with_status(mut self, status: StatusCode) -> Self {
        self.status = status;
        self
    }
}

impl Display for ServerError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        write!(f, "{:?}: {}", self.kind, self.message)
    }
}

impl Error for ServerError {}

/// Upstream statuses a client can act on are passed through; the rest become 502.
fn upstream_status(status_code: Option<u16>) -> StatusCode {
    match status_code {
        Some(code @ (400 | 401 | 403 | 404 | 408 | 413 | 422 | 429)) => {
            StatusCode::from_u16(code).unwrap_or(StatusCode::BAD_GATEWAY)
        }
        _ => StatusCode::BAD_GATEWAY,
    }
}

impl From<ChatError> for ServerError {
    fn from(value: ChatError) -> Self {
        match value.kind {
            ChatErrorKind::InvalidRequest => {
                ServerError::bad_request(value.message).with_code("invalid_request")
            }
            ChatErrorKind::NotFound => ServerError::not_found(value.message).with_code("not_found"),
            ChatErrorKind::Busy => ServerError::conflict(value.message).with_code("thread_busy"),
            ChatErrorKind::Provider => {
                let status = upstream_status(value.status_code);
                let code = value
                    .status_code
                    .map(|code| format!("upstream_{code}"))
                    .unwrap_or_else(|| "upstream".to_string());
                ServerError::upstream(value.message)
                    .with_status(status)
                    .with_code(code)
            }
            ChatErrorKind::Cancelled => {
                ServerError::unavailable(value.message).with_code("cancelled")
            }
            ChatErrorKind::Store | ChatErrorKind::Tooling => {
                ServerError::internal(value.message).with_code("internal")
            }
        }
    }
}

impl From<ToolError> for ServerError {
    fn from(value: ToolError) -> Self {
        match value.kind {
            ToolErrorKind::NotFound => ServerError::not_found(value.message).with_code("not_found"),
            _ => ServerError::internal(value.message).with_code("internal"),
        }
    }
}

impl IntoResponse for ServerError {
    fn into_response(self) -> Response {
        if self.status.is_server_error() {
            tracing::error!(
                phase = "http",
                event = "error",
                status = self.status.as_u16(),
                error_type = self.kind.error_type(),
                message = %self.message
            );
        } else {
            tracing::debug!(
                phase = "http",
                event = "client_error",
                status = self.status.as_u16(),
                message = %self.message
            );
        }

        let body = json!({
            "error": {
                "message": self.message,
                "type": self.kind.error_type(),
                "code": self.code,
            }
        });
        (self.status, Json(body)).into_response()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn chat_errors_map_to_http_statuses() {
        let busy = ServerError::from(ChatError::busy("thread busy"));
        assert_eq!(busy.status, StatusCode::CONFLICT);

        let limited = ServerError::from(ChatError::provider("slow down").with_status(429));
        assert_eq!(limited.status, StatusCode::TOO_MANY_REQUESTS);
        assert_eq!(limited.code.as_deref(), Some("upstream_429"));

        let outage = ServerError::from(ChatError::provider("overloaded").with_status(529));
        assert_eq!(outage.status, StatusCode::BAD_GATEWAY);

        let missing = ServerError::from(ChatError::invalid_request("No new message found"));
        assert_eq!(missing.status, StatusCode::BAD_REQUEST);
        assert_eq!(missing.kind.error_type(), "invalid_request_error");
    }
}
