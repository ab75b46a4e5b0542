use std::sync::Arc;

use schat::ChatService;
use stooling::ApprovalQueue;

/// A model advertised by `GET /models`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ModelInfo {
    pub id: String,
    pub owned_by: String,
}

impl ModelInfo {
    pub fn new(id: impl Into<String>, owned_by: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            owned_by: owned_by.into(),
        }
    }
}

#[derive(Clone)]
pub struct AppState {
    pub chat: ChatService,
    /// Present when tool approvals are resolved over HTTP.
    pub approvals: Option<Arc<ApprovalQueue>>,
    pub models: Arc<Vec<ModelInfo>>,
}

impl AppState {
    pub fn new(chat: ChatService) -> Self {
        Self {
            chat,
            approvals: None,
            models: Arc::new(Vec::new()),
        }
    }

    pub fn with_approvals(mut self, approvals: Arc<ApprovalQueue>) -> Self {
        self.approvals = Some(approvals);
        self
    }

    pub fn with_models(mut self, models: Vec<ModelInfo>) -> Self {
        self.models = Arc::new(models);
        self
    }
}
