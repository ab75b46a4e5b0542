//! Shared provider error kinds and error value helpers.
//!
//! ```rust
//! use sprovider::ProviderError;
//!
//! let auth = ProviderError::authentication("bad key").with_status(401);
//! assert!(!auth.retryable);
//! assert_eq!(auth.status_code, Some(401));
//!
//! let timeout = ProviderError::timeout("temporary timeout");
//! assert!(timeout.retryable);
//! ```

use std::error::Error;
use std::fmt::{Display, Formatter};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ProviderErrorKind {
    Authentication,
    RateLimited,
    InvalidRequest,
    NotFound,
    Timeout,
    Transport,
    Unavailable,
    Other,
}

/// Request-level failure raised before (or instead of) a chunk stream.
///
/// `retryable` is advisory for callers; adapters never retry on their own.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ProviderError {
    pub kind: ProviderErrorKind,
    pub message: String,
    pub retryable: bool,
    pub status_code: Option<u16>,
}

impl ProviderError {
    pub fn new(kind: ProviderErrorKind, message: impl Into<String>, retryable: bool) -> Self {
        Self {
            kind,
            message: message.into(),
            retryable,
            status_code: None,
        }
    }

    pub fn authentication(message: impl Into<String>) -> Self {
        Self::new(ProviderErrorKind::Authentication, message, false)
    }

    pub fn rate_limited(message: impl Into<String>) -> Self {
        Self::new(ProviderErrorKind::RateLimited, message, true)
    }

    pub fn invalid_request(message: impl Into<String>) -> Self {
        Self::new(ProviderErrorKind::InvalidRequest, message, false)
    }

    pub fn not_found(message: impl Into<String>) -> Self {
        Self::new(ProviderErrorKind::NotFound, message, false)
    }

    pub fn timeout(message: impl Into<String>) -> Self {
        Self::new(ProviderErrorKind::Timeout, message, true)
    }

    pub fn transport(message: impl Into<String>) -> Self {
        Self::new(ProviderErrorKind::Transport, message, true)
    }

    pub fn unavailable(message: impl Into<String>) -> Self {
        Self::new(ProviderErrorKind::Unavailable, message, true)
    }

    pub fn other(message: impl Into<String>) -> Self {
        Self::new(ProviderErrorKind::Other, message, false)
    }

    pub fn with_status(mut self, status_code: u16) -> Self {
        self.status_code = Some(status_code);
        self
    }

    /// HTTP status a downstream caller should see for this failure.
    pub fn effective_status(&self) -> u16 {
        if let Some(status) = self.status_code {
            return status;
        }

        match self.kind {
            ProviderErrorKind::Authentication => 401,
            ProviderErrorKind::RateLimited => 429,
            ProviderErrorKind::InvalidRequest => 400,
            ProviderErrorKind::NotFound => 404,
            ProviderErrorKind::Timeout => 504,
            ProviderErrorKind::Transport | ProviderErrorKind::Unavailable => 502,
            ProviderErrorKind::Other => 500,
        }
    }
}

impl Display for ProviderError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self.status_code {
            Some(status) => write!(f, "{:?} ({status}): {}", self.kind, self.message),
            None => write!(f, "{:?}: {}", self.kind, self.message),
        }
    }
}

impl Error for ProviderError {}
