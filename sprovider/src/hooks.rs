//! Observation points for provider stream lifecycles.
//!
//! ```rust
//! use sprovider::{NoopProviderHooks, ProviderHooks};
//!
//! fn assert_hooks_trait(_hooks: &dyn ProviderHooks) {}
//!
//! assert_hooks_trait(&NoopProviderHooks);
//! ```

use std::time::Duration;

use crate::{ProviderError, ProviderId};

pub trait ProviderHooks: Send + Sync {
    fn on_stream_open(&self, _provider: ProviderId, _model: &str) {}

    fn on_stream_rejected(&self, _provider: ProviderId, _model: &str, _error: &ProviderError) {}

    fn on_tool_call_dropped(&self, _provider: ProviderId, _tool_use_id: &str, _reason: &str) {}

    fn on_vendor_error(&self, _provider: ProviderId, _message: &str, _status_code: u16) {}

    fn on_stream_end(&self, _provider: ProviderId, _chunks: u64, _elapsed: Duration) {}
}

#[derive(Debug, Default, Clone, Copy)]
pub struct NoopProviderHooks;

impl ProviderHooks for NoopProviderHooks {}
