use std::future::Future;
use std::pin::Pin;

use crate::{ChunkStream, ModelRequest, ProviderError, ProviderId};

pub type ProviderFuture<'a, T> = Pin<Box<dyn Future<Output = T> + Send + 'a>>;

/// Vendor integration contract.
///
/// `stream` resolves only after the upstream accepted the request, so
/// connection failures and non-2xx statuses surface as `Err` before any chunk.
pub trait ProviderAdapter: Send + Sync {
    fn id(&self) -> ProviderId;

    fn stream<'a>(
        &'a self,
        request: ModelRequest,
    ) -> ProviderFuture<'a, Result<ChunkStream<'a>, ProviderError>>;
}
