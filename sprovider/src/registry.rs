//! Provider registry for runtime provider lookup and swapping.
//!
//! ```rust
//! use sprovider::ProviderRegistry;
//!
//! let registry = ProviderRegistry::new();
//! assert!(registry.is_empty());
//! assert!(registry.resolve("claude-sonnet-4-5").is_none());
//! ```

use std::sync::Arc;

use scommon::Registry;

use crate::{ProviderAdapter, ProviderId};

#[derive(Default)]
pub struct ProviderRegistry {
    providers: Registry<ProviderId, Arc<dyn ProviderAdapter>>,
    routes: Vec<ModelRoute>,
    default_provider: Option<ProviderId>,
}

/// Maps model names with a given prefix to a provider.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ModelRoute {
    pub prefix: String,
    pub provider: ProviderId,
}

impl ProviderRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn register<P>(&mut self, provider: P)
    where
        P: ProviderAdapter + 'static,
    {
        self.register_arc(Arc::new(provider));
    }

    pub fn register_arc(&mut self, provider: Arc<dyn ProviderAdapter>) {
        let id = provider.id();
        if self.default_provider.is_none() {
            self.default_provider = Some(id);
        }
        self.providers.insert(id, provider);
    }

    pub fn route_prefix(&mut self, prefix: impl Into<String>, provider: ProviderId) {
        self.routes.push(ModelRoute {
            prefix: prefix.into(),
            provider,
        });
    }

    pub fn set_default(&mut self, provider: ProviderId) {
        self.default_provider = Some(provider);
    }

    pub fn get(&self, provider_id: ProviderId) -> Option<Arc<dyn ProviderAdapter>> {
        self.providers.get(&provider_id).cloned()
    }

    /// Longest matching prefix wins; otherwise the default provider.
    pub fn resolve(&self, model: &str) -> Option<Arc<dyn ProviderAdapter>> {
        let routed = self
            .routes
            .iter()
            .filter(|route| model.starts_with(route.prefix.as_str()))
            .max_by_key(|route| route.prefix.len())
            .map(|route| route.provider);

        routed
            .or(self.default_provider)
            .and_then(|provider| self.get(provider))
    }

    pub fn remove(&mut self, provider_id: ProviderId) -> Option<Arc<dyn ProviderAdapter>> {
        if self.default_provider == Some(provider_id) {
            self.default_provider = None;
        }
        self.providers.remove(&provider_id)
    }

    pub fn contains(&self, provider_id: ProviderId) -> bool {
        self.providers.contains_key(&provider_id)
    }

    pub fn len(&self) -> usize {
        self.providers.len()
    }

    pub fn is_empty(&self) -> bool {
        self.providers.is_empty()
    }
}
