//! Provider construction from configuration.

use std::sync::Arc;
use std::time::Duration;

use reqwest::Client;
use sprovider::{
    HttpStreamTransport, ProviderAdapter, ProviderHooks, ProviderRegistry,
    SecureCredentialManager, StreamTransport,
};
use sserver::ModelInfo;

use crate::config::{ConfigError, ProviderConfig, ProviderKind, SluiceConfig};

pub const CONNECT_TIMEOUT: Duration = Duration::from_secs(15);

/// Builds a registry with one adapter per configured provider.
///
/// `lookup_env` resolves the variable named by each provider's `api_key_env`.
pub fn build_provider_registry<F>(
    config: &SluiceConfig,
    hooks: Arc<dyn ProviderHooks>,
    lookup_env: F,
) -> Result<ProviderRegistry, ConfigError>
where
    F: Fn(&str) -> Option<String>,
{
    let http = Client::builder()
        .connect_timeout(CONNECT_TIMEOUT)
        .build()
        .map_err(|err| ConfigError::invalid(format!("failed to build http client: {err}")))?;
    let credentials = Arc::new(SecureCredentialManager::new());

    let mut registry = ProviderRegistry::new();
    for provider in &config.providers {
        let variable = provider.api_key_env();
        let api_key = lookup_env(variable)
            .map(|key| key.trim().to_string())
            .filter(|key| !key.is_empty())
            .ok_or_else(|| {
                ConfigError::missing_credential(format!(
                    "provider '{}' needs an API key in ${variable}",
                    provider.kind.provider_id()
                ))
            })?;
        credentials
            .set_api_key(provider.kind.provider_id(), api_key)
            .map_err(|err| ConfigError::missing_credential(err.message))?;

        let adapter = build_adapter(
            provider,
            Arc::clone(&credentials),
            http.clone(),
            Arc::clone(&hooks),
        )?;
        registry.register_arc(adapter);
        for prefix in SluiceConfig::routes_for(provider) {
            registry.route_prefix(prefix, provider.kind.provider_id());
        }

        tracing::info!(
            phase = "startup",
            event = "provider_registered",
            provider = %provider.kind.provider_id(),
            models = provider.models.len()
        );
    }

    if let Some(default) = config.default_provider() {
        registry.set_default(default.kind.provider_id());
    }
    Ok(registry)
}

fn transport(provider: &ProviderConfig, http: Client, fallback: &str) -> Arc<dyn StreamTransport> {
    let base_url = provider.base_url.as_deref().unwrap_or(fallback);
    Arc::new(HttpStreamTransport::new(http, base_url))
}

#[cfg(feature = "provider-anthropic")]
fn build_anthropic(
    provider: &ProviderConfig,
    credentials: Arc<SecureCredentialManager>,
    http: Client,
    hooks: Arc<dyn ProviderHooks>,
) -> Result<Arc<dyn ProviderAdapter>, ConfigError> {
    use sprovider::adapters::anthropic::{ANTHROPIC_BASE_URL, AnthropicProvider};

    let mut adapter =
        AnthropicProvider::new(credentials, transport(provider, http, ANTHROPIC_BASE_URL))
            .with_hooks(hooks)
            .with_tool_call_deltas(provider.tool_call_deltas);
    if let Some(max_tokens) = provider.max_tokens {
        adapter = adapter.with_max_tokens(max_tokens);
    }
    Ok(Arc::new(adapter))
}

#[cfg(not(feature = "provider-anthropic"))]
fn build_anthropic(
    _provider: &ProviderConfig,
    _credentials: Arc<SecureCredentialManager>,
    _http: Client,
    _hooks: Arc<dyn ProviderHooks>,
) -> Result<Arc<dyn ProviderAdapter>, ConfigError> {
    Err(ConfigError::invalid(
        "provider-anthropic feature is not enabled on sluice",
    ))
}

#[cfg(feature = "provider-openai")]
fn build_openai(
    provider: &ProviderConfig,
    credentials: Arc<SecureCredentialManager>,
    http: Client,
    hooks: Arc<dyn ProviderHooks>,
) -> Result<Arc<dyn ProviderAdapter>, ConfigError> {
    use sprovider::adapters::openai::{OPENAI_BASE_URL, OpenAiProvider};

    let adapter = OpenAiProvider::new(credentials, transport(provider, http, OPENAI_BASE_URL))
        .with_hooks(hooks)
        .with_tool_call_deltas(provider.tool_call_deltas);
    Ok(Arc::new(adapter))
}

#[cfg(not(feature = "provider-openai"))]
fn build_openai(
    _provider: &ProviderConfig,
    _credentials: Arc<SecureCredentialManager>,
    _http: Client,
    _hooks: Arc<dyn ProviderHooks>,
) -> Result<Arc<dyn ProviderAdapter>, ConfigError> {
    Err(ConfigError::invalid(
        "provider-openai feature is not enabled on sluice",
    ))
}

#[cfg(feature = "provider-gemini")]
fn build_gemini(
    provider: &ProviderConfig,
    credentials: Arc<SecureCredentialManager>,
    http: Client,
    hooks: Arc<dyn ProviderHooks>,
) -> Result<Arc<dyn ProviderAdapter>, ConfigError> {
    use sprovider::adapters::gemini::{GEMINI_BASE_URL, GeminiProvider};

    let adapter = GeminiProvider::new(credentials, transport(provider, http, GEMINI_BASE_URL))
        .with_hooks(hooks)
        .with_tool_call_deltas(provider.tool_call_deltas);
    Ok(Arc::new(adapter))
}

#[cfg(not(feature = "provider-gemini"))]
fn build_gemini(
    _provider: &ProviderConfig,
    _credentials: Arc<SecureCredentialManager>,
    _http: Client,
    _hooks: Arc<dyn ProviderHooks>,
) -> Result<Arc<dyn ProviderAdapter>, ConfigError> {
    Err(ConfigError::invalid(
        "provider-gemini feature is not enabled on sluice",
    ))
}

fn build_adapter(
    provider: &ProviderConfig,
    credentials: Arc<SecureCredentialManager>,
    http: Client,
    hooks: Arc<dyn ProviderHooks>,
) -> Result<Arc<dyn ProviderAdapter>, ConfigError> {
    match provider.kind {
        ProviderKind::Anthropic => build_anthropic(provider, credentials, http, hooks),
        ProviderKind::Openai => build_openai(provider, credentials, http, hooks),
        ProviderKind::Gemini => build_gemini(provider, credentials, http, hooks),
    }
}

/// Models advertised by `GET /models`, in configuration order.
pub fn advertised_models(config: &SluiceConfig) -> Vec<ModelInfo> {
    config
        .providers
        .iter()
        .flat_map(|provider| {
            let owner = provider.kind.provider_id().to_string();
            provider
                .models
                .iter()
                .map(move |model| ModelInfo::new(model.clone(), owner.clone()))
        })
        .collect()
}
