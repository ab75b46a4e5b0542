//! Anthropic Messages API provider over the streaming transport.

use std::sync::Arc;
use std::time::Instant;

use async_stream::try_stream;
use futures_util::StreamExt;
use reqwest::Client;

use crate::{
    ChunkPayload, ChunkStream, HttpStreamTransport, ModelRequest, NoopProviderHooks,
    ProviderAdapter, ProviderError, ProviderFuture, ProviderHooks, ProviderId, SecretString,
    SecureCredentialManager, StreamAuth, StreamRequest, StreamTransport,
};

use super::converter::AnthropicStreamConverter;
use super::serde_api::{AnthropicStreamEvent, build_api_request};

pub const ANTHROPIC_BASE_URL: &str = "https://api.anthropic.com/v1";
pub const ANTHROPIC_VERSION: &str = "2023-06-01";
pub const DEFAULT_MAX_TOKENS: u32 = 4096;

#[derive(Clone)]
pub struct AnthropicProvider {
    credentials: Arc<SecureCredentialManager>,
    transport: Arc<dyn StreamTransport>,
    hooks: Arc<dyn ProviderHooks>,
    max_tokens: u32,
    emit_tool_call_deltas: bool,
}

impl AnthropicProvider {
    pub fn new(
        credentials: Arc<SecureCredentialManager>,
        transport: Arc<dyn StreamTransport>,
    ) -> Self {
        Self {
            credentials,
            transport,
            hooks: Arc::new(NoopProviderHooks),
            max_tokens: DEFAULT_MAX_TOKENS,
            emit_tool_call_deltas: false,
        }
    }

    pub fn with_hooks(mut self, hooks: Arc<dyn ProviderHooks>) -> Self {
        self.hooks = hooks;
        self
    }

    pub fn with_max_tokens(mut self, max_tokens: u32) -> Self {
        self.max_tokens = max_tokens;
        self
    }

    pub fn with_tool_call_deltas(mut self, enabled: bool) -> Self {
        self.emit_tool_call_deltas = enabled;
        self
    }

    pub fn default_http_transport(client: Client) -> HttpStreamTransport {
        HttpStreamTransport::new(client, ANTHROPIC_BASE_URL)
    }

    fn build_stream_request(&self, request: ModelRequest) -> Result<StreamRequest, ProviderError> {
        let api_key = self.credentials.require_api_key(ProviderId::Anthropic)?;
        let body = build_api_request(request, self.max_tokens)?;
        let body = serde_json::to_value(body)
            .map_err(|err| ProviderError::invalid_request(err.to_string()))?;

        Ok(StreamRequest {
            path: "messages".to_string(),
            auth: StreamAuth::Header {
                name: "x-api-key".to_string(),
                value: SecretString::new(api_key),
            },
            headers: vec![(
                "anthropic-version".to_string(),
                ANTHROPIC_VERSION.to_string(),
            )],
            body,
        })
    }
}

impl ProviderAdapter for AnthropicProvider {
    fn id(&self) -> ProviderId {
        ProviderId::Anthropic
    }

    fn stream<'a>(
        &'a self,
        request: ModelRequest,
    ) -> ProviderFuture<'a, Result<ChunkStream<'a>, ProviderError>> {
        Box::pin(async move {
            request.validate()?;
            let model = request.model.clone();
            let stream_request = self.build_stream_request(request)?;

            self.hooks.on_stream_open(ProviderId::Anthropic, &model);
            let mut payloads = match self.transport.open(stream_request).await {
                Ok(payloads) => payloads,
                Err(error) => {
                    self.hooks
                        .on_stream_rejected(ProviderId::Anthropic, &model, &error);
                    return Err(error);
                }
            };

            let hooks = Arc::clone(&self.hooks);
            let mut converter =
                AnthropicStreamConverter::new().with_tool_call_deltas(self.emit_tool_call_deltas);

            let stream = try_stream! {
                let started = Instant::now();
                let mut emitted = 0_u64;

                while let Some(payload) = payloads.next().await {
                    let event = AnthropicStreamEvent::from_json(&payload?)?;

                    for chunk in converter.convert(event) {
                        if let ChunkPayload::Error { message, status_code } = &chunk.payload {
                            hooks.on_vendor_error(ProviderId::Anthropic, message, *status_code);
                        }
                        emitted += 1;
                        yield chunk;
                    }

                    for dropped in converter.take_dropped() {
                        hooks.on_tool_call_dropped(
                            ProviderId::Anthropic,
                            &dropped.tool_use_id,
                            &dropped.reason,
                        );
                    }

                    if converter.is_finished() {
                        break;
                    }
                }

                hooks.on_stream_end(ProviderId::Anthropic, emitted, started.elapsed());
            };

            Ok(Box::pin(stream) as ChunkStream<'a>)
        })
    }
}
