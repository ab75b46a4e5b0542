//! Gemini `streamGenerateContent` provider over the streaming transport.

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

use super::converter::GeminiStreamConverter;
use super::serde_api::{GeminiStreamPayload, build_api_request};

pub const GEMINI_BASE_URL: &str = "https://generativelanguage.googleapis.com/v1beta";

#[derive(Clone)]
pub struct GeminiProvider {
    credentials: Arc<SecureCredentialManager>,
    transport: Arc<dyn StreamTransport>,
    hooks: Arc<dyn ProviderHooks>,
    emit_tool_call_deltas: bool,
}

impl GeminiProvider {
    pub fn new(
        credentials: Arc<SecureCredentialManager>,
        transport: Arc<dyn StreamTransport>,
    ) -> Self {
        Self {
            credentials,
            transport,
            hooks: Arc::new(NoopProviderHooks),
            emit_tool_call_deltas: false,
        }
    }

    pub fn with_hooks(mut self, hooks: Arc<dyn ProviderHooks>) -> Self {
        self.hooks = hooks;
        self
    }

    pub fn with_tool_call_deltas(mut self, enabled: bool) -> Self {
        self.emit_tool_call_deltas = enabled;
        self
    }

    pub fn default_http_transport(client: Client) -> HttpStreamTransport {
        HttpStreamTransport::new(client, GEMINI_BASE_URL)
    }

    fn build_stream_request(&self, request: ModelRequest) -> Result<StreamRequest, ProviderError> {
        let api_key = self.credentials.require_api_key(ProviderId::Gemini)?;
        let model = request.model.trim_start_matches("models/").to_string();
        let body = build_api_request(request)?;
        let body = serde_json::to_value(body)
            .map_err(|err| ProviderError::invalid_request(err.to_string()))?;

        Ok(StreamRequest {
            path: stream_path(&model),
            auth: StreamAuth::Header {
                name: "x-goog-api-key".to_string(),
                value: SecretString::new(api_key),
            },
            headers: Vec::new(),
            body,
        })
    }
}

/// The model travels in the URL; `alt=sse` switches the response to SSE.
pub(crate) fn stream_path(model: &str) -> String {
    format!("models/{model}:streamGenerateContent?alt=sse")
}

impl ProviderAdapter for GeminiProvider {
    fn id(&self) -> ProviderId {
        ProviderId::Gemini
    }

    fn stream<'a>(
        &'a self,
        request: ModelRequest,
    ) -> ProviderFuture<'a, Result<ChunkStream<'a>, ProviderError>> {
        Box::pin(async move {
            request.validate()?;
            let model = request.model.clone();
            let stream_request = self.build_stream_request(request)?;

            self.hooks.on_stream_open(ProviderId::Gemini, &model);
            let mut payloads = match self.transport.open(stream_request).await {
                Ok(payloads) => payloads,
                Err(error) => {
                    self.hooks.on_stream_rejected(ProviderId::Gemini, &model, &error);
                    return Err(error);
                }
            };

            let hooks = Arc::clone(&self.hooks);
            let mut converter =
                GeminiStreamConverter::new().with_tool_call_deltas(self.emit_tool_call_deltas);

            let stream = try_stream! {
                let started = Instant::now();
                let mut emitted = 0_u64;

                while let Some(payload) = payloads.next().await {
                    let payload = GeminiStreamPayload::from_json(&payload?)?;

                    for chunk in converter.convert(payload) {
                        if let ChunkPayload::Error { message, status_code } = &chunk.payload {
                            hooks.on_vendor_error(ProviderId::Gemini, message, *status_code);
                        }
                        emitted += 1;
                        yield chunk;
                    }

                    if converter.is_finished() {
                        break;
                    }
                }

                for chunk in converter.finish_stream() {
                    emitted += 1;
                    yield chunk;
                }

                for dropped in converter.take_dropped() {
                    hooks.on_tool_call_dropped(
                        ProviderId::Gemini,
                        &dropped.tool_use_id,
                        &dropped.reason,
                    );
                }

                hooks.on_stream_end(ProviderId::Gemini, emitted, started.elapsed());
            };

            Ok(Box::pin(stream) as ChunkStream<'a>)
        })
    }
}
