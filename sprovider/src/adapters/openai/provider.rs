//! OpenAI-compatible chat-completions provider over the streaming transport.

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

use super::converter::OpenAiStreamConverter;
use super::serde_api::{OpenAiStreamPayload, build_api_request};

pub const OPENAI_BASE_URL: &str = "https://api.openai.com/v1";

#[derive(Clone)]
pub struct OpenAiProvider {
    credentials: Arc<SecureCredentialManager>,
    transport: Arc<dyn StreamTransport>,
    hooks: Arc<dyn ProviderHooks>,
    emit_tool_call_deltas: bool,
}

impl OpenAiProvider {
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
        HttpStreamTransport::new(client, OPENAI_BASE_URL)
    }

    fn build_stream_request(&self, request: ModelRequest) -> Result<StreamRequest, ProviderError> {
        let api_key = self.credentials.require_api_key(ProviderId::OpenAi)?;
        let body = build_api_request(request)?;
        let body = serde_json::to_value(body)
            .map_err(|err| ProviderError::invalid_request(err.to_string()))?;

        Ok(StreamRequest {
            path: "chat/completions".to_string(),
            auth: StreamAuth::Bearer(SecretString::new(api_key)),
            headers: Vec::new(),
            body,
        })
    }
}

impl ProviderAdapter for OpenAiProvider {
    fn id(&self) -> ProviderId {
        ProviderId::OpenAi
    }

    fn stream<'a>(
        &'a self,
        request: ModelRequest,
    ) -> ProviderFuture<'a, Result<ChunkStream<'a>, ProviderError>> {
        Box::pin(async move {
            request.validate()?;
            let model = request.model.clone();
            let stream_request = self.build_stream_request(request)?;

            self.hooks.on_stream_open(ProviderId::OpenAi, &model);
            let mut payloads = match self.transport.open(stream_request).await {
                Ok(payloads) => payloads,
                Err(error) => {
                    self.hooks.on_stream_rejected(ProviderId::OpenAi, &model, &error);
                    return Err(error);
                }
            };

            let hooks = Arc::clone(&self.hooks);
            let mut converter =
                OpenAiStreamConverter::new().with_tool_call_deltas(self.emit_tool_call_deltas);

            let stream = try_stream! {
                let started = Instant::now();
                let mut emitted = 0_u64;

                while let Some(payload) = payloads.next().await {
                    let payload = OpenAiStreamPayload::from_json(&payload?)?;
                    let chunks = converter.convert(payload);

                    for chunk in chunks {
                        if let ChunkPayload::Error { message, status_code } = &chunk.payload {
                            hooks.on_vendor_error(ProviderId::OpenAi, message, *status_code);
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
                        ProviderId::OpenAi,
                        &dropped.tool_use_id,
                        &dropped.reason,
                    );
                }

                hooks.on_stream_end(ProviderId::OpenAi, emitted, started.elapsed());
            };

            Ok(Box::pin(stream) as ChunkStream<'a>)
        })
    }
}
