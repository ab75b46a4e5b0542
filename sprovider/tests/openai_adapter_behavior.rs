#![cfg(feature = "provider-openai")]

use std::sync::{Arc, Mutex};

use futures_util::StreamExt;
use futures_util::stream;
use serde_json::{Value, json};
use sprovider::adapters::openai::OpenAiProvider;
use sprovider::{
    ChunkPayload, FinishReason, Message, ModelRequest, ProviderAdapter, ProviderError,
    ProviderFuture, ProviderId, Role, SecureCredentialManager, SsePayloadStream, StreamAuth,
    StreamRequest, StreamTransport,
};

#[derive(Debug, Default)]
struct ScriptedTransport {
    payloads: Vec<String>,
    captured: Mutex<Option<(String, Option<String>, Value)>>,
}

impl StreamTransport for ScriptedTransport {
    fn open<'a>(
        &'a self,
        request: StreamRequest,
    ) -> ProviderFuture<'a, Result<SsePayloadStream<'a>, ProviderError>> {
        Box::pin(async move {
            let bearer = match &request.auth {
                StreamAuth::Bearer(token) => Some(token.expose().to_string()),
                StreamAuth::Header { .. } => None,
            };
            *self.captured.lock().expect("capture lock") =
                Some((request.path, bearer, request.body));

            let payloads = self.payloads.clone();
            let stream: SsePayloadStream<'a> = Box::pin(stream::iter(payloads.into_iter().map(Ok)));
            Ok(stream)
        })
    }
}

fn provider(transport: Arc<ScriptedTransport>) -> OpenAiProvider {
    let credentials = Arc::new(SecureCredentialManager::new());
    credentials
        .set_api_key(ProviderId::OpenAi, "sk-openai-test")
        .expect("key should store");
    OpenAiProvider::new(credentials, transport)
}

#[tokio::test]
async fn stream_without_finish_reason_is_flushed_at_end() {
    let transport = Arc::new(ScriptedTransport {
        payloads: vec![
            r#"{"id":"chatcmpl-1","model":"gpt-4o-mini","created":10,"choices":[{"delta":{"content":"hi"}}]}"#.to_string(),
            r#"{"id":"chatcmpl-1","model":"gpt-4o-mini","created":10,"choices":[{"delta":{"tool_calls":[{"index":0,"id":"call_9","function":{"name":"current_time","arguments":""}}]}}]}"#.to_string(),
        ],
        ..ScriptedTransport::default()
    });
    let provider = provider(Arc::clone(&transport));

    let request = ModelRequest::new("gpt-4o-mini", vec![Message::new(Role::User, "time?")]);
    let chunks: Vec<_> = provider
        .stream(request)
        .await
        .expect("stream should open")
        .collect::<Vec<_>>()
        .await
        .into_iter()
        .collect::<Result<_, _>>()
        .expect("no stream errors");

    let payloads: Vec<_> = chunks.into_iter().map(|chunk| chunk.payload).collect();
    assert_eq!(
        payloads,
        vec![
            ChunkPayload::text_open(),
            ChunkPayload::text("hi"),
            ChunkPayload::text_stop(FinishReason::Stop),
            ChunkPayload::ToolCallRequest {
                tool_name: "current_time".to_string(),
                input: json!({}),
                tool_use_id: "call_9".to_string(),
                finish: Some(FinishReason::ToolCalls),
            },
        ]
    );

    let (path, bearer, body) = transport
        .captured
        .lock()
        .expect("capture lock")
        .clone()
        .expect("request should be captured");
    assert_eq!(path, "chat/completions");
    assert_eq!(bearer.as_deref(), Some("sk-openai-test"));
    assert_eq!(body["stream"], true);
}
