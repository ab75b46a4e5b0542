#![cfg(feature = "provider-gemini")]

use std::sync::{Arc, Mutex};

use futures_util::StreamExt;
use futures_util::stream;
use serde_json::{Value, json};
use sprovider::adapters::gemini::GeminiProvider;
use sprovider::{
    ChunkPayload, FinishReason, Message, ModelRequest, ProviderAdapter, ProviderError,
    ProviderErrorKind, ProviderFuture, ProviderHooks, ProviderId, Role, SecureCredentialManager,
    SsePayloadStream, StreamAuth, StreamRequest, StreamTransport,
};

#[derive(Debug, Default)]
struct ScriptedTransport {
    payloads: Vec<String>,
    captured: Mutex<Option<(String, Option<(String, String)>, Value)>>,
}

impl StreamTransport for ScriptedTransport {
    fn open<'a>(
        &'a self,
        request: StreamRequest,
    ) -> ProviderFuture<'a, Result<SsePayloadStream<'a>, ProviderError>> {
        Box::pin(async move {
            let header = match &request.auth {
                StreamAuth::Header { name, value } => {
                    Some((name.clone(), value.expose().to_string()))
                }
                StreamAuth::Bearer(_) => None,
            };
            *self.captured.lock().expect("capture lock") =
                Some((request.path, header, request.body));

            let payloads = self.payloads.clone();
            let stream: SsePayloadStream<'a> = Box::pin(stream::iter(payloads.into_iter().map(Ok)));
            Ok(stream)
        })
    }
}

#[derive(Default)]
struct RecordingHooks {
    vendor_errors: Mutex<Vec<(ProviderId, u16)>>,
}

impl ProviderHooks for RecordingHooks {
    fn on_vendor_error(&self, provider: ProviderId, _message: &str, status_code: u16) {
        self.vendor_errors
            .lock()
            .expect("hooks lock")
            .push((provider, status_code));
    }
}

fn credentials() -> Arc<SecureCredentialManager> {
    let credentials = Arc::new(SecureCredentialManager::new());
    credentials
        .set_api_key(ProviderId::Gemini, "gm-test-key")
        .expect("key should store");
    credentials
}

async fn collect(provider: &GeminiProvider, request: ModelRequest) -> Vec<ChunkPayload> {
    provider
        .stream(request)
        .await
        .expect("stream should open")
        .collect::<Vec<_>>()
        .await
        .into_iter()
        .map(|chunk| chunk.expect("no stream errors").payload)
        .collect()
}

#[tokio::test]
async fn text_and_function_call_stream_through_the_adapter() {
    let transport = Arc::new(ScriptedTransport {
        payloads: vec![
            r#"{"candidates":[{"content":{"role":"model","parts":[{"text":"Checking"}]}}],"modelVersion":"gemini-2.5-flash","responseId":"resp-1"}"#.to_string(),
            r#"{"candidates":[{"content":{"role":"model","parts":[{"functionCall":{"name":"current_time","args":{}}}]},"finishReason":"STOP"}],"usageMetadata":{"promptTokenCount":12,"candidatesTokenCount":5}}"#.to_string(),
        ],
        ..ScriptedTransport::default()
    });
    let provider = GeminiProvider::new(
        credentials(),
        Arc::clone(&transport) as Arc<dyn StreamTransport>,
    );

    let request = ModelRequest::new(
        "models/gemini-2.5-flash",
        vec![
            Message::new(Role::System, "be brief"),
            Message::new(Role::User, "time?"),
        ],
    );
    let payloads = collect(&provider, request).await;

    assert_eq!(
        payloads,
        vec![
            ChunkPayload::text_open(),
            ChunkPayload::text("Checking"),
            ChunkPayload::text_stop(FinishReason::Stop),
            ChunkPayload::ToolCallRequest {
                tool_name: "current_time".to_string(),
                input: json!({}),
                tool_use_id: "call_0".to_string(),
                finish: Some(FinishReason::ToolCalls),
            },
            ChunkPayload::Usage {
                input_tokens: 12,
                output_tokens: 5,
            },
        ]
    );

    let (path, header, body) = transport
        .captured
        .lock()
        .expect("capture lock")
        .clone()
        .expect("request should be captured");
    assert_eq!(path, "models/gemini-2.5-flash:streamGenerateContent?alt=sse");
    assert_eq!(
        header,
        Some(("x-goog-api-key".to_string(), "gm-test-key".to_string()))
    );
    assert_eq!(body["systemInstruction"]["parts"][0]["text"], "be brief");
    assert_eq!(body["contents"][0]["parts"][0]["text"], "time?");
}

#[tokio::test]
async fn in_stream_error_reaches_the_hooks() {
    let transport = Arc::new(ScriptedTransport {
        payloads: vec![
            r#"{"error":{"code":429,"message":"Resource exhausted","status":"RESOURCE_EXHAUSTED"}}"#
                .to_string(),
            r#"{"candidates":[{"content":{"parts":[{"text":"ignored"}]}}]}"#.to_string(),
        ],
        ..ScriptedTransport::default()
    });
    let hooks = Arc::new(RecordingHooks::default());
    let provider = GeminiProvider::new(credentials(), transport)
        .with_hooks(Arc::clone(&hooks) as Arc<dyn ProviderHooks>);

    let payloads = collect(
        &provider,
        ModelRequest::new("gemini-2.5-pro", vec![Message::new(Role::User, "hi")]),
    )
    .await;

    assert_eq!(
        payloads,
        vec![ChunkPayload::error("Gemini API error: Resource exhausted", 429)]
    );
    assert_eq!(
        *hooks.vendor_errors.lock().expect("hooks lock"),
        vec![(ProviderId::Gemini, 429)]
    );
}

#[tokio::test]
async fn missing_key_fails_before_opening_a_stream() {
    let transport = Arc::new(ScriptedTransport::default());
    let provider = GeminiProvider::new(
        Arc::new(SecureCredentialManager::new()),
        Arc::clone(&transport) as Arc<dyn StreamTransport>,
    );

    let error = provider
        .stream(ModelRequest::new(
            "gemini-2.5-flash",
            vec![Message::new(Role::User, "hi")],
        ))
        .await
        .err()
        .expect("missing key should fail");

    assert_eq!(error.kind, ProviderErrorKind::Authentication);
    assert!(transport.captured.lock().expect("capture lock").is_none());
}
