use std::collections::VecDeque;
use std::sync::{Arc, Mutex};

use axum::Router;
use axum::body::{Body, to_bytes};
use axum::http::{Request, StatusCode};
use futures_util::{StreamExt, stream};
use schat::prelude::*;
use schat::{ChatEventKind, thread_id_banner};
use serde_json::{Value, json};
use sprovider::{
    ChunkPayload, ChunkSequencer, ChunkStream, FinishReason, ModelRequest, ProviderAdapter,
    ProviderError, ProviderFuture, ProviderId, ProviderRegistry, Role, ToolDefinition,
};
use sserver::{AppState, ModelInfo, build_router};
use stooling::{ApprovalQueue, FunctionTool, ToolRegistry};
use tower::ServiceExt;

enum Round {
    Chunks(Vec<ChunkPayload>),
    Stall(Vec<ChunkPayload>),
    Reject(ProviderError),
}

struct ScriptedProvider {
    rounds: Mutex<VecDeque<Round>>,
}

impl ScriptedProvider {
    fn new(rounds: Vec<Round>) -> Arc<Self> {
        Arc::new(Self {
            rounds: Mutex::new(rounds.into()),
        })
    }
}

impl ProviderAdapter for ScriptedProvider {
    fn id(&self) -> ProviderId {
        ProviderId::Anthropic
    }

    fn stream<'a>(
        &'a self,
        _request: ModelRequest,
    ) -> ProviderFuture<'a, Result<ChunkStream<'a>, ProviderError>> {
        Box::pin(async move {
            let round = self.rounds.lock().expect("rounds lock").pop_front();
            let (payloads, stall) = match round {
                Some(Round::Chunks(payloads)) => (payloads, false),
                Some(Round::Stall(payloads)) => (payloads, true),
                Some(Round::Reject(error)) => return Err(error),
                None => return Err(ProviderError::other("script exhausted")),
            };

            let mut sequencer = ChunkSequencer::new();
            let chunks = payloads
                .into_iter()
                .map(|payload| Ok::<_, ProviderError>(sequencer.next(payload)))
                .collect::<Vec<_>>();
            let stream = stream::iter(chunks);
            if stall {
                Ok(Box::pin(stream.chain(stream::pending())) as ChunkStream<'a>)
            } else {
                Ok(Box::pin(stream) as ChunkStream<'a>)
            }
        })
    }
}

fn text_round(text: &str) -> Vec<ChunkPayload> {
    vec![
        ChunkPayload::text_open(),
        ChunkPayload::text(text),
        ChunkPayload::text_stop(FinishReason::Stop),
    ]
}

fn state_with(rounds: Vec<Round>) -> (AppState, Arc<ApprovalQueue>) {
    let mut providers = ProviderRegistry::new();
    providers.register_arc(ScriptedProvider::new(rounds));

    let mut tools = ToolRegistry::new();
    tools.register(
        FunctionTool::new(
            ToolDefinition::new("deploy", "Deploys the build", json!({"type": "object"})),
            |_input, _ctx| async move { Ok(json!("deployed")) },
        )
        .requiring_approval(),
    );

    let approvals = Arc::new(ApprovalQueue::new());
    let chat = ChatService::builder(Arc::new(providers))
        .tools(Arc::new(tools))
        .approvals(approvals.clone())
        .build();
    let state = AppState::new(chat)
        .with_approvals(approvals.clone())
        .with_models(vec![ModelInfo::new("claude-test", "anthropic")]);
    (state, approvals)
}

fn post_json(uri: &str, body: Value) -> Request<Body> {
    Request::builder()
        .method("POST")
        .uri(uri)
        .header("content-type", "application/json")
        .body(Body::from(body.to_string()))
        .expect("request should build")
}

async fn body_json(router: Router, request: Request<Body>) -> (StatusCode, Value) {
    let response = router.oneshot(request).await.expect("router should respond");
    let status = response.status();
    let bytes = to_bytes(response.into_body(), usize::MAX)
        .await
        .expect("body should read");
    let value = serde_json::from_slice(&bytes).unwrap_or(Value::Null);
    (status, value)
}

fn sse_payloads(body: &str) -> Vec<String> {
    body.lines()
        .filter_map(|line| line.strip_prefix("data: "))
        .map(str::to_string)
        .collect()
}

#[tokio::test]
async fn streaming_completion_opens_with_thread_banner_and_ends_with_done() {
    let (state, _approvals) = state_with(vec![Round::Chunks(text_round("hello"))]);
    let router = build_router(state);

    let response = router
        .oneshot(post_json(
            "/chat/completions",
            json!({
                "model": "claude-test",
                "stream": true,
                "messages": [{"role": "user", "content": "hi"}]
            }),
        ))
        .await
        .expect("router should respond");

    assert_eq!(response.status(), StatusCode::OK);
    let content_type = response
        .headers()
        .get("content-type")
        .and_then(|value| value.to_str().ok())
        .unwrap_or_default()
        .to_string();
    assert!(content_type.starts_with("text/event-stream"));

    let bytes = to_bytes(response.into_body(), usize::MAX)
        .await
        .expect("stream should finish");
    let payloads = sse_payloads(&String::from_utf8_lossy(&bytes));

    assert_eq!(payloads.last().map(String::as_str), Some("[DONE]"));
    let chunks = payloads[..payloads.len() - 1]
        .iter()
        .map(|payload| serde_json::from_str::<Value>(payload).expect("chunk should be json"))
        .collect::<Vec<_>>();

    let opening = &chunks[0]["choices"][0]["delta"];
    assert_eq!(opening["role"], "assistant");
    let banner = opening["content"].as_str().expect("new thread banner");
    assert!(banner.starts_with("thread_id: "));
    assert!(banner.ends_with("\n\n"));

    assert_eq!(chunks[1]["choices"][0]["delta"]["content"], "hello\n");
    let closing = chunks.last().expect("closing chunk");
    assert_eq!(closing["choices"][0]["finish_reason"], "stop");
    assert!(
        chunks
            .iter()
            .all(|chunk| chunk["object"] == "chat.completion.chunk" && chunk["id"] == chunks[0]["id"])
    );
}

#[tokio::test]
async fn non_streaming_completion_folds_the_turn_into_one_message() {
    let (state, _approvals) = state_with(vec![Round::Chunks(text_round("hello"))]);

    let (status, body) = body_json(
        build_router(state),
        post_json(
            "/v1/chat/completions",
            json!({
                "model": "claude-test",
                "messages": [{"role": "user", "content": [{"type": "text", "text": "hi"}]}]
            }),
        ),
    )
    .await;

    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["object"], "chat.completion");
    let content = body["choices"][0]["message"]["content"]
        .as_str()
        .expect("assistant content");
    assert!(content.starts_with("thread_id: "));
    assert!(content.ends_with("\n\nhello\n"));
}

#[tokio::test]
async fn request_without_new_user_message_is_a_bad_request() {
    let (state, _approvals) = state_with(Vec::new());

    let (status, body) = body_json(
        build_router(state),
        post_json(
            "/chat/completions",
            json!({
                "model": "claude-test",
                "messages": [
                    {"role": "system", "content": "be brief"},
                    {"role": "assistant", "content": "hello"}
                ]
            }),
        ),
    )
    .await;

    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["error"]["message"], "No new message found");
    assert_eq!(body["error"]["type"], "invalid_request_error");
}

#[tokio::test]
async fn malformed_json_is_a_bad_request() {
    let (state, _approvals) = state_with(Vec::new());
    let request = Request::builder()
        .method("POST")
        .uri("/chat/completions")
        .header("content-type", "application/json")
        .body(Body::from("{\"model\":"))
        .expect("request should build");

    let (status, body) = body_json(build_router(state), request).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["error"]["code"], "invalid_json");
}

#[tokio::test]
async fn upstream_rejection_keeps_its_status() {
    let (state, _approvals) = state_with(vec![Round::Reject(ProviderError::rate_limited(
        "slow down",
    ))]);

    let (status, body) = body_json(
        build_router(state),
        post_json(
            "/chat/completions",
            json!({
                "model": "claude-test",
                "stream": true,
                "messages": [{"role": "user", "content": "hi"}]
            }),
        ),
    )
    .await;

    assert_eq!(status, StatusCode::TOO_MANY_REQUESTS);
    assert_eq!(body["error"]["message"], "slow down");
}

#[tokio::test]
async fn different_request_on_a_busy_thread_conflicts() {
    let (state, _approvals) = state_with(vec![
        Round::Chunks(text_round("first")),
        Round::Stall(vec![ChunkPayload::text_open(), ChunkPayload::text("thinking")]),
    ]);

    let first = state
        .chat
        .start_turn(ChatRequest::new(
            "claude-test",
            vec![InboundMessage::new(Role::User, "hi")],
        ))
        .await
        .expect("first turn should start");
    let thread_id = first.thread_id();
    first.collect().await;

    let history = vec![
        InboundMessage::new(Role::User, "hi"),
        InboundMessage::new(Role::Assistant, thread_id_banner(&thread_id)),
        InboundMessage::new(Role::User, "keep going"),
    ];
    let stalled = state
        .chat
        .start_turn(ChatRequest::new("claude-test", history))
        .await
        .expect("second turn should start");

    let (status, body) = body_json(
        build_router(state.clone()),
        post_json(
            "/chat/completions",
            json!({
                "model": "claude-test",
                "stream": true,
                "messages": [
                    {"role": "user", "content": "hi"},
                    {"role": "assistant", "content": thread_id_banner(&thread_id)},
                    {"role": "user", "content": "something else"}
                ]
            }),
        ),
    )
    .await;

    assert_eq!(status, StatusCode::CONFLICT);
    assert_eq!(body["error"]["code"], "thread_busy");

    drop(stalled);
}

#[tokio::test]
async fn models_are_listed_in_openai_shape() {
    let (state, _approvals) = state_with(Vec::new());
    let request = Request::builder()
        .uri("/models")
        .body(Body::empty())
        .expect("request should build");

    let (status, body) = body_json(build_router(state), request).await;

    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["object"], "list");
    assert_eq!(body["data"][0]["id"], "claude-test");
    assert_eq!(body["data"][0]["object"], "model");
    assert_eq!(body["data"][0]["owned_by"], "anthropic");
}

#[tokio::test]
async fn pending_approval_is_listed_and_resolved_over_http() {
    let (state, approvals) = state_with(vec![
        Round::Chunks(vec![ChunkPayload::ToolCallRequest {
            tool_name: "deploy".to_string(),
            input: json!({"target": "prod"}),
            tool_use_id: "toolu_1".to_string(),
            finish: Some(FinishReason::ToolCalls),
        }]),
        Round::Chunks(text_round("deployed it")),
    ]);

    let turn = state
        .chat
        .start_turn(ChatRequest::new(
            "claude-test",
            vec![InboundMessage::new(Role::User, "ship it")],
        ))
        .await
        .expect("turn should start");
    let collector = tokio::spawn(turn.collect());

    while approvals.pending().expect("pending approvals").is_empty() {
        tokio::task::yield_now().await;
    }

    let listing = Request::builder()
        .uri("/approvals")
        .body(Body::empty())
        .expect("request should build");
    let (status, body) = body_json(build_router(state.clone()), listing).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body[0]["tool_use_id"], "toolu_1");
    assert_eq!(body[0]["tool_name"], "deploy");

    let (status, body) = body_json(
        build_router(state.clone()),
        post_json("/approvals/toolu_1", json!({"approved": true})),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["approved"], true);

    let events = collector.await.expect("collector should join");
    assert!(events.iter().any(|event| matches!(
        &event.kind,
        ChatEventKind::Message { content: MessageContent::Text { text }, .. } if text == "deployed it"
    )));

    let (status, body) = body_json(
        build_router(state),
        post_json("/approvals/toolu_1", json!({"approved": false})),
    )
    .await;
    assert_eq!(status, StatusCode::NOT_FOUND);
    assert_eq!(body["error"]["type"], "not_found_error");
}
