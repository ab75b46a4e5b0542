//! Turn driver: provider rounds, concurrent tool uses, and cancellation.

use std::collections::{HashMap, HashSet};
use std::sync::Arc;
use std::time::{Duration, Instant};

use futures_util::StreamExt;
use scommon::{GenerationOptions, ThreadId};
use sprovider::{
    ChunkPayload, ChunkStream, Message, ModelRequest, ProviderAdapter, Role, TokenUsage, ToolCall,
};
use stooling::{
    ApprovalHandler, ToolError, ToolExecutionContext, ToolExecutionResult, ToolRegistry,
    ToolRuntimeHooks, ToolUse,
};
use tokio::sync::oneshot;
use tokio::task::{self, JoinError, JoinSet};
use tokio_util::sync::CancellationToken;

use crate::history::conversation_from_events;
use crate::{ChatError, ChatEvent, ChatPolicy, TurnHooks, TurnMultiplexer, TurnOutcome};

pub(crate) const CANCELLED_REASON: &str = "cancelled";
pub(crate) const PROVIDER_ERROR_REASON: &str = "provider error";
pub(crate) const ROUND_LIMIT_REASON: &str = "round limit";

/// Signals whether the first provider round opened.
pub(crate) type OpenedSender = oneshot::Sender<Result<(), ChatError>>;

pub(crate) struct TurnDriver {
    pub provider: Arc<dyn ProviderAdapter>,
    pub tools: Arc<ToolRegistry>,
    pub approvals: Arc<dyn ApprovalHandler>,
    pub tool_hooks: Arc<dyn ToolRuntimeHooks>,
    pub hooks: Arc<dyn TurnHooks>,
    pub policy: ChatPolicy,
    pub model: String,
    pub options: GenerationOptions,
    pub cancel: CancellationToken,
}

pub(crate) struct TurnInput {
    pub history: Vec<ChatEvent>,
    pub new_messages: Vec<String>,
}

enum RoundEnd {
    Continue,
    Finished(TurnOutcome),
}

/// Per-round bookkeeping of text and tool uses.
#[derive(Default)]
struct RoundState {
    text: String,
    round_text: String,
    calls: Vec<ToolCall>,
    tool_uses: Vec<Arc<ToolUse>>,
    spawned: HashMap<task::Id, Arc<ToolUse>>,
    committed: HashSet<String>,
    failed: bool,
}

impl TurnDriver {
    pub async fn run(
        self,
        mut multiplexer: TurnMultiplexer,
        input: TurnInput,
        opened: OpenedSender,
    ) -> TurnOutcome {
        let thread_id = *multiplexer.thread_id();
        let started = Instant::now();
        self.hooks
            .on_turn_start(&thread_id, &self.model, input.new_messages.len());

        let mut conversation = Vec::new();
        if let Some(prompt) = &self.policy.system_prompt {
            conversation.push(Message::new(Role::System, prompt.clone()));
        }
        conversation.extend(conversation_from_events(&input.history));
        conversation.extend(
            input
                .new_messages
                .iter()
                .map(|text| Message::new(Role::User, text.clone())),
        );
        let user_events = input
            .new_messages
            .into_iter()
            .map(ChatEvent::user_text)
            .collect::<Vec<_>>();

        let mut opened = Some(opened);
        let outcome = self
            .drive(&mut multiplexer, conversation, user_events, &mut opened)
            .await;
        if let Some(opened) = opened.take() {
            let _ = opened.send(Err(ChatError::provider("turn ended before a provider round opened")));
        }

        multiplexer.finish();
        let elapsed = started.elapsed();
        tracing::info!(
            phase = "turn",
            event = "end",
            thread_id = %thread_id,
            outcome = outcome.as_str(),
            elapsed_ms = elapsed.as_millis() as u64,
            "chat turn finished"
        );
        self.hooks.on_turn_end(&thread_id, outcome, elapsed);
        outcome
    }

    async fn drive(
        &self,
        multiplexer: &mut TurnMultiplexer,
        mut conversation: Vec<Message>,
        user_events: Vec<ChatEvent>,
        opened: &mut Option<OpenedSender>,
    ) -> TurnOutcome {
        let thread_id = *multiplexer.thread_id();
        let mut checkpointed = false;

        for round in 1..=self.policy.max_tool_rounds {
            self.hooks.on_round_start(&thread_id, round);
            tracing::debug!(phase = "turn", event = "round_start", thread_id = %thread_id, round);

            let request = ModelRequest::builder(self.model.clone())
                .messages(conversation.clone())
                .tools(self.tools.definitions())
                .options(self.options)
                .metadata("thread_id", thread_id.to_string())
                .build();

            let opened_stream = match request {
                Ok(request) => tokio::select! {
                    biased;
                    _ = self.cancel.cancelled() => {
                        if let Some(opened) = opened.take() {
                            let _ = opened.send(Err(ChatError::cancelled("turn cancelled before the provider responded")));
                        }
                        return TurnOutcome::Cancelled;
                    }
                    result = self.provider.stream(request) => result,
                },
                Err(error) => Err(error),
            };

            let stream = match opened_stream {
                Ok(stream) => stream,
                Err(error) => {
                    tracing::warn!(
                        phase = "turn",
                        event = "provider_rejected",
                        thread_id = %thread_id,
                        round,
                        error = %error,
                    );
                    if let Some(opened) = opened.take() {
                        let _ = opened.send(Err(ChatError::from(error)));
                    } else {
                        self.publish(
                            multiplexer,
                            ChatEvent::assistant_failure(error.message, PROVIDER_ERROR_REASON),
                        )
                        .await;
                    }
                    return TurnOutcome::Failed;
                }
            };

            if let Some(opened) = opened.take() {
                for event in &user_events {
                    if let Err(error) = multiplexer.append_history(event.clone()).await {
                        tracing::error!(phase = "turn", event = "store_failed", thread_id = %thread_id, error = %error);
                    }
                }
                let _ = opened.send(Ok(()));
            }

            let context = ToolExecutionContext::new(thread_id).with_metadata("model", self.model.clone());
            let (state, end) = self
                .run_round(multiplexer, stream, &context, &mut checkpointed)
                .await;

            match end {
                RoundEnd::Finished(outcome) => return outcome,
                RoundEnd::Continue if state.calls.is_empty() => return TurnOutcome::Completed,
                RoundEnd::Continue => {
                    conversation.push(Message::assistant_tool_calls(
                        state.round_text,
                        state.calls,
                    ));
                    conversation.extend(state.tool_uses.iter().map(|tool_use| {
                        tool_use
                            .execution_result()
                            .unwrap_or_else(|| {
                                ToolExecutionResult::new(
                                    tool_use.id(),
                                    serde_json::json!({ "error": "the tool call did not complete" }),
                                )
                            })
                            .into_message()
                    }));
                }
            }
        }

        tracing::warn!(
            phase = "turn",
            event = "round_limit",
            thread_id = %thread_id,
            max_tool_rounds = self.policy.max_tool_rounds,
        );
        self.publish(
            multiplexer,
            ChatEvent::assistant_failure(
                format!(
                    "Stopped after {} tool rounds without a final answer.",
                    self.policy.max_tool_rounds
                ),
                ROUND_LIMIT_REASON,
            ),
        )
        .await;
        TurnOutcome::RoundLimit
    }

    async fn run_round(
        &self,
        multiplexer: &mut TurnMultiplexer,
        mut stream: ChunkStream<'_>,
        context: &ToolExecutionContext,
        checkpointed: &mut bool,
    ) -> (RoundState, RoundEnd) {
        let mut state = RoundState::default();
        let mut tasks = JoinSet::new();
        let mut stream_done = false;

        loop {
            if stream_done && tasks.is_empty() {
                break;
            }

            tokio::select! {
                biased;
                _ = self.cancel.cancelled() => {
                    drop(stream);
                    self.cancel_round(multiplexer, &mut state, &mut tasks, context).await;
                    return (state, RoundEnd::Finished(TurnOutcome::Cancelled));
                }
                chunk = stream.next(), if !stream_done => match chunk {
                    None => {
                        stream_done = true;
                        self.flush_text(multiplexer, &mut state, None).await;
                    }
                    Some(Ok(chunk)) => {
                        stream_done |= self
                            .handle_chunk(multiplexer, &mut state, &mut tasks, chunk.payload, context, checkpointed)
                            .await;
                    }
                    Some(Err(error)) => {
                        tracing::warn!(
                            phase = "turn",
                            event = "stream_failed",
                            thread_id = %multiplexer.thread_id(),
                            error = %error,
                        );
                        self.flush_text(multiplexer, &mut state, None).await;
                        self.publish(
                            multiplexer,
                            ChatEvent::assistant_failure(error.message, PROVIDER_ERROR_REASON),
                        )
                        .await;
                        state.failed = true;
                        stream_done = true;
                    }
                },
                Some(joined) = tasks.join_next(), if !tasks.is_empty() => {
                    match joined {
                        Ok(tool_use) => self.commit_tool_use(multiplexer, &mut state, &tool_use).await,
                        Err(error) => self.settle_failed_task(multiplexer, &mut state, context, error).await,
                    }
                }
            }
        }

        self.settle_uncommitted(multiplexer, &mut state).await;
        let end = if state.failed {
            RoundEnd::Finished(TurnOutcome::Failed)
        } else {
            RoundEnd::Continue
        };
        (state, end)
    }

    /// Returns `true` when the chunk ends the provider stream.
    async fn handle_chunk(
        &self,
        multiplexer: &mut TurnMultiplexer,
        state: &mut RoundState,
        tasks: &mut JoinSet<Arc<ToolUse>>,
        payload: ChunkPayload,
        context: &ToolExecutionContext,
        checkpointed: &mut bool,
    ) -> bool {
        match payload {
            ChunkPayload::TextDelta {
                content, finish, ..
            } => {
                state.text.push_str(&content);
                if finish.is_some() {
                    self.flush_text(multiplexer, state, None).await;
                }
                false
            }
            ChunkPayload::ToolCallRequest {
                tool_name,
                input,
                tool_use_id,
                ..
            } => {
                self.flush_text(multiplexer, state, None).await;
                let call = ToolCall {
                    id: tool_use_id,
                    name: tool_name,
                    input,
                };
                let tool_use = self.tools.instantiate(call.clone());

                if tool_use.requires_approval() && !*checkpointed {
                    *checkpointed = true;
                    self.publish(
                        multiplexer,
                        ChatEvent::checkpoint(format!("before {}", tool_use.tool_name())),
                    )
                    .await;
                }

                tracing::debug!(
                    phase = "turn",
                    event = "tool_call",
                    thread_id = %context.thread_id,
                    tool_name = %tool_use.tool_name(),
                    tool_use_id = %tool_use.id(),
                );
                state.calls.push(call);
                state.tool_uses.push(tool_use.clone());

                let approvals = self.approvals.clone();
                let hooks = self.tool_hooks.clone();
                let context = context.clone();
                let running = tool_use.clone();
                let handle = tasks.spawn(async move {
                    running
                        .run(approvals.as_ref(), &context, hooks.as_ref())
                        .await;
                    running
                });
                state.spawned.insert(handle.id(), tool_use);
                false
            }
            ChunkPayload::ToolCallDelta { tool_use_id, .. } => {
                tracing::trace!(phase = "turn", event = "tool_call_delta", tool_use_id = %tool_use_id);
                false
            }
            ChunkPayload::Error {
                message,
                status_code,
            } => {
                tracing::warn!(
                    phase = "turn",
                    event = "vendor_error",
                    thread_id = %context.thread_id,
                    status_code,
                    message = %message,
                );
                self.flush_text(multiplexer, state, None).await;
                self.publish(
                    multiplexer,
                    ChatEvent::assistant_failure(message, PROVIDER_ERROR_REASON),
                )
                .await;
                state.failed = true;
                true
            }
            ChunkPayload::Ping { .. } => false,
            ChunkPayload::Usage {
                input_tokens,
                output_tokens,
            } => {
                self.hooks.on_usage(
                    &context.thread_id,
                    &TokenUsage {
                        input_tokens,
                        output_tokens,
                    },
                );
                false
            }
        }
    }

    async fn cancel_round(
        &self,
        multiplexer: &mut TurnMultiplexer,
        state: &mut RoundState,
        tasks: &mut JoinSet<Arc<ToolUse>>,
        context: &ToolExecutionContext,
    ) {
        tracing::info!(
            phase = "turn",
            event = "cancelled",
            thread_id = %multiplexer.thread_id(),
            live_tool_uses = tasks.len(),
        );
        self.flush_text(multiplexer, state, Some(CANCELLED_REASON)).await;

        for tool_use in &state.tool_uses {
            tool_use.cancel();
        }
        while let Some(joined) = tasks.join_next().await {
            match joined {
                Ok(tool_use) => self.commit_tool_use(multiplexer, state, &tool_use).await,
                Err(error) => self.settle_failed_task(multiplexer, state, context, error).await,
            }
        }
        self.settle_uncommitted(multiplexer, state).await;
    }

    /// A panicked tool task fails its tool use; it is never reported as a cancellation.
    async fn settle_failed_task(
        &self,
        multiplexer: &mut TurnMultiplexer,
        state: &mut RoundState,
        context: &ToolExecutionContext,
        error: JoinError,
    ) {
        tracing::error!(
            phase = "turn",
            event = "tool_task_failed",
            thread_id = %multiplexer.thread_id(),
            error = %error,
        );
        let Some(tool_use) = state.spawned.remove(&error.id()) else {
            return;
        };
        if !error.is_panic() {
            return;
        }

        let failure = ToolError::execution(format!("tool panicked: {error}"))
            .with_tool_name(tool_use.tool_name())
            .with_tool_use_id(tool_use.id());
        self.tool_hooks
            .on_execution_failure(&tool_use, context, &failure, Duration::ZERO);
        tool_use.fail(failure);
        self.commit_tool_use(multiplexer, state, &tool_use).await;
    }

    /// Commits tool uses whose task never reported back.
    async fn settle_uncommitted(&self, multiplexer: &mut TurnMultiplexer, state: &mut RoundState) {
        let pending = state
            .tool_uses
            .iter()
            .filter(|tool_use| !state.committed.contains(tool_use.id()))
            .cloned()
            .collect::<Vec<_>>();

        for tool_use in pending {
            tool_use.cancel();
            self.commit_tool_use(multiplexer, state, &tool_use).await;
        }
    }

    async fn commit_tool_use(
        &self,
        multiplexer: &mut TurnMultiplexer,
        state: &mut RoundState,
        tool_use: &ToolUse,
    ) {
        if !state.committed.insert(tool_use.id().to_string()) {
            return;
        }
        let event = ChatEvent::tool_use(tool_use.record(), tool_use.describe());
        self.publish(multiplexer, event).await;
    }

    async fn flush_text(
        &self,
        multiplexer: &mut TurnMultiplexer,
        state: &mut RoundState,
        failure_reason: Option<&str>,
    ) {
        let text = std::mem::take(&mut state.text);
        if text.is_empty() {
            return;
        }

        if !state.round_text.is_empty() {
            state.round_text.push('\n');
        }
        state.round_text.push_str(&text);

        let event = match failure_reason {
            Some(reason) => ChatEvent::assistant_failure(text, reason),
            None => ChatEvent::assistant_text(text),
        };
        self.publish(multiplexer, event).await;
    }

    async fn publish(&self, multiplexer: &mut TurnMultiplexer, event: ChatEvent) {
        if let Err(error) = multiplexer.commit(event).await {
            let thread_id: ThreadId = *multiplexer.thread_id();
            tracing::error!(
                phase = "turn",
                event = "store_failed",
                thread_id = %thread_id,
                error = %error,
            );
        }
    }
}
