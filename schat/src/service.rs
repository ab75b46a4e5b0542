//! Session resolution and turn orchestration.

use std::collections::HashMap;
use std::pin::Pin;
use std::sync::{Arc, Mutex};

use futures_core::Stream;
use futures_util::StreamExt;
use scommon::ThreadId;
use sprovider::ProviderRegistry;
use stooling::{
    ApprovalHandler, AutoApprove, NoopToolRuntimeHooks, ToolRegistry, ToolRuntimeHooks,
};
use tokio::sync::{oneshot, watch};
use tokio_util::sync::{CancellationToken, DropGuard};

use crate::thread::{extract_thread_id, new_user_messages};
use crate::turn::{TurnDriver, TurnInput};
use crate::{
    ChatError, ChatEvent, ChatEventStore, ChatRequest, EventMerger, InMemoryChatEventStore,
    NoopTurnHooks, ThreadSession, TurnHooks, TurnMultiplexer, TurnSnapshot,
};

pub const DEFAULT_MAX_TOOL_ROUNDS: usize = 8;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ChatPolicy {
    pub max_tool_rounds: usize,
    pub system_prompt: Option<String>,
}

impl Default for ChatPolicy {
    fn default() -> Self {
        Self {
            max_tool_rounds: DEFAULT_MAX_TOOL_ROUNDS,
            system_prompt: None,
        }
    }
}

impl ChatPolicy {
    pub fn with_max_tool_rounds(mut self, max_tool_rounds: usize) -> Self {
        self.max_tool_rounds = max_tool_rounds.max(1);
        self
    }

    pub fn with_system_prompt(mut self, prompt: impl Into<String>) -> Self {
        self.system_prompt = Some(prompt.into());
        self
    }
}

pub type SnapshotStream = Pin<Box<dyn Stream<Item = TurnSnapshot> + Send>>;
pub type EventStream = Pin<Box<dyn Stream<Item = ChatEvent> + Send>>;

#[derive(Default)]
struct SessionSlot {
    session: Option<Arc<Mutex<ThreadSession>>>,
    active: Option<ActiveTurn>,
}

struct ActiveTurn {
    serial: u64,
    fingerprint: TurnFingerprint,
    receiver: watch::Receiver<TurnSnapshot>,
    cancel: CancellationToken,
}

impl ActiveTurn {
    fn is_running(&self) -> bool {
        !self.receiver.borrow().done
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
struct TurnFingerprint {
    model: String,
    messages: Vec<String>,
}

#[derive(Default)]
struct SessionTable {
    slots: HashMap<ThreadId, SessionSlot>,
    next_serial: u64,
}

type SharedSessions = Arc<Mutex<SessionTable>>;

/// Output of one turn as seen by a single caller.
///
/// The caller that started the turn holds a drop guard: dropping its stream
/// cancels the turn. Callers that joined an in-flight turn only observe it.
pub struct TurnHandle {
    thread_id: ThreadId,
    is_new_thread: bool,
    joined: bool,
    receiver: watch::Receiver<TurnSnapshot>,
    cancel: CancellationToken,
    guard: Option<DropGuard>,
}

impl TurnHandle {
    pub fn thread_id(&self) -> ThreadId {
        self.thread_id
    }

    pub fn is_new_thread(&self) -> bool {
        self.is_new_thread
    }

    pub fn joined(&self) -> bool {
        self.joined
    }

    pub fn cancel(&self) {
        self.cancel.cancel();
    }

    /// Cumulative snapshots; ends after the snapshot marked `done`.
    pub fn snapshots(self) -> SnapshotStream {
        let mut receiver = self.receiver;
        let guard = self.guard;

        Box::pin(async_stream::stream! {
            let _guard = guard;
            loop {
                let snapshot = receiver.borrow_and_update().clone();
                let done = snapshot.done;
                yield snapshot;
                if done || receiver.changed().await.is_err() {
                    break;
                }
            }
        })
    }

    /// Each event of the turn exactly once, in commit order.
    pub fn events(self) -> EventStream {
        let mut snapshots = self.snapshots();

        Box::pin(async_stream::stream! {
            let mut merger = EventMerger::new();
            while let Some(snapshot) = snapshots.next().await {
                for event in merger.merge(&snapshot.events) {
                    yield event;
                }
            }
        })
    }

    /// Waits for the turn to finish and returns all of its events.
    pub async fn collect(self) -> Vec<ChatEvent> {
        let mut events = self.events();
        let mut collected = Vec::new();
        while let Some(event) = events.next().await {
            collected.push(event);
        }
        collected
    }
}

#[derive(Clone)]
pub struct ChatService {
    providers: Arc<ProviderRegistry>,
    tools: Arc<ToolRegistry>,
    approvals: Arc<dyn ApprovalHandler>,
    store: Arc<dyn ChatEventStore>,
    hooks: Arc<dyn TurnHooks>,
    tool_hooks: Arc<dyn ToolRuntimeHooks>,
    policy: ChatPolicy,
    sessions: SharedSessions,
}

impl ChatService {
    pub fn builder(providers: Arc<ProviderRegistry>) -> ChatServiceBuilder {
        ChatServiceBuilder::new(providers)
    }

    pub fn policy(&self) -> &ChatPolicy {
        &self.policy
    }

    pub fn tools(&self) -> &Arc<ToolRegistry> {
        &self.tools
    }

    /// Resolves the request's thread and starts (or joins) a turn on it.
    ///
    /// Fails before any output when the request carries no new user message,
    /// no provider serves the model, another turn with different input is in
    /// flight, or the first provider round is rejected.
    pub async fn start_turn(&self, request: ChatRequest) -> Result<TurnHandle, ChatError> {
        let ChatRequest {
            model,
            messages,
            options,
        } = request;

        let new_messages = new_user_messages(&messages);
        if new_messages.is_empty() {
            return Err(ChatError::invalid_request("No new message found"));
        }

        let (thread_id, is_new_thread) = match extract_thread_id(&messages) {
            Some(thread_id) => (thread_id, false),
            None => (ThreadId::new(), true),
        };

        let provider = self.providers.resolve(&model).ok_or_else(|| {
            ChatError::not_found(format!("no provider is configured for model '{model}'"))
        })?;

        let fingerprint = TurnFingerprint {
            model: model.clone(),
            messages: new_messages.clone(),
        };
        if let Some(handle) = self.join_in_flight(&thread_id, &fingerprint)? {
            return Ok(handle);
        }

        let session = self.load_session(&thread_id, is_new_thread).await?;
        let history = session
            .lock()
            .map_err(|_| ChatError::store("thread session lock poisoned"))?
            .events
            .clone();

        let cancel = CancellationToken::new();
        let (multiplexer, receiver) =
            TurnMultiplexer::new(session, self.store.clone(), self.hooks.clone())?;
        let serial = self.claim(&thread_id, fingerprint, receiver.clone(), cancel.clone())?;
        let guard = cancel.clone().drop_guard();

        tracing::info!(
            phase = "turn",
            event = "start",
            thread_id = %thread_id,
            model = %model,
            new_thread = is_new_thread,
            new_messages = new_messages.len(),
        );

        let driver = TurnDriver {
            provider,
            tools: self.tools.clone(),
            approvals: self.approvals.clone(),
            tool_hooks: self.tool_hooks.clone(),
            hooks: self.hooks.clone(),
            policy: self.policy.clone(),
            model,
            options,
            cancel: cancel.clone(),
        };
        let input = TurnInput {
            history,
            new_messages,
        };

        let (opened_tx, opened_rx) = oneshot::channel();
        let sessions = self.sessions.clone();
        tokio::spawn(async move {
            driver.run(multiplexer, input, opened_tx).await;
            release(&sessions, &thread_id, serial);
        });

        match opened_rx.await {
            Ok(Ok(())) => Ok(TurnHandle {
                thread_id,
                is_new_thread,
                joined: false,
                receiver,
                cancel,
                guard: Some(guard),
            }),
            Ok(Err(error)) => {
                let _ = guard.disarm();
                release(&self.sessions, &thread_id, serial);
                Err(error)
            }
            Err(_) => Err(ChatError::provider("turn task ended unexpectedly")),
        }
    }

    /// Cancels the in-flight turn of a thread; returns whether one was running.
    pub fn cancel(&self, thread_id: &ThreadId) -> Result<bool, ChatError> {
        let table = self.lock_sessions()?;
        match table
            .slots
            .get(thread_id)
            .and_then(|slot| slot.active.as_ref())
        {
            Some(active) if active.is_running() => {
                active.cancel.cancel();
                Ok(true)
            }
            _ => Ok(false),
        }
    }

    pub fn is_busy(&self, thread_id: &ThreadId) -> Result<bool, ChatError> {
        let table = self.lock_sessions()?;
        Ok(table
            .slots
            .get(thread_id)
            .and_then(|slot| slot.active.as_ref())
            .is_some_and(ActiveTurn::is_running))
    }

    /// Full stored history of a thread.
    pub async fn history(&self, thread_id: &ThreadId) -> Result<Vec<ChatEvent>, ChatError> {
        self.store.load(thread_id).await
    }

    fn join_in_flight(
        &self,
        thread_id: &ThreadId,
        fingerprint: &TurnFingerprint,
    ) -> Result<Option<TurnHandle>, ChatError> {
        let table = self.lock_sessions()?;
        let Some(active) = table
            .slots
            .get(thread_id)
            .and_then(|slot| slot.active.as_ref())
            .filter(|active| active.is_running())
        else {
            return Ok(None);
        };

        if &active.fingerprint != fingerprint {
            tracing::info!(phase = "turn", event = "busy", thread_id = %thread_id);
            return Err(ChatError::busy(format!(
                "thread {thread_id} already has a turn in progress"
            )));
        }

        tracing::info!(phase = "turn", event = "joined", thread_id = %thread_id);
        Ok(Some(TurnHandle {
            thread_id: *thread_id,
            is_new_thread: false,
            joined: true,
            receiver: active.receiver.clone(),
            cancel: active.cancel.clone(),
            guard: None,
        }))
    }

    /// Marks the thread busy, re-checking under the lock for a racing request.
    fn claim(
        &self,
        thread_id: &ThreadId,
        fingerprint: TurnFingerprint,
        receiver: watch::Receiver<TurnSnapshot>,
        cancel: CancellationToken,
    ) -> Result<u64, ChatError> {
        let mut table = self.lock_sessions()?;
        let serial = table.next_serial;
        let slot = table.slots.entry(*thread_id).or_default();
        if slot.active.as_ref().is_some_and(ActiveTurn::is_running) {
            return Err(ChatError::busy(format!(
                "thread {thread_id} already has a turn in progress"
            )));
        }

        slot.active = Some(ActiveTurn {
            serial,
            fingerprint,
            receiver,
            cancel,
        });
        table.next_serial += 1;
        Ok(serial)
    }

    async fn load_session(
        &self,
        thread_id: &ThreadId,
        is_new_thread: bool,
    ) -> Result<Arc<Mutex<ThreadSession>>, ChatError> {
        if let Some(session) = self
            .lock_sessions()?
            .slots
            .get(thread_id)
            .and_then(|slot| slot.session.clone())
        {
            return Ok(session);
        }

        let events = if is_new_thread {
            Vec::new()
        } else {
            self.store.load(thread_id).await?
        };
        tracing::debug!(
            phase = "session",
            event = "loaded",
            thread_id = %thread_id,
            events = events.len(),
        );

        let mut table = self.lock_sessions()?;
        let slot = table.slots.entry(*thread_id).or_default();
        let session = slot
            .session
            .get_or_insert_with(|| Arc::new(Mutex::new(ThreadSession::new(*thread_id, events))))
            .clone();
        Ok(session)
    }

    fn lock_sessions(&self) -> Result<std::sync::MutexGuard<'_, SessionTable>, ChatError> {
        self.sessions
            .lock()
            .map_err(|_| ChatError::store("session table lock poisoned"))
    }
}

fn release(sessions: &SharedSessions, thread_id: &ThreadId, serial: u64) {
    let Ok(mut table) = sessions.lock() else {
        tracing::error!(phase = "session", event = "release_failed", thread_id = %thread_id);
        return;
    };
    if let Some(slot) = table.slots.get_mut(thread_id)
        && slot.active.as_ref().is_some_and(|active| active.serial == serial)
    {
        slot.active = None;
    }
}

pub struct ChatServiceBuilder {
    providers: Arc<ProviderRegistry>,
    tools: Arc<ToolRegistry>,
    approvals: Arc<dyn ApprovalHandler>,
    store: Arc<dyn ChatEventStore>,
    hooks: Arc<dyn TurnHooks>,
    tool_hooks: Arc<dyn ToolRuntimeHooks>,
    policy: ChatPolicy,
}

impl ChatServiceBuilder {
    pub fn new(providers: Arc<ProviderRegistry>) -> Self {
        Self {
            providers,
            tools: Arc::new(ToolRegistry::new()),
            approvals: Arc::new(AutoApprove),
            store: Arc::new(InMemoryChatEventStore::new()),
            hooks: Arc::new(NoopTurnHooks),
            tool_hooks: Arc::new(NoopToolRuntimeHooks),
            policy: ChatPolicy::default(),
        }
    }

    pub fn tools(mut self, tools: Arc<ToolRegistry>) -> Self {
        self.tools = tools;
        self
    }

    pub fn approvals(mut self, approvals: Arc<dyn ApprovalHandler>) -> Self {
        self.approvals = approvals;
        self
    }

    pub fn store(mut self, store: Arc<dyn ChatEventStore>) -> Self {
        self.store = store;
        self
    }

    pub fn hooks(mut self, hooks: Arc<dyn TurnHooks>) -> Self {
        self.hooks = hooks;
        self
    }

    pub fn tool_hooks(mut self, tool_hooks: Arc<dyn ToolRuntimeHooks>) -> Self {
        self.tool_hooks = tool_hooks;
        self
    }

    pub fn policy(mut self, policy: ChatPolicy) -> Self {
        self.policy = policy;
        self
    }

    pub fn build(self) -> ChatService {
        ChatService {
            providers: self.providers,
            tools: self.tools,
            approvals: self.approvals,
            store: self.store,
            hooks: self.hooks,
            tool_hooks: self.tool_hooks,
            policy: self.policy,
            sessions: Arc::new(Mutex::new(SessionTable::default())),
        }
    }
}
