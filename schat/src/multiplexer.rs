//! Single writer of a thread's history during one turn.
//!
//! Every committed event is appended to the session, persisted, and published
//! as part of a cumulative [`TurnSnapshot`]: the full set of events since the
//! turn began. Readers de-duplicate by event id with [`crate::EventMerger`].

use std::collections::HashSet;
use std::sync::{Arc, Mutex};

use scommon::ThreadId;
use tokio::sync::watch;

use crate::{ChatError, ChatEvent, ChatEventStore, ThreadSession, TurnHooks};

/// Everything a turn has produced so far.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct TurnSnapshot {
    pub events: Vec<ChatEvent>,
    pub done: bool,
}

pub struct TurnMultiplexer {
    thread_id: ThreadId,
    session: Arc<Mutex<ThreadSession>>,
    store: Arc<dyn ChatEventStore>,
    hooks: Arc<dyn TurnHooks>,
    emitted: HashSet<String>,
    snapshot: TurnSnapshot,
    sender: watch::Sender<TurnSnapshot>,
}

impl TurnMultiplexer {
    pub fn new(
        session: Arc<Mutex<ThreadSession>>,
        store: Arc<dyn ChatEventStore>,
        hooks: Arc<dyn TurnHooks>,
    ) -> Result<(Self, watch::Receiver<TurnSnapshot>), ChatError> {
        let thread_id = session
            .lock()
            .map_err(|_| ChatError::store("thread session lock poisoned"))?
            .thread_id;
        let (sender, receiver) = watch::channel(TurnSnapshot::default());

        Ok((
            Self {
                thread_id,
                session,
                store,
                hooks,
                emitted: HashSet::new(),
                snapshot: TurnSnapshot::default(),
                sender,
            },
            receiver,
        ))
    }

    pub fn thread_id(&self) -> &ThreadId {
        &self.thread_id
    }

    pub fn subscribe(&self) -> watch::Receiver<TurnSnapshot> {
        self.sender.subscribe()
    }

    pub fn events(&self) -> &[ChatEvent] {
        &self.snapshot.events
    }

    /// Records an event that belongs to the thread but not to the turn output.
    pub async fn append_history(&mut self, event: ChatEvent) -> Result<(), ChatError> {
        self.push_to_session(event.clone())?;
        self.store.save(&self.thread_id, event).await
    }

    /// Publishes an event of this turn.
    ///
    /// An id that was already committed is ignored; published payloads are
    /// never replaced.
    pub async fn commit(&mut self, event: ChatEvent) -> Result<(), ChatError> {
        if !self.emitted.insert(event.id.clone()) {
            tracing::warn!(
                phase = "turn",
                event = "duplicate_event",
                thread_id = %self.thread_id,
                event_id = %event.id,
                "ignoring re-commit of an already published event"
            );
            self.hooks.on_duplicate_event(&self.thread_id, &event.id);
            return Ok(());
        }

        self.push_to_session(event.clone())?;
        self.snapshot.events.push(event.clone());
        self.sender.send_replace(self.snapshot.clone());
        self.hooks.on_event_committed(&self.thread_id, &event);

        self.store.save(&self.thread_id, event).await
    }

    /// Marks the turn as complete; receivers stop after the final snapshot.
    pub fn finish(&mut self) {
        self.snapshot.done = true;
        self.sender.send_replace(self.snapshot.clone());
    }

    pub fn is_finished(&self) -> bool {
        self.snapshot.done
    }

    fn push_to_session(&self, event: ChatEvent) -> Result<(), ChatError> {
        self.session
            .lock()
            .map_err(|_| ChatError::store("thread session lock poisoned"))?
            .events
            .push(event);
        Ok(())
    }
}

impl Drop for TurnMultiplexer {
    fn drop(&mut self) {
        if !self.snapshot.done {
            self.finish();
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{InMemoryChatEventStore, NoopTurnHooks};

    fn multiplexer() -> (
        TurnMultiplexer,
        watch::Receiver<TurnSnapshot>,
        Arc<Mutex<ThreadSession>>,
        Arc<InMemoryChatEventStore>,
    ) {
        let session = Arc::new(Mutex::new(ThreadSession::new(ThreadId::new(), Vec::new())));
        let store = Arc::new(InMemoryChatEventStore::new());
        let (multiplexer, receiver) =
            TurnMultiplexer::new(session.clone(), store.clone(), Arc::new(NoopTurnHooks))
                .expect("multiplexer should build");
        (multiplexer, receiver, session, store)
    }

    #[tokio::test]
    async fn snapshots_are_cumulative_and_exclude_history_only_events() {
        let (mut multiplexer, receiver, session, store) = multiplexer();

        multiplexer
            .append_history(ChatEvent::user_text("question"))
            .await
            .expect("history append should work");
        multiplexer
            .commit(ChatEvent::assistant_text("one"))
            .await
            .expect("commit should work");
        multiplexer
            .commit(ChatEvent::assistant_text("two"))
            .await
            .expect("commit should work");

        let snapshot = receiver.borrow().clone();
        assert_eq!(snapshot.events.len(), 2);
        assert!(!snapshot.done);

        let thread_id = *multiplexer.thread_id();
        assert_eq!(session.lock().expect("session lock").events.len(), 3);
        assert_eq!(store.load(&thread_id).await.expect("load").len(), 3);

        multiplexer.finish();
        assert!(receiver.borrow().done);
    }

    #[tokio::test]
    async fn recommitting_an_id_is_ignored() {
        let (mut multiplexer, receiver, session, _store) = multiplexer();
        let event = ChatEvent::assistant_text("once");

        multiplexer.commit(event.clone()).await.expect("commit should work");

        let mut changed = event.clone();
        changed.kind = ChatEvent::assistant_text("twice").kind;
        multiplexer.commit(changed).await.expect("duplicate is not an error");

        assert_eq!(receiver.borrow().events, vec![event]);
        assert_eq!(session.lock().expect("session lock").events.len(), 1);
    }

    #[tokio::test]
    async fn dropping_the_writer_finishes_the_turn() {
        let (multiplexer, receiver, _session, _store) = multiplexer();
        drop(multiplexer);
        assert!(receiver.borrow().done);
    }
}
