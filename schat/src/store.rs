//! Append-only chat event storage: an in-memory map and a JSONL directory.

use std::collections::HashMap;
use std::fs::{self, OpenOptions};
use std::io::Write;
use std::path::{Path, PathBuf};
use std::sync::Mutex;

use scommon::{BoxFuture, ThreadId};

use crate::{ChatError, ChatEvent};

pub type ChatFuture<'a, T> = BoxFuture<'a, T>;

/// Persistence collaborator for thread histories. Events are only ever appended.
pub trait ChatEventStore: Send + Sync {
    fn save<'a>(
        &'a self,
        thread_id: &'a ThreadId,
        event: ChatEvent,
    ) -> ChatFuture<'a, Result<(), ChatError>>;

    fn load<'a>(&'a self, thread_id: &'a ThreadId)
    -> ChatFuture<'a, Result<Vec<ChatEvent>, ChatError>>;
}

#[derive(Debug, Default)]
pub struct InMemoryChatEventStore {
    threads: Mutex<HashMap<ThreadId, Vec<ChatEvent>>>,
}

impl InMemoryChatEventStore {
    pub fn new() -> Self {
        Self::default()
    }
}

impl ChatEventStore for InMemoryChatEventStore {
    fn save<'a>(
        &'a self,
        thread_id: &'a ThreadId,
        event: ChatEvent,
    ) -> ChatFuture<'a, Result<(), ChatError>> {
        Box::pin(async move {
            let mut threads = self
                .threads
                .lock()
                .map_err(|_| ChatError::store("chat event store lock poisoned"))?;

            threads.entry(*thread_id).or_default().push(event);
            Ok(())
        })
    }

    fn load<'a>(
        &'a self,
        thread_id: &'a ThreadId,
    ) -> ChatFuture<'a, Result<Vec<ChatEvent>, ChatError>> {
        Box::pin(async move {
            let threads = self
                .threads
                .lock()
                .map_err(|_| ChatError::store("chat event store lock poisoned"))?;

            Ok(threads.get(thread_id).cloned().unwrap_or_default())
        })
    }
}

/// One `<thread_id>.jsonl` file per thread, one event per line.
#[derive(Debug)]
pub struct JsonlChatEventStore {
    root: PathBuf,
    lock: Mutex<()>,
}

impl JsonlChatEventStore {
    pub fn new(root: impl AsRef<Path>) -> Result<Self, ChatError> {
        let root = root.as_ref().to_path_buf();
        fs::create_dir_all(&root).map_err(|error| {
            ChatError::store(format!("failed to create chat history directory: {error}"))
        })?;
        Ok(Self {
            root,
            lock: Mutex::new(()),
        })
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    fn thread_path(&self, thread_id: &ThreadId) -> PathBuf {
        self.root.join(format!("{thread_id}.jsonl"))
    }

    fn append_line(&self, thread_id: &ThreadId, event: &ChatEvent) -> Result<(), ChatError> {
        let mut line = serde_json::to_string(event).map_err(|error| {
            ChatError::store(format!("failed to serialize chat event: {error}"))
        })?;
        line.push('\n');

        let mut file = OpenOptions::new()
            .create(true)
            .append(true)
            .open(self.thread_path(thread_id))
            .map_err(|error| ChatError::store(format!("failed to open thread file: {error}")))?;
        file.write_all(line.as_bytes())
            .map_err(|error| ChatError::store(format!("failed to append chat event: {error}")))
    }

    fn read_lines(&self, thread_id: &ThreadId) -> Result<Vec<ChatEvent>, ChatError> {
        let path = self.thread_path(thread_id);
        if !path.exists() {
            return Ok(Vec::new());
        }

        let contents = fs::read_to_string(&path)
            .map_err(|error| ChatError::store(format!("failed to read thread file: {error}")))?;

        contents
            .lines()
            .filter(|line| !line.trim().is_empty())
            .enumerate()
            .map(|(number, line)| {
                serde_json::from_str::<ChatEvent>(line).map_err(|error| {
                    ChatError::store(format!(
                        "failed to decode chat event on line {}: {error}",
                        number + 1
                    ))
                })
            })
            .collect()
    }
}

impl ChatEventStore for JsonlChatEventStore {
    fn save<'a>(
        &'a self,
        thread_id: &'a ThreadId,
        event: ChatEvent,
    ) -> ChatFuture<'a, Result<(), ChatError>> {
        Box::pin(async move {
            let _guard = self
                .lock
                .lock()
                .map_err(|_| ChatError::store("jsonl store lock poisoned"))?;
            self.append_line(thread_id, &event)
        })
    }

    fn load<'a>(
        &'a self,
        thread_id: &'a ThreadId,
    ) -> ChatFuture<'a, Result<Vec<ChatEvent>, ChatError>> {
        Box::pin(async move {
            let _guard = self
                .lock
                .lock()
                .map_err(|_| ChatError::store("jsonl store lock poisoned"))?;
            self.read_lines(thread_id)
        })
    }
}
