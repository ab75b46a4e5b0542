//! Turn events rendered as chat-completion chunks.

use std::convert::Infallible;
use std::time::Duration;

use axum::response::sse::{Event, KeepAlive, Sse};
use futures_util::{Stream, StreamExt, stream};
use schat::{TurnHandle, thread_id_banner};

use crate::wire::{ChatCompletion, ChatCompletionChunk, ChunkDelta, ResponseIdentity};

pub const KEEP_ALIVE_INTERVAL: Duration = Duration::from_secs(15);
pub const DONE_SENTINEL: &str = "[DONE]";

fn chunk_event(chunk: &ChatCompletionChunk) -> Event {
    Event::default()
        .json_data(chunk)
        .unwrap_or_else(|_| Event::default().comment("unencodable chunk"))
}

/// Opening delta: the assistant role, plus the thread banner for new threads.
fn opening_chunk(identity: &ResponseIdentity, turn: &TurnHandle) -> ChatCompletionChunk {
    let content = turn
        .is_new_thread()
        .then(|| thread_id_banner(&turn.thread_id()));
    identity.chunk(
        ChunkDelta {
            role: Some("assistant".to_string()),
            content,
        },
        None,
    )
}

/// Chunks for one turn: opening delta, one chunk per streamable event, a stop chunk.
pub fn turn_chunks(
    identity: ResponseIdentity,
    turn: TurnHandle,
) -> impl Stream<Item = ChatCompletionChunk> + Send {
    let opening = opening_chunk(&identity, &turn);
    let closing = identity.chunk(ChunkDelta::default(), Some("stop"));
    let events = turn.events();

    stream::once(async move { opening })
        .chain(events.filter_map(move |event| {
            let chunk = event.stream_representation().map(|content| {
                identity.chunk(
                    ChunkDelta {
                        role: None,
                        content: Some(content),
                    },
                    None,
                )
            });
            async move { chunk }
        }))
        .chain(stream::once(async move { closing }))
}

pub fn sse_response(
    identity: ResponseIdentity,
    turn: TurnHandle,
) -> Sse<impl Stream<Item = Result<Event, Infallible>> + Send> {
    tracing::debug!(
        phase = "http",
        event = "sse_open",
        thread_id = %turn.thread_id(),
        joined = turn.joined()
    );

    let events = turn_chunks(identity, turn)
        .map(|chunk| Ok::<_, Infallible>(chunk_event(&chunk)))
        .chain(stream::once(async {
            Ok::<_, Infallible>(Event::default().data(DONE_SENTINEL))
        }));

    Sse::new(events).keep_alive(KeepAlive::new().interval(KEEP_ALIVE_INTERVAL))
}

/// Waits for the turn and folds its representations into one completion.
pub async fn collect_completion(identity: ResponseIdentity, turn: TurnHandle) -> ChatCompletion {
    let mut content = String::new();
    if turn.is_new_thread() {
        content.push_str(&thread_id_banner(&turn.thread_id()));
    }
    for event in turn.collect().await {
        if let Some(representation) = event.stream_representation() {
            content.push_str(&representation);
        }
    }
    identity.completion(content)
}
