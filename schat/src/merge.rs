//! Receiver-side materialization of cumulative turn snapshots.

use std::collections::HashSet;

use crate::ChatEvent;

/// Set-differences each snapshot against the events already materialized.
///
/// Snapshots carry every event since the turn began, so repeating one is a
/// no-op and only unseen ids are appended.
#[derive(Debug, Default)]
pub struct EventMerger {
    seen: HashSet<String>,
    events: Vec<ChatEvent>,
}

impl EventMerger {
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns the events of `snapshot` not seen before, in snapshot order.
    pub fn merge(&mut self, snapshot: &[ChatEvent]) -> Vec<ChatEvent> {
        let mut fresh = Vec::new();
        for event in snapshot {
            if self.seen.insert(event.id.clone()) {
                self.events.push(event.clone());
                fresh.push(event.clone());
            }
        }
        fresh
    }

    pub fn events(&self) -> &[ChatEvent] {
        &self.events
    }

    pub fn has_seen(&self, id: &str) -> bool {
        self.seen.contains(id)
    }

    pub fn into_events(self) -> Vec<ChatEvent> {
        self.events
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn ids(events: &[ChatEvent]) -> Vec<&str> {
        events.iter().map(|event| event.id.as_str()).collect()
    }

    #[test]
    fn repeated_snapshots_materialize_each_event_once() {
        let a = ChatEvent::assistant_text("a");
        let b = ChatEvent::assistant_text("b");
        let c = ChatEvent::assistant_text("c");

        let mut merger = EventMerger::new();
        assert_eq!(merger.merge(&[a.clone()]).len(), 1);
        assert_eq!(merger.merge(&[a.clone()]).len(), 0);
        assert_eq!(merger.merge(&[a.clone(), b.clone()]), vec![b.clone()]);
        assert_eq!(merger.merge(&[a.clone(), b.clone(), c.clone()]), vec![c.clone()]);
        assert_eq!(merger.merge(&[a.clone(), b.clone(), c.clone()]).len(), 0);

        assert_eq!(ids(merger.events()), vec![a.id.as_str(), b.id.as_str(), c.id.as_str()]);
    }

    #[test]
    fn outcome_is_independent_of_repetition_pattern() {
        let events: Vec<ChatEvent> = (0..4)
            .map(|n| ChatEvent::assistant_text(format!("event {n}")))
            .collect();
        let snapshots: Vec<Vec<ChatEvent>> =
            (1..=events.len()).map(|n| events[..n].to_vec()).collect();

        let mut once = EventMerger::new();
        for snapshot in &snapshots {
            once.merge(snapshot);
        }

        let mut repeated = EventMerger::new();
        for snapshot in &snapshots {
            repeated.merge(snapshot);
            repeated.merge(snapshot);
            repeated.merge(&snapshots[0]);
        }

        let mut skipping = EventMerger::new();
        skipping.merge(&snapshots[1]);
        skipping.merge(&snapshots[3]);

        assert_eq!(once.events(), repeated.events());
        assert_eq!(once.events(), skipping.events());
        assert_eq!(once.into_events(), events);
    }
}
