//! Thread identity resolution and new-message windowing over inbound requests.

use scommon::ThreadId;
use sprovider::Role;

use crate::InboundMessage;

pub const THREAD_ID_MARKER: &str = "thread_id: ";
pub const USER_PREAMBLE_MARKER: &str = "The user has asked:";

/// Finds the first `thread_id: <uuid>` carried by an assistant message.
///
/// User-authored text is never scanned, so a pasted marker cannot hijack
/// another thread.
pub fn extract_thread_id(messages: &[InboundMessage]) -> Option<ThreadId> {
    messages
        .iter()
        .filter(|message| message.role == Role::Assistant)
        .find_map(|message| find_marker(&message.text))
}

fn find_marker(text: &str) -> Option<ThreadId> {
    text.match_indices(THREAD_ID_MARKER).find_map(|(offset, _)| {
        let start = offset + THREAD_ID_MARKER.len();
        text.get(start..start + ThreadId::TEXT_LEN)
            .and_then(ThreadId::parse)
    })
}

/// Returns the user messages sent after the last assistant message.
pub fn new_user_messages(messages: &[InboundMessage]) -> Vec<String> {
    let mut pending = Vec::new();
    for message in messages {
        match message.role {
            Role::Assistant => pending.clear(),
            Role::User => pending.push(strip_preamble(&message.text)),
            _ => {}
        }
    }
    pending
}

/// Some editors wrap the question in context; only the trailing question is kept.
pub fn strip_preamble(text: &str) -> String {
    match text.rsplit_once(USER_PREAMBLE_MARKER) {
        Some((_, question)) => question.trim().to_string(),
        None => text.to_string(),
    }
}

pub fn thread_id_banner(thread_id: &ThreadId) -> String {
    format!("{THREAD_ID_MARKER}{thread_id}\n\n")
}

#[cfg(test)]
mod tests {
    use super::*;

    fn user(text: &str) -> InboundMessage {
        InboundMessage::new(Role::User, text)
    }

    fn assistant(text: &str) -> InboundMessage {
        InboundMessage::new(Role::Assistant, text)
    }

    #[test]
    fn thread_id_is_read_from_assistant_text_only() {
        let id = ThreadId::new();
        let banner = format!("thread_id: {id}\n\nSure thing");

        let resolved = extract_thread_id(&[user("hi"), assistant(&banner)]);
        assert_eq!(resolved, Some(id));

        assert_eq!(extract_thread_id(&[user(&banner)]), None);
    }

    #[test]
    fn malformed_marker_is_skipped_for_a_later_valid_one() {
        let id = ThreadId::new();
        let text = format!("thread_id: not-a-uuid and later thread_id: {id}");
        assert_eq!(extract_thread_id(&[assistant(&text)]), Some(id));
        assert_eq!(extract_thread_id(&[assistant("thread_id: 1234")]), None);
    }

    #[test]
    fn first_assistant_match_wins() {
        let first = ThreadId::new();
        let second = ThreadId::new();
        let messages = [
            assistant(&thread_id_banner(&first)),
            user("again"),
            assistant(&thread_id_banner(&second)),
        ];
        assert_eq!(extract_thread_id(&messages), Some(first));
    }

    #[test]
    fn new_messages_reset_at_each_assistant_message() {
        let messages = [user("A"), assistant("R1"), user("B"), user("C")];
        assert_eq!(new_user_messages(&messages), vec!["B", "C"]);

        assert_eq!(new_user_messages(&[assistant("R1"), user("A")]), vec!["A"]);
        assert!(new_user_messages(&[user("A"), assistant("R1")]).is_empty());
        assert!(new_user_messages(&[]).is_empty());
        assert_eq!(new_user_messages(&[user("A"), user("B")]), vec!["A", "B"]);
    }

    #[test]
    fn system_messages_do_not_break_the_window() {
        let messages = [
            InboundMessage::new(Role::System, "be brief"),
            user("A"),
            InboundMessage::new(Role::System, "late"),
            user("B"),
        ];
        assert_eq!(new_user_messages(&messages), vec!["A", "B"]);
    }

    #[test]
    fn editor_preamble_is_stripped() {
        let text = "File: main.rs\nThe user has asked:\n  why does this panic?  ";
        assert_eq!(strip_preamble(text), "why does this panic?");
        assert_eq!(strip_preamble("plain question"), "plain question");
    }
}
