//! Conversation log: the append-only transcript of a session

use crate::types::Message;

/// Ordered, write-once record of every message in the session.
///
/// Callers keep `created_at` non-decreasing; the log does not re-check it.
#[derive(Debug, Clone, Default)]
pub struct ConversationLog {
    messages: Vec<Message>,
}

impl ConversationLog {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn append(&mut self, message: Message) {
        debug_assert!(
            self.messages
                .last()
                .is_none_or(|last| last.created_at <= message.created_at),
            "log timestamps must be non-decreasing"
        );
        self.messages.push(message);
    }

    pub fn all(&self) -> &[Message] {
        &self.messages
    }

    pub fn last(&self) -> Option<&Message> {
        self.messages.last()
    }

    pub fn len(&self) -> usize {
        self.messages.len()
    }

    pub fn is_empty(&self) -> bool {
        self.messages.is_empty()
    }

    /// Messages appended after the first `offset` entries
    pub fn since(&self, offset: usize) -> &[Message] {
        self.messages.get(offset..).unwrap_or(&[])
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::Sender;
    use chrono::{DateTime, Duration, Utc};

    fn msg(id: &str, ms: i64) -> Message {
        Message {
            id: id.to_string(),
            content: format!("content {id}"),
            sender: Sender::user(),
            created_at: DateTime::<Utc>::UNIX_EPOCH + Duration::milliseconds(ms),
        }
    }

    #[test]
    fn test_append_preserves_order() {
        let mut log = ConversationLog::new();
        log.append(msg("m1", 0));
        log.append(msg("m2", 0));
        log.append(msg("m3", 10));

        let ids: Vec<_> = log.all().iter().map(|m| m.id.as_str()).collect();
        assert_eq!(ids, vec!["m1", "m2", "m3"]);
        assert_eq!(log.last().unwrap().id, "m3");
        assert_eq!(log.len(), 3);
    }

    #[test]
    fn test_since() {
        let mut log = ConversationLog::new();
        assert!(log.since(0).is_empty());
        log.append(msg("m1", 0));
        log.append(msg("m2", 5));
        assert_eq!(log.since(1).len(), 1);
        assert_eq!(log.since(1)[0].id, "m2");
        assert!(log.since(10).is_empty());
    }
}
