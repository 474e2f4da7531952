//! Message Log
//!
//! Append-only record of every message sent or received during the process
//! lifetime. Entries keep arrival order; nothing is reordered, deduplicated,
//! edited or removed.

use std::sync::{Arc, PoisonError, RwLock};

use peerlink_core::{LogEntry, Message};

/// Shared, append-only message log
///
/// Cloning yields another handle to the same log.
#[derive(Debug, Clone, Default)]
pub struct MessageLog {
    entries: Arc<RwLock<Vec<LogEntry>>>,
}

impl MessageLog {
    pub fn new() -> Self {
        Self::default()
    }

    /// Append an entry, returning its position
    pub fn append(&self, entry: LogEntry) -> usize {
        let mut entries = self.entries.write().unwrap_or_else(PoisonError::into_inner);
        entries.push(entry);
        entries.len() - 1
    }

    /// Full ordered copy of the log
    pub fn snapshot(&self) -> Vec<LogEntry> {
        self.entries
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }

    /// Messages only, in log order
    pub fn messages(&self) -> Vec<Message> {
        self.entries
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .iter()
            .map(|entry| entry.message.clone())
            .collect()
    }

    pub fn last(&self) -> Option<LogEntry> {
        self.entries
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .last()
            .cloned()
    }

    pub fn len(&self) -> usize {
        self.entries.read().unwrap_or_else(PoisonError::into_inner).len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use peerlink_core::{Direction, EndpointId};

    #[test]
    fn test_append_preserves_order() {
        let log = MessageLog::new();
        assert!(log.is_empty());

        assert_eq!(log.append(LogEntry::new(Direction::Outbound, Message::text("one"))), 0);
        let from = EndpointId::new("abc123");
        assert_eq!(
            log.append(LogEntry::new(Direction::Inbound { from }, Message::text("two"))),
            1
        );
        log.append(LogEntry::new(Direction::Outbound, Message::text("two")));

        let contents: Vec<String> = log
            .messages()
            .iter()
            .map(|m| m.content().to_string())
            .collect();
        assert_eq!(contents, vec!["one", "two", "two"]);
        assert_eq!(log.len(), 3);
        assert!(log.last().unwrap().direction == Direction::Outbound);
    }

    #[test]
    fn test_snapshot_is_detached() {
        let log = MessageLog::new();
        log.append(LogEntry::new(Direction::Outbound, Message::text("a")));
        let snapshot = log.snapshot();
        log.append(LogEntry::new(Direction::Outbound, Message::text("b")));
        assert_eq!(snapshot.len(), 1);
        assert_eq!(log.len(), 2);
    }
}
