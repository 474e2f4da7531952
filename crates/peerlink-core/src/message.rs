//! Message model
//!
//! A [`Message`] is what the user sees: an immutable `{kind, content}` pair.
//! Binary payloads keep their data-URI form as content so they can be shown
//! or saved without re-encoding. [`LogEntry`] adds where the message came
//! from and when it was recorded.

use core::fmt;
use serde::{Deserialize, Serialize};

use crate::codec::DataUri;
use crate::errors::CodecError;
use crate::types::{EndpointId, Timestamp};

// ----------------------------------------------------------------------------
// Message
// ----------------------------------------------------------------------------

/// Classification of a payload
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum MessageKind {
    Text,
    Binary,
}

impl fmt::Display for MessageKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            MessageKind::Text => write!(f, "text"),
            MessageKind::Binary => write!(f, "binary"),
        }
    }
}

/// Immutable record of one sent or received payload
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Message {
    kind: MessageKind,
    content: String,
}

impl Message {
    pub fn new(kind: MessageKind, content: impl Into<String>) -> Self {
        Self {
            kind,
            content: content.into(),
        }
    }

    pub fn text(content: impl Into<String>) -> Self {
        Self::new(MessageKind::Text, content)
    }

    /// Binary message carrying the data URI form of `data`
    pub fn binary(data: &DataUri) -> Self {
        Self::new(MessageKind::Binary, data.to_string())
    }

    pub fn kind(&self) -> MessageKind {
        self.kind
    }

    pub fn content(&self) -> &str {
        &self.content
    }

    pub fn is_text(&self) -> bool {
        self.kind == MessageKind::Text
    }

    /// Parse the content of a binary message back into bytes and MIME type
    ///
    /// Returns `None` for text messages.
    pub fn data_uri(&self) -> Option<Result<DataUri, CodecError>> {
        match self.kind {
            MessageKind::Binary => Some(self.content.parse()),
            MessageKind::Text => None,
        }
    }
}

// ----------------------------------------------------------------------------
// Log Entry
// ----------------------------------------------------------------------------

/// Which way a logged message travelled
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum Direction {
    /// Received on a channel from `from`
    Inbound { from: EndpointId },
    /// Sent by the local endpoint to every open channel
    Outbound,
}

/// One record of the message log
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LogEntry {
    pub direction: Direction,
    pub message: Message,
    pub recorded_at: Timestamp,
}

impl LogEntry {
    pub fn new(direction: Direction, message: Message) -> Self {
        Self {
            direction,
            message,
            recorded_at: Timestamp::now(),
        }
    }

    pub fn is_inbound(&self) -> bool {
        matches!(self.direction, Direction::Inbound { .. })
    }
}

impl fmt::Display for LogEntry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let who = match &self.direction {
            Direction::Inbound { from } => from.as_str(),
            Direction::Outbound => "me",
        };
        match self.message.kind() {
            MessageKind::Text => write!(f, "[{}] {}", who, self.message.content()),
            MessageKind::Binary => match self.message.data_uri() {
                Some(Ok(uri)) => write!(f, "[{}] <{} {} bytes>", who, uri.mime(), uri.data().len()),
                _ => write!(f, "[{}] <binary {} chars>", who, self.message.content().len()),
            },
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_text_message_has_no_data_uri() {
        let message = Message::text("hello");
        assert!(message.is_text());
        assert!(message.data_uri().is_none());
    }

    #[test]
    fn test_binary_message_round_trips_bytes() {
        let uri = DataUri::new("image/png", vec![1, 2, 3]);
        let message = Message::binary(&uri);
        assert_eq!(message.kind(), MessageKind::Binary);
        assert_eq!(message.data_uri().unwrap().unwrap(), uri);
    }

    #[test]
    fn test_log_entry_display() {
        let entry = LogEntry::new(
            Direction::Inbound {
                from: EndpointId::new("abc123"),
            },
            Message::text("hi"),
        );
        assert_eq!(entry.to_string(), "[abc123] hi");

        let image = LogEntry::new(
            Direction::Outbound,
            Message::binary(&DataUri::new("image/gif", vec![0; 4])),
        );
        assert_eq!(image.to_string(), "[me] <image/gif 4 bytes>");
    }
}
