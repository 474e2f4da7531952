//! Application events
//!
//! State changes the session layer publishes for presentation layers. A UI
//! observes these; it never drives the session through them.

use core::fmt;

use crate::message::LogEntry;
use crate::state::SessionState;
use crate::types::{ChannelId, EndpointId};

/// Events sent from the session layer to observers
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum AppEvent {
    /// The rendezvous session moved to a new state
    SessionStateChanged(SessionState),
    /// A direct channel opened and joined the registry
    ChannelOpened {
        channel: ChannelId,
        remote: EndpointId,
    },
    /// A direct channel left the registry
    ChannelClosed {
        channel: ChannelId,
        remote: EndpointId,
        reason: Option<String>,
    },
    /// A message was appended to the log
    MessageLogged(LogEntry),
}

impl fmt::Display for AppEvent {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            AppEvent::SessionStateChanged(state) => write!(f, "session: {}", state),
            AppEvent::ChannelOpened { channel, remote } => {
                write!(f, "channel {} to {} opened", channel, remote)
            }
            AppEvent::ChannelClosed {
                channel,
                remote,
                reason: Some(reason),
            } => write!(f, "channel {} to {} closed: {}", channel, remote, reason),
            AppEvent::ChannelClosed {
                channel, remote, ..
            } => write!(f, "channel {} to {} closed", channel, remote),
            AppEvent::MessageLogged(entry) => write!(f, "{}", entry),
        }
    }
}
