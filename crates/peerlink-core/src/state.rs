//! Session State Machine
//!
//! Lifecycle of the link to the rendezvous service:
//!
//! ```text
//! Disconnected ──Connect──▶ Connecting ──Established──▶ Connected
//!                               │                          │
//!                         ConnectFailed               LinkFailed
//!                               ▼                          ▼
//!                             Error ◀──────────────────────┘
//! ```
//!
//! `Disconnect` is accepted from every state and always lands in
//! `Disconnected`. `Connect` is accepted from `Disconnected`, `Error` (retry)
//! and `Connecting` (restart); a connected session has to be torn down first.

use core::fmt;
use serde::{Deserialize, Serialize};

use crate::types::EndpointId;

// ----------------------------------------------------------------------------
// State and Events
// ----------------------------------------------------------------------------

/// Lifecycle state of the rendezvous session
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum SessionState {
    /// No rendezvous link
    Disconnected,
    /// Connect issued, waiting for the service
    Connecting,
    /// Link established; the service assigned `own_id`
    Connected { own_id: EndpointId },
    /// Connect failed or the link broke
    Error { cause: String },
}

/// Inputs that drive the session state machine
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SessionEvent {
    Connect,
    Established { own_id: EndpointId },
    ConnectFailed { cause: String },
    LinkFailed { cause: String },
    Disconnect,
}

impl SessionEvent {
    fn name(&self) -> &'static str {
        match self {
            SessionEvent::Connect => "Connect",
            SessionEvent::Established { .. } => "Established",
            SessionEvent::ConnectFailed { .. } => "ConnectFailed",
            SessionEvent::LinkFailed { .. } => "LinkFailed",
            SessionEvent::Disconnect => "Disconnect",
        }
    }
}

// ----------------------------------------------------------------------------
// State Machine Implementation
// ----------------------------------------------------------------------------

impl Default for SessionState {
    fn default() -> Self {
        SessionState::Disconnected
    }
}

impl SessionState {
    /// Name of the state for logging
    pub fn state_name(&self) -> &'static str {
        match self {
            SessionState::Disconnected => "Disconnected",
            SessionState::Connecting => "Connecting",
            SessionState::Connected { .. } => "Connected",
            SessionState::Error { .. } => "Error",
        }
    }

    pub fn is_connected(&self) -> bool {
        matches!(self, SessionState::Connected { .. })
    }

    /// Own endpoint id, present only while connected
    pub fn own_id(&self) -> Option<&EndpointId> {
        match self {
            SessionState::Connected { own_id } => Some(own_id),
            _ => None,
        }
    }

    /// Error cause, present only in the error state
    pub fn error_cause(&self) -> Option<&str> {
        match self {
            SessionState::Error { cause } => Some(cause),
            _ => None,
        }
    }

    /// Apply an event, returning the next state
    pub fn transition(self, event: SessionEvent) -> Result<SessionState, StateTransitionError> {
        let from_state = self.state_name();
        let event_name = event.name();

        let next = match (self, event) {
            (_, SessionEvent::Disconnect) => SessionState::Disconnected,

            (
                SessionState::Disconnected | SessionState::Error { .. } | SessionState::Connecting,
                SessionEvent::Connect,
            ) => SessionState::Connecting,

            (SessionState::Connecting, SessionEvent::Established { own_id }) => {
                SessionState::Connected { own_id }
            }
            (SessionState::Connecting, SessionEvent::ConnectFailed { cause }) => {
                SessionState::Error { cause }
            }

            (SessionState::Connected { .. }, SessionEvent::LinkFailed { cause }) => {
                SessionState::Error { cause }
            }

            _ => {
                return Err(StateTransitionError::InvalidTransition {
                    from_state,
                    event: event_name,
                })
            }
        };

        Ok(next)
    }
}

impl fmt::Display for SessionState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SessionState::Connected { own_id } => write!(f, "Connected as {}", own_id),
            SessionState::Error { cause } => write!(f, "Error: {}", cause),
            other => f.write_str(other.state_name()),
        }
    }
}

// ----------------------------------------------------------------------------
// Error Types
// ----------------------------------------------------------------------------

/// Rejected state machine input
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum StateTransitionError {
    InvalidTransition {
        from_state: &'static str,
        event: &'static str,
    },
}

impl fmt::Display for StateTransitionError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            StateTransitionError::InvalidTransition { from_state, event } => {
                write!(f, "Invalid transition from {} on event {}", from_state, event)
            }
        }
    }
}

impl std::error::Error for StateTransitionError {}

// ----------------------------------------------------------------------------
// Tests
// ----------------------------------------------------------------------------
