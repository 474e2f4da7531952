//! Error types for PeerLink
//!
//! Every failure in the session layer is recoverable: the caller may retry a
//! connect or dial, and per-channel failures never abort a broadcast. The
//! specific enums below are unified by [`PeerlinkError`].

use std::path::PathBuf;

use crate::state::StateTransitionError;

// ----------------------------------------------------------------------------
// Specific Error Types
// ----------------------------------------------------------------------------

/// Failures talking to the rendezvous service
#[derive(Debug, thiserror::Error)]
pub enum RendezvousError {
    #[error("Rendezvous service unreachable at {url}: {reason}")]
    Unreachable { url: String, reason: String },
    #[error("Rendezvous service refused the session: {reason}")]
    Refused { reason: String },
    #[error("Rendezvous link lost: {reason}")]
    LinkLost { reason: String },
}

/// Failures on a direct channel
#[derive(Debug, thiserror::Error)]
pub enum TransportError {
    #[error("Dial to {remote} failed: {reason}")]
    DialFailed { remote: String, reason: String },
    #[error("Channel to {remote} is closed")]
    ChannelClosed { remote: String },
    #[error("Send to {remote} failed: {reason}")]
    SendFailed { remote: String, reason: String },
}

/// Failures encoding or decoding payloads
#[derive(Debug, thiserror::Error)]
pub enum CodecError {
    #[error("Invalid data URI: {reason}")]
    InvalidDataUri { reason: String },
    #[error("Base64 decoding failed: {0}")]
    Base64(#[from] base64::DecodeError),
}

/// Failures of session lifecycle operations
#[derive(Debug, thiserror::Error)]
pub enum SessionError {
    #[error("Connect attempt was superseded by a newer connect or disconnect")]
    Superseded,
    #[error(transparent)]
    InvalidTransition(#[from] StateTransitionError),
}

/// Invalid configuration values
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("Invalid configuration: {reason}")]
    Invalid { reason: String },
    #[error("Invalid rendezvous URL: {0}")]
    Url(#[from] url::ParseError),
}

// ----------------------------------------------------------------------------
// Unified Error
// ----------------------------------------------------------------------------

/// Core error type for PeerLink
#[derive(Debug, thiserror::Error)]
pub enum PeerlinkError {
    #[error("Rendezvous error: {0}")]
    Rendezvous(#[from] RendezvousError),

    #[error("Transport error: {0}")]
    Transport(#[from] TransportError),

    #[error("Codec error: {0}")]
    Codec(#[from] CodecError),

    #[error("Session error: {0}")]
    Session(#[from] SessionError),

    #[error("Configuration error: {0}")]
    Config(#[from] ConfigError),

    #[error("Failed to read {path}: {source}")]
    FileRead {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
}

impl From<StateTransitionError> for PeerlinkError {
    fn from(err: StateTransitionError) -> Self {
        PeerlinkError::Session(SessionError::InvalidTransition(err))
    }
}

pub type PeerlinkResult<T> = core::result::Result<T, PeerlinkError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_messages_carry_context() {
        let err: PeerlinkError = RendezvousError::Unreachable {
            url: "wss://example:443/".to_string(),
            reason: "connection refused".to_string(),
        }
        .into();
        let text = err.to_string();
        assert!(text.contains("wss://example:443/"));
        assert!(text.contains("connection refused"));
    }

    #[test]
    fn test_transport_error_conversion() {
        let err: PeerlinkError = TransportError::ChannelClosed {
            remote: "abc123".to_string(),
        }
        .into();
        assert!(matches!(err, PeerlinkError::Transport(_)));
    }
}
