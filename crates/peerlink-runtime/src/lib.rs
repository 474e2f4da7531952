//! PeerLink Runtime
//!
//! The session layer of PeerLink:
//! - `SessionController`: rendezvous lifecycle, dialing, per-channel event wiring
//! - `ChannelRegistry`: open direct channels keyed by remote endpoint
//! - `MessageLog`: append-only record of sent and received messages
//! - `OutboundDispatcher`: fan-out of one payload to every open channel
//!
//! `peerlink-core` holds the types and collaborator traits these build on.

pub mod builder;
pub mod context;
pub mod dispatcher;
pub mod managers;
pub mod session;

pub use builder::PeerBuilder;
pub use context::PeerContext;
pub use dispatcher::{BroadcastReport, OutboundDispatcher, SendFailure};
pub use managers::*;
pub use session::SessionController;

// Re-export core types for convenience
pub use peerlink_core::{
    AppEvent, ChannelConfig, ChannelId, DataUri, Direction, EndpointId, Envelope, LogEntry,
    Message, MessageKind, PeerConfig, PeerlinkError, PeerlinkResult, RawInput, RendezvousConfig,
    SessionState,
};
