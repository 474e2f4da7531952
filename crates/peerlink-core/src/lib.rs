//! PeerLink Core
//!
//! Foundational types for PeerLink, a peer-to-peer messenger where endpoints
//! meet through a rendezvous service and then exchange text and images over
//! direct data channels. This crate holds the pieces that do no I/O of their
//! own: identifiers, configuration, the payload codec, the message model, the
//! session state machine and the collaborator traits the runtime drives.

// ----------------------------------------------------------------------------
// Module Declarations
// ----------------------------------------------------------------------------

pub mod codec;
pub mod config;
pub mod errors;
pub mod events;
pub mod message;
pub mod state;
pub mod transport;
pub mod types;

// ----------------------------------------------------------------------------
// Public API
// ----------------------------------------------------------------------------

pub use codec::{decode, decode_frame, encode, DataUri, Envelope, RawInput};
pub use config::{ChannelConfig, PeerConfig, RendezvousConfig};
pub use errors::{
    CodecError, ConfigError, PeerlinkError, PeerlinkResult, RendezvousError, SessionError,
    TransportError,
};
pub use events::AppEvent;
pub use message::{Direction, LogEntry, Message, MessageKind};
pub use state::{SessionEvent, SessionState, StateTransitionError};
pub use transport::{
    ChannelEvent, DataChannel, FileSource, FsFileSource, PendingChannel, Rendezvous,
    RendezvousEvent, RendezvousLink, RendezvousSession,
};
pub use types::{ChannelId, EndpointId, Timestamp};
