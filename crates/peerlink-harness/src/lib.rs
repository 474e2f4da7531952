//! PeerLink Harness
//!
//! An in-process stand-in for the external collaborators of PeerLink: a
//! rendezvous hub that assigns endpoint ids and brokers dials, and paired
//! local channels that honour the open/data/close/error event contract.
//! Used by integration tests and the CLI demo; it can also simulate service
//! outages and broken links.

pub mod local;

pub use local::{LocalChannel, LocalLink, LocalRendezvous, LocalRendezvousConfig};
