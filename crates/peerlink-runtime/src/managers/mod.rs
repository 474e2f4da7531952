//! Shared state managers for the PeerLink runtime
//!
//! The channel registry and message log are the two pieces of process-wide
//! mutable state. Both are cheap cloneable handles safe to use from any task.

pub mod log;
pub mod registry;

pub use log::MessageLog;
pub use registry::{Channel, ChannelOrigin, ChannelRegistry};
