//! Collaborator contracts
//!
//! The rendezvous service, the direct-channel transport and the file picker
//! are external to PeerLink. These traits are the seams the session layer
//! talks through; `peerlink-harness` ships an in-process implementation.
//!
//! Events travel over per-link and per-channel `mpsc` queues so the session
//! controller is the single subscriber of every event source.

use std::path::Path;
use std::sync::Arc;

use async_trait::async_trait;
use tokio::sync::mpsc;

use crate::config::RendezvousConfig;
use crate::errors::{RendezvousError, TransportError};
use crate::types::EndpointId;

// ----------------------------------------------------------------------------
// Direct Channels
// ----------------------------------------------------------------------------

/// Events a direct channel reports, delivered in order per channel
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ChannelEvent {
    /// The channel is ready to carry data
    Open,
    /// One wire frame arrived
    Data(Vec<u8>),
    /// The channel was closed by either side
    Close,
    /// The channel failed; it is unusable afterwards
    Error(String),
}

/// Send half of a direct channel to one remote endpoint
#[async_trait]
pub trait DataChannel: Send + Sync {
    /// Endpoint on the other side
    fn remote(&self) -> &EndpointId;

    /// Send one wire frame
    async fn send(&self, frame: &[u8]) -> Result<(), TransportError>;

    /// Close the channel; both sides observe [`ChannelEvent::Close`]
    async fn close(&self);
}

/// A channel that has been created but not necessarily opened yet
pub struct PendingChannel {
    pub channel: Arc<dyn DataChannel>,
    pub events: mpsc::Receiver<ChannelEvent>,
}

impl std::fmt::Debug for PendingChannel {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("PendingChannel")
            .field("remote", self.channel.remote())
            .finish_non_exhaustive()
    }
}

// ----------------------------------------------------------------------------
// Rendezvous
// ----------------------------------------------------------------------------

/// Events surfaced by an established rendezvous link
#[derive(Debug)]
pub enum RendezvousEvent {
    /// A remote endpoint dialed us
    InboundChannel(PendingChannel),
    /// The link broke asynchronously
    LinkError(String),
}

/// An established link to the rendezvous service
#[async_trait]
pub trait RendezvousLink: Send + Sync {
    /// Identifier the service assigned to this endpoint
    fn own_id(&self) -> &EndpointId;

    /// Request a new direct channel to `remote`
    async fn dial(&self, remote: &EndpointId) -> Result<PendingChannel, TransportError>;

    /// Tear the link down; open direct channels are left alone
    async fn disconnect(&self);
}

/// Result of a successful connect
pub struct RendezvousSession {
    pub link: Arc<dyn RendezvousLink>,
    pub events: mpsc::Receiver<RendezvousEvent>,
}

/// Entry point to a rendezvous service
#[async_trait]
pub trait Rendezvous: Send + Sync {
    /// Open a link and obtain an endpoint id
    async fn connect(&self, config: &RendezvousConfig) -> Result<RendezvousSession, RendezvousError>;
}

// ----------------------------------------------------------------------------
// File Input
// ----------------------------------------------------------------------------

/// Source of user-selected file content
#[async_trait]
pub trait FileSource: Send + Sync {
    /// Read the whole selection, one result per call
    async fn read(&self, path: &Path) -> std::io::Result<Vec<u8>>;
}

/// Reads selections from the local filesystem
#[derive(Debug, Clone, Copy, Default)]
pub struct FsFileSource;

#[async_trait]
impl FileSource for FsFileSource {
    async fn read(&self, path: &Path) -> std::io::Result<Vec<u8>> {
        tokio::fs::read(path).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_fs_file_source_reads_bytes() {
        let path = std::env::temp_dir().join(format!("peerlink-{}.bin", uuid::Uuid::new_v4()));
        tokio::fs::write(&path, [7u8, 8, 9]).await.unwrap();

        let data = FsFileSource.read(&path).await.unwrap();
        assert_eq!(data, vec![7, 8, 9]);

        tokio::fs::remove_file(&path).await.unwrap();
    }

    #[tokio::test]
    async fn test_fs_file_source_missing_file() {
        let path = std::env::temp_dir().join("peerlink-definitely-missing.bin");
        assert!(FsFileSource.read(&path).await.is_err());
    }
}
