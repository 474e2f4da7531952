//! Channel Registry
//!
//! Tracks the direct channels that are currently open, keyed by remote
//! endpoint. A remote may have several channels at once (for example one we
//! dialed and one it dialed), so each key maps to a small set of handles.
//!
//! Enumeration always works on a point-in-time snapshot: a channel removed
//! before the snapshot is taken is never visited, and channels closing while
//! a broadcast walks the snapshot do not disturb it.

use std::fmt;
use std::sync::Arc;

use dashmap::DashMap;
use smallvec::SmallVec;

use peerlink_core::{ChannelId, DataChannel, EndpointId, TransportError};

// ----------------------------------------------------------------------------
// Channel Handle
// ----------------------------------------------------------------------------

/// How a channel came into existence
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ChannelOrigin {
    /// We dialed the remote
    Dialed,
    /// The remote dialed us
    Inbound,
}

/// Cloneable handle to one direct channel
#[derive(Clone)]
pub struct Channel {
    id: ChannelId,
    origin: ChannelOrigin,
    link: Arc<dyn DataChannel>,
}

impl Channel {
    pub fn new(link: Arc<dyn DataChannel>, origin: ChannelOrigin) -> Self {
        Self {
            id: ChannelId::new(),
            origin,
            link,
        }
    }

    pub fn id(&self) -> ChannelId {
        self.id
    }

    pub fn remote(&self) -> &EndpointId {
        self.link.remote()
    }

    pub fn origin(&self) -> ChannelOrigin {
        self.origin
    }

    /// Send one wire frame over the channel
    pub async fn send(&self, frame: &[u8]) -> Result<(), TransportError> {
        self.link.send(frame).await
    }

    pub async fn close(&self) {
        self.link.close().await
    }
}

impl fmt::Debug for Channel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Channel")
            .field("id", &self.id)
            .field("remote", self.remote())
            .field("origin", &self.origin)
            .finish()
    }
}

impl PartialEq for Channel {
    fn eq(&self, other: &Self) -> bool {
        self.id == other.id
    }
}

impl Eq for Channel {}

// ----------------------------------------------------------------------------
// Registry
// ----------------------------------------------------------------------------

type ChannelSet = SmallVec<[Channel; 2]>;

/// Concurrent map from remote endpoint to its open channels
///
/// Cloning yields another handle to the same registry.
#[derive(Clone, Default)]
pub struct ChannelRegistry {
    channels: Arc<DashMap<EndpointId, ChannelSet>>,
}

impl ChannelRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Insert an open channel; returns false if it was already present
    pub fn add(&self, channel: Channel) -> bool {
        let mut set = self.channels.entry(channel.remote().clone()).or_default();
        if set.iter().any(|c| c.id == channel.id) {
            return false;
        }
        set.push(channel);
        true
    }

    /// Remove a channel; returns false if it was not registered
    pub fn remove(&self, channel: &Channel) -> bool {
        self.remove_by_id(channel.remote(), channel.id())
    }

    /// Remove a channel by remote and id
    pub fn remove_by_id(&self, remote: &EndpointId, id: ChannelId) -> bool {
        let removed = match self.channels.get_mut(remote) {
            Some(mut set) => {
                let before = set.len();
                set.retain(|c| c.id != id);
                set.len() != before
            }
            None => false,
        };
        self.channels.remove_if(remote, |_, set| set.is_empty());
        removed
    }

    /// Point-in-time copy of every registered channel
    pub fn snapshot(&self) -> Vec<Channel> {
        self.channels
            .iter()
            .flat_map(|entry| entry.value().to_vec())
            .collect()
    }

    /// Visit every channel of the current snapshot
    pub fn for_each<F>(&self, mut f: F)
    where
        F: FnMut(&Channel),
    {
        for channel in self.snapshot() {
            f(&channel);
        }
    }

    /// All open channels to one remote (possibly empty)
    pub fn channels_for(&self, remote: &EndpointId) -> Vec<Channel> {
        self.channels
            .get(remote)
            .map(|set| set.to_vec())
            .unwrap_or_default()
    }

    pub fn contains(&self, id: ChannelId) -> bool {
        self.channels
            .iter()
            .any(|entry| entry.value().iter().any(|c| c.id == id))
    }

    /// Remotes with at least one open channel
    pub fn remotes(&self) -> Vec<EndpointId> {
        let mut remotes: Vec<EndpointId> =
            self.channels.iter().map(|entry| entry.key().clone()).collect();
        remotes.sort();
        remotes
    }

    /// Number of open channels across all remotes
    pub fn len(&self) -> usize {
        self.channels.iter().map(|entry| entry.value().len()).sum()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

impl fmt::Debug for ChannelRegistry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ChannelRegistry")
            .field("remotes", &self.remotes())
            .field("channels", &self.len())
            .finish()
    }
}

// ----------------------------------------------------------------------------
// Tests
// ----------------------------------------------------------------------------

#[cfg(test)]
pub(crate) mod tests {
    use super::*;
    use async_trait::async_trait;
    use std::sync::Mutex;

    #[derive(Clone, Copy, PartialEq, Eq)]
    enum Behaviour {
        Accept,
        Fail,
        Stall,
    }

    /// Channel stub that records frames and can be told to fail or hang
    pub(crate) struct RecordingChannel {
        remote: EndpointId,
        pub(crate) sent: Mutex<Vec<Vec<u8>>>,
        behaviour: Behaviour,
    }

    impl RecordingChannel {
        fn with_behaviour(remote: &str, behaviour: Behaviour) -> Arc<Self> {
            Arc::new(Self {
                remote: EndpointId::new(remote),
                sent: Mutex::new(Vec::new()),
                behaviour,
            })
        }

        pub(crate) fn new(remote: &str) -> Arc<Self> {
            Self::with_behaviour(remote, Behaviour::Accept)
        }

        pub(crate) fn failing(remote: &str) -> Arc<Self> {
            Self::with_behaviour(remote, Behaviour::Fail)
        }

        /// Never completes a send, like a peer that stopped reading
        pub(crate) fn stalled(remote: &str) -> Arc<Self> {
            Self::with_behaviour(remote, Behaviour::Stall)
        }

        pub(crate) fn frames(&self) -> Vec<Vec<u8>> {
            self.sent.lock().unwrap().clone()
        }
    }

    #[async_trait]
    impl DataChannel for RecordingChannel {
        fn remote(&self) -> &EndpointId {
            &self.remote
        }

        async fn send(&self, frame: &[u8]) -> Result<(), TransportError> {
            match self.behaviour {
                Behaviour::Accept => {}
                Behaviour::Fail => {
                    return Err(TransportError::ChannelClosed {
                        remote: self.remote.to_string(),
                    })
                }
                Behaviour::Stall => std::future::pending::<()>().await,
            }
            self.sent.lock().unwrap().push(frame.to_vec());
            Ok(())
        }

        async fn close(&self) {}
    }

    fn channel(remote: &str) -> Channel {
        Channel::new(RecordingChannel::new(remote), ChannelOrigin::Dialed)
    }

    #[test]
    fn test_add_and_remove() {
        let registry = ChannelRegistry::new();
        let a = channel("abc123");

        assert!(registry.is_empty());
        assert!(registry.add(a.clone()));
        assert!(!registry.add(a.clone()));
        assert_eq!(registry.len(), 1);
        assert!(registry.contains(a.id()));

        assert!(registry.remove(&a));
        assert!(!registry.remove(&a));
        assert!(registry.is_empty());
        assert!(registry.remotes().is_empty());
    }

    #[test]
    fn test_multiple_channels_per_remote() {
        let registry = ChannelRegistry::new();
        let dialed = channel("abc123");
        let inbound = Channel::new(RecordingChannel::new("abc123"), ChannelOrigin::Inbound);
        let other = channel("xyz789");

        registry.add(dialed.clone());
        registry.add(inbound.clone());
        registry.add(other);

        let set = registry.channels_for(&EndpointId::new("abc123"));
        assert_eq!(set.len(), 2);
        assert!(set.contains(&dialed));
        assert!(set.contains(&inbound));
        assert_eq!(registry.len(), 3);

        registry.remove(&dialed);
        assert_eq!(registry.channels_for(&EndpointId::new("abc123")), vec![inbound]);
        assert_eq!(
            registry.remotes(),
            vec![EndpointId::new("abc123"), EndpointId::new("xyz789")]
        );
    }

    #[test]
    fn test_unknown_remote_lookup_is_empty() {
        let registry = ChannelRegistry::new();
        assert!(registry.channels_for(&EndpointId::new("nobody")).is_empty());
        assert!(!registry.remove_by_id(&EndpointId::new("nobody"), ChannelId::new()));
    }

    #[test]
    fn test_snapshot_is_stable_under_mutation() {
        let registry = ChannelRegistry::new();
        let a = channel("abc123");
        let b = channel("xyz789");
        registry.add(a.clone());
        registry.add(b.clone());

        let mut visited = 0;
        registry.for_each(|c| {
            // Removing while iterating must not deadlock or skip the snapshot
            registry.remove(c);
            visited += 1;
        });

        assert_eq!(visited, 2);
        assert!(registry.is_empty());
    }

    #[test]
    fn test_clones_share_state() {
        let registry = ChannelRegistry::new();
        let handle = registry.clone();
        handle.add(channel("abc123"));
        assert_eq!(registry.len(), 1);
    }
}
