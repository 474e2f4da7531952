//! Local Rendezvous
//!
//! Deterministic in-process rendezvous service. Every endpoint connected to
//! the same [`LocalRendezvous`] can dial every other one; a dial creates a
//! pair of [`LocalChannel`]s whose event queues both receive `Open` straight
//! away. Closing either end delivers `Close` to both, and so does dropping
//! an end that was never closed.

use std::collections::{HashMap, VecDeque};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use async_trait::async_trait;
use tokio::runtime::Handle;
use tokio::sync::mpsc::error::TrySendError;
use tokio::sync::{mpsc, Mutex};
use tracing::{debug, info, warn};
use uuid::Uuid;

use peerlink_core::{
    ChannelEvent, DataChannel, EndpointId, PendingChannel, Rendezvous, RendezvousConfig,
    RendezvousError, RendezvousEvent, RendezvousLink, RendezvousSession, TransportError,
};

// ----------------------------------------------------------------------------
// Configuration
// ----------------------------------------------------------------------------

/// Address and queue sizes of the local hub
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LocalRendezvousConfig {
    /// Host the hub answers to
    pub host: String,
    /// Port the hub answers to
    pub port: u16,
    /// Capacity of each channel end's event queue
    pub channel_buffer_size: usize,
    /// Capacity of each endpoint's rendezvous event queue
    pub link_buffer_size: usize,
}

impl Default for LocalRendezvousConfig {
    fn default() -> Self {
        Self {
            host: "localhost".to_string(),
            port: 9000,
            channel_buffer_size: 128,
            link_buffer_size: 32,
        }
    }
}

// ----------------------------------------------------------------------------
// Hub State
// ----------------------------------------------------------------------------

/// Both ends of one local channel
struct ChannelPair {
    dialer: EndpointId,
    listener: EndpointId,
    to_dialer: mpsc::Sender<ChannelEvent>,
    to_listener: mpsc::Sender<ChannelEvent>,
    closed: AtomicBool,
}

impl ChannelPair {
    fn is_closed(&self) -> bool {
        self.closed.load(Ordering::SeqCst)
    }

    fn connects(&self, a: &EndpointId, b: &EndpointId) -> bool {
        (&self.dialer == a && &self.listener == b) || (&self.dialer == b && &self.listener == a)
    }

    /// Mark closed and deliver `event` to both ends, once
    async fn shut(&self, event: ChannelEvent) -> bool {
        if self.closed.swap(true, Ordering::SeqCst) {
            return false;
        }
        // Either end may already have stopped listening
        let _ = self.to_dialer.send(event.clone()).await;
        let _ = self.to_listener.send(event).await;
        true
    }

    /// Mark closed from a synchronous context, delivering `Close` to both ends
    fn abandon(&self) -> bool {
        if self.closed.swap(true, Ordering::SeqCst) {
            return false;
        }
        for queue in [self.to_dialer.clone(), self.to_listener.clone()] {
            if let Err(TrySendError::Full(event)) = queue.try_send(ChannelEvent::Close) {
                // Queue is backed up; deliver once the reader catches up
                if let Ok(runtime) = Handle::try_current() {
                    runtime.spawn(async move {
                        let _ = queue.send(event).await;
                    });
                }
            }
        }
        true
    }
}

#[derive(Default)]
struct HubState {
    available: bool,
    endpoints: HashMap<EndpointId, mpsc::Sender<RendezvousEvent>>,
    pending_ids: VecDeque<EndpointId>,
    pairs: Vec<Arc<ChannelPair>>,
}

impl HubState {
    fn prune_pairs(&mut self) {
        self.pairs.retain(|pair| !pair.is_closed());
    }
}

type SharedHub = Arc<Mutex<HubState>>;

// ----------------------------------------------------------------------------
// Rendezvous
// ----------------------------------------------------------------------------

/// In-process rendezvous hub
///
/// Cloning yields another handle to the same hub.
#[derive(Clone)]
pub struct LocalRendezvous {
    config: LocalRendezvousConfig,
    hub: SharedHub,
}

impl Default for LocalRendezvous {
    fn default() -> Self {
        Self::new()
    }
}

impl LocalRendezvous {
    pub fn new() -> Self {
        Self::with_config(LocalRendezvousConfig::default())
    }

    pub fn with_config(config: LocalRendezvousConfig) -> Self {
        Self {
            config,
            hub: Arc::new(Mutex::new(HubState {
                available: true,
                ..HubState::default()
            })),
        }
    }

    /// Hub answering at `host:port` with default queue sizes
    pub fn with_address(host: impl Into<String>, port: u16) -> Self {
        Self::with_config(LocalRendezvousConfig {
            host: host.into(),
            port,
            ..LocalRendezvousConfig::default()
        })
    }

    /// Client configuration that reaches this hub
    pub fn rendezvous_config(&self) -> RendezvousConfig {
        RendezvousConfig::new(self.config.host.clone(), self.config.port, false)
    }

    /// Ids to hand out, in order, before falling back to random ones
    pub async fn queue_ids<I, S>(&self, ids: I)
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        let mut hub = self.hub.lock().await;
        hub.pending_ids
            .extend(ids.into_iter().map(EndpointId::new));
    }

    /// Simulate an outage; connects fail while unavailable
    pub async fn set_available(&self, available: bool) {
        self.hub.lock().await.available = available;
    }

    /// Endpoints with a live rendezvous link, sorted
    pub async fn online(&self) -> Vec<EndpointId> {
        let hub = self.hub.lock().await;
        let mut ids: Vec<EndpointId> = hub.endpoints.keys().cloned().collect();
        ids.sort();
        ids
    }

    /// Break the rendezvous link of `id`; returns false if it was not online
    pub async fn fail_link(&self, id: &EndpointId, cause: impl Into<String>) -> bool {
        let sender = self.hub.lock().await.endpoints.remove(id);
        match sender {
            Some(sender) => {
                info!(endpoint = %id, "Injecting link failure");
                let _ = sender.send(RendezvousEvent::LinkError(cause.into())).await;
                true
            }
            None => false,
        }
    }

    /// Fail every open channel between `a` and `b`, returning how many broke
    pub async fn sever(&self, a: &EndpointId, b: &EndpointId, cause: impl Into<String>) -> usize {
        let cause = cause.into();
        let pairs: Vec<Arc<ChannelPair>> = {
            let mut hub = self.hub.lock().await;
            hub.prune_pairs();
            hub.pairs
                .iter()
                .filter(|pair| pair.connects(a, b))
                .cloned()
                .collect()
        };

        let mut severed = 0;
        for pair in pairs {
            if pair.shut(ChannelEvent::Error(cause.clone())).await {
                severed += 1;
            }
        }
        debug!(%a, %b, severed, "Severed channels");
        severed
    }
}

#[async_trait]
impl Rendezvous for LocalRendezvous {
    async fn connect(&self, config: &RendezvousConfig) -> Result<RendezvousSession, RendezvousError> {
        let url = config
            .url()
            .map(|url| url.to_string())
            .unwrap_or_else(|_| format!("{}:{}", config.host, config.port));

        if config.host != self.config.host || config.port != self.config.port {
            return Err(RendezvousError::Unreachable {
                url,
                reason: "no rendezvous service at this address".to_string(),
            });
        }

        let mut hub = self.hub.lock().await;
        if !hub.available {
            return Err(RendezvousError::Unreachable {
                url,
                reason: "service unavailable".to_string(),
            });
        }

        let own_id = hub
            .pending_ids
            .pop_front()
            .unwrap_or_else(|| EndpointId::new(Uuid::new_v4().simple().to_string()[..8].to_string()));
        if hub.endpoints.contains_key(&own_id) {
            return Err(RendezvousError::Refused {
                reason: format!("endpoint id {} is taken", own_id),
            });
        }

        let (sender, events) = mpsc::channel(self.config.link_buffer_size.max(1));
        hub.endpoints.insert(own_id.clone(), sender);
        info!(endpoint = %own_id, "Endpoint joined hub");

        let link = LocalLink {
            own_id,
            hub: self.hub.clone(),
            channel_buffer_size: self.config.channel_buffer_size.max(1),
        };
        Ok(RendezvousSession {
            link: Arc::new(link),
            events,
        })
    }
}

// ----------------------------------------------------------------------------
// Link
// ----------------------------------------------------------------------------

/// One endpoint's link to the local hub
pub struct LocalLink {
    own_id: EndpointId,
    hub: SharedHub,
    channel_buffer_size: usize,
}

#[async_trait]
impl RendezvousLink for LocalLink {
    fn own_id(&self) -> &EndpointId {
        &self.own_id
    }

    async fn dial(&self, remote: &EndpointId) -> Result<PendingChannel, TransportError> {
        let remote_link = {
            let hub = self.hub.lock().await;
            if !hub.endpoints.contains_key(&self.own_id) {
                return Err(TransportError::DialFailed {
                    remote: remote.to_string(),
                    reason: "rendezvous link is down".to_string(),
                });
            }
            hub.endpoints.get(remote).cloned()
        };
        let Some(remote_link) = remote_link else {
            return Err(TransportError::DialFailed {
                remote: remote.to_string(),
                reason: "unknown endpoint".to_string(),
            });
        };

        let (to_dialer, dialer_events) = mpsc::channel(self.channel_buffer_size);
        let (to_listener, listener_events) = mpsc::channel(self.channel_buffer_size);
        let pair = Arc::new(ChannelPair {
            dialer: self.own_id.clone(),
            listener: remote.clone(),
            to_dialer,
            to_listener,
            closed: AtomicBool::new(false),
        });

        // Fresh queues always have room for the open events
        let _ = pair.to_listener.try_send(ChannelEvent::Open);
        let _ = pair.to_dialer.try_send(ChannelEvent::Open);

        let inbound = PendingChannel {
            channel: Arc::new(LocalChannel {
                remote: self.own_id.clone(),
                peer: pair.to_dialer.clone(),
                pair: pair.clone(),
            }),
            events: listener_events,
        };
        if remote_link
            .send(RendezvousEvent::InboundChannel(inbound))
            .await
            .is_err()
        {
            warn!(remote = %remote, "Remote stopped listening for inbound channels");
            return Err(TransportError::DialFailed {
                remote: remote.to_string(),
                reason: "remote is not accepting channels".to_string(),
            });
        }

        let mut hub = self.hub.lock().await;
        hub.prune_pairs();
        hub.pairs.push(pair.clone());
        drop(hub);
        debug!(from = %self.own_id, to = %remote, "Channel pair created");

        Ok(PendingChannel {
            channel: Arc::new(LocalChannel {
                remote: remote.clone(),
                peer: pair.to_listener.clone(),
                pair,
            }),
            events: dialer_events,
        })
    }

    async fn disconnect(&self) {
        let mut hub = self.hub.lock().await;
        if hub.endpoints.remove(&self.own_id).is_some() {
            info!(endpoint = %self.own_id, "Endpoint left hub");
        }
    }
}

// ----------------------------------------------------------------------------
// Channel
// ----------------------------------------------------------------------------

/// One end of a local channel pair
pub struct LocalChannel {
    remote: EndpointId,
    /// Event queue of the other end
    peer: mpsc::Sender<ChannelEvent>,
    pair: Arc<ChannelPair>,
}

#[async_trait]
impl DataChannel for LocalChannel {
    fn remote(&self) -> &EndpointId {
        &self.remote
    }

    async fn send(&self, frame: &[u8]) -> Result<(), TransportError> {
        if self.pair.is_closed() {
            return Err(TransportError::ChannelClosed {
                remote: self.remote.to_string(),
            });
        }
        // A data channel buffers or rejects; it never waits for the reader
        self.peer
            .try_send(ChannelEvent::Data(frame.to_vec()))
            .map_err(|e| {
                let reason = match e {
                    TrySendError::Full(_) => "remote buffer full",
                    TrySendError::Closed(_) => "remote end dropped",
                };
                TransportError::SendFailed {
                    remote: self.remote.to_string(),
                    reason: reason.to_string(),
                }
            })
    }

    async fn close(&self) {
        if self.pair.shut(ChannelEvent::Close).await {
            debug!(remote = %self.remote, "Local channel closed");
        }
    }
}

impl Drop for LocalChannel {
    fn drop(&mut self) {
        if self.pair.abandon() {
            debug!(remote = %self.remote, "Local channel end dropped without close");
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    async fn join(hub: &LocalRendezvous) -> RendezvousSession {
        hub.connect(&hub.rendezvous_config()).await.unwrap()
    }

    #[tokio::test]
    async fn test_assigns_queued_ids_in_order() {
        let hub = LocalRendezvous::new();
        hub.queue_ids(["abc123", "xyz789"]).await;

        let a = join(&hub).await;
        let b = join(&hub).await;
        let c = join(&hub).await;

        assert_eq!(a.link.own_id().as_str(), "abc123");
        assert_eq!(b.link.own_id().as_str(), "xyz789");
        assert_eq!(c.link.own_id().as_str().len(), 8);
        assert_eq!(hub.online().await.len(), 3);
    }

    #[tokio::test]
    async fn test_connect_rejects_wrong_address() {
        let hub = LocalRendezvous::new();
        let config = RendezvousConfig::new("elsewhere", 9000, false);
        assert!(matches!(
            hub.connect(&config).await,
            Err(RendezvousError::Unreachable { .. })
        ));
    }

    #[tokio::test]
    async fn test_outage_refuses_connect() {
        let hub = LocalRendezvous::new();
        hub.set_available(false).await;
        assert!(hub.connect(&hub.rendezvous_config()).await.is_err());

        hub.set_available(true).await;
        assert!(hub.connect(&hub.rendezvous_config()).await.is_ok());
    }

    #[tokio::test]
    async fn test_duplicate_id_is_refused() {
        let hub = LocalRendezvous::new();
        hub.queue_ids(["abc123", "abc123"]).await;
        let _first = join(&hub).await;
        assert!(matches!(
            hub.connect(&hub.rendezvous_config()).await,
            Err(RendezvousError::Refused { .. })
        ));
    }

    #[tokio::test]
    async fn test_dial_opens_both_ends() {
        let hub = LocalRendezvous::new();
        hub.queue_ids(["abc123", "xyz789"]).await;
        let mut a = join(&hub).await;
        let b = join(&hub).await;

        let mut dialed = b.link.dial(a.link.own_id()).await.unwrap();
        let Some(RendezvousEvent::InboundChannel(mut inbound)) = a.events.recv().await else {
            panic!("expected an inbound channel");
        };

        assert_eq!(dialed.channel.remote().as_str(), "abc123");
        assert_eq!(inbound.channel.remote().as_str(), "xyz789");
        assert_eq!(dialed.events.recv().await, Some(ChannelEvent::Open));
        assert_eq!(inbound.events.recv().await, Some(ChannelEvent::Open));

        dialed.channel.send(b"\"hello\"").await.unwrap();
        assert_eq!(
            inbound.events.recv().await,
            Some(ChannelEvent::Data(b"\"hello\"".to_vec()))
        );

        inbound.channel.close().await;
        assert_eq!(dialed.events.recv().await, Some(ChannelEvent::Close));
        assert_eq!(inbound.events.recv().await, Some(ChannelEvent::Close));
        assert!(dialed.channel.send(b"late").await.is_err());
    }

    #[tokio::test]
    async fn test_dial_unknown_endpoint_fails() {
        let hub = LocalRendezvous::new();
        let a = join(&hub).await;
        let result = a.link.dial(&EndpointId::new("nobody")).await;
        assert!(matches!(result, Err(TransportError::DialFailed { .. })));
    }

    #[tokio::test]
    async fn test_disconnected_endpoint_cannot_dial_or_be_dialed() {
        let hub = LocalRendezvous::new();
        hub.queue_ids(["abc123", "xyz789"]).await;
        let a = join(&hub).await;
        let b = join(&hub).await;

        a.link.disconnect().await;
        assert!(a.link.dial(b.link.own_id()).await.is_err());
        assert!(b.link.dial(a.link.own_id()).await.is_err());
        assert_eq!(hub.online().await, vec![EndpointId::new("xyz789")]);
    }

    #[tokio::test]
    async fn test_fail_link_delivers_error() {
        let hub = LocalRendezvous::new();
        hub.queue_ids(["abc123"]).await;
        let mut a = join(&hub).await;

        assert!(hub.fail_link(a.link.own_id(), "server restarted").await);
        assert!(matches!(
            a.events.recv().await,
            Some(RendezvousEvent::LinkError(cause)) if cause == "server restarted"
        ));
        assert!(!hub.fail_link(&EndpointId::new("abc123"), "again").await);
    }

    #[tokio::test]
    async fn test_dropped_end_closes_the_other() {
        let hub = LocalRendezvous::new();
        hub.queue_ids(["abc123", "xyz789"]).await;
        let mut a = join(&hub).await;
        let b = join(&hub).await;

        let mut dialed = b.link.dial(a.link.own_id()).await.unwrap();
        let Some(RendezvousEvent::InboundChannel(inbound)) = a.events.recv().await else {
            panic!("expected an inbound channel");
        };
        drop(inbound);

        assert_eq!(dialed.events.recv().await, Some(ChannelEvent::Open));
        assert_eq!(dialed.events.recv().await, Some(ChannelEvent::Close));
        assert!(matches!(
            dialed.channel.send(b"late").await,
            Err(TransportError::ChannelClosed { .. })
        ));
    }

    #[tokio::test]
    async fn test_full_remote_queue_rejects_send() {
        let hub = LocalRendezvous::with_config(LocalRendezvousConfig {
            channel_buffer_size: 2,
            ..LocalRendezvousConfig::default()
        });
        hub.queue_ids(["abc123", "xyz789"]).await;
        let mut a = join(&hub).await;
        let b = join(&hub).await;

        let dialed = b.link.dial(a.link.own_id()).await.unwrap();
        let Some(RendezvousEvent::InboundChannel(mut inbound)) = a.events.recv().await else {
            panic!("expected an inbound channel");
        };

        // `Open` takes the first slot; nobody reads the rest
        dialed.channel.send(b"\"one\"").await.unwrap();
        let result = dialed.channel.send(b"\"two\"").await;
        assert!(matches!(
            result,
            Err(TransportError::SendFailed { ref reason, .. }) if reason == "remote buffer full"
        ));

        assert_eq!(inbound.events.recv().await, Some(ChannelEvent::Open));
        dialed.channel.send(b"\"three\"").await.unwrap();
    }

    #[tokio::test]
    async fn test_abandoned_pairs_are_pruned() {
        let hub = LocalRendezvous::new();
        hub.queue_ids(["abc123", "xyz789"]).await;
        let mut a = join(&hub).await;
        let b = join(&hub).await;

        for _ in 0..3 {
            let dialed = b.link.dial(a.link.own_id()).await.unwrap();
            let Some(RendezvousEvent::InboundChannel(inbound)) = a.events.recv().await else {
                panic!("expected an inbound channel");
            };
            drop(inbound);
            drop(dialed);
        }
        let _live = b.link.dial(a.link.own_id()).await.unwrap();

        assert_eq!(hub.hub.lock().await.pairs.len(), 1);
    }

    #[tokio::test]
    async fn test_sever_errors_both_ends() {
        let hub = LocalRendezvous::new();
        hub.queue_ids(["abc123", "xyz789"]).await;
        let mut a = join(&hub).await;
        let b = join(&hub).await;

        let mut dialed = b.link.dial(a.link.own_id()).await.unwrap();
        let Some(RendezvousEvent::InboundChannel(mut inbound)) = a.events.recv().await else {
            panic!("expected an inbound channel");
        };
        let _ = dialed.events.recv().await;
        let _ = inbound.events.recv().await;

        let severed = hub
            .sever(a.link.own_id(), b.link.own_id(), "ice failed")
            .await;
        assert_eq!(severed, 1);
        assert_eq!(
            dialed.events.recv().await,
            Some(ChannelEvent::Error("ice failed".to_string()))
        );
        assert_eq!(
            inbound.events.recv().await,
            Some(ChannelEvent::Error("ice failed".to_string()))
        );
    }
}
