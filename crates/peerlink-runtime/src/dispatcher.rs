//! Outbound Dispatcher
//!
//! Fans one envelope out to every channel in the registry. All sends of one
//! broadcast run concurrently and each is bounded by the send timeout, so a
//! peer that stops reading costs at most that bound and never starves the
//! others. Report entries follow snapshot order.
//!
//! A failed or timed out send is logged and recorded in the report; it never
//! removes the channel, which stays until the transport reports close or
//! error.

use std::time::Duration;

use futures::future::join_all;
use tokio::time::timeout;
use tracing::{debug, warn};

use peerlink_core::{ChannelConfig, ChannelId, EndpointId, Envelope};

use crate::managers::ChannelRegistry;

/// One channel that rejected a frame
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SendFailure {
    pub channel: ChannelId,
    pub remote: EndpointId,
    pub reason: String,
}

/// Outcome of a broadcast
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct BroadcastReport {
    /// Channels in the snapshot
    pub attempted: usize,
    /// Channels that accepted the frame
    pub delivered: usize,
    pub failures: Vec<SendFailure>,
}

impl BroadcastReport {
    /// Whether every attempted channel accepted the frame
    pub fn is_complete(&self) -> bool {
        self.failures.is_empty()
    }
}

/// Broadcasts envelopes across the channel registry
#[derive(Debug, Clone)]
pub struct OutboundDispatcher {
    registry: ChannelRegistry,
    send_timeout: Duration,
}

impl OutboundDispatcher {
    pub fn new(registry: ChannelRegistry) -> Self {
        Self {
            registry,
            send_timeout: ChannelConfig::default().send_timeout(),
        }
    }

    pub fn with_send_timeout(mut self, send_timeout: Duration) -> Self {
        self.send_timeout = send_timeout;
        self
    }

    /// Send `envelope` on every currently open channel
    ///
    /// An empty registry is a valid no-op.
    pub async fn broadcast(&self, envelope: &Envelope) -> BroadcastReport {
        let frame = envelope.to_wire();
        let channels = self.registry.snapshot();
        let mut report = BroadcastReport {
            attempted: channels.len(),
            ..BroadcastReport::default()
        };

        let sends = channels.iter().map(|channel| {
            let frame = &frame;
            async move {
                match timeout(self.send_timeout, channel.send(frame)).await {
                    Ok(Ok(())) => Ok(()),
                    Ok(Err(e)) => Err(e.to_string()),
                    Err(_) => Err(format!(
                        "Send to {} timed out after {}ms",
                        channel.remote(),
                        self.send_timeout.as_millis()
                    )),
                }
            }
        });
        let outcomes = join_all(sends).await;

        for (channel, outcome) in channels.iter().zip(outcomes) {
            match outcome {
                Ok(()) => report.delivered += 1,
                Err(reason) => {
                    warn!(channel = %channel.id(), remote = %channel.remote(), "Send failed: {}", reason);
                    report.failures.push(SendFailure {
                        channel: channel.id(),
                        remote: channel.remote().clone(),
                        reason,
                    });
                }
            }
        }

        debug!(
            kind = %envelope.kind,
            attempted = report.attempted,
            delivered = report.delivered,
            "Broadcast finished"
        );
        report
    }
}
