//! Shared peer context
//!
//! The single owned bundle of process-wide state: the channel registry, the
//! message log and the application event bus. Components receive it
//! explicitly instead of reaching for globals.

use std::time::Duration;

use tokio::sync::broadcast;
use tracing::{debug, info, trace};

use peerlink_core::{AppEvent, ChannelConfig, Direction, LogEntry, Message};

use crate::managers::{Channel, ChannelRegistry, MessageLog};

/// Registry, log and event bus of one PeerLink client
#[derive(Debug)]
pub struct PeerContext {
    registry: ChannelRegistry,
    log: MessageLog,
    events: broadcast::Sender<AppEvent>,
    send_timeout: Duration,
}

impl PeerContext {
    pub fn new(config: &ChannelConfig) -> Self {
        let (events, _) = broadcast::channel(config.app_event_buffer_size.max(1));
        Self {
            registry: ChannelRegistry::new(),
            log: MessageLog::new(),
            events,
            send_timeout: config.send_timeout(),
        }
    }

    pub fn registry(&self) -> &ChannelRegistry {
        &self.registry
    }

    pub fn log(&self) -> &MessageLog {
        &self.log
    }

    /// Upper bound on one channel accepting one outbound frame
    pub fn send_timeout(&self) -> Duration {
        self.send_timeout
    }

    /// Subscribe to application events
    pub fn subscribe(&self) -> broadcast::Receiver<AppEvent> {
        self.events.subscribe()
    }

    /// Publish an event; having no subscribers is fine
    pub(crate) fn emit(&self, event: AppEvent) {
        if self.events.send(event).is_err() {
            trace!("No app event subscribers");
        }
    }

    /// Append a message to the log and announce it
    pub(crate) fn record(&self, direction: Direction, message: Message) -> LogEntry {
        let entry = LogEntry::new(direction, message);
        let index = self.log.append(entry.clone());
        debug!(index, kind = %entry.message.kind(), "Message logged");
        self.emit(AppEvent::MessageLogged(entry.clone()));
        entry
    }

    /// Make an open channel visible to broadcasts
    pub(crate) fn admit(&self, channel: &Channel) {
        if self.registry.add(channel.clone()) {
            info!(
                channel = %channel.id(),
                remote = %channel.remote(),
                origin = ?channel.origin(),
                "Channel open"
            );
            self.emit(AppEvent::ChannelOpened {
                channel: channel.id(),
                remote: channel.remote().clone(),
            });
        }
    }

    /// Drop a channel from the registry, announcing it if it was present
    pub(crate) fn retire(&self, channel: &Channel, reason: Option<String>) {
        if self.registry.remove(channel) {
            info!(channel = %channel.id(), remote = %channel.remote(), "Channel closed");
            self.emit(AppEvent::ChannelClosed {
                channel: channel.id(),
                remote: channel.remote().clone(),
                reason,
            });
        }
    }
}
