//! Configuration for PeerLink sessions
//!
//! `RendezvousConfig` describes where the rendezvous service lives,
//! `ChannelConfig` sizes the internal queues, and `PeerConfig` bundles both
//! so front ends can load them from a single file.

use std::time::Duration;

use serde::{Deserialize, Serialize};
use url::Url;

use crate::errors::ConfigError;

// ----------------------------------------------------------------------------
// Rendezvous Configuration
// ----------------------------------------------------------------------------

/// Public signaling server used by the browser client
pub const DEFAULT_RENDEZVOUS_HOST: &str = "signallingserver-t80i.onrender.com";
/// Port the public signaling server listens on
pub const DEFAULT_RENDEZVOUS_PORT: u16 = 10000;

/// Location and security scheme of the rendezvous service
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct RendezvousConfig {
    /// Host name of the rendezvous service
    pub host: String,
    /// TCP port of the rendezvous service
    pub port: u16,
    /// Whether to use TLS (`wss`) instead of plain `ws`
    pub secure: bool,
    /// Path prefix the service is mounted under
    pub path: String,
    /// API key expected by the service
    pub key: String,
}

impl Default for RendezvousConfig {
    fn default() -> Self {
        Self {
            host: DEFAULT_RENDEZVOUS_HOST.to_string(),
            port: DEFAULT_RENDEZVOUS_PORT,
            secure: true,
            path: "/".to_string(),
            key: "peerjs".to_string(),
        }
    }
}

impl RendezvousConfig {
    /// Configuration for a service at `host:port`, keeping the other defaults
    pub fn new(host: impl Into<String>, port: u16, secure: bool) -> Self {
        Self {
            host: host.into(),
            port,
            secure,
            ..Self::default()
        }
    }

    /// Check the values a connect attempt depends on
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.host.trim().is_empty() {
            return Err(ConfigError::Invalid {
                reason: "rendezvous host must not be empty".to_string(),
            });
        }
        if self.port == 0 {
            return Err(ConfigError::Invalid {
                reason: "rendezvous port must be non-zero".to_string(),
            });
        }
        Ok(())
    }

    /// WebSocket URL of the service, e.g. `wss://host:10000/`
    pub fn url(&self) -> Result<Url, ConfigError> {
        self.validate()?;
        let scheme = if self.secure { "wss" } else { "ws" };
        let path = if self.path.starts_with('/') {
            self.path.clone()
        } else {
            format!("/{}", self.path)
        };
        Ok(Url::parse(&format!(
            "{}://{}:{}{}",
            scheme, self.host, self.port, path
        ))?)
    }
}

// ----------------------------------------------------------------------------
// Channel Configuration
// ----------------------------------------------------------------------------

/// Buffer sizes for the internal event queues and the per-send bound
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ChannelConfig {
    /// Capacity of each direct channel's event queue (transport → session)
    pub event_buffer_size: usize,
    /// Capacity of the application event broadcast (session → UI)
    pub app_event_buffer_size: usize,
    /// How long one channel may take to accept a frame before the send is
    /// reported as failed
    pub send_timeout_ms: u64,
}

impl Default for ChannelConfig {
    fn default() -> Self {
        Self {
            event_buffer_size: 128, // Inbound data can be bursty
            app_event_buffer_size: 256,
            send_timeout_ms: 5_000,
        }
    }
}

impl ChannelConfig {
    /// Small queues for constrained environments
    pub fn low_memory() -> Self {
        Self {
            event_buffer_size: 16,
            app_event_buffer_size: 32,
            ..Self::default()
        }
    }

    pub fn send_timeout(&self) -> Duration {
        Duration::from_millis(self.send_timeout_ms)
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.event_buffer_size == 0 || self.app_event_buffer_size == 0 {
            return Err(ConfigError::Invalid {
                reason: "channel buffer sizes must be non-zero".to_string(),
            });
        }
        if self.send_timeout_ms == 0 {
            return Err(ConfigError::Invalid {
                reason: "send timeout must be non-zero".to_string(),
            });
        }
        Ok(())
    }
}

// ----------------------------------------------------------------------------
// Peer Configuration
// ----------------------------------------------------------------------------

/// Complete configuration of one PeerLink client
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct PeerConfig {
    pub rendezvous: RendezvousConfig,
    pub channels: ChannelConfig,
}

impl PeerConfig {
    pub fn validate(&self) -> Result<(), ConfigError> {
        self.rendezvous.validate()?;
        self.channels.validate()
    }
}

// ----------------------------------------------------------------------------
// Tests
// ----------------------------------------------------------------------------
