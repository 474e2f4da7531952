//! PeerLink CLI Configuration Management
//!
//! Configuration is read from a TOML file and then adjusted by command-line
//! flags: flags > config file > defaults.
//!
//! ```toml
//! [rendezvous]
//! host = "signallingserver-t80i.onrender.com"
//! port = 10000
//! secure = true
//!
//! [channels]
//! event_buffer_size = 128
//! send_timeout_ms = 5000
//!
//! [interface]
//! prompt = "> "
//! ```

use std::path::Path;
use std::time::Duration;

use serde::{Deserialize, Serialize};
use tracing::debug;

use peerlink_core::{ChannelConfig, PeerConfig, RendezvousConfig};

use crate::cli::Cli;
use crate::error::{CliError, Result};

// ----------------------------------------------------------------------------
// CLI Application Configuration
// ----------------------------------------------------------------------------

/// Complete configuration for the PeerLink CLI application
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct AppConfig {
    /// Where to find the rendezvous service
    pub rendezvous: RendezvousConfig,
    /// Internal queue sizes
    pub channels: ChannelConfig,
    /// Terminal presentation
    pub interface: InterfaceConfig,
}

/// Terminal presentation options
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct InterfaceConfig {
    /// Prompt printed before each interactive command
    pub prompt: String,
    /// Prefix printed log entries with their timestamp
    pub show_timestamps: bool,
    /// How long the demo waits for channels and messages (milliseconds)
    pub wait_timeout_ms: u64,
}

impl Default for InterfaceConfig {
    fn default() -> Self {
        Self {
            prompt: "> ".to_string(),
            show_timestamps: false,
            wait_timeout_ms: 2000,
        }
    }
}

impl InterfaceConfig {
    pub fn wait_timeout(&self) -> Duration {
        Duration::from_millis(self.wait_timeout_ms)
    }
}

impl AppConfig {
    /// Load configuration from a TOML file; missing sections keep defaults
    pub fn load_from_file<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path = path.as_ref();
        let content = std::fs::read_to_string(path)?;
        let config = Self::from_toml(&content)?;
        debug!("Loaded configuration from {}", path.display());
        Ok(config)
    }

    pub fn from_toml(content: &str) -> Result<Self> {
        let config: AppConfig = toml::from_str(content)?;
        config.validate()?;
        Ok(config)
    }

    /// Apply command-line overrides on top of the loaded values
    pub fn apply_overrides(&mut self, cli: &Cli) {
        if let Some(host) = &cli.host {
            self.rendezvous.host = host.clone();
        }
        if let Some(port) = cli.port {
            self.rendezvous.port = port;
        }
        if cli.insecure {
            self.rendezvous.secure = false;
        }
    }

    pub fn validate(&self) -> Result<()> {
        self.peer_config().validate()?;
        if self.interface.wait_timeout_ms == 0 {
            return Err(CliError::Config(
                "interface.wait_timeout_ms must be non-zero".to_string(),
            ));
        }
        Ok(())
    }

    pub fn peer_config(&self) -> PeerConfig {
        PeerConfig {
            rendezvous: self.rendezvous.clone(),
            channels: self.channels.clone(),
        }
    }
}
