//! Peer Builder API
//!
//! Assembles a [`SessionController`] from its collaborators for consumers
//! (CLI, tests, embedding applications).

use std::sync::Arc;

use tracing::debug;

use peerlink_core::{
    ChannelConfig, ConfigError, FileSource, FsFileSource, PeerlinkResult, Rendezvous,
};

use crate::context::PeerContext;
use crate::session::SessionController;

// ----------------------------------------------------------------------------
// Peer Builder
// ----------------------------------------------------------------------------

/// Builder for one PeerLink client
#[derive(Default)]
pub struct PeerBuilder {
    rendezvous: Option<Arc<dyn Rendezvous>>,
    files: Option<Arc<dyn FileSource>>,
    channels: ChannelConfig,
}

impl PeerBuilder {
    pub fn new() -> Self {
        Self::default()
    }

    /// Set the rendezvous service to connect through (required)
    pub fn with_rendezvous(mut self, rendezvous: Arc<dyn Rendezvous>) -> Self {
        self.rendezvous = Some(rendezvous);
        self
    }

    /// Set where `send_file` reads from; defaults to the local filesystem
    pub fn with_file_source(mut self, files: Arc<dyn FileSource>) -> Self {
        self.files = Some(files);
        self
    }

    pub fn with_channel_config(mut self, channels: ChannelConfig) -> Self {
        self.channels = channels;
        self
    }

    /// Build the controller
    pub fn build(self) -> PeerlinkResult<SessionController> {
        self.channels.validate()?;
        let rendezvous = self.rendezvous.ok_or_else(|| ConfigError::Invalid {
            reason: "a rendezvous service is required".to_string(),
        })?;
        let files = self.files.unwrap_or_else(|| Arc::new(FsFileSource));

        debug!(
            app_event_buffer = self.channels.app_event_buffer_size,
            "Building peer"
        );
        let context = Arc::new(PeerContext::new(&self.channels));
        Ok(SessionController::new(context, rendezvous, files))
    }
}
