//! Echo peer
//!
//! A second in-process endpoint for interactive mode: it answers every
//! inbound message over all of its open channels.

use tokio::sync::broadcast::error::RecvError;
use tokio::task::JoinHandle;
use tracing::{debug, warn};

use peerlink_core::{AppEvent, Message, MessageKind};
use peerlink_runtime::SessionController;

pub struct EchoPeer;

impl EchoPeer {
    /// Start answering inbound messages on `controller`
    pub fn spawn(controller: SessionController) -> JoinHandle<()> {
        let mut events = controller.subscribe_events();
        tokio::spawn(async move {
            loop {
                match events.recv().await {
                    Ok(AppEvent::MessageLogged(entry)) if entry.is_inbound() => {
                        let reply = Self::reply_to(&entry.message);
                        let report = controller.send_text(reply).await;
                        debug!(delivered = report.delivered, "Echo sent");
                    }
                    Ok(_) => {}
                    Err(RecvError::Lagged(skipped)) => {
                        warn!(skipped, "Echo peer fell behind");
                    }
                    Err(RecvError::Closed) => break,
                }
            }
        })
    }

    pub fn reply_to(message: &Message) -> String {
        match message.kind() {
            MessageKind::Text => format!("echo: {}", message.content()),
            MessageKind::Binary => match message.data_uri() {
                Some(Ok(uri)) => {
                    format!("echo: received {} ({} bytes)", uri.mime(), uri.data().len())
                }
                _ => "echo: received an unreadable image".to_string(),
            },
        }
    }
}
