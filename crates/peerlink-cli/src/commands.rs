//! Command handlers for the PeerLink CLI
//!
//! Both modes run against the in-process rendezvous hub, bound to the
//! configured rendezvous address.

use std::io::Write;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use tokio::io::{AsyncBufReadExt, BufReader};
use tokio::sync::broadcast::{self, error::RecvError};
use tokio::time::{sleep, timeout};
use tracing::{info, warn};

use peerlink_core::{AppEvent, EndpointId, LogEntry};
use peerlink_harness::{LocalRendezvous, LocalRendezvousConfig};
use peerlink_runtime::{BroadcastReport, PeerBuilder, SessionController};

use crate::cli::{Cli, Commands};
use crate::config::AppConfig;
use crate::echo::EchoPeer;
use crate::error::{CliError, Result};
use crate::interactive::{InteractiveCommand, HELP};

/// Command dispatcher for handling CLI commands
pub struct CommandDispatcher;

impl CommandDispatcher {
    /// Execute a CLI command
    pub async fn execute(cli: Cli, config: AppConfig) -> Result<()> {
        match cli.command {
            Commands::Demo { message, image } => {
                Self::handle_demo_command(&config, message, image).await
            }
            Commands::Interactive => Self::handle_interactive_command(&config).await,
        }
    }

    // ------------------------------------------------------------------------
    // Demo
    // ------------------------------------------------------------------------

    /// Two endpoints meet, exchange a text and optionally an image
    async fn handle_demo_command(
        config: &AppConfig,
        message: String,
        image: Option<PathBuf>,
    ) -> Result<()> {
        let hub = local_hub(config);
        let alice = build_peer(&hub, config)?;
        let bob = build_peer(&hub, config)?;
        let wait = config.interface.wait_timeout();

        let alice_id = alice.connect(&config.rendezvous).await?;
        let bob_id = bob.connect(&config.rendezvous).await?;
        println!("alice is {}, bob is {}", alice_id, bob_id);

        bob.dial(&alice_id)
            .await
            .ok_or_else(|| CliError::Demo(format!("bob could not dial {}", alice_id)))?;
        wait_for(wait, "the channel to open", || {
            !alice.registry().is_empty() && !bob.registry().is_empty()
        })
        .await?;

        print_report("alice", &alice.send_text(message).await);

        let mut expected = 1;
        if let Some(path) = image {
            let report = bob
                .send_file(&path)
                .await
                .ok_or_else(|| CliError::Demo(format!("could not read {}", path.display())))?;
            print_report("bob", &report);
            expected += 1;
        }

        wait_for(wait, "both logs to fill", || {
            alice.log().len() >= expected && bob.log().len() >= expected
        })
        .await?;

        let show_timestamps = config.interface.show_timestamps;
        print_log("alice", &alice.log().snapshot(), show_timestamps);
        print_log("bob", &bob.log().snapshot(), show_timestamps);

        alice.disconnect().await;
        bob.disconnect().await;
        Ok(())
    }

    // ------------------------------------------------------------------------
    // Interactive
    // ------------------------------------------------------------------------

    /// Read commands from stdin until `/quit` or end of input
    async fn handle_interactive_command(config: &AppConfig) -> Result<()> {
        let hub = local_hub(config);

        let echo = build_peer(&hub, config)?;
        let echo_id = echo.connect(&config.rendezvous).await?;
        let echo_task = EchoPeer::spawn(echo.clone());

        let me = build_peer(&hub, config)?;
        let printer = tokio::spawn(print_events(
            me.subscribe_events(),
            config.interface.show_timestamps,
        ));

        println!("Echo peer is online as {}. Try /connect then /dial {}", echo_id, echo_id);
        println!("{}", HELP);

        let mut lines = BufReader::new(tokio::io::stdin()).lines();
        loop {
            print!("{}", config.interface.prompt);
            std::io::stdout().flush()?;

            let Some(line) = lines.next_line().await? else {
                break;
            };
            match InteractiveCommand::parse(&line) {
                InteractiveCommand::Quit => break,
                command => Self::run_interactive(&me, config, command).await,
            }
        }

        info!("Shutting down");
        printer.abort();
        echo_task.abort();
        me.disconnect().await;
        echo.disconnect().await;
        Ok(())
    }

    async fn run_interactive(me: &SessionController, config: &AppConfig, command: InteractiveCommand) {
        match command {
            InteractiveCommand::Connect => match me.connect(&config.rendezvous).await {
                Ok(own_id) => println!("Connected as {}", own_id),
                Err(e) => println!("Connect failed: {}", e),
            },
            InteractiveCommand::Disconnect => {
                me.disconnect().await;
                println!("Disconnected");
            }
            InteractiveCommand::Dial(remote) => match me.dial(&remote).await {
                Some(channel) => println!("Dialing {} (channel {})", remote, channel),
                None => println!("Dial to {} dropped, see log output", remote),
            },
            InteractiveCommand::Close(remote) => {
                let closed = me.close_channels(&remote).await;
                println!("Closed {} channel(s) to {}", closed, remote);
            }
            InteractiveCommand::Image(path) => match me.send_file(&path).await {
                Some(report) => print_report("me", &report),
                None => println!("Could not read {}", path.display()),
            },
            InteractiveCommand::Text(text) => print_report("me", &me.send_text(text).await),
            InteractiveCommand::Log => {
                print_log("me", &me.log().snapshot(), config.interface.show_timestamps)
            }
            InteractiveCommand::Peers => print_peers(&me.registry().remotes()),
            InteractiveCommand::State => println!("Session: {}", me.state()),
            InteractiveCommand::Help => println!("{}", HELP),
            InteractiveCommand::Invalid(reason) => println!("{}", reason),
            InteractiveCommand::Empty | InteractiveCommand::Quit => {}
        }
    }
}

// ----------------------------------------------------------------------------
// Helpers
// ----------------------------------------------------------------------------

/// In-process hub answering at the configured rendezvous address
fn local_hub(config: &AppConfig) -> LocalRendezvous {
    LocalRendezvous::with_config(LocalRendezvousConfig {
        host: config.rendezvous.host.clone(),
        port: config.rendezvous.port,
        channel_buffer_size: config.channels.event_buffer_size,
        ..LocalRendezvousConfig::default()
    })
}

fn build_peer(hub: &LocalRendezvous, config: &AppConfig) -> Result<SessionController> {
    let peer = PeerBuilder::new()
        .with_rendezvous(Arc::new(hub.clone()))
        .with_channel_config(config.channels.clone())
        .build()?;
    Ok(peer)
}

async fn wait_for<F>(limit: Duration, what: &str, condition: F) -> Result<()>
where
    F: Fn() -> bool,
{
    let polled = timeout(limit, async {
        while !condition() {
            sleep(Duration::from_millis(10)).await;
        }
    })
    .await;
    polled.map_err(|_| CliError::Demo(format!("timed out waiting for {}", what)))
}

fn format_entry(entry: &LogEntry, show_timestamps: bool) -> String {
    if show_timestamps {
        format!("{} {}", entry.recorded_at, entry)
    } else {
        entry.to_string()
    }
}

fn print_log(owner: &str, entries: &[LogEntry], show_timestamps: bool) {
    println!("--- {}'s log ({} messages) ---", owner, entries.len());
    for entry in entries {
        println!("  {}", format_entry(entry, show_timestamps));
    }
}

fn print_peers(remotes: &[EndpointId]) {
    if remotes.is_empty() {
        println!("No open channels");
        return;
    }
    println!("Open channels to:");
    for remote in remotes {
        println!("  {}", remote);
    }
}

fn print_report(sender: &str, report: &BroadcastReport) {
    println!(
        "{} broadcast to {}/{} channel(s)",
        sender, report.delivered, report.attempted
    );
    for failure in &report.failures {
        println!("  {} ({}): {}", failure.remote, failure.channel, failure.reason);
    }
}

/// Print what arrives while the user is typing
async fn print_events(mut events: broadcast::Receiver<AppEvent>, show_timestamps: bool) {
    loop {
        match events.recv().await {
            Ok(AppEvent::MessageLogged(entry)) if entry.is_inbound() => {
                println!("{}", format_entry(&entry, show_timestamps));
            }
            Ok(AppEvent::MessageLogged(_)) => {}
            Ok(event) => println!("* {}", event),
            Err(RecvError::Lagged(skipped)) => warn!(skipped, "Event printer fell behind"),
            Err(RecvError::Closed) => break,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use peerlink_core::{Direction, Message, Timestamp};

    #[test]
    fn test_format_entry_with_timestamp() {
        let mut entry = LogEntry::new(Direction::Outbound, Message::text("hi"));
        entry.recorded_at = Timestamp::new(42);
        assert_eq!(format_entry(&entry, false), entry.to_string());
        assert!(format_entry(&entry, true).starts_with(&Timestamp::new(42).to_string()));
    }

    #[tokio::test]
    async fn test_demo_runs_against_local_hub() {
        let mut config = AppConfig::default();
        config.rendezvous.host = "localhost".to_string();
        config.rendezvous.port = 9000;
        let result =
            CommandDispatcher::handle_demo_command(&config, "hello".to_string(), None).await;
        assert!(result.is_ok());
    }

    #[tokio::test]
    async fn test_demo_with_missing_image_fails() {
        let config = AppConfig::default();
        let missing = std::env::temp_dir().join("peerlink-demo-missing.png");
        let result =
            CommandDispatcher::handle_demo_command(&config, "hello".to_string(), Some(missing))
                .await;
        assert!(matches!(result, Err(CliError::Demo(_))));
    }
}
