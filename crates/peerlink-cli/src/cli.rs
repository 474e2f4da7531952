//! Command-line interface definitions and parsing

use std::path::PathBuf;

use clap::{Parser, Subcommand};

#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Commands,

    /// Enable verbose logging
    #[arg(short, long)]
    pub verbose: bool,

    /// Configuration file path
    #[arg(short, long)]
    pub config: Option<String>,

    /// Rendezvous service host
    #[arg(long)]
    pub host: Option<String>,

    /// Rendezvous service port
    #[arg(long)]
    pub port: Option<u16>,

    /// Use plain ws:// instead of wss:// for the rendezvous link
    #[arg(long)]
    pub insecure: bool,
}

#[derive(Subcommand, Debug, Clone, PartialEq, Eq)]
pub enum Commands {
    /// Run two in-process endpoints that exchange a message and print both logs
    Demo {
        /// Text the first endpoint broadcasts
        #[arg(short, long, default_value = "hello")]
        message: String,
        /// Image the second endpoint sends back
        #[arg(short, long)]
        image: Option<PathBuf>,
    },
    /// Start interactive command-line mode with a local echo peer to dial
    Interactive,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_demo_with_overrides() {
        let cli = Cli::parse_from([
            "peerlink", "--host", "localhost", "--port", "9000", "--insecure", "demo", "-m", "hi",
        ]);
        assert_eq!(cli.host.as_deref(), Some("localhost"));
        assert_eq!(cli.port, Some(9000));
        assert!(cli.insecure);
        assert_eq!(
            cli.command,
            Commands::Demo {
                message: "hi".to_string(),
                image: None
            }
        );
    }

    #[test]
    fn test_parse_interactive_defaults() {
        let cli = Cli::parse_from(["peerlink", "-v", "interactive"]);
        assert!(cli.verbose);
        assert!(cli.config.is_none());
        assert_eq!(cli.command, Commands::Interactive);
    }
}
