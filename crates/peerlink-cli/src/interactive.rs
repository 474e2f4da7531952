//! Interactive command parsing
//!
//! One line of stdin is either a slash command or plain text to broadcast.

use std::path::PathBuf;

use peerlink_core::EndpointId;

pub const HELP: &str = "\
Commands:
  /connect          open the rendezvous session
  /disconnect       close the rendezvous session (channels stay open)
  /dial <id>        open a channel to an endpoint
  /close <id>       close every channel to an endpoint
  /image <path>     broadcast an image file
  /log              print the message log
  /peers            list endpoints with open channels
  /state            print the session state
  /help             print this help
  /quit             exit
Anything else is broadcast as text.";

/// One parsed line of interactive input
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum InteractiveCommand {
    Connect,
    Disconnect,
    Dial(EndpointId),
    Close(EndpointId),
    Image(PathBuf),
    Log,
    Peers,
    State,
    Help,
    Quit,
    Text(String),
    Empty,
    /// Unusable input with a message for the user
    Invalid(String),
}

impl InteractiveCommand {
    pub fn parse(line: &str) -> Self {
        let line = line.trim();
        if line.is_empty() {
            return Self::Empty;
        }
        if !line.starts_with('/') {
            return Self::Text(line.to_string());
        }

        let (command, argument) = match line.split_once(char::is_whitespace) {
            Some((command, rest)) => (command, rest.trim()),
            None => (line, ""),
        };

        match (command, argument.is_empty()) {
            ("/connect", _) => Self::Connect,
            ("/disconnect", _) => Self::Disconnect,
            ("/dial", false) => Self::Dial(EndpointId::new(argument)),
            ("/dial", true) => Self::Invalid("usage: /dial <id>".to_string()),
            ("/close", false) => Self::Close(EndpointId::new(argument)),
            ("/close", true) => Self::Invalid("usage: /close <id>".to_string()),
            ("/image", false) => Self::Image(PathBuf::from(argument)),
            ("/image", true) => Self::Invalid("usage: /image <path>".to_string()),
            ("/log", _) => Self::Log,
            ("/peers", _) => Self::Peers,
            ("/state", _) => Self::State,
            ("/help", _) => Self::Help,
            ("/quit" | "/exit", _) => Self::Quit,
            (other, _) => Self::Invalid(format!("unknown command {}, try /help", other)),
        }
    }
}
