//! PeerLink CLI library
//!
//! Command-line front end for PeerLink: argument parsing, TOML
//! configuration, and the demo and interactive modes.

pub mod cli;
pub mod commands;
pub mod config;
pub mod echo;
pub mod error;
pub mod interactive;

pub use cli::{Cli, Commands};
pub use commands::CommandDispatcher;
pub use config::AppConfig;
pub use error::{CliError, Result};
