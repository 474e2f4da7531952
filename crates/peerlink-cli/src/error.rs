//! Error handling for the PeerLink CLI

use thiserror::Error;

/// CLI-specific error types
#[derive(Error, Debug)]
pub enum CliError {
    #[error("PeerLink error: {0}")]
    Peerlink(#[from] peerlink_core::PeerlinkError),

    #[error("Configuration error: {0}")]
    Config(String),

    #[error("Demo failed: {0}")]
    Demo(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("TOML parsing error: {0}")]
    TomlParsing(#[from] toml::de::Error),
}

impl From<peerlink_core::ConfigError> for CliError {
    fn from(err: peerlink_core::ConfigError) -> Self {
        CliError::Peerlink(err.into())
    }
}

/// Result type for CLI operations
pub type Result<T> = std::result::Result<T, CliError>;
