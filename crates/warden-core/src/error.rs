//! Error types shared across warden crates.

use std::path::PathBuf;

use thiserror::Error;

/// Configuration problems. All of these are fatal at startup.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("failed to read config file {path}: {source}")]
    Read {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("failed to parse config: {0}")]
    Parse(#[from] toml::de::Error),

    #[error("no tcp ports configured for monitoring")]
    NoPorts,

    #[error("invalid config: {0}")]
    Invalid(String),
}

/// Errors from a container lifecycle driver.
#[derive(Debug, Error)]
pub enum DriverError {
    #[error("container {0} not found")]
    NotFound(String),

    #[error("failed to spawn {program}: {source}")]
    Spawn {
        program: String,
        #[source]
        source: std::io::Error,
    },

    #[error("`{command}` failed: {stderr}")]
    CommandFailed { command: String, stderr: String },

    #[error("container did not reach {target} within {waited_secs}s")]
    Timeout { target: String, waited_secs: u64 },

    #[error("container entered error state while waiting for {0}")]
    ErrorState(String),

    #[error("failed to decode driver output: {0}")]
    Decode(String),
}

/// A message could not be delivered to one recipient.
#[derive(Debug, Error)]
pub enum DeliveryError {
    #[error("recipient {recipient} rejected message: {reason}")]
    Rejected { recipient: String, reason: String },

    #[error("transport error: {0}")]
    Transport(String),
}
