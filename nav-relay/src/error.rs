//! Error types for the relay

use nav_extractor::CodecError;
use thiserror::Error;

/// Failures of the upstream collaborator (notification capture side)
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum UpstreamError {
    #[error("No access to notifications")]
    NoAccess,

    #[error("Upstream command failed: {0}")]
    CommandFailed(String),
}

#[derive(Debug, Error)]
pub enum RelayError {
    #[error("No port available from the candidate list {0:?}")]
    NoPortAvailable(Vec<u16>),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Codec error: {0}")]
    Codec(#[from] CodecError),

    #[error("Upstream error: {0}")]
    Upstream(#[from] UpstreamError),

    #[error("Configuration error: {0}")]
    Config(String),
}
