use std::fmt;

use chain::ChainError;

/// Errors from the replication layer.
#[derive(Debug)]
pub enum PeerError {
    /// Failure to reach a peer (connect, send, timeout).
    Transport(String),
    /// A peer answered with an unexpected HTTP status.
    Status(String),
    /// A peer's response could not be decoded or failed verification.
    Protocol(String),
    /// The operation needs the client's own address, but none is bound.
    NoAddress,
    /// Underlying chain failure.
    Chain(ChainError),
}

impl From<ChainError> for PeerError {
    fn from(e: ChainError) -> Self {
        PeerError::Chain(e)
    }
}

impl From<reqwest::Error> for PeerError {
    fn from(e: reqwest::Error) -> Self {
        PeerError::Transport(e.to_string())
    }
}

impl fmt::Display for PeerError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            PeerError::Transport(msg) => write!(f, "transport error: {msg}"),
            PeerError::Status(msg) => write!(f, "{msg}"),
            PeerError::Protocol(msg) => write!(f, "protocol error: {msg}"),
            PeerError::NoAddress => write!(f, "client has no bound address"),
            PeerError::Chain(e) => write!(f, "{e}"),
        }
    }
}

impl std::error::Error for PeerError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            PeerError::Chain(e) => Some(e),
            _ => None,
        }
    }
}
