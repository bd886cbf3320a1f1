use std::fmt;

/// Error type shared by all fallible chain operations.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum ChainError {
    /// A message or closure signature failed verification.
    InvalidSignature,
    /// A proof-of-work key has the wrong length or does not satisfy the
    /// digest suffix rule.
    InvalidKey,
    /// The magic number is empty or not usable as a hex suffix.
    InvalidMagicNumber,
    /// Mutation attempted on a closed block.
    BlockAlreadyClosed,
    /// Verification attempted on an open block.
    BlockNotClosed,
    /// Structural linkage, ordering, or root rules violated.
    InvalidChain,
    /// Signing attempted with a public-only identity.
    NoPrivateKey,
    /// The mining search domain was exhausted without a valid key.
    KeyNotFound,
    /// RSA or PEM failure with a dynamic error message.
    Crypto(String),
    /// Wire decoding failure with a dynamic error message.
    Codec(String),
}

impl fmt::Display for ChainError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ChainError::InvalidSignature => write!(f, "invalid signature"),
            ChainError::InvalidKey => write!(f, "invalid proof-of-work key"),
            ChainError::InvalidMagicNumber => {
                write!(f, "magic number must be a non-empty hex string")
            }
            ChainError::BlockAlreadyClosed => write!(f, "block is already closed"),
            ChainError::BlockNotClosed => write!(f, "block is not closed"),
            ChainError::InvalidChain => write!(f, "invalid chain"),
            ChainError::NoPrivateKey => write!(f, "identity has no private key"),
            ChainError::KeyNotFound => write!(f, "no key found in the search domain"),
            ChainError::Crypto(msg) => write!(f, "crypto error: {msg}"),
            ChainError::Codec(msg) => write!(f, "codec error: {msg}"),
        }
    }
}

impl std::error::Error for ChainError {}
