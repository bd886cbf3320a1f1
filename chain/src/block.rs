// chain/src/block.rs

//! Block types and the proof-of-work closure protocol.
//!
//! A block starts *open*: it accumulates signed messages and carries a
//! reference to its closed parent. Closing a block means presenting a
//! 32-byte key such that the SHA-256 digest over
//! `parent.signature ++ message signatures ++ key`, rendered as lowercase
//! hex, ends with the chain's magic number, together with a signature by
//! the closer over `timestamp ++ key`. Closure is atomic and terminal.

use std::time::{SystemTime, UNIX_EPOCH};

use rand::RngCore;
use sha2::{Digest, Sha256};

use crate::error::ChainError;
use crate::identity::Identity;
use crate::message::Message;

/// Magic number used when none is configured.
pub const DEFAULT_MAGIC_NUMBER: &str = "c105ed";

/// Length in bytes of every proof-of-work key and of the root key.
pub const KEY_LEN: usize = 32;

/// Checks that a magic number is a non-empty lowercase hex string.
pub(crate) fn validate_magic_number(magic_number: &str) -> Result<(), ChainError> {
    let ok = !magic_number.is_empty()
        && magic_number
            .chars()
            .all(|c| c.is_ascii_digit() || ('a'..='f').contains(&c));
    if ok {
        Ok(())
    } else {
        Err(ChainError::InvalidMagicNumber)
    }
}

/// Returns the wall-clock time in milliseconds since the Unix epoch.
///
/// Falls back to 0 if the system clock is before the epoch.
pub(crate) fn now_millis() -> u64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_millis() as u64)
        .unwrap_or(0)
}

/// Pre-image of a closure signature: 8-byte big-endian timestamp, then key.
fn closure_preimage(timestamp: u64, key: &[u8]) -> Vec<u8> {
    let mut data = timestamp.to_be_bytes().to_vec();
    data.extend_from_slice(key);
    data
}

/// Reference to a block's parent.
///
/// In-memory children derive this from the full parent block; blocks
/// reconstructed from the wire carry only this stub, which is exactly
/// enough to verify linkage and the proof-of-work hash without
/// reconstructing ancestry.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ParentRef {
    index: u64,
    magic_number: String,
    signature: Vec<u8>,
}

impl ParentRef {
    /// Builds a parent stub from its raw parts.
    pub fn new(
        index: u64,
        magic_number: impl Into<String>,
        signature: Vec<u8>,
    ) -> Result<Self, ChainError> {
        let magic_number = magic_number.into();
        validate_magic_number(&magic_number)?;

        Ok(Self {
            index,
            magic_number,
            signature,
        })
    }

    /// Builds a parent stub pointing at a closed block.
    ///
    /// Fails with [`ChainError::BlockNotClosed`] if the block is open,
    /// since an open block has no signature to link against.
    pub fn of(block: &Block) -> Result<Self, ChainError> {
        let signature = block.signature().ok_or(ChainError::BlockNotClosed)?;

        Ok(Self {
            index: block.index(),
            magic_number: block.magic_number().to_string(),
            signature: signature.to_vec(),
        })
    }

    pub fn index(&self) -> u64 {
        self.index
    }

    pub fn magic_number(&self) -> &str {
        &self.magic_number
    }

    pub fn signature(&self) -> &[u8] {
        &self.signature
    }
}

/// Closure metadata, set atomically when a block transitions to closed.
#[derive(Clone, Debug)]
pub(crate) struct Closure {
    pub(crate) closer: Identity,
    pub(crate) key: Vec<u8>,
    pub(crate) timestamp: u64,
    pub(crate) signature: Vec<u8>,
}

/// One node of the chain.
#[derive(Clone, Debug)]
pub struct Block {
    pub(crate) index: u64,
    pub(crate) magic_number: String,
    pub(crate) parent: Option<ParentRef>,
    pub(crate) messages: Vec<Message>,
    pub(crate) closure: Option<Closure>,
}

impl Block {
    /// Creates the root of a new chain.
    ///
    /// The root holds no messages and is closed from creation: its key is
    /// 32 random bytes and its signature covers `timestamp ++ key` under
    /// the given user, who acts as the chain's administrator.
    pub fn make_root(user: &Identity, magic_number: Option<&str>) -> Result<Self, ChainError> {
        let magic_number = magic_number.unwrap_or(DEFAULT_MAGIC_NUMBER).to_string();
        validate_magic_number(&magic_number)?;

        let mut key = vec![0u8; KEY_LEN];
        rand::thread_rng().fill_bytes(&mut key);

        let timestamp = now_millis();
        let signature = user.sign_raw(&closure_preimage(timestamp, &key))?;

        Ok(Self {
            index: 0,
            magic_number,
            parent: None,
            messages: Vec::new(),
            closure: Some(Closure {
                closer: user.clone(),
                key,
                timestamp,
                signature,
            }),
        })
    }

    /// Creates an open child of a closed block.
    ///
    /// The child inherits the parent's magic number and index + 1.
    pub fn child_of(parent: &Block) -> Result<Self, ChainError> {
        Ok(Self::with_parent(ParentRef::of(parent)?))
    }

    /// Creates an open block from a parent stub.
    pub(crate) fn with_parent(parent: ParentRef) -> Self {
        Self {
            index: parent.index + 1,
            magic_number: parent.magic_number.clone(),
            parent: Some(parent),
            messages: Vec::new(),
            closure: None,
        }
    }

    pub fn index(&self) -> u64 {
        self.index
    }

    pub fn magic_number(&self) -> &str {
        &self.magic_number
    }

    pub fn parent(&self) -> Option<&ParentRef> {
        self.parent.as_ref()
    }

    pub fn messages(&self) -> &[Message] {
        &self.messages
    }

    /// Returns `true` for the chain's first block.
    pub fn is_root(&self) -> bool {
        self.index == 0 && self.parent.is_none()
    }

    /// Returns `true` once the closure metadata is set.
    pub fn is_closed(&self) -> bool {
        self.closure.is_some()
    }

    pub fn closer(&self) -> Option<&Identity> {
        self.closure.as_ref().map(|c| &c.closer)
    }

    pub fn key(&self) -> Option<&[u8]> {
        self.closure.as_ref().map(|c| c.key.as_slice())
    }

    pub fn timestamp(&self) -> Option<u64> {
        self.closure.as_ref().map(|c| c.timestamp)
    }

    pub fn signature(&self) -> Option<&[u8]> {
        self.closure.as_ref().map(|c| c.signature.as_slice())
    }

    /// Pools a new message into this block.
    ///
    /// Fails with [`ChainError::BlockAlreadyClosed`] on a closed block and
    /// with [`ChainError::InvalidSignature`] if the message does not
    /// verify.
    pub fn pool(&mut self, message: Message) -> Result<(), ChainError> {
        if self.is_closed() {
            return Err(ChainError::BlockAlreadyClosed);
        }
        if !message.verify()? {
            return Err(ChainError::InvalidSignature);
        }

        self.messages.push(message);
        Ok(())
    }

    /// Verifies a closed block.
    ///
    /// Checks the closure signature, and for non-root blocks the index
    /// linkage to the parent stub and the proof-of-work hash. Returns
    /// `Ok(false)` on mismatch rather than an error; calling this on an
    /// open block fails with [`ChainError::BlockNotClosed`].
    pub fn verify(&self) -> Result<bool, ChainError> {
        let closure = self.closure.as_ref().ok_or(ChainError::BlockNotClosed)?;

        let preimage = closure_preimage(closure.timestamp, &closure.key);
        if !closure.closer.verify_raw(&preimage, &closure.signature) {
            return Ok(false);
        }

        if self.is_root() {
            return Ok(self.messages.is_empty());
        }

        let Some(parent) = &self.parent else {
            // Closed, non-root, but parentless: nothing to link against.
            return Ok(false);
        };
        if parent.index + 1 != self.index {
            return Ok(false);
        }

        Ok(self.verify_key(&closure.key))
    }

    /// Checks whether `key` closes this block.
    ///
    /// The key must be exactly [`KEY_LEN`] bytes, the magic number must
    /// match the parent's, and the SHA-256 digest over
    /// `parent.signature ++ message signatures ++ key` must end with the
    /// magic number in lowercase hex.
    pub fn verify_key(&self, key: &[u8]) -> bool {
        let Some(parent) = &self.parent else {
            return false;
        };

        if key.len() != KEY_LEN {
            return false;
        }
        if self.magic_number != parent.magic_number {
            return false;
        }

        let mut hasher = Sha256::new();
        hasher.update(&parent.signature);
        for message in &self.messages {
            hasher.update(message.signature());
        }
        hasher.update(key);

        hex::encode(hasher.finalize()).ends_with(&self.magic_number)
    }

    /// Closes this block and returns the next open block.
    ///
    /// A missing timestamp defaults to the wall clock; a missing signature
    /// is produced with the user's private key, while a provided one is
    /// verified against the user. The operation is all-or-nothing: on any
    /// failure this block is left untouched.
    pub fn close(
        &mut self,
        user: &Identity,
        key: &[u8],
        timestamp: Option<u64>,
        signature: Option<Vec<u8>>,
    ) -> Result<Block, ChainError> {
        if self.is_closed() {
            return Err(ChainError::BlockAlreadyClosed);
        }
        if !self.verify_key(key) {
            return Err(ChainError::InvalidKey);
        }

        let timestamp = timestamp.unwrap_or_else(now_millis);
        let preimage = closure_preimage(timestamp, key);

        let signature = match signature {
            Some(signature) => {
                if !user.verify_raw(&preimage, &signature) {
                    return Err(ChainError::InvalidSignature);
                }
                signature
            }
            None => user.sign_raw(&preimage)?,
        };

        self.closure = Some(Closure {
            closer: user.clone(),
            key: key.to_vec(),
            timestamp,
            signature,
        });

        Block::child_of(self)
    }
}
