//! Wire serialization.
//!
//! Blocks and messages travel between peers as JSON documents with
//! base64-framed binary fields and PEM-framed identities. A chain is a
//! JSON array of blocks, root first.
//!
//! The wire form does not carry the magic number, so deserializing a block
//! rebuilds its parent stub with a caller-supplied magic number that
//! defaults to [`DEFAULT_MAGIC_NUMBER`].

use base64::Engine as _;
use base64::engine::general_purpose::STANDARD as BASE64;
use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::block::{Block, Closure, DEFAULT_MAGIC_NUMBER, ParentRef, validate_magic_number};
use crate::chain::Chain;
use crate::error::ChainError;
use crate::identity::Identity;
use crate::message::Message;

/// Wire form of a [`Message`].
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct MessageDto {
    /// Author's public key as PEM.
    pub user: String,
    pub namespace: String,
    pub payload: Value,
    /// Base64-encoded signature bytes.
    pub signature: String,
}

/// Wire form of a [`Block`].
///
/// The closure fields are all `null` while the block is open.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct BlockDto {
    pub index: u64,
    /// Base64-encoded signature of the parent block, `null` for the root.
    pub parent: Option<String>,
    pub key: Option<String>,
    /// Closer's public key as PEM.
    pub closer: Option<String>,
    pub timestamp: Option<u64>,
    pub signature: Option<String>,
    pub messages: Vec<MessageDto>,
}

fn decode(field: &str, what: &str) -> Result<Vec<u8>, ChainError> {
    BASE64
        .decode(field)
        .map_err(|e| ChainError::Codec(format!("bad base64 in {what}: {e}")))
}

impl Message {
    /// Converts to the wire form.
    pub fn to_dto(&self) -> Result<MessageDto, ChainError> {
        Ok(MessageDto {
            user: self.author().public_pem()?,
            namespace: self.namespace().to_string(),
            payload: self.payload().clone(),
            signature: BASE64.encode(self.signature()),
        })
    }

    /// Reconstructs from the wire form, verifying the signature.
    pub fn from_dto(dto: &MessageDto) -> Result<Self, ChainError> {
        let author = Identity::from_pem(&dto.user)?;
        let signature = decode(&dto.signature, "message signature")?;

        Message::with_signature(author, dto.namespace.clone(), dto.payload.clone(), signature)
    }
}

impl Block {
    /// Converts to the wire form.
    pub fn to_dto(&self) -> Result<BlockDto, ChainError> {
        let closer = match self.closer() {
            Some(closer) => Some(closer.public_pem()?),
            None => None,
        };
        let messages = self
            .messages()
            .iter()
            .map(Message::to_dto)
            .collect::<Result<Vec<_>, _>>()?;

        Ok(BlockDto {
            index: self.index(),
            parent: self.parent().map(|p| BASE64.encode(p.signature())),
            key: self.key().map(|k| BASE64.encode(k)),
            closer,
            timestamp: self.timestamp(),
            signature: self.signature().map(|s| BASE64.encode(s)),
            messages,
        })
    }

    /// Reconstructs a block from the wire form.
    ///
    /// A block with a parent gets a stub carrying `(index - 1,
    /// magic_number, parent signature)`; a block without one is the root.
    /// A closure is only reconstructed when all four closure fields are
    /// present; anything partial deserializes as an open block. Messages
    /// are verified individually.
    pub fn from_dto(dto: &BlockDto, magic_number: Option<&str>) -> Result<Self, ChainError> {
        let magic_number = magic_number.unwrap_or(DEFAULT_MAGIC_NUMBER);
        validate_magic_number(magic_number)?;

        let mut block = match &dto.parent {
            Some(parent_signature) => {
                let parent_index = dto.index.checked_sub(1).ok_or_else(|| {
                    ChainError::Codec("non-root block cannot have index 0".to_string())
                })?;
                let stub = ParentRef::new(
                    parent_index,
                    magic_number,
                    decode(parent_signature, "parent signature")?,
                )?;
                Block::with_parent(stub)
            }
            None => Block {
                index: 0,
                magic_number: magic_number.to_string(),
                parent: None,
                messages: Vec::new(),
                closure: None,
            },
        };

        block.closure = match (&dto.closer, &dto.key, dto.timestamp, &dto.signature) {
            (Some(closer), Some(key), Some(timestamp), Some(signature)) => Some(Closure {
                closer: Identity::from_pem(closer)?,
                key: decode(key, "key")?,
                timestamp,
                signature: decode(signature, "block signature")?,
            }),
            _ => None,
        };

        block.messages = dto
            .messages
            .iter()
            .map(Message::from_dto)
            .collect::<Result<Vec<_>, _>>()?;

        Ok(block)
    }
}

impl Chain {
    /// Converts the whole chain to its wire form, root first.
    pub fn to_dto(&self) -> Result<Vec<BlockDto>, ChainError> {
        self.iter().map(Block::to_dto).collect()
    }

    /// Reconstructs and verifies a chain from its wire form.
    pub fn from_dto(blocks: &[BlockDto]) -> Result<Self, ChainError> {
        let blocks = blocks
            .iter()
            .map(|dto| Block::from_dto(dto, None))
            .collect::<Result<Vec<_>, _>>()?;

        Chain::from_blocks(blocks)
    }
}
