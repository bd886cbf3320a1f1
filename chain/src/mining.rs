//! Nonce search for closing a block.

use sha2::{Digest, Sha256};

use crate::block::{Block, KEY_LEN};
use crate::error::ChainError;

/// Finds a key that closes `block`.
///
/// Keys are 32-byte big-endian integers tried from 0 upward; the first key
/// satisfying [`Block::verify_key`] is returned. The digest state over the
/// parent signature and the message signatures is computed once and cloned
/// per trial. The block must be open and have a parent.
///
/// Exhausting the search domain fails with [`ChainError::KeyNotFound`];
/// for small magic numbers this is practically unreachable.
pub fn mine(block: &Block) -> Result<[u8; KEY_LEN], ChainError> {
    if block.is_closed() {
        return Err(ChainError::BlockAlreadyClosed);
    }
    let Some(parent) = block.parent() else {
        return Err(ChainError::KeyNotFound);
    };

    let mut base = Sha256::new();
    base.update(parent.signature());
    for message in block.messages() {
        base.update(message.signature());
    }

    let magic_number = block.magic_number();
    for counter in 0..u64::MAX {
        let mut key = [0u8; KEY_LEN];
        key[KEY_LEN - 8..].copy_from_slice(&counter.to_be_bytes());

        let mut hasher = base.clone();
        hasher.update(key);

        if hex::encode(hasher.finalize()).ends_with(magic_number) {
            return Ok(key);
        }
    }

    Err(ChainError::KeyNotFound)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::identity::Identity;

    fn test_identity() -> Identity {
        Identity::generate_with_bits(1024).expect("key generation should succeed")
    }

    #[test]
    fn mined_key_satisfies_verify_key() {
        let user = test_identity();
        let root = Block::make_root(&user, Some("00")).unwrap();
        let child = Block::child_of(&root).unwrap();

        let key = mine(&child).unwrap();
        assert_eq!(key.len(), KEY_LEN);
        assert!(child.verify_key(&key));
    }

    #[test]
    fn mining_a_closed_block_fails() {
        let user = test_identity();
        let root = Block::make_root(&user, Some("0")).unwrap();

        match mine(&root) {
            Err(ChainError::BlockAlreadyClosed) => {}
            other => panic!("unexpected result: {other:?}"),
        }
    }

    #[test]
    fn mining_accounts_for_pooled_messages() {
        use serde_json::json;

        use crate::message::Message;

        let user = test_identity();
        let root = Block::make_root(&user, Some("00")).unwrap();
        let mut child = Block::child_of(&root).unwrap();
        child
            .pool(Message::new(user.clone(), "ns", json!("hello")).unwrap())
            .unwrap();

        let key = mine(&child).unwrap();
        assert!(child.verify_key(&key));
    }
}
