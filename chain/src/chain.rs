//! The block chain: an ordered block sequence with a single open tip.
//!
//! The chain owns its blocks as an indexable sequence. Parental linkage is
//! carried by the stub embedded in each block, so reconciliation only ever
//! rewrites the tail. Two ways a block can join:
//!
//! - *extension*: a block whose parent is the closed tip is appended;
//! - *tip-close reconciliation*: a closed block at the open tip's index
//!   takes the tip's position, and the still-open tip rebases onto it.

use crate::block::{Block, ParentRef};
use crate::error::ChainError;
use crate::identity::Identity;

/// A replica of the block chain.
///
/// A chain is never empty: its first element is the root and its last
/// element is the tip, which is the only block allowed to be open.
#[derive(Clone, Debug)]
pub struct Chain {
    blocks: Vec<Block>,
}

impl Chain {
    /// Generates a new chain: a root and its open child.
    pub fn generate(user: &Identity, magic_number: Option<&str>) -> Result<Self, ChainError> {
        let root = Block::make_root(user, magic_number)?;
        let tip = Block::child_of(&root)?;
        Self::from_blocks(vec![root, tip])
    }

    /// Builds a chain from blocks, failing with [`ChainError::InvalidChain`]
    /// unless the sequence verifies as a whole.
    pub fn from_blocks(blocks: Vec<Block>) -> Result<Self, ChainError> {
        let chain = Self { blocks };
        if !chain.verify() {
            return Err(ChainError::InvalidChain);
        }
        Ok(chain)
    }

    pub fn len(&self) -> usize {
        self.blocks.len()
    }

    pub fn is_empty(&self) -> bool {
        self.blocks.is_empty()
    }

    pub fn blocks(&self) -> &[Block] {
        &self.blocks
    }

    pub fn iter(&self) -> std::slice::Iter<'_, Block> {
        self.blocks.iter()
    }

    /// Returns the block at `index`, counting from the tail for negative
    /// values (`-1` is the tip).
    pub fn block_at(&self, index: i64) -> Option<&Block> {
        let len = self.blocks.len() as i64;
        let pos = if index < 0 { len + index } else { index };
        if (0..len).contains(&pos) {
            self.blocks.get(pos as usize)
        } else {
            None
        }
    }

    /// Returns the last block.
    pub fn tip(&self) -> &Block {
        self.blocks.last().expect("chain is never empty")
    }

    /// Returns the last block mutably, for closing it in place.
    pub fn tip_mut(&mut self) -> &mut Block {
        self.blocks.last_mut().expect("chain is never empty")
    }

    /// Returns `true` if some block in the chain has the same signature.
    pub fn contains(&self, block: &Block) -> bool {
        self.blocks
            .iter()
            .any(|b| b.signature() == block.signature())
    }

    /// Verifies the whole chain.
    ///
    /// The root must be a valid root; every following block must link to
    /// its predecessor by signature and index and, except for a possibly
    /// still-open tip, verify as closed.
    pub fn verify(&self) -> bool {
        let Some(root) = self.blocks.first() else {
            return false;
        };
        if !root.is_root() || !matches!(root.verify(), Ok(true)) {
            return false;
        }

        for i in 1..self.blocks.len() {
            let block = &self.blocks[i];
            let parent = &self.blocks[i - 1];

            if block.is_root() {
                return false;
            }
            let Some(stub) = block.parent() else {
                return false;
            };
            if Some(stub.signature()) != parent.signature() {
                return false;
            }
            if block.index() != parent.index() + 1 {
                return false;
            }

            match block.verify() {
                Ok(true) => {}
                Err(ChainError::BlockNotClosed) if i == self.blocks.len() - 1 => {}
                _ => return false,
            }
        }

        true
    }

    /// Joins a new block into the chain.
    ///
    /// Case A appends an extension of the closed tip. Case B reconciles a
    /// remote closure with the still-open local tip: the incoming closed
    /// block takes the tip's position and the tip rebases onto it,
    /// keeping its pooled messages in place. Anything else, and anything
    /// that leaves the chain unverifiable, fails with
    /// [`ChainError::InvalidChain`] without modifying the chain.
    pub fn join(&mut self, block: Block) -> Result<(), ChainError> {
        enum Applied {
            Appended,
            Rebased { old_parent: ParentRef },
        }

        if block.is_root() {
            return Err(ChainError::InvalidChain);
        }
        if block.is_closed() && !matches!(block.verify(), Ok(true)) {
            return Err(ChainError::InvalidChain);
        }

        let tip_pos = self.blocks.len() - 1;
        let applied = {
            let tip = &self.blocks[tip_pos];

            let extends_tip = tip.is_closed()
                && block.parent().map(|p| p.signature()) == tip.signature()
                && block.index() == tip.index() + 1;
            let closes_tip =
                block.is_closed() && !tip.is_closed() && block.index() == tip.index();

            if extends_tip {
                self.blocks.push(block);
                Applied::Appended
            } else if closes_tip {
                let Some(old_parent) = self.blocks[tip_pos].parent().cloned() else {
                    return Err(ChainError::InvalidChain);
                };
                let stub = ParentRef::of(&block)?;

                self.blocks.insert(tip_pos, block);
                let tip = &mut self.blocks[tip_pos + 1];
                tip.index += 1;
                tip.parent = Some(stub);

                Applied::Rebased { old_parent }
            } else {
                return Err(ChainError::InvalidChain);
            }
        };

        if !self.verify() {
            // Undo, so a rejected join never corrupts the replica.
            match applied {
                Applied::Appended => {
                    self.blocks.pop();
                }
                Applied::Rebased { old_parent } => {
                    self.blocks.remove(tip_pos);
                    let tip = &mut self.blocks[tip_pos];
                    tip.index -= 1;
                    tip.parent = Some(old_parent);
                }
            }
            return Err(ChainError::InvalidChain);
        }

        Ok(())
    }
}

impl std::ops::Index<usize> for Chain {
    type Output = Block;

    fn index(&self, index: usize) -> &Block {
        &self.blocks[index]
    }
}

impl<'a> IntoIterator for &'a Chain {
    type Item = &'a Block;
    type IntoIter = std::slice::Iter<'a, Block>;

    fn into_iter(self) -> Self::IntoIter {
        self.blocks.iter()
    }
}

#[cfg(test)]
mod tests {
    use serde_json::json;

    use super::*;
    use crate::message::Message;
    use crate::mining::mine;

    fn test_identity() -> Identity {
        Identity::generate_with_bits(1024).expect("key generation should succeed")
    }

    /// Closes the tip of `chain` as `user` and joins the successor,
    /// returning the signature of the block that just closed.
    fn close_tip(chain: &mut Chain, user: &Identity) -> Vec<u8> {
        let key = mine(chain.tip()).unwrap();
        let next = chain.tip_mut().close(user, &key, None, None).unwrap();
        chain.join(next).unwrap();
        chain[chain.len() - 2].signature().unwrap().to_vec()
    }

    fn assert_monotonic(chain: &Chain) {
        for i in 1..chain.len() {
            assert_eq!(chain[i].index(), chain[i - 1].index() + 1);
            assert_eq!(
                chain[i].parent().unwrap().signature(),
                chain[i - 1].signature().unwrap(),
            );
        }
    }

    #[test]
    fn generate_creates_root_and_open_tip() {
        let user = test_identity();
        let chain = Chain::generate(&user, Some("000")).unwrap();

        assert_eq!(chain.len(), 2);
        assert!(chain[0].is_closed());
        assert!(!chain[1].is_closed());
        assert!(chain.verify());
    }

    #[test]
    fn closing_the_tip_extends_the_chain() {
        let user = test_identity();
        let mut chain = Chain::generate(&user, Some("0")).unwrap();

        close_tip(&mut chain, &user);

        assert_eq!(chain.len(), 3);
        assert!(chain.verify());
        assert!(!chain.tip().is_closed());
        assert_monotonic(&chain);

        close_tip(&mut chain, &user);
        assert_eq!(chain.len(), 4);
        assert_monotonic(&chain);
    }

    #[test]
    fn remote_closure_rebases_the_open_tip() {
        let user = test_identity();
        let mut chain = Chain::generate(&user, Some("0")).unwrap();

        // Local replica pools a message on its open tip.
        let message = Message::new(user.clone(), "ns", json!("pooled locally")).unwrap();
        chain.tip_mut().pool(message.clone()).unwrap();

        // A remote miner closes its own (empty) copy of the same tip.
        let mut remote_tip = Block::child_of(&chain[0]).unwrap();
        let key = mine(&remote_tip).unwrap();
        remote_tip.close(&user, &key, None, None).unwrap();
        let remote_sig = remote_tip.signature().unwrap().to_vec();

        chain.join(remote_tip).unwrap();

        assert_eq!(chain.len(), 3);
        assert!(chain.verify());

        // The closed remote block took the tip's slot.
        assert_eq!(chain[1].signature().unwrap(), remote_sig.as_slice());

        // The open tip rebased onto it and kept its pooled message.
        let tip = chain.tip();
        assert!(!tip.is_closed());
        assert_eq!(tip.index(), chain[1].index() + 1);
        assert_eq!(tip.parent().unwrap().signature(), remote_sig.as_slice());
        assert_eq!(tip.messages().len(), 1);
        assert_eq!(tip.messages()[0].signature(), message.signature());
    }

    #[test]
    fn joining_a_root_is_rejected() {
        let user = test_identity();
        let mut chain = Chain::generate(&user, Some("0")).unwrap();

        let other_root = Block::make_root(&user, Some("0")).unwrap();
        match chain.join(other_root) {
            Err(ChainError::InvalidChain) => {}
            other => panic!("unexpected result: {other:?}"),
        }
        assert_eq!(chain.len(), 2);
    }

    #[test]
    fn joining_a_closure_from_a_foreign_chain_is_rejected_and_undone() {
        let user = test_identity();
        let mut chain = Chain::generate(&user, Some("0")).unwrap();

        // A closed block at the right index, but hanging off a different
        // root. It verifies in isolation against its own parent stub and
        // only the full-chain check can reject it.
        let mut foreign = Chain::generate(&user, Some("0")).unwrap();
        let key = mine(foreign.tip()).unwrap();
        foreign.tip_mut().close(&user, &key, None, None).unwrap();
        let stray = foreign.tip().clone();

        match chain.join(stray) {
            Err(ChainError::InvalidChain) => {}
            other => panic!("unexpected result: {other:?}"),
        }

        // The replica is untouched.
        assert_eq!(chain.len(), 2);
        assert!(chain.verify());
        assert_eq!(chain.tip().index(), 1);
        assert_eq!(
            chain.tip().parent().unwrap().signature(),
            chain[0].signature().unwrap(),
        );
    }

    #[test]
    fn joining_a_non_contiguous_block_is_rejected() {
        let user = test_identity();
        let mut chain = Chain::generate(&user, Some("0")).unwrap();
        close_tip(&mut chain, &user);

        // Re-deliver a closure for an index that is already closed.
        let mut stale_tip = Block::child_of(&chain[0]).unwrap();
        let key = mine(&stale_tip).unwrap();
        stale_tip.close(&user, &key, None, None).unwrap();

        // The local tip is open at index 2; the stale closure is at index
        // 1 and matches neither join case.
        match chain.join(stale_tip) {
            Err(ChainError::InvalidChain) => {}
            other => panic!("unexpected result: {other:?}"),
        }
        assert_eq!(chain.len(), 3);
    }

    #[test]
    fn containment_is_by_signature() {
        let user = test_identity();
        let mut chain = Chain::generate(&user, Some("0")).unwrap();
        close_tip(&mut chain, &user);

        let closed = chain[1].clone();
        assert!(chain.contains(&closed));

        let mut foreign = Chain::generate(&user, Some("0")).unwrap();
        let key = mine(foreign.tip()).unwrap();
        foreign.tip_mut().close(&user, &key, None, None).unwrap();
        assert!(!chain.contains(foreign.tip()));
    }

    #[test]
    fn block_at_supports_tail_relative_indices() {
        let user = test_identity();
        let chain = Chain::generate(&user, Some("0")).unwrap();

        assert_eq!(chain.block_at(0).unwrap().index(), 0);
        assert_eq!(chain.block_at(1).unwrap().index(), 1);
        assert_eq!(chain.block_at(-1).unwrap().index(), 1);
        assert_eq!(chain.block_at(-2).unwrap().index(), 0);
        assert!(chain.block_at(2).is_none());
        assert!(chain.block_at(-3).is_none());
    }

    #[test]
    fn from_blocks_rejects_broken_sequences() {
        let user = test_identity();
        let chain = Chain::generate(&user, Some("0")).unwrap();

        // Tip without its root.
        match Chain::from_blocks(vec![chain.tip().clone()]) {
            Err(ChainError::InvalidChain) => {}
            other => panic!("unexpected result: {other:?}"),
        }

        // Empty sequence.
        match Chain::from_blocks(Vec::new()) {
            Err(ChainError::InvalidChain) => {}
            other => panic!("unexpected result: {other:?}"),
        }
    }
}
