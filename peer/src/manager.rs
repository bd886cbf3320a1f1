//! Local replica state.
//!
//! The [`ChainManager`] owns this process's chain replica together with
//! the outbound [`PeerClient`], and is the single entry point for every
//! state transition: block ingress from peers, tip closure, and message
//! pooling. Transports serialize access to it (one mutex is enough; the
//! critical sections are small).

use chain::{Block, Chain, ChainError, Identity, Message};

use crate::client::PeerClient;
use crate::error::PeerError;

/// A chain replica and its view of the peer mesh.
pub struct ChainManager {
    addr: String,
    chain: Chain,
    client: PeerClient,
}

impl ChainManager {
    /// Wraps an existing chain for the peer at `addr`.
    pub fn new(addr: impl Into<String>, chain: Chain) -> Result<Self, PeerError> {
        let addr = addr.into();
        let client = PeerClient::new(addr.clone())?;

        Ok(Self { addr, chain, client })
    }

    /// Starts a brand-new chain with `root_user` as its administrator.
    pub fn generate(addr: impl Into<String>, root_user: &Identity) -> Result<Self, PeerError> {
        let chain = Chain::generate(root_user, None)?;
        Self::new(addr, chain)
    }

    /// Bootstraps a replica by fetching the chain from `remote`, then
    /// connecting to it.
    pub fn clone_from(addr: impl Into<String>, remote: &str) -> Result<Self, PeerError> {
        let chain = PeerClient::detached()?.get_chain(remote)?;
        let mut manager = Self::new(addr, chain)?;
        manager.connect(remote)?;

        Ok(manager)
    }

    pub fn addr(&self) -> &str {
        &self.addr
    }

    pub fn chain(&self) -> &Chain {
        &self.chain
    }

    /// Returns the connected peer addresses.
    pub fn peers(&self) -> Vec<String> {
        self.client.hosts()
    }

    /// Records an inbound connection from `addr`.
    pub fn connected(&mut self, addr: &str) {
        self.client.connected(addr);
    }

    /// Records a disconnect from `addr`.
    pub fn disconnected(&mut self, addr: &str) {
        self.client.disconnected(addr);
    }

    /// Requests a connection with the peer at `addr`.
    pub fn connect(&mut self, addr: &str) -> Result<Vec<String>, PeerError> {
        self.client.connect_request(addr)
    }

    /// Leaves the mesh, best-effort.
    pub fn disconnect_all(&mut self) {
        self.client.disconnect_all();
    }

    /// Ingresses a block, from a peer (`origin` set) or from a local
    /// closure (`origin` empty).
    ///
    /// Returns `false` without touching anything if the block is already
    /// contained; otherwise joins it and gossips the element that just
    /// became closed (the second-to-last after the join, since the tail
    /// stays an open tip) to every peer except `origin`. Gossip delivery
    /// is best-effort; join failures propagate.
    pub fn add_block(&mut self, block: Block, origin: Option<&str>) -> Result<bool, ChainError> {
        if self.chain.contains(&block) {
            return Ok(false);
        }

        self.chain.join(block)?;

        let closed = &self.chain[self.chain.len() - 2];
        if let Err(e) = self.client.put_block(closed, origin) {
            tracing::warn!("gossip fan-out failed: {e}");
        }

        Ok(true)
    }

    /// Applies a closure tuple to the current tip.
    ///
    /// Any failure (stale tip, bad key, bad signature) is reported as
    /// `false` and leaves the replica untouched. On success the fresh
    /// open child joins the chain and the closure is propagated, skipping
    /// `host` when the tuple itself arrived from a peer.
    pub fn close_block(
        &mut self,
        closer: &Identity,
        timestamp: u64,
        key: &[u8],
        signature: Vec<u8>,
        host: Option<&str>,
    ) -> bool {
        let child = match self
            .chain
            .tip_mut()
            .close(closer, key, Some(timestamp), Some(signature))
        {
            Ok(child) => child,
            Err(e) => {
                tracing::warn!("rejected closure: {e}");
                return false;
            }
        };

        match self.add_block(child, host) {
            Ok(_) => true,
            Err(e) => {
                tracing::error!("failed to extend the chain after a closure: {e}");
                false
            }
        }
    }

    /// Pools a message into the current tip.
    pub fn add_message(&mut self, message: Message) -> Result<(), ChainError> {
        self.chain.tip_mut().pool(message)
    }
}

#[cfg(test)]
mod tests {
    use serde_json::json;

    use chain::mine;

    use super::*;

    fn test_identity() -> Identity {
        Identity::generate_with_bits(1024).expect("key generation should succeed")
    }

    fn test_manager(user: &Identity) -> ChainManager {
        let chain = Chain::generate(user, Some("0")).expect("chain generation should succeed");
        ChainManager::new("http://localhost:50001", chain).expect("manager should build")
    }

    /// Produces a valid closure of the manager's current tip without
    /// going through the manager, like a remote miner would.
    fn remote_closure(manager: &ChainManager, user: &Identity) -> Block {
        let mut copy = manager.chain().tip().clone();
        let key = mine(&copy).unwrap();
        copy.close(user, &key, None, None).unwrap();
        copy
    }

    #[test]
    fn add_message_pools_into_the_tip() {
        let user = test_identity();
        let mut manager = test_manager(&user);

        let message = Message::new(user, "ns", json!("hello")).unwrap();
        manager.add_message(message).unwrap();

        assert_eq!(manager.chain().tip().messages().len(), 1);
    }

    #[test]
    fn duplicate_blocks_are_ignored() {
        let user = test_identity();
        let mut manager = test_manager(&user);

        let closed = remote_closure(&manager, &user);

        assert!(manager.add_block(closed.clone(), None).unwrap());
        assert_eq!(manager.chain().len(), 3);

        // Second delivery of the same block, e.g. via another gossip path.
        assert!(!manager.add_block(closed, None).unwrap());
        assert_eq!(manager.chain().len(), 3);
    }

    #[test]
    fn close_block_applies_a_remote_closure_tuple() {
        let user = test_identity();
        let mut manager = test_manager(&user);

        let closed = remote_closure(&manager, &user);
        let closer = Identity::from_pem(&user.public_pem().unwrap()).unwrap();

        let ok = manager.close_block(
            &closer,
            closed.timestamp().unwrap(),
            closed.key().unwrap(),
            closed.signature().unwrap().to_vec(),
            None,
        );

        assert!(ok);
        assert_eq!(manager.chain().len(), 3);
        assert!(manager.chain()[1].is_closed());
        assert!(!manager.chain().tip().is_closed());
        assert_eq!(manager.chain().tip().index(), 2);
    }

    #[test]
    fn close_block_rejects_a_bad_key_without_mutating() {
        let user = test_identity();
        let mut manager = test_manager(&user);

        let ok = manager.close_block(&user, 12345, &[0u8; chain::KEY_LEN], vec![1, 2, 3], None);

        assert!(!ok);
        assert_eq!(manager.chain().len(), 2);
        assert!(!manager.chain().tip().is_closed());
    }

    #[test]
    fn losing_closure_of_a_race_is_rejected_as_non_contiguous() {
        let user = test_identity();
        let mut manager = test_manager(&user);

        // Two miners close the same tip; the winner's block arrives first
        // and rebases the open tip to index 2.
        let winner = remote_closure(&manager, &user);
        let loser = remote_closure(&manager, &user);
        assert!(manager.add_block(winner, None).unwrap());

        // The loser's block still carries index 1 and matches neither
        // join case.
        match manager.add_block(loser, None) {
            Err(ChainError::InvalidChain) => {}
            other => panic!("unexpected result: {other:?}"),
        }
        assert_eq!(manager.chain().len(), 3);
    }

    #[test]
    fn peer_set_roundtrip() {
        let user = test_identity();
        let mut manager = test_manager(&user);

        manager.connected("http://localhost:50002");
        assert_eq!(manager.peers(), vec!["http://localhost:50002".to_string()]);

        manager.disconnected("http://localhost:50002");
        assert!(manager.peers().is_empty());
    }
}
