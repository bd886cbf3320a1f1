//! Outbound peer protocol client.
//!
//! This client speaks the JSON-over-HTTP replication protocol to other
//! peers: connection handshakes, block gossip, closure submission, and
//! message posting. It uses the blocking `reqwest` client internally;
//! inside a Tokio runtime, calls must be wrapped in blocking tasks (the
//! endpoint layer does this).

use std::collections::HashSet;
use std::time::Duration;

use base64::Engine as _;
use base64::engine::general_purpose::STANDARD as BASE64;
use reqwest::blocking::{Client, Response};
use serde_json::json;

use chain::wire::BlockDto;
use chain::{Block, Chain, Message};

use crate::error::PeerError;

/// Timeout applied to every peer request.
const REQUEST_TIMEOUT: Duration = Duration::from_secs(10);

/// HTTP client for the outbound peer protocol.
///
/// A client bound to its own address (`new`) can take part in connection
/// handshakes; a detached client (`detached`) is enough for the mining
/// and messaging tools, which only talk to a single server.
pub struct PeerClient {
    addr: Option<String>,
    hosts: HashSet<String>,
    http: Client,
}

impl PeerClient {
    /// Creates a client bound to this peer's own public address.
    pub fn new(addr: impl Into<String>) -> Result<Self, PeerError> {
        Self::build(Some(addr.into()))
    }

    /// Creates a client without an own address.
    pub fn detached() -> Result<Self, PeerError> {
        Self::build(None)
    }

    fn build(addr: Option<String>) -> Result<Self, PeerError> {
        let http = Client::builder()
            .timeout(REQUEST_TIMEOUT)
            .build()
            .map_err(|e| PeerError::Transport(format!("failed to build HTTP client: {e}")))?;

        Ok(Self {
            addr,
            hosts: HashSet::new(),
            http,
        })
    }

    /// Returns this peer's own address, if bound.
    pub fn addr(&self) -> Option<&str> {
        self.addr.as_deref()
    }

    /// Returns the connected peer addresses, sorted for stable output.
    pub fn hosts(&self) -> Vec<String> {
        let mut hosts: Vec<String> = self.hosts.iter().cloned().collect();
        hosts.sort();
        hosts
    }

    fn self_addr(&self) -> Result<&str, PeerError> {
        self.addr.as_deref().ok_or(PeerError::NoAddress)
    }

    fn endpoint(addr: &str, path: &str) -> String {
        // Avoid accidental double slashes.
        format!(
            "{}/{}",
            addr.trim_end_matches('/'),
            path.trim_start_matches('/')
        )
    }

    /// Records `addr` as connected.
    pub fn connected(&mut self, addr: &str) {
        tracing::info!("connect with {addr}");
        self.hosts.insert(addr.to_string());
    }

    /// Removes `addr` from the peer set.
    pub fn disconnected(&mut self, addr: &str) {
        if self.hosts.remove(addr) {
            tracing::info!("disconnect with {addr}");
        } else {
            tracing::warn!("{addr} was not connected");
        }
    }

    /// Asks `remote` to register this peer, then records the connection.
    ///
    /// Returns the peer list the remote answered with.
    pub fn connect_request(&mut self, remote: &str) -> Result<Vec<String>, PeerError> {
        let own = self.self_addr()?.to_string();
        let url = Self::endpoint(remote, "connection");

        let resp = self.http.put(&url).json(&json!({ "addr": own })).send()?;
        let resp = check_status(resp)?;
        let peers = resp
            .json::<Vec<String>>()
            .map_err(|e| PeerError::Protocol(format!("failed to parse peer list: {e}")))?;

        self.connected(remote);
        Ok(peers)
    }

    /// Deregisters from every connected peer, best-effort, and clears the
    /// peer set. A failing peer does not abort the remaining fan-out.
    pub fn disconnect_all(&mut self) {
        let Some(own) = self.addr.clone() else {
            self.hosts.clear();
            return;
        };

        for addr in &self.hosts {
            let url = Self::endpoint(addr, "connection");
            let result = self
                .http
                .delete(&url)
                .json(&json!({ "addr": own }))
                .send()
                .and_then(|resp| resp.error_for_status());

            match result {
                Ok(_) => tracing::info!("disconnect with {addr}"),
                Err(e) => tracing::warn!("failed to disconnect from {addr}: {e}"),
            }
        }

        self.hosts.clear();
    }

    /// Gossips a closed block to every connected peer except `origin`.
    ///
    /// The block is verified before anything is sent; per-peer delivery is
    /// best-effort and a failing peer does not abort the fan-out.
    pub fn put_block(&self, block: &Block, origin: Option<&str>) -> Result<(), PeerError> {
        if !block.verify()? {
            return Err(PeerError::Protocol(
                "refusing to gossip an unverifiable block".to_string(),
            ));
        }

        let body = json!({
            "host": self.addr,
            "block": block.to_dto()?,
        });

        for addr in &self.hosts {
            if Some(addr.as_str()) == origin {
                continue;
            }

            tracing::info!("notify {addr}");
            let url = Self::endpoint(addr, "block");
            let result = self
                .http
                .put(&url)
                .json(&body)
                .send()
                .and_then(|resp| resp.error_for_status());

            if let Err(e) = result {
                tracing::warn!("failed to notify {addr}: {e}");
            }
        }

        Ok(())
    }

    /// Fetches one block from `addr`.
    ///
    /// Negative indices are tail-relative, so `-1` fetches the tip. A
    /// closed block that does not verify is rejected; open blocks are
    /// accepted as-is.
    pub fn get_block(&self, addr: &str, index: i64) -> Result<Block, PeerError> {
        let url = Self::endpoint(addr, &format!("block/{index}"));

        let resp = check_status(self.http.get(&url).send()?)?;
        let dto = resp
            .json::<BlockDto>()
            .map_err(|e| PeerError::Protocol(format!("failed to parse block: {e}")))?;

        let block = Block::from_dto(&dto, None)?;
        if block.is_closed() && !block.verify()? {
            return Err(PeerError::Protocol(
                "peer returned an unverifiable block".to_string(),
            ));
        }

        Ok(block)
    }

    /// Fetches and verifies the whole chain from `addr`.
    pub fn get_chain(&self, addr: &str) -> Result<Chain, PeerError> {
        let url = Self::endpoint(addr, "block");

        let resp = check_status(self.http.get(&url).send()?)?;
        let dto = resp
            .json::<Vec<BlockDto>>()
            .map_err(|e| PeerError::Protocol(format!("failed to parse chain: {e}")))?;

        Ok(Chain::from_dto(&dto)?)
    }

    /// Submits the closure tuple of a verified closed block to `addr`.
    pub fn post_close_block(&self, addr: &str, block: &Block) -> Result<(), PeerError> {
        if !block.verify()? {
            return Err(PeerError::Protocol(
                "refusing to submit an unverifiable closure".to_string(),
            ));
        }

        // verify() only succeeds on closed blocks, so the closure tuple
        // is present here.
        let (closer, key, timestamp, signature) = match (
            block.closer(),
            block.key(),
            block.timestamp(),
            block.signature(),
        ) {
            (Some(closer), Some(key), Some(timestamp), Some(signature)) => {
                (closer, key, timestamp, signature)
            }
            _ => return Err(PeerError::Chain(chain::ChainError::BlockNotClosed)),
        };

        let body = json!({
            "user": closer.public_pem()?,
            "key": BASE64.encode(key),
            "timestamp": timestamp,
            "signature": BASE64.encode(signature),
            "host": self.addr,
        });

        let url = Self::endpoint(addr, "block");
        let resp = self.http.post(&url).json(&body).send()?;
        check_status(resp)?;
        Ok(())
    }

    /// Posts a signed message to `addr`.
    pub fn post_message(&self, addr: &str, message: &Message) -> Result<(), PeerError> {
        let url = Self::endpoint(addr, "message");
        let resp = self.http.post(&url).json(&message.to_dto()?).send()?;
        check_status(resp)?;
        Ok(())
    }
}

fn check_status(resp: Response) -> Result<Response, PeerError> {
    let status = resp.status();
    if status.is_success() {
        Ok(resp)
    } else {
        Err(PeerError::Status(format!(
            "{} returned HTTP status {status}",
            resp.url()
        )))
    }
}
