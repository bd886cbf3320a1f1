//! Peer library crate.
//!
//! This crate layers HTTP replication on top of the `chain` crate:
//!
//! - the replica manager (`manager`),
//! - the outbound gossip client (`client`),
//! - the inbound axum endpoint (`routes`),
//! - shared request state (`state`),
//! - Prometheus metrics (`metrics`),
//! - and server configuration (`config`).
//!
//! The `peer` binary wires these into a server process; the `mine` and
//! `send_message` binaries drive a running server from outside.

pub mod client;
pub mod config;
pub mod error;
pub mod manager;
pub mod metrics;
pub mod routes;
pub mod state;

pub use client::PeerClient;
pub use config::PeerConfig;
pub use error::PeerError;
pub use manager::ChainManager;
pub use metrics::{MetricsRegistry, PeerMetrics};
pub use routes::router;
pub use state::{AppState, SharedState};
