//! Chain library crate.
//!
//! This crate provides the core state machine of the proof-of-work
//! message chain:
//!
//! - canonical JSON encoding for signature pre-images (`canonical`),
//! - RSA identities with PEM import/export (`identity`),
//! - signed user messages (`message`),
//! - proof-of-work blocks and the closure protocol (`block`),
//! - the chain with its reconciliation rules (`chain`),
//! - the nonce search primitive (`mining`),
//! - and the JSON wire forms exchanged between peers (`wire`).
//!
//! Everything here is transport-free and synchronous; the `peer` crate
//! layers HTTP replication on top.

pub mod block;
pub mod canonical;
pub mod chain;
pub mod error;
pub mod identity;
pub mod message;
pub mod mining;
pub mod wire;

pub use block::{Block, DEFAULT_MAGIC_NUMBER, KEY_LEN, ParentRef};
pub use chain::Chain;
pub use error::ChainError;
pub use identity::{DEFAULT_KEY_BITS, Identity};
pub use message::Message;
pub use mining::mine;
pub use wire::{BlockDto, MessageDto};
