//! Signed user messages.
//!
//! A message is a `(author, namespace, payload)` tuple whose signature
//! covers the canonical JSON of `{"namespace": …, "payload": …}`. Messages
//! are immutable once constructed and are only ever accepted by the system
//! in a verifying state.

use serde_json::{Value, json};

use crate::error::ChainError;
use crate::identity::Identity;

/// A signed message published into the chain.
#[derive(Clone, Debug)]
pub struct Message {
    author: Identity,
    namespace: String,
    payload: Value,
    signature: Vec<u8>,
}

impl Message {
    /// Creates and signs a new message with the author's private key.
    pub fn new(
        author: Identity,
        namespace: impl Into<String>,
        payload: Value,
    ) -> Result<Self, ChainError> {
        let namespace = namespace.into();
        let signature = author.sign(&Self::preimage(&namespace, &payload))?;

        Ok(Self {
            author,
            namespace,
            payload,
            signature,
        })
    }

    /// Reconstructs a message with an existing signature.
    ///
    /// The signature is verified immediately; a mismatch fails with
    /// [`ChainError::InvalidSignature`].
    pub fn with_signature(
        author: Identity,
        namespace: impl Into<String>,
        payload: Value,
        signature: Vec<u8>,
    ) -> Result<Self, ChainError> {
        let message = Self {
            author,
            namespace: namespace.into(),
            payload,
            signature,
        };

        if !message.verify()? {
            return Err(ChainError::InvalidSignature);
        }
        Ok(message)
    }

    fn preimage(namespace: &str, payload: &Value) -> Value {
        json!({
            "namespace": namespace,
            "payload": payload,
        })
    }

    /// Re-verifies the signature over the reconstructed pre-image.
    pub fn verify(&self) -> Result<bool, ChainError> {
        self.author
            .verify(&Self::preimage(&self.namespace, &self.payload), &self.signature)
    }

    pub fn author(&self) -> &Identity {
        &self.author
    }

    pub fn namespace(&self) -> &str {
        &self.namespace
    }

    pub fn payload(&self) -> &Value {
        &self.payload
    }

    pub fn signature(&self) -> &[u8] {
        &self.signature
    }
}
