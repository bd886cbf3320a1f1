//! User identities backed by RSA key pairs.
//!
//! An [`Identity`] is either a full key pair (able to sign) or a
//! public-only key (able to verify). Raw signatures are RSASSA-PSS over a
//! SHA-256 digest; structured signatures first serialize the input with
//! [`crate::canonical`] so that every replica signs and verifies the same
//! bytes.

use std::fmt;

use rsa::pkcs1::{DecodeRsaPrivateKey, DecodeRsaPublicKey};
use rsa::pkcs8::{DecodePrivateKey, DecodePublicKey, EncodePrivateKey, EncodePublicKey, LineEnding};
use rsa::{Pss, RsaPrivateKey, RsaPublicKey};
use serde::Serialize;
use sha2::{Digest, Sha256};

use crate::canonical;
use crate::error::ChainError;

/// Default RSA modulus size in bits for newly generated identities.
pub const DEFAULT_KEY_BITS: usize = 2048;

/// An RSA identity, full or public-only.
///
/// Two identities denote the same author iff their public keys are equal,
/// which is the same as their public PEM exports being byte-equal.
#[derive(Clone)]
pub struct Identity {
    private: Option<RsaPrivateKey>,
    public: RsaPublicKey,
}

impl Identity {
    /// Generates a fresh key pair with [`DEFAULT_KEY_BITS`].
    pub fn generate() -> Result<Self, ChainError> {
        Self::generate_with_bits(DEFAULT_KEY_BITS)
    }

    /// Generates a fresh key pair with an explicit modulus size.
    ///
    /// Smaller keys only change the PEM wire bytes, not any protocol
    /// semantics; tests use them to keep key generation cheap.
    pub fn generate_with_bits(bits: usize) -> Result<Self, ChainError> {
        let private = RsaPrivateKey::new(&mut rand::thread_rng(), bits)
            .map_err(|e| ChainError::Crypto(format!("key generation failed: {e}")))?;
        let public = private.to_public_key();

        Ok(Self {
            private: Some(private),
            public,
        })
    }

    /// Imports an identity from PEM text.
    ///
    /// Accepts PKCS#8 or PKCS#1 private keys (yielding a full identity)
    /// and SPKI or PKCS#1 public keys (yielding a public-only identity).
    pub fn from_pem(text: &str) -> Result<Self, ChainError> {
        if let Ok(private) = RsaPrivateKey::from_pkcs8_pem(text)
            .or_else(|_| RsaPrivateKey::from_pkcs1_pem(text))
        {
            let public = private.to_public_key();
            return Ok(Self {
                private: Some(private),
                public,
            });
        }

        let public = RsaPublicKey::from_public_key_pem(text)
            .or_else(|_| RsaPublicKey::from_pkcs1_pem(text))
            .map_err(|e| ChainError::Crypto(format!("unreadable PEM: {e}")))?;

        Ok(Self {
            private: None,
            public,
        })
    }

    /// Returns `true` if this identity can sign.
    pub fn has_private(&self) -> bool {
        self.private.is_some()
    }

    /// Exports the public half as SPKI PEM.
    pub fn public_pem(&self) -> Result<String, ChainError> {
        self.public
            .to_public_key_pem(LineEnding::LF)
            .map_err(|e| ChainError::Crypto(format!("public PEM export failed: {e}")))
    }

    /// Exports the private half as PKCS#8 PEM.
    pub fn private_pem(&self) -> Result<String, ChainError> {
        let private = self.private.as_ref().ok_or(ChainError::NoPrivateKey)?;
        let pem = private
            .to_pkcs8_pem(LineEnding::LF)
            .map_err(|e| ChainError::Crypto(format!("private PEM export failed: {e}")))?;
        Ok(pem.to_string())
    }

    /// Signs raw bytes with SHA-256 + PSS.
    pub fn sign_raw(&self, data: &[u8]) -> Result<Vec<u8>, ChainError> {
        let private = self.private.as_ref().ok_or(ChainError::NoPrivateKey)?;
        let digest = Sha256::digest(data);

        private
            .sign_with_rng(&mut rand::thread_rng(), Pss::new::<Sha256>(), &digest)
            .map_err(|e| ChainError::Crypto(format!("signing failed: {e}")))
    }

    /// Verifies a raw-byte signature. Returns `false` on mismatch.
    pub fn verify_raw(&self, data: &[u8], signature: &[u8]) -> bool {
        let digest = Sha256::digest(data);
        self.public
            .verify(Pss::new::<Sha256>(), &digest, signature)
            .is_ok()
    }

    /// Signs the canonical JSON form of a structured value.
    pub fn sign<T: Serialize>(&self, value: &T) -> Result<Vec<u8>, ChainError> {
        self.sign_raw(&canonical::to_bytes(value)?)
    }

    /// Verifies a structured-value signature over canonical JSON.
    pub fn verify<T: Serialize>(&self, value: &T, signature: &[u8]) -> Result<bool, ChainError> {
        Ok(self.verify_raw(&canonical::to_bytes(value)?, signature))
    }
}

impl PartialEq for Identity {
    fn eq(&self, other: &Self) -> bool {
        self.public == other.public
    }
}

impl Eq for Identity {}

impl fmt::Debug for Identity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Identity")
            .field("has_private", &self.has_private())
            .finish_non_exhaustive()
    }
}

#[cfg(test)]
mod tests {
    use serde_json::json;

    use super::*;

    fn test_identity() -> Identity {
        Identity::generate_with_bits(1024).expect("key generation should succeed")
    }

    #[test]
    fn sign_and_verify_roundtrip() {
        let user = test_identity();
        let sig = user.sign(&"hello world").unwrap();

        assert!(user.verify(&"hello world", &sig).unwrap());
        assert!(!user.verify(&"helloworld", &sig).unwrap());
    }

    #[test]
    fn structured_values_verify_independent_of_key_order() {
        let user = test_identity();

        let sig = user.sign(&json!({"hello": "world", "foo": "bar"})).unwrap();
        assert!(
            user.verify(&json!({"foo": "bar", "hello": "world"}), &sig)
                .unwrap()
        );
    }

    #[test]
    fn tampered_signature_fails_verification() {
        let user = test_identity();
        let mut sig = user.sign_raw(b"payload").unwrap();
        sig[0] ^= 0x01;

        assert!(!user.verify_raw(b"payload", &sig));
    }

    #[test]
    fn private_pem_roundtrip_keeps_signing_ability() {
        let user = test_identity();
        let sig = user.sign(&"hello").unwrap();

        let reloaded = Identity::from_pem(&user.private_pem().unwrap()).unwrap();
        assert!(reloaded.has_private());
        assert!(reloaded.verify(&"hello", &sig).unwrap());
        assert_eq!(user, reloaded);
    }

    #[test]
    fn public_pem_roundtrip_is_verify_only() {
        let user = test_identity();
        let sig = user.sign(&"hello").unwrap();

        let public_only = Identity::from_pem(&user.public_pem().unwrap()).unwrap();
        assert!(!public_only.has_private());
        assert!(public_only.verify(&"hello", &sig).unwrap());
        assert_eq!(user, public_only);

        match public_only.sign(&"foo bar") {
            Err(ChainError::NoPrivateKey) => {}
            other => panic!("unexpected result: {other:?}"),
        }
        match public_only.private_pem() {
            Err(ChainError::NoPrivateKey) => {}
            other => panic!("unexpected result: {other:?}"),
        }
    }

    #[test]
    fn unreadable_pem_is_a_crypto_error() {
        match Identity::from_pem("not a pem") {
            Err(ChainError::Crypto(_)) => {}
            other => panic!("unexpected result: {other:?}"),
        }
    }

    #[test]
    fn distinct_identities_are_not_equal() {
        assert_ne!(test_identity(), test_identity());
    }
}
