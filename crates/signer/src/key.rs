//! Ed25519 key types and operations.
//!
//! Public keys travel as `name:base64`, or as bare base64 in which case the
//! name is empty. Secret keys never leave the process that generated them.

use crate::error::{SignerError, SignerResult};
use base64::Engine;
use base64::engine::general_purpose::STANDARD;
use ed25519_dalek::{SigningKey, VerifyingKey};
use std::fmt;

fn split_named(s: &str) -> (String, &str) {
    match s.trim().split_once(':') {
        Some((name, b64)) => (name.to_string(), b64),
        None => (String::new(), s.trim()),
    }
}

fn decode_exact<const N: usize>(b64: &str, what: &str) -> SignerResult<[u8; N]> {
    let bytes = STANDARD
        .decode(b64)
        .map_err(|e| SignerError::KeyParsing(format!("invalid base64: {e}")))?;
    let len = bytes.len();
    bytes
        .try_into()
        .map_err(|_| SignerError::KeyParsing(format!("{what}: expected {N} bytes, got {len}")))
}

/// A secret (private) key for issuing tokens.
pub struct SecretKey {
    inner: SigningKey,
}

impl SecretKey {
    /// Generate a new random secret key.
    pub fn generate() -> Self {
        let mut rng = rand_core::OsRng;
        Self {
            inner: SigningKey::generate(&mut rng),
        }
    }

    /// Get the corresponding public key.
    pub fn public_key(&self) -> PublicKey {
        PublicKey {
            inner: self.inner.verifying_key(),
        }
    }

    pub(crate) fn signing_key(&self) -> &SigningKey {
        &self.inner
    }
}

impl fmt::Debug for SecretKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "SecretKey([REDACTED])")
    }
}

/// A public key for verification.
#[derive(Clone)]
pub struct PublicKey {
    inner: VerifyingKey,
}

impl PublicKey {
    /// Parse `name:base64(public)` or bare `base64(public)`.
    pub fn parse(s: &str) -> SignerResult<(String, Self)> {
        let (name, b64) = split_named(s);
        let bytes: [u8; 32] = decode_exact(b64, "public key")?;
        let inner = VerifyingKey::from_bytes(&bytes)
            .map_err(|e| SignerError::KeyParsing(format!("invalid public key: {e}")))?;
        Ok((name, Self { inner }))
    }

    /// Encode as `name:base64(public)`.
    pub fn encode(&self, key_name: &str) -> String {
        format!("{key_name}:{}", STANDARD.encode(self.inner.as_bytes()))
    }

    pub(crate) fn verifying_key(&self) -> &VerifyingKey {
        &self.inner
    }
}

impl fmt::Debug for PublicKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let b64 = STANDARD.encode(self.inner.as_bytes());
        write!(f, "PublicKey({}...)", &b64[..8])
    }
}

/// A named key pair.
pub struct KeyPair {
    pub name: String,
    pub secret: SecretKey,
    pub public: PublicKey,
}

impl KeyPair {
    /// Generate a new key pair with the given name.
    pub fn generate(name: impl Into<String>) -> Self {
        let secret = SecretKey::generate();
        let public = secret.public_key();
        Self {
            name: name.into(),
            secret,
            public,
        }
    }

    pub fn encoded_public_key(&self) -> String {
        self.public.encode(&self.name)
    }
}

impl fmt::Debug for KeyPair {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("KeyPair")
            .field("name", &self.name)
            .field("public", &self.public)
            .finish()
    }
}
