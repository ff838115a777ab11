//! Keys and access tokens for paid content.
//!
//! This crate provides:
//! - Ed25519 key generation and parsing
//! - Issuing signed, expiring access tokens
//! - Token verification with distinct failure reasons

pub mod error;
pub mod key;
pub mod token;

pub use error::{SignerError, SignerResult};
pub use key::{KeyPair, PublicKey, SecretKey};
pub use token::{AccessClaims, TokenIssuer, TokenVerifier};
