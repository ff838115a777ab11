//! Signed, time-bound access tokens for paid content.
//!
//! A token is three base64url (unpadded) segments, `header.claims.signature`,
//! where the signature is Ed25519 over `header.claims`.

use crate::error::{SignerError, SignerResult};
use crate::key::{PublicKey, SecretKey};
use base64::Engine;
use base64::engine::general_purpose::URL_SAFE_NO_PAD;
use ed25519_dalek::{Signature, Signer as _, Verifier as _};
use serde::{Deserialize, Serialize};
use time::{Duration, OffsetDateTime};

const ALGORITHM: &str = "EdDSA";

#[derive(Debug, Serialize, Deserialize)]
struct Header {
    alg: String,
    typ: String,
}

/// Payload of an access token.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct AccessClaims {
    /// Content the token grants access to (`claim_name/claim_id`).
    pub sub: String,
    /// Issued-at, unix seconds.
    pub iat: i64,
    /// Expiry, unix seconds.
    pub exp: i64,
}

fn encode_segment<T: Serialize>(value: &T) -> SignerResult<String> {
    let json = serde_json::to_vec(value).map_err(|e| SignerError::Malformed(e.to_string()))?;
    Ok(URL_SAFE_NO_PAD.encode(json))
}

fn decode_segment(segment: &str, what: &str) -> SignerResult<Vec<u8>> {
    URL_SAFE_NO_PAD
        .decode(segment)
        .map_err(|e| SignerError::Malformed(format!("{what}: {e}")))
}

/// Issues tokens with a secret key.
pub struct TokenIssuer {
    secret: SecretKey,
}

impl TokenIssuer {
    pub fn new(secret: SecretKey) -> Self {
        Self { secret }
    }

    /// Issue a token for `content_id` valid for `ttl` from now.
    pub fn issue(&self, content_id: &str, ttl: Duration) -> SignerResult<String> {
        self.issue_at(content_id, OffsetDateTime::now_utc(), ttl)
    }

    /// Issue a token as if the current time were `now`.
    pub fn issue_at(
        &self,
        content_id: &str,
        now: OffsetDateTime,
        ttl: Duration,
    ) -> SignerResult<String> {
        let header = Header {
            alg: ALGORITHM.to_string(),
            typ: "JWT".to_string(),
        };
        let claims = AccessClaims {
            sub: content_id.to_string(),
            iat: now.unix_timestamp(),
            exp: (now + ttl).unix_timestamp(),
        };

        let signing_input = format!("{}.{}", encode_segment(&header)?, encode_segment(&claims)?);
        let signature = self.secret.signing_key().sign(signing_input.as_bytes());
        Ok(format!(
            "{signing_input}.{}",
            URL_SAFE_NO_PAD.encode(signature.to_bytes())
        ))
    }
}

/// Verifies tokens against a public key.
#[derive(Clone, Debug)]
pub struct TokenVerifier {
    public: PublicKey,
}

impl TokenVerifier {
    pub fn new(public: PublicKey) -> Self {
        Self { public }
    }

    /// Check structure, signature and expiry, and return the claims.
    ///
    /// The signature is checked before the expiry, so a genuine but stale
    /// token reports `Expired`.
    pub fn verify(&self, token: &str, now: OffsetDateTime) -> SignerResult<AccessClaims> {
        let segments: Vec<&str> = token.split('.').collect();
        let [header_b64, claims_b64, signature_b64] = &segments[..] else {
            return Err(SignerError::InvalidSegments);
        };

        let header: Header = serde_json::from_slice(&decode_segment(header_b64, "header")?)
            .map_err(|e| SignerError::Malformed(format!("header: {e}")))?;
        if header.alg != ALGORITHM {
            return Err(SignerError::Malformed(format!(
                "unsupported algorithm {}",
                header.alg
            )));
        }

        let signature_bytes: [u8; 64] = decode_segment(signature_b64, "signature")?
            .try_into()
            .map_err(|_| SignerError::Malformed("signature has wrong length".to_string()))?;
        let signature = Signature::from_bytes(&signature_bytes);
        let signing_input = &token[..header_b64.len() + 1 + claims_b64.len()];
        self.public
            .verifying_key()
            .verify(signing_input.as_bytes(), &signature)
            .map_err(|_| SignerError::BadSignature)?;

        let claims: AccessClaims = serde_json::from_slice(&decode_segment(claims_b64, "claims")?)
            .map_err(|e| SignerError::Malformed(format!("claims: {e}")))?;
        if now.unix_timestamp() >= claims.exp {
            return Err(SignerError::Expired);
        }
        Ok(claims)
    }

    /// Like [`verify`](Self::verify), and also require the token to be bound
    /// to `content_id`.
    pub fn verify_for(
        &self,
        token: &str,
        content_id: &str,
        now: OffsetDateTime,
    ) -> SignerResult<AccessClaims> {
        let claims = self.verify(token, now)?;
        if claims.sub != content_id {
            return Err(SignerError::ContentMismatch {
                expected: content_id.to_string(),
                actual: claims.sub,
            });
        }
        Ok(claims)
    }
}
