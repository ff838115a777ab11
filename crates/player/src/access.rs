//! Paid-content gate.

use crate::error::{PlayerError, PlayerResult};
use spool_core::ContentDescriptor;
use spool_signer::TokenVerifier;
use time::OffsetDateTime;

/// Decides whether a request may stream a piece of content.
///
/// Free content always passes. Priced content needs a token signed by the
/// configured key and bound to the content's `claim_name/claim_id`.
#[derive(Clone, Debug, Default)]
pub struct AccessVerifier {
    verifier: Option<TokenVerifier>,
}

impl AccessVerifier {
    /// `None` means no key is configured and priced content cannot be served.
    pub fn new(verifier: Option<TokenVerifier>) -> Self {
        Self { verifier }
    }

    pub fn has_key(&self) -> bool {
        self.verifier.is_some()
    }

    pub fn verify(&self, descriptor: &ContentDescriptor, token: &str) -> PlayerResult<()> {
        self.verify_at(descriptor, token, OffsetDateTime::now_utc())
    }

    pub fn verify_at(
        &self,
        descriptor: &ContentDescriptor,
        token: &str,
        now: OffsetDateTime,
    ) -> PlayerResult<()> {
        if !descriptor.is_paid() {
            return Ok(());
        }
        if token.is_empty() {
            return Err(PlayerError::PaymentRequired);
        }
        let verifier = self.verifier.as_ref().ok_or(PlayerError::PaidUnavailable)?;
        verifier.verify_for(token, &descriptor.content_id(), now)?;
        Ok(())
    }
}
