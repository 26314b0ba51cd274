//! Incoming signature verification.
//!
//! # Steps
//! ```text
//! SignatureHeader + raw body + now
//!     → algorithm check (ed25519 only)
//!     → window check (created < expires, created <= now <= expires)
//!     → trusted-subscriber bypass (configured, logged)
//!     → resolve public key for subscriber|key
//!     → rebuild signing string from the received bytes
//!     → detached signature check
//! ```
//!
//! Every failure is an `AuthError`; nothing escapes as a panic or an
//! unhandled resolver error.

use base64::{engine::general_purpose::STANDARD, Engine as _};
use ed25519_dalek::Signature;
use std::sync::Arc;

use crate::keys::PublicKeyResolver;
use crate::signing::canonical::signing_string;
use crate::signing::error::AuthError;
use crate::signing::header::{SignatureHeader, ALGORITHM};

/// Acceptance rules applied on top of the signature itself.
#[derive(Debug, Clone, Default)]
pub struct VerificationPolicy {
    /// Reject signatures outside `[created, expires]`.
    pub enforce_window: bool,
    /// Tolerance applied to both ends of the window.
    pub clock_skew_secs: u64,
    /// Subscriber whose signatures are accepted without checking.
    pub trusted_subscriber_id: Option<String>,
}

/// Successful outcome.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Verification {
    Verified,
    /// Accepted through the configured trusted-subscriber exception.
    TrustedBypass,
}

pub struct Verifier {
    resolver: Arc<dyn PublicKeyResolver>,
    policy: VerificationPolicy,
}

impl Verifier {
    pub fn new(resolver: Arc<dyn PublicKeyResolver>, policy: VerificationPolicy) -> Self {
        if let Some(trusted) = &policy.trusted_subscriber_id {
            tracing::warn!(
                subscriber_id = %trusted,
                "Signature verification bypass enabled for trusted subscriber"
            );
        }
        if !policy.enforce_window {
            tracing::warn!("Signature window enforcement disabled");
        }
        Self { resolver, policy }
    }

    pub fn policy(&self) -> &VerificationPolicy {
        &self.policy
    }

    /// Verify `header` against the exact `body` bytes received.
    pub async fn verify(
        &self,
        header: &SignatureHeader,
        body: &[u8],
        now: u64,
    ) -> Result<Verification, AuthError> {
        if header.algorithm != ALGORITHM {
            return Err(AuthError::UnsupportedAlgorithm(header.algorithm.clone()));
        }
        if header.key_id.algorithm != ALGORITHM {
            return Err(AuthError::UnsupportedAlgorithm(header.key_id.algorithm.clone()));
        }

        let key_id = &header.key_id;
        if key_id.subscriber_id.is_empty() || key_id.unique_key_id.is_empty() {
            return Err(AuthError::MalformedKeyId(key_id.to_string()));
        }

        self.check_window(header.created, header.expires, now)?;

        if self.policy.trusted_subscriber_id.as_deref() == Some(key_id.subscriber_id.as_str()) {
            tracing::info!(
                subscriber_id = %key_id.subscriber_id,
                key_id = %key_id.unique_key_id,
                "Trusted subscriber accepted without signature check"
            );
            return Ok(Verification::TrustedBypass);
        }

        let public_key = self
            .resolver
            .resolve(&key_id.subscriber_id, &key_id.unique_key_id)
            .await
            .map_err(|e| AuthError::KeyResolution(e.to_string()))?
            .ok_or_else(|| AuthError::UnknownKey(key_id.to_string()))?;

        let bytes = STANDARD
            .decode(header.signature.trim())
            .map_err(|e| AuthError::BadEncoding(format!("signature: {}", e)))?;
        let signature = Signature::from_slice(&bytes)
            .map_err(|e| AuthError::BadEncoding(format!("signature: {}", e)))?;

        let message = signing_string(body, header.created, header.expires);
        public_key
            .verify_strict(message.as_bytes(), &signature)
            .map_err(|_| AuthError::SignatureMismatch)?;

        Ok(Verification::Verified)
    }

    fn check_window(&self, created: u64, expires: u64, now: u64) -> Result<(), AuthError> {
        if !self.policy.enforce_window {
            return Ok(());
        }
        if created >= expires {
            return Err(AuthError::InvertedWindow { created, expires });
        }

        let skew = self.policy.clock_skew_secs;
        if now.saturating_add(skew) < created {
            return Err(AuthError::NotYetValid { created, now });
        }
        if now > expires.saturating_add(skew) {
            return Err(AuthError::Expired { expires, now });
        }
        Ok(())
    }
}
