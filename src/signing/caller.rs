//! Internal caller tokens.
//!
//! The settlement service proves who it is by sending, in `x-signature`, a
//! hex-encoded Ed25519 *signed message*: the 64-byte signature followed by the
//! message itself. The message must be SHA-256 of `subscriberId|subscriberUri`,
//! so a token is bound to one proxy deployment rather than to a request body.

use ed25519_dalek::{Signature, Signer as _, SigningKey, Verifier as _, VerifyingKey, SIGNATURE_LENGTH};
use sha2::{Digest, Sha256};
use subtle::ConstantTimeEq;

use crate::signing::error::AuthError;

/// SHA-256 of `subscriber_id|subscriber_uri`.
pub fn reference_message(subscriber_id: &str, subscriber_uri: &str) -> [u8; 32] {
    let mut hasher = Sha256::new();
    hasher.update(subscriber_id.as_bytes());
    hasher.update(b"|");
    hasher.update(subscriber_uri.as_bytes());
    hasher.finalize().into()
}

/// Issue a token for a deployment. Used by tooling and tests.
pub fn issue_token(signing_key: &SigningKey, subscriber_id: &str, subscriber_uri: &str) -> String {
    let message = reference_message(subscriber_id, subscriber_uri);
    let signature = signing_key.sign(&message);

    let mut signed = Vec::with_capacity(SIGNATURE_LENGTH + message.len());
    signed.extend_from_slice(&signature.to_bytes());
    signed.extend_from_slice(&message);
    hex::encode(signed)
}

/// Checks caller tokens against one deployment's reference message.
#[derive(Debug, Clone)]
pub struct CallerAuthenticator {
    reference: [u8; 32],
}

impl CallerAuthenticator {
    pub fn new(subscriber_id: &str, subscriber_uri: &str) -> Self {
        Self {
            reference: reference_message(subscriber_id, subscriber_uri),
        }
    }

    /// Open `token` with `key` and compare its message with the reference.
    pub fn verify(&self, token: &str, key: &VerifyingKey) -> Result<(), AuthError> {
        let signed = hex::decode(token.trim())
            .map_err(|e| AuthError::BadEncoding(format!("caller token: {}", e)))?;
        if signed.len() < SIGNATURE_LENGTH {
            return Err(AuthError::BadEncoding(format!(
                "caller token is {} bytes",
                signed.len()
            )));
        }

        let (signature, message) = signed.split_at(SIGNATURE_LENGTH);
        let signature = Signature::from_slice(signature)
            .map_err(|e| AuthError::BadEncoding(format!("caller signature: {}", e)))?;
        key.verify(message, &signature)
            .map_err(|_| AuthError::SignatureMismatch)?;

        if bool::from(message.ct_eq(&self.reference)) {
            Ok(())
        } else {
            Err(AuthError::ReferenceMismatch)
        }
    }
}
