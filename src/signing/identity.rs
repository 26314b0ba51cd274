//! Our own signing identity on the network.

use base64::{engine::general_purpose::STANDARD, Engine as _};
use ed25519_dalek::{SigningKey, VerifyingKey, KEYPAIR_LENGTH, SECRET_KEY_LENGTH};
use std::fmt;

use crate::signing::header::KeyId;

/// Errors decoding key material.
#[derive(Debug, thiserror::Error, PartialEq, Eq)]
pub enum KeyMaterialError {
    #[error("key is not valid base64: {0}")]
    Base64(String),

    #[error("private key must be 32 or 64 bytes, got {0}")]
    Length(usize),

    #[error("private key half does not match public key half")]
    Mismatch,

    #[error("public key is invalid: {0}")]
    PublicKey(String),
}

/// Subscriber id, unique key id and Ed25519 key pair. Immutable after startup.
#[derive(Clone)]
pub struct SigningIdentity {
    subscriber_id: String,
    unique_key_id: String,
    signing_key: SigningKey,
}

impl SigningIdentity {
    pub fn new(
        subscriber_id: impl Into<String>,
        unique_key_id: impl Into<String>,
        signing_key: SigningKey,
    ) -> Self {
        Self {
            subscriber_id: subscriber_id.into(),
            unique_key_id: unique_key_id.into(),
            signing_key,
        }
    }

    /// Build from a base64 private key: a 32-byte seed or a 64-byte seed+public pair.
    pub fn from_base64(
        subscriber_id: impl Into<String>,
        unique_key_id: impl Into<String>,
        private_key: &str,
    ) -> Result<Self, KeyMaterialError> {
        let signing_key = decode_signing_key(private_key)?;
        Ok(Self::new(subscriber_id, unique_key_id, signing_key))
    }

    pub fn subscriber_id(&self) -> &str {
        &self.subscriber_id
    }

    pub fn unique_key_id(&self) -> &str {
        &self.unique_key_id
    }

    /// Composite key id as it appears in our headers.
    pub fn key_id(&self) -> KeyId {
        KeyId::new(&self.subscriber_id, &self.unique_key_id)
    }

    pub fn signing_key(&self) -> &SigningKey {
        &self.signing_key
    }

    pub fn verifying_key(&self) -> VerifyingKey {
        self.signing_key.verifying_key()
    }

    /// Public key, base64, in the form the registry publishes.
    pub fn public_key_base64(&self) -> String {
        STANDARD.encode(self.verifying_key().as_bytes())
    }
}

impl fmt::Debug for SigningIdentity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SigningIdentity")
            .field("subscriber_id", &self.subscriber_id)
            .field("unique_key_id", &self.unique_key_id)
            .field("public_key", &self.public_key_base64())
            .finish()
    }
}

/// Decode a base64 Ed25519 private key (seed or libsodium-style keypair).
pub fn decode_signing_key(value: &str) -> Result<SigningKey, KeyMaterialError> {
    let bytes = STANDARD
        .decode(value.trim())
        .map_err(|e| KeyMaterialError::Base64(e.to_string()))?;

    match bytes.len() {
        SECRET_KEY_LENGTH => {
            let mut seed = [0u8; SECRET_KEY_LENGTH];
            seed.copy_from_slice(&bytes);
            Ok(SigningKey::from_bytes(&seed))
        }
        KEYPAIR_LENGTH => {
            let mut pair = [0u8; KEYPAIR_LENGTH];
            pair.copy_from_slice(&bytes);
            SigningKey::from_keypair_bytes(&pair).map_err(|_| KeyMaterialError::Mismatch)
        }
        n => Err(KeyMaterialError::Length(n)),
    }
}

/// Decode a base64 Ed25519 public key.
pub fn decode_verifying_key(value: &str) -> Result<VerifyingKey, KeyMaterialError> {
    let bytes = STANDARD
        .decode(value.trim())
        .map_err(|e| KeyMaterialError::Base64(e.to_string()))?;
    let bytes: [u8; 32] = bytes
        .as_slice()
        .try_into()
        .map_err(|_| KeyMaterialError::PublicKey(format!("expected 32 bytes, got {}", bytes.len())))?;
    VerifyingKey::from_bytes(&bytes).map_err(|e| KeyMaterialError::PublicKey(e.to_string()))
}
