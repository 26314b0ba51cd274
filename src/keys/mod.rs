//! Public key resolution subsystem.
//!
//! # Data Flow
//! ```text
//! Route A (internal caller):
//!     x-key-id → KeyCache("rsf") → RsfKeySource (GET /public/auth/keys)
//!
//! Route B (network caller):
//!     Verifier → RegistryResolver → KeyCache("registry") → RegistryKeySource (POST /lookup)
//! ```
//!
//! # Design Decisions
//! - Sources and resolvers are trait objects so tests can swap in fakes
//! - Caches are constructed explicitly and shared by `Arc`, never global
//! - A source error and "no such key" both surface as "not found" to callers

pub mod cache;
pub mod registry;
pub mod rsf;

use ed25519_dalek::VerifyingKey;
use futures_util::future::BoxFuture;
use std::collections::HashMap;
use thiserror::Error;

pub use cache::{CachedKey, KeyCache};
pub use registry::{RegistryKeySource, RegistryResolver};
pub use rsf::RsfKeySource;

/// Failures talking to a key source.
#[derive(Debug, Error)]
pub enum KeyError {
    /// Request could not be sent or the connection failed.
    #[error("key source unreachable: {0}")]
    Transport(String),

    /// Source answered with a non-success status.
    #[error("key source returned status {0}")]
    Status(u16),

    /// Response body or key material could not be decoded.
    #[error("key source response invalid: {0}")]
    Decode(String),

    /// The key id handed to the source does not have the shape it expects.
    #[error("invalid key id: {0}")]
    InvalidKeyId(String),
}

/// Upstream that knows public keys by key id.
pub trait KeySource: Send + Sync {
    /// Fetch the key. `Ok(None)` means the source answered but has no such key.
    fn fetch<'a>(&'a self, key_id: &'a str) -> BoxFuture<'a, Result<Option<VerifyingKey>, KeyError>>;
}

/// Resolver injected into the verifier: `(subscriber id, key id) → key`.
pub trait PublicKeyResolver: Send + Sync {
    fn resolve<'a>(
        &'a self,
        subscriber_id: &'a str,
        key_id: &'a str,
    ) -> BoxFuture<'a, Result<Option<VerifyingKey>, KeyError>>;
}

/// Fixed in-memory key set.
#[derive(Debug, Clone, Default)]
pub struct StaticKeys {
    keys: HashMap<(String, String), VerifyingKey>,
}

impl StaticKeys {
    pub fn with(mut self, subscriber_id: &str, key_id: &str, key: VerifyingKey) -> Self {
        self.keys.insert((subscriber_id.to_string(), key_id.to_string()), key);
        self
    }

    pub fn get(&self, subscriber_id: &str, key_id: &str) -> Option<VerifyingKey> {
        self.keys
            .get(&(subscriber_id.to_string(), key_id.to_string()))
            .copied()
    }
}

impl PublicKeyResolver for StaticKeys {
    fn resolve<'a>(
        &'a self,
        subscriber_id: &'a str,
        key_id: &'a str,
    ) -> BoxFuture<'a, Result<Option<VerifyingKey>, KeyError>> {
        let key = self.get(subscriber_id, key_id);
        Box::pin(async move { Ok(key) })
    }
}
