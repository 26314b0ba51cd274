//! Outgoing signature generation.

use base64::{engine::general_purpose::STANDARD, Engine as _};
use ed25519_dalek::Signer as _;

use crate::signing::canonical::signing_string;
use crate::signing::header::{SignatureHeader, ALGORITHM, SIGNED_HEADERS};
use crate::signing::identity::SigningIdentity;

/// Validity window of every signature we issue, in seconds.
pub const SIGNATURE_TTL_SECS: u64 = 300;

/// What the signer should emit.
///
/// Anything other than `Valid` exists for exercising the network's rejection
/// paths and is only selectable when test mode is enabled in configuration.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum SignatureMode {
    #[default]
    Valid,
    /// Well-formed header with a corrupted signature.
    Invalid,
    /// No header at all.
    Omit,
}

/// Signs request bodies on behalf of our identity.
#[derive(Debug, Clone)]
pub struct Signer {
    identity: SigningIdentity,
    ttl_secs: u64,
}

impl Signer {
    pub fn new(identity: SigningIdentity) -> Self {
        Self {
            identity,
            ttl_secs: SIGNATURE_TTL_SECS,
        }
    }

    pub fn identity(&self) -> &SigningIdentity {
        &self.identity
    }

    /// Detached signature over `message`, base64.
    pub fn sign_message(&self, message: &[u8]) -> String {
        let signature = self.identity.signing_key().sign(message);
        STANDARD.encode(signature.to_bytes())
    }

    /// Header for `body`, valid from `created` for the protocol window.
    pub fn sign(&self, body: &[u8], created: u64) -> SignatureHeader {
        let expires = created + self.ttl_secs;
        let signing = signing_string(body, created, expires);

        SignatureHeader {
            key_id: self.identity.key_id(),
            algorithm: ALGORITHM.to_string(),
            created,
            expires,
            headers: SIGNED_HEADERS.to_string(),
            signature: self.sign_message(signing.as_bytes()),
        }
    }

    /// Authorization header value for `body`, or `None` when omitted.
    pub fn authorization(&self, body: &[u8], created: u64, mode: SignatureMode) -> Option<String> {
        match mode {
            SignatureMode::Valid => Some(self.sign(body, created).to_string()),
            SignatureMode::Invalid => {
                let mut header = self.sign(body, created);
                header.signature = corrupt(&header.signature);
                Some(header.to_string())
            }
            SignatureMode::Omit => None,
        }
    }
}

/// Flip one bit of the decoded signature and re-encode it.
fn corrupt(signature: &str) -> String {
    let mut bytes = STANDARD.decode(signature).unwrap_or_else(|_| vec![0u8; 64]);
    if let Some(first) = bytes.first_mut() {
        *first ^= 0x01;
    }
    STANDARD.encode(bytes)
}
