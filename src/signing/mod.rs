//! Request signing subsystem.
//!
//! # Data Flow
//! ```text
//! Outgoing (egress):
//!     body bytes → canonical.rs (digest, signing string)
//!                → signer.rs (Ed25519, SignatureHeader)
//!                → header.rs (wire format)
//!
//! Incoming (ingress):
//!     Authorization → header.rs (parse) → verifier.rs (window, key, signature)
//!
//! Internal caller:
//!     x-signature → caller.rs (open signed message, compare reference)
//! ```
//!
//! # Design Decisions
//! - Signing and verification always run over the exact bytes on the wire
//! - Time is passed in as epoch seconds so every check is testable

pub mod caller;
pub mod canonical;
pub mod error;
pub mod header;
pub mod identity;
pub mod signer;
pub mod verifier;

use std::time::{SystemTime, UNIX_EPOCH};

pub use caller::{issue_token, CallerAuthenticator};
pub use canonical::{body_digest, signing_string};
pub use error::AuthError;
pub use header::{KeyId, SignatureHeader};
pub use identity::{KeyMaterialError, SigningIdentity};
pub use signer::{SignatureMode, Signer, SIGNATURE_TTL_SECS};
pub use verifier::{Verification, VerificationPolicy, Verifier};

/// Current time as epoch seconds.
pub fn unix_now() -> u64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .unwrap_or_default()
        .as_secs()
}
