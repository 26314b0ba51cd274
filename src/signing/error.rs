//! Authentication failure taxonomy.
//!
//! Every variant carries enough detail for logs. None of it reaches the
//! caller: the HTTP layer answers all of them with the same rejection.

use thiserror::Error;

/// Reasons a request failed authentication.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum AuthError {
    /// A required header was absent or empty.
    #[error("missing header: {0}")]
    MissingHeader(&'static str),

    /// The signature header did not parse.
    #[error("malformed signature header")]
    MalformedHeader,

    /// The composite key id did not split into its parts.
    #[error("malformed key id: {0}")]
    MalformedKeyId(String),

    /// Algorithm other than ed25519.
    #[error("unsupported algorithm: {0}")]
    UnsupportedAlgorithm(String),

    /// No public key is known for the key id.
    #[error("unknown key: {0}")]
    UnknownKey(String),

    /// The key resolver failed.
    #[error("key resolution failed: {0}")]
    KeyResolution(String),

    /// Signature or key material was not valid base64/hex or had the wrong length.
    #[error("bad encoding: {0}")]
    BadEncoding(String),

    /// The signature did not verify.
    #[error("signature mismatch")]
    SignatureMismatch,

    /// The signed message of an internal caller token was not the expected reference.
    #[error("caller reference mismatch")]
    ReferenceMismatch,

    /// `created` is not before `expires`.
    #[error("invalid window: created {created} >= expires {expires}")]
    InvertedWindow { created: u64, expires: u64 },

    /// The signature is past its `expires`.
    #[error("signature expired at {expires} (now {now})")]
    Expired { expires: u64, now: u64 },

    /// The signature's `created` is in the future.
    #[error("signature not valid before {created} (now {now})")]
    NotYetValid { created: u64, now: u64 },
}

impl AuthError {
    /// Short stable label used for metrics.
    pub fn reason(&self) -> &'static str {
        match self {
            AuthError::MissingHeader(_) => "missing_header",
            AuthError::MalformedHeader => "malformed_header",
            AuthError::MalformedKeyId(_) => "malformed_key_id",
            AuthError::UnsupportedAlgorithm(_) => "unsupported_algorithm",
            AuthError::UnknownKey(_) => "unknown_key",
            AuthError::KeyResolution(_) => "key_resolution",
            AuthError::BadEncoding(_) => "bad_encoding",
            AuthError::SignatureMismatch => "signature_mismatch",
            AuthError::ReferenceMismatch => "reference_mismatch",
            AuthError::InvertedWindow { .. } => "inverted_window",
            AuthError::Expired { .. } => "expired",
            AuthError::NotYetValid { .. } => "not_yet_valid",
        }
    }
}
