//! Body digest and canonical signing string.
//!
//! The signing string is never transmitted. Both sides rebuild it from the
//! raw body bytes and the `created`/`expires` values carried in the header, so
//! the layout below is a wire contract with the network:
//!
//! ```text
//! (created): <created>
//! (expires): <expires>
//! digest: BLAKE-512=<base64 blake2b-512 of body>
//! ```

use base64::{engine::general_purpose::STANDARD, Engine as _};
use blake2::{Blake2b512, Digest};

/// Prefix of the digest line.
pub const DIGEST_PREFIX: &str = "BLAKE-512=";

/// BLAKE2b-512 of the body, base64 encoded (standard alphabet, padded).
pub fn body_digest(body: &[u8]) -> String {
    let hash = Blake2b512::digest(body);
    STANDARD.encode(hash)
}

/// Build the canonical signing string for a body and validity window.
pub fn signing_string(body: &[u8], created: u64, expires: u64) -> String {
    format!(
        "(created): {}\n(expires): {}\ndigest: {}{}",
        created,
        expires,
        DIGEST_PREFIX,
        body_digest(body)
    )
}
