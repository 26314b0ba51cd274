//! `Authorization: Signature ...` header codec.
//!
//! # Wire format
//! ```text
//! Signature keyId="<sub>|<key>|ed25519",algorithm="ed25519",created="<epoch>",
//!           expires="<epoch>",headers="(created) (expires) digest",signature="<base64>"
//! ```
//!
//! # Design Decisions
//! - Parsing scans for `key="value"` pairs and skips anything else
//! - Values are restricted to a fixed character set; a value outside it is not a pair
//! - Any missing field or malformed key id yields `None`, never a panic
//! - Serialization is `Display`, field order fixed

use std::collections::HashMap;
use std::fmt;

/// The only algorithm the network accepts.
pub const ALGORITHM: &str = "ed25519";

/// Value of the `headers` field for every signature this scheme produces.
pub const SIGNED_HEADERS: &str = "(created) (expires) digest";

/// Composite key identifier, `subscriberId|uniqueKeyId|algorithm` on the wire.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct KeyId {
    pub subscriber_id: String,
    pub unique_key_id: String,
    pub algorithm: String,
}

impl KeyId {
    /// Key id for one of our own signatures.
    pub fn new(subscriber_id: impl Into<String>, unique_key_id: impl Into<String>) -> Self {
        Self {
            subscriber_id: subscriber_id.into(),
            unique_key_id: unique_key_id.into(),
            algorithm: ALGORITHM.to_string(),
        }
    }

    /// Split `sub|key|alg`. All three parts must be present and non-empty.
    pub fn parse(value: &str) -> Option<Self> {
        let mut parts = value.split('|');
        let subscriber_id = parts.next()?.trim();
        let unique_key_id = parts.next()?.trim();
        let algorithm = parts.next()?.trim();

        if parts.next().is_some()
            || subscriber_id.is_empty()
            || unique_key_id.is_empty()
            || algorithm.is_empty()
        {
            return None;
        }

        Some(Self {
            subscriber_id: subscriber_id.to_string(),
            unique_key_id: unique_key_id.to_string(),
            algorithm: algorithm.to_string(),
        })
    }
}

impl fmt::Display for KeyId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}|{}|{}", self.subscriber_id, self.unique_key_id, self.algorithm)
    }
}

/// Parsed or to-be-sent signature header.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SignatureHeader {
    pub key_id: KeyId,
    pub algorithm: String,
    pub created: u64,
    pub expires: u64,
    pub headers: String,
    pub signature: String,
}

impl SignatureHeader {
    /// Parse an `Authorization` header value. Returns `None` on any defect.
    pub fn parse(value: &str) -> Option<Self> {
        let mut fields = scan_pairs(value);

        let key_id = KeyId::parse(&fields.remove("keyId")?)?;
        let algorithm = fields.remove("algorithm")?;
        let created = fields.remove("created")?.trim().parse().ok()?;
        let expires = fields.remove("expires")?.trim().parse().ok()?;
        let headers = fields.remove("headers")?;
        let signature = fields.remove("signature")?;

        Some(Self {
            key_id,
            algorithm,
            created,
            expires,
            headers,
            signature,
        })
    }
}

impl fmt::Display for SignatureHeader {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "Signature keyId=\"{}\",algorithm=\"{}\",created=\"{}\",expires=\"{}\",headers=\"{}\",signature=\"{}\"",
            self.key_id, self.algorithm, self.created, self.expires, self.headers, self.signature
        )
    }
}

fn is_name_char(b: u8) -> bool {
    b.is_ascii_alphanumeric() || b == b'_'
}

fn is_value_char(b: u8) -> bool {
    is_name_char(b)
        || b.is_ascii_whitespace()
        || matches!(b, b':' | b'.' | b'-' | b'/' | b'|' | b'(' | b')' | b'=' | b'+')
}

/// Collect every `name="value"` occurrence, leftmost first. Later duplicates win.
fn scan_pairs(input: &str) -> HashMap<String, String> {
    let bytes = input.as_bytes();
    let mut pairs = HashMap::new();
    let mut pos = 0;

    while pos < bytes.len() {
        match match_pair(bytes, pos) {
            Some((name, value, end)) => {
                pairs.insert(input[name.0..name.1].to_string(), input[value.0..value.1].to_string());
                pos = end;
            }
            None => pos += 1,
        }
    }

    pairs
}

type Span = (usize, usize);

/// Try to match one pair starting exactly at `start`.
fn match_pair(bytes: &[u8], start: usize) -> Option<(Span, Span, usize)> {
    let mut i = start;
    while i < bytes.len() && is_name_char(bytes[i]) {
        i += 1;
    }
    if i == start || bytes.get(i) != Some(&b'=') || bytes.get(i + 1) != Some(&b'"') {
        return None;
    }
    let name = (start, i);

    let value_start = i + 2;
    let mut j = value_start;
    while j < bytes.len() && is_value_char(bytes[j]) {
        j += 1;
    }
    if j == value_start || bytes.get(j) != Some(&b'"') {
        return None;
    }

    Some((name, (value_start, j), j + 1))
}
