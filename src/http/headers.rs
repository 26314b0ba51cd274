//! Header mapping and filtering.
//!
//! # Responsibilities
//! - Represent request headers as lower-cased name → one-or-many values
//! - Coerce singular headers by taking the first value
//! - Enforce the egress allow-list and strip hop-by-hop headers
//!
//! # Design Decisions
//! - Names are lower-cased on the way in; lookups are case-insensitive
//! - Values are kept as raw `HeaderValue` bytes, so obs-text passes through untouched
//! - Only the headers the pipeline reads need UTF-8; anything else reads as absent

use axum::http::{HeaderMap, HeaderName, HeaderValue};
use std::collections::BTreeMap;

use crate::http::error::ProxyError;

/// Destination of an egress request (absolute URL).
pub const X_FORWARD_TO: &str = "x-forward-to";
/// Key id of the internal caller on egress; credential key id on ingress.
pub const X_KEY_ID: &str = "x-key-id";
/// Caller token of the internal caller.
pub const X_SIGNATURE: &str = "x-signature";
/// Shared secret presented to the settlement service.
pub const X_SECRET_KEY: &str = "x-secret-key";
/// Test mode: emit a corrupted signature.
pub const X_DEBUG_INVALID_SIGNATURE: &str = "x-debug-invalid-signature";
/// Test mode: send no Authorization header.
pub const X_DEBUG_OMIT_SIGNATURE: &str = "x-debug-omit-signature";
pub const AUTHORIZATION: &str = "authorization";

/// Headers allowed out of the egress route. `accept*` is matched by prefix.
pub const FORWARDABLE_HEADERS: &[&str] = &[
    "user-agent",
    "content-type",
    "content-length",
    "authorization",
    "host",
    "origin",
    "referer",
];

/// Connection-scoped headers that never cross the proxy.
pub const HOP_BY_HOP_HEADERS: &[&str] = &[
    "connection",
    "keep-alive",
    "proxy-authenticate",
    "proxy-authorization",
    "proxy-connection",
    "te",
    "trailer",
    "transfer-encoding",
    "upgrade",
];

/// Recomputed by the HTTP client for each outbound request.
pub const RECOMPUTED_HEADERS: &[&str] = &["host", "content-length"];

/// True if `name` may leave the egress route.
pub fn is_forwardable(name: &str) -> bool {
    let name = name.to_ascii_lowercase();
    name.starts_with("accept") || FORWARDABLE_HEADERS.contains(&name.as_str())
}

pub fn is_hop_by_hop(name: &str) -> bool {
    HOP_BY_HOP_HEADERS.contains(&name.to_ascii_lowercase().as_str())
}

/// Lower-cased header multimap.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ProxyHeaders {
    entries: BTreeMap<String, Vec<HeaderValue>>,
}

impl ProxyHeaders {
    pub fn new() -> Self {
        Self::default()
    }

    /// Copy an HTTP header map, values byte for byte.
    pub fn from_header_map(map: &HeaderMap) -> Self {
        let mut headers = Self::new();
        for (name, value) in map.iter() {
            headers.append(name.as_str(), value.clone());
        }
        headers
    }

    /// Build an HTTP header map, preserving multiple values.
    pub fn to_header_map(&self) -> Result<HeaderMap, ProxyError> {
        let mut map = HeaderMap::new();
        for (name, values) in &self.entries {
            let header_name = HeaderName::from_bytes(name.as_bytes())
                .map_err(|_| ProxyError::Internal(format!("invalid header name '{}'", name)))?;
            for value in values {
                map.append(header_name.clone(), value.clone());
            }
        }
        Ok(map)
    }

    /// Replace all values of `name`. Fails if `value` is not a legal header value.
    pub fn insert(&mut self, name: &str, value: &str) -> Result<(), ProxyError> {
        let value = HeaderValue::from_str(value)
            .map_err(|_| ProxyError::Internal(format!("invalid value for header '{}'", name)))?;
        self.entries.insert(name.to_ascii_lowercase(), vec![value]);
        Ok(())
    }

    pub fn append(&mut self, name: &str, value: HeaderValue) {
        self.entries
            .entry(name.to_ascii_lowercase())
            .or_default()
            .push(value);
    }

    pub fn remove(&mut self, name: &str) -> Option<Vec<HeaderValue>> {
        self.entries.remove(&name.to_ascii_lowercase())
    }

    /// Single-value coercion: the first value wins. A first value that is
    /// not UTF-8 reads as absent; later values are never consulted.
    pub fn first(&self, name: &str) -> Option<&str> {
        self.entries
            .get(&name.to_ascii_lowercase())
            .and_then(|values| values.first())
            .and_then(|value| std::str::from_utf8(value.as_bytes()).ok())
    }

    /// First value, trimmed, if it is non-empty.
    pub fn first_non_empty(&self, name: &str) -> Option<&str> {
        self.first(name).map(str::trim).filter(|v| !v.is_empty())
    }

    pub fn get_all(&self, name: &str) -> &[HeaderValue] {
        self.entries
            .get(&name.to_ascii_lowercase())
            .map(Vec::as_slice)
            .unwrap_or(&[])
    }

    pub fn contains(&self, name: &str) -> bool {
        self.entries.contains_key(&name.to_ascii_lowercase())
    }

    /// Keep only headers whose name satisfies `keep`.
    pub fn retain<F>(&mut self, mut keep: F)
    where
        F: FnMut(&str) -> bool,
    {
        self.entries.retain(|name, _| keep(name.as_str()));
    }

    pub fn names(&self) -> impl Iterator<Item = &str> {
        self.entries.keys().map(String::as_str)
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

/// Drop hop-by-hop and recomputed headers from a response header map.
pub fn sanitize_response_headers(headers: &mut HeaderMap) {
    for name in HOP_BY_HOP_HEADERS.iter().chain(RECOMPUTED_HEADERS) {
        headers.remove(*name);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_names_are_case_insensitive() {
        let mut headers = ProxyHeaders::new();
        headers.append("X-Forward-To", HeaderValue::from_static("http://a"));
        assert_eq!(headers.first("x-forward-to"), Some("http://a"));
        assert_eq!(headers.first("X-FORWARD-TO"), Some("http://a"));
        assert_eq!(headers.names().collect::<Vec<_>>(), vec!["x-forward-to"]);
    }

    #[test]
    fn test_first_value_wins() {
        let mut map = HeaderMap::new();
        map.append("x-key-id", HeaderValue::from_static("first"));
        map.append("x-key-id", HeaderValue::from_static("second"));
        let headers = ProxyHeaders::from_header_map(&map);
        assert_eq!(headers.first("x-key-id"), Some("first"));
        assert_eq!(headers.get_all("x-key-id").len(), 2);
    }

    #[test]
    fn test_insert_replaces_all_values() {
        let mut headers = ProxyHeaders::new();
        headers.append("authorization", HeaderValue::from_static("a"));
        headers.append("authorization", HeaderValue::from_static("b"));
        headers.insert("Authorization", "c").unwrap();
        assert_eq!(headers.get_all("authorization"), [HeaderValue::from_static("c")]);
    }

    #[test]
    fn test_insert_rejects_illegal_value() {
        let mut headers = ProxyHeaders::new();
        assert!(matches!(headers.insert("x-secret-key", "a\nb"), Err(ProxyError::Internal(_))));
        assert!(headers.is_empty());
    }

    #[test]
    fn test_first_non_empty() {
        let mut headers = ProxyHeaders::new();
        headers.insert("x-key-id", "   ").unwrap();
        assert_eq!(headers.first_non_empty("x-key-id"), None);
        assert_eq!(headers.first_non_empty("missing"), None);
    }

    #[test]
    fn test_empty_first_value_does_not_fall_through() {
        let mut map = HeaderMap::new();
        map.append("x-forward-to", HeaderValue::from_static(""));
        map.append("x-forward-to", HeaderValue::from_static("https://seller.example/"));
        let headers = ProxyHeaders::from_header_map(&map);
        assert_eq!(headers.first("x-forward-to"), Some(""));
        assert_eq!(headers.first_non_empty("x-forward-to"), None);
    }

    #[test]
    fn test_allow_list() {
        for name in ["user-agent", "Content-Type", "content-length", "accept", "accept-encoding",
                     "accept-language", "authorization", "host", "origin", "referer"] {
            assert!(is_forwardable(name), "{} should be forwardable", name);
        }
        for name in ["x-forward-to", "x-key-id", "x-signature", "cookie", "x-debug-omit-signature",
                     "x-request-id", "forwarded"] {
            assert!(!is_forwardable(name), "{} should be stripped", name);
        }
    }

    #[test]
    fn test_round_trip_through_header_map() {
        let mut headers = ProxyHeaders::new();
        headers.append("accept", HeaderValue::from_static("application/json"));
        headers.append("accept", HeaderValue::from_static("text/plain"));
        headers.insert("user-agent", "settlement").unwrap();
        let map = headers.to_header_map().unwrap();
        assert_eq!(map.get_all("accept").iter().count(), 2);
        assert_eq!(ProxyHeaders::from_header_map(&map), headers);
    }

    #[test]
    fn test_non_utf8_value_kept_as_bytes() {
        let latin1 = HeaderValue::from_bytes(b"caf\xe9").unwrap();
        let mut map = HeaderMap::new();
        map.insert("user-agent", latin1.clone());
        map.insert("authorization", HeaderValue::from_bytes(&[0xff, 0xfe]).unwrap());

        let headers = ProxyHeaders::from_header_map(&map);
        assert_eq!(headers.first("user-agent"), None);
        assert_eq!(headers.first_non_empty("authorization"), None);
        assert_eq!(headers.to_header_map().unwrap().get("user-agent"), Some(&latin1));
    }

    #[test]
    fn test_sanitize_response_headers() {
        let mut map = HeaderMap::new();
        map.insert("connection", HeaderValue::from_static("close"));
        map.insert("transfer-encoding", HeaderValue::from_static("chunked"));
        map.insert("content-length", HeaderValue::from_static("10"));
        map.insert("content-type", HeaderValue::from_static("application/json"));
        sanitize_response_headers(&mut map);
        assert_eq!(map.len(), 1);
        assert!(map.contains_key("content-type"));
    }
}
