//! Egress route: settlement service → network.
//!
//! # Responsibilities
//! - Resolve the destination from `x-forward-to`
//! - Authenticate the internal caller by its `x-key-id` / `x-signature` token
//! - Sign the raw body and attach the Authorization header
//! - Forward only allow-listed headers

use std::sync::Arc;
use url::Url;

use crate::http::error::ProxyError;
use crate::http::forward::{Forwarder, OutboundRequest, UpstreamResponse};
use crate::http::headers::{
    is_forwardable, ProxyHeaders, AUTHORIZATION, RECOMPUTED_HEADERS, X_DEBUG_INVALID_SIGNATURE,
    X_DEBUG_OMIT_SIGNATURE, X_FORWARD_TO, X_KEY_ID, X_SIGNATURE,
};
use crate::keys::KeyCache;
use crate::pipeline::ProxyRequest;
use crate::signing::{AuthError, CallerAuthenticator, SignatureMode, Signer};

pub struct Egress {
    signer: Signer,
    caller: CallerAuthenticator,
    caller_keys: Arc<KeyCache>,
    forwarder: Arc<dyn Forwarder>,
    allow_debug_headers: bool,
}

impl Egress {
    pub fn new(
        signer: Signer,
        caller: CallerAuthenticator,
        caller_keys: Arc<KeyCache>,
        forwarder: Arc<dyn Forwarder>,
        allow_debug_headers: bool,
    ) -> Self {
        if allow_debug_headers {
            tracing::warn!("Debug signature headers enabled on egress");
        }
        Self {
            signer,
            caller,
            caller_keys,
            forwarder,
            allow_debug_headers,
        }
    }

    pub async fn handle(&self, request: ProxyRequest, now: u64) -> Result<UpstreamResponse, ProxyError> {
        let destination = destination(&request.headers)?;
        self.authenticate(&request.headers).await?;

        let mode = self.signature_mode(&request.headers);
        let mut headers = request.headers;
        headers.retain(|name| is_forwardable(name) && !RECOMPUTED_HEADERS.contains(&name));
        headers.remove(AUTHORIZATION);
        if let Some(authorization) = self.signer.authorization(&request.body, now, mode) {
            headers.insert(AUTHORIZATION, &authorization)?;
        }

        tracing::debug!(
            destination = %destination,
            mode = ?mode,
            body_len = request.body.len(),
            "Forwarding signed request"
        );

        self.forwarder
            .forward(OutboundRequest {
                method: request.method,
                url: destination,
                headers: headers.to_header_map()?,
                body: request.body,
            })
            .await
    }

    async fn authenticate(&self, headers: &ProxyHeaders) -> Result<(), AuthError> {
        let key_id = headers
            .first_non_empty(X_KEY_ID)
            .ok_or(AuthError::MissingHeader(X_KEY_ID))?;
        let token = headers
            .first_non_empty(X_SIGNATURE)
            .ok_or(AuthError::MissingHeader(X_SIGNATURE))?;

        let key = self
            .caller_keys
            .get_public_key(key_id)
            .await
            .ok_or_else(|| AuthError::UnknownKey(key_id.to_string()))?;

        self.caller.verify(token, &key)
    }

    fn signature_mode(&self, headers: &ProxyHeaders) -> SignatureMode {
        if !self.allow_debug_headers {
            return SignatureMode::Valid;
        }
        if flag_set(headers, X_DEBUG_OMIT_SIGNATURE) {
            SignatureMode::Omit
        } else if flag_set(headers, X_DEBUG_INVALID_SIGNATURE) {
            SignatureMode::Invalid
        } else {
            SignatureMode::Valid
        }
    }
}

/// Absolute http(s) URL from the first `x-forward-to` value.
fn destination(headers: &ProxyHeaders) -> Result<Url, ProxyError> {
    let raw = headers
        .first_non_empty(X_FORWARD_TO)
        .ok_or_else(|| ProxyError::Destination(format!("{} header missing", X_FORWARD_TO)))?;

    let url = Url::parse(raw).map_err(|e| ProxyError::Destination(format!("'{}': {}", raw, e)))?;
    if !matches!(url.scheme(), "http" | "https") || url.host().is_none() {
        return Err(ProxyError::Destination(format!("'{}' is not an http(s) URL", raw)));
    }
    Ok(url)
}

/// Present and not an explicit "0"/"false".
fn flag_set(headers: &ProxyHeaders, name: &str) -> bool {
    match headers.first(name) {
        Some(value) => {
            let value = value.trim();
            value != "0" && !value.eq_ignore_ascii_case("false")
        }
        None => false,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::pipeline::tests::{request, MapSource, RecordingForwarder};
    use crate::signing::caller::issue_token;
    use crate::signing::{SignatureHeader, SigningIdentity, Verification, VerificationPolicy, Verifier};
    use crate::keys::StaticKeys;
    use axum::http::StatusCode;
    use ed25519_dalek::SigningKey;
    use std::sync::atomic::Ordering;
    use std::time::Duration;

    const SUB: &str = "np.example.com";
    const URI: &str = "https://np.example.com/ondc";
    const NOW: u64 = 1_700_000_000;

    struct Fixture {
        egress: Egress,
        forwarder: Arc<RecordingForwarder>,
        source: Arc<MapSource>,
        caller_key: SigningKey,
        network_key: SigningKey,
    }

    fn fixture(allow_debug_headers: bool) -> Fixture {
        let caller_key = SigningKey::from_bytes(&[7u8; 32]);
        let network_key = SigningKey::from_bytes(&[9u8; 32]);

        let mut source = MapSource::default();
        source.keys.insert("rsf-key".into(), caller_key.verifying_key());
        let source = Arc::new(source);

        let cache = Arc::new(KeyCache::new(
            "rsf",
            source.clone(),
            Duration::from_secs(600),
            Duration::from_secs(600),
        ));
        let forwarder = Arc::new(RecordingForwarder::default());
        let egress = Egress::new(
            Signer::new(SigningIdentity::new(SUB, "uk-1", network_key.clone())),
            CallerAuthenticator::new(SUB, URI),
            cache,
            forwarder.clone(),
            allow_debug_headers,
        );

        Fixture { egress, forwarder, source, caller_key, network_key }
    }

    fn token(key: &SigningKey) -> String {
        issue_token(key, SUB, URI)
    }

    #[tokio::test]
    async fn test_forwards_signed_request_with_allow_listed_headers() {
        let f = fixture(false);
        let token = token(&f.caller_key);
        let req = request(
            "/rsf",
            &[
                ("x-forward-to", "https://seller.example/ondc/settle?x=1"),
                ("x-key-id", "rsf-key"),
                ("x-signature", token.as_str()),
                ("content-type", "application/json"),
                ("accept-encoding", "gzip"),
                ("user-agent", "rsf/1.0"),
                ("host", "proxy.internal"),
                ("content-length", "2"),
                ("cookie", "session=1"),
                ("x-request-id", "abc"),
                ("authorization", "Bearer internal"),
            ],
            b"{}",
        );

        let response = f.egress.handle(req, NOW).await.unwrap();
        assert_eq!(response.status, StatusCode::OK);

        let sent = f.forwarder.sent();
        assert_eq!(sent.len(), 1);
        let out = &sent[0];
        assert_eq!(out.url.as_str(), "https://seller.example/ondc/settle?x=1");
        assert_eq!(out.body.as_ref(), b"{}");

        let mut names: Vec<_> = out.headers.keys().map(|n| n.as_str().to_string()).collect();
        names.sort();
        assert_eq!(names, vec!["accept-encoding", "authorization", "content-type", "user-agent"]);
        for name in out.headers.keys() {
            assert!(is_forwardable(name.as_str()));
        }

        let authorization = out.headers.get("authorization").unwrap().to_str().unwrap();
        let header = SignatureHeader::parse(authorization).unwrap();
        assert_eq!(header.key_id.to_string(), "np.example.com|uk-1|ed25519");
        assert_eq!(header.created, NOW);
        assert_eq!(header.expires, NOW + 300);

        let resolver = Arc::new(StaticKeys::default().with(SUB, "uk-1", f.network_key.verifying_key()));
        let verifier = Verifier::new(
            resolver,
            VerificationPolicy { enforce_window: true, ..Default::default() },
        );
        assert_eq!(verifier.verify(&header, b"{}", NOW + 10).await, Ok(Verification::Verified));
    }

    #[tokio::test]
    async fn test_missing_destination_rejected_without_forwarding() {
        let f = fixture(false);
        let token = token(&f.caller_key);
        let req = request("/rsf", &[("x-key-id", "rsf-key"), ("x-signature", token.as_str())], b"{}");

        let err = f.egress.handle(req, NOW).await.unwrap_err();
        assert!(matches!(err, ProxyError::Destination(_)));
        assert!(f.forwarder.sent().is_empty());
        assert_eq!(f.source.fetches.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn test_relative_or_non_http_destination_rejected() {
        let f = fixture(false);
        for target in ["/relative/path", "ftp://seller.example/file", "not a url"] {
            let req = request("/rsf", &[("x-forward-to", target)], b"{}");
            let err = f.egress.handle(req, NOW).await.unwrap_err();
            assert!(matches!(err, ProxyError::Destination(_)), "{} accepted", target);
        }
        assert!(f.forwarder.sent().is_empty());
    }

    #[tokio::test]
    async fn test_caller_token_failures_are_rejected() {
        let f = fixture(false);
        let stranger = SigningKey::from_bytes(&[3u8; 32]);
        let wrong_reference = issue_token(&f.caller_key, SUB, "https://other.example");

        let cases: Vec<(Vec<(&str, String)>, &str)> = vec![
            (vec![], "missing_header"),
            (vec![("x-key-id", "rsf-key".into())], "missing_header"),
            (vec![("x-key-id", "unknown".into()), ("x-signature", token(&f.caller_key))], "unknown_key"),
            (vec![("x-key-id", "rsf-key".into()), ("x-signature", token(&stranger))], "signature_mismatch"),
            (vec![("x-key-id", "rsf-key".into()), ("x-signature", wrong_reference)], "reference_mismatch"),
            (vec![("x-key-id", "rsf-key".into()), ("x-signature", "zz".into())], "bad_encoding"),
        ];

        for (extra, reason) in cases {
            let mut headers: Vec<(&str, &str)> = vec![("x-forward-to", "https://seller.example/x")];
            headers.extend(extra.iter().map(|(n, v)| (*n, v.as_str())));
            let err = f.egress.handle(request("/rsf", &headers, b"{}"), NOW).await.unwrap_err();
            match err {
                ProxyError::Authentication(auth) => assert_eq!(auth.reason(), reason),
                other => panic!("expected authentication failure, got {:?}", other),
            }
        }
        assert!(f.forwarder.sent().is_empty());
    }

    #[tokio::test]
    async fn test_debug_headers_ignored_unless_enabled() {
        let f = fixture(false);
        let token = token(&f.caller_key);
        let req = request(
            "/rsf",
            &[
                ("x-forward-to", "https://seller.example/x"),
                ("x-key-id", "rsf-key"),
                ("x-signature", token.as_str()),
                ("x-debug-omit-signature", "1"),
            ],
            b"{}",
        );
        f.egress.handle(req, NOW).await.unwrap();
        let sent = f.forwarder.sent();
        assert!(sent[0].headers.contains_key("authorization"));
        assert!(!sent[0].headers.contains_key("x-debug-omit-signature"));
    }

    #[tokio::test]
    async fn test_debug_headers_select_mode_when_enabled() {
        let f = fixture(true);
        let token = token(&f.caller_key);
        let base = [
            ("x-forward-to", "https://seller.example/x"),
            ("x-key-id", "rsf-key"),
            ("x-signature", token.as_str()),
        ];

        let mut omit = base.to_vec();
        omit.push(("x-debug-omit-signature", "true"));
        f.egress.handle(request("/rsf", &omit, b"{}"), NOW).await.unwrap();

        let mut invalid = base.to_vec();
        invalid.push(("x-debug-invalid-signature", "1"));
        f.egress.handle(request("/rsf", &invalid, b"{}"), NOW).await.unwrap();

        let mut off = base.to_vec();
        off.push(("x-debug-invalid-signature", "false"));
        f.egress.handle(request("/rsf", &off, b"{}"), NOW).await.unwrap();

        let sent = f.forwarder.sent();
        assert!(!sent[0].headers.contains_key("authorization"));

        let resolver = Arc::new(StaticKeys::default().with(SUB, "uk-1", f.network_key.verifying_key()));
        let verifier = Verifier::new(resolver, VerificationPolicy::default());
        let parse = |i: usize| {
            SignatureHeader::parse(sent[i].headers.get("authorization").unwrap().to_str().unwrap()).unwrap()
        };
        assert_eq!(
            verifier.verify(&parse(1), b"{}", NOW).await,
            Err(AuthError::SignatureMismatch)
        );
        assert_eq!(verifier.verify(&parse(2), b"{}", NOW).await, Ok(Verification::Verified));
    }

    #[tokio::test]
    async fn test_caller_key_is_cached_between_requests() {
        let f = fixture(false);
        let token = token(&f.caller_key);
        for _ in 0..3 {
            let req = request(
                "/rsf",
                &[
                    ("x-forward-to", "https://seller.example/x"),
                    ("x-key-id", "rsf-key"),
                    ("x-signature", token.as_str()),
                ],
                b"{}",
            );
            f.egress.handle(req, NOW).await.unwrap();
        }
        assert_eq!(f.source.fetches.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn test_flag_values() {
        let mut headers = ProxyHeaders::new();
        assert!(!flag_set(&headers, "x-flag"));
        headers.insert("x-flag", "").unwrap();
        assert!(flag_set(&headers, "x-flag"));
        headers.insert("x-flag", "FALSE").unwrap();
        assert!(!flag_set(&headers, "x-flag"));
        headers.insert("x-flag", "0").unwrap();
        assert!(!flag_set(&headers, "x-flag"));
        headers.insert("x-flag", "yes").unwrap();
        assert!(flag_set(&headers, "x-flag"));
    }
}
