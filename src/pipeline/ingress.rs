//! Ingress route: network → settlement service.
//!
//! # Responsibilities
//! - Verify the network signature over the raw body
//! - Swap the network Authorization for the settlement service credential
//! - Rewrite the path under `/api/v1/ondc`, keeping the query

use std::fmt;
use std::sync::Arc;
use url::Url;

use crate::http::error::ProxyError;
use crate::http::forward::{Forwarder, OutboundRequest, UpstreamResponse};
use crate::http::headers::{
    is_hop_by_hop, ProxyHeaders, AUTHORIZATION, RECOMPUTED_HEADERS, X_KEY_ID, X_SECRET_KEY,
};
use crate::pipeline::{ProxyRequest, INGRESS_PATHS, INGRESS_PREFIX};
use crate::signing::{AuthError, SignatureHeader, Verification, Verifier};

/// Key id and secret the settlement service expects from us.
#[derive(Clone)]
pub struct Credential {
    key_id: String,
    secret_key: String,
}

impl Credential {
    pub fn new(key_id: &str, secret_key: &str) -> Self {
        Self {
            key_id: key_id.to_string(),
            secret_key: secret_key.to_string(),
        }
    }
}

impl fmt::Debug for Credential {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Credential")
            .field("key_id", &self.key_id)
            .field("secret_key", &"<redacted>")
            .finish()
    }
}

pub struct Ingress {
    verifier: Verifier,
    credential: Credential,
    rsf_url: Url,
    forwarder: Arc<dyn Forwarder>,
}

impl Ingress {
    pub fn new(verifier: Verifier, credential: Credential, rsf_url: Url, forwarder: Arc<dyn Forwarder>) -> Self {
        Self {
            verifier,
            credential,
            rsf_url,
            forwarder,
        }
    }

    pub async fn handle(&self, request: ProxyRequest, now: u64) -> Result<UpstreamResponse, ProxyError> {
        if request.method != axum::http::Method::POST || !INGRESS_PATHS.contains(&request.path.as_str()) {
            return Err(ProxyError::Route(format!("{} {}", request.method, request.path)));
        }

        let verification = self.authenticate(&request.headers, &request.body, now).await?;
        let target = self.target(&request.path, request.query.as_deref())?;

        let mut headers = request.headers;
        headers.retain(|name| !is_hop_by_hop(name) && !RECOMPUTED_HEADERS.contains(&name));
        headers.remove(AUTHORIZATION);
        headers.insert(X_KEY_ID, &self.credential.key_id)?;
        headers.insert(X_SECRET_KEY, &self.credential.secret_key)?;

        tracing::debug!(
            target_url = %target,
            verification = ?verification,
            body_len = request.body.len(),
            "Forwarding verified request"
        );

        self.forwarder
            .forward(OutboundRequest {
                method: request.method,
                url: target,
                headers: headers.to_header_map()?,
                body: request.body,
            })
            .await
    }

    async fn authenticate(
        &self,
        headers: &ProxyHeaders,
        body: &[u8],
        now: u64,
    ) -> Result<Verification, AuthError> {
        let authorization = headers
            .first_non_empty(AUTHORIZATION)
            .ok_or(AuthError::MissingHeader(AUTHORIZATION))?;
        let header = SignatureHeader::parse(authorization).ok_or(AuthError::MalformedHeader)?;
        self.verifier.verify(&header, body, now).await
    }

    /// `<rsf_url>/api/v1/ondc<path>[?query]`
    fn target(&self, path: &str, query: Option<&str>) -> Result<Url, ProxyError> {
        let base = self.rsf_url.as_str().trim_end_matches('/');
        let mut raw = format!("{}{}{}", base, INGRESS_PREFIX, path);
        if let Some(query) = query.filter(|q| !q.is_empty()) {
            raw.push('?');
            raw.push_str(query);
        }
        Url::parse(&raw).map_err(|e| ProxyError::Internal(format!("ingress target '{}': {}", raw, e)))
    }
}
