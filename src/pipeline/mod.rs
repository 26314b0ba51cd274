//! Request transformation pipeline.
//!
//! # Data Flow
//! ```text
//! Egress (POST /rsf, internal caller → network):
//!     x-forward-to → caller token (RSF key cache) → sign body
//!         → allow-list headers → forward to destination
//!
//! Ingress (POST /on_settle|/on_report|/on_recon, network → internal):
//!     Authorization → verify (registry key cache) → credential headers
//!         → forward to <rsf_url>/api/v1/ondc<path>
//! ```
//!
//! # Design Decisions
//! - Requests are fully buffered; signatures cover the exact received bytes
//! - Collaborators are injected so each direction is testable without sockets
//! - The current time is a parameter, supplied by the server per request

pub mod egress;
pub mod ingress;

use axum::body::Bytes;
use axum::http::Method;
use std::sync::Arc;
use url::Url;

use crate::config::{ConfigError, ProxyConfig};
use crate::http::error::ProxyError;
use crate::http::forward::{Forwarder, HttpForwarder, UpstreamResponse};
use crate::http::headers::ProxyHeaders;
use crate::keys::{KeyCache, RegistryKeySource, RegistryResolver, RsfKeySource};
use crate::signing::{CallerAuthenticator, Signer, SigningIdentity, VerificationPolicy, Verifier};

pub use egress::Egress;
pub use ingress::{Credential, Ingress};

/// Route accepting calls from the settlement service.
pub const EGRESS_PATH: &str = "/rsf";
/// Routes accepting calls from the network.
pub const INGRESS_PATHS: &[&str] = &["/on_settle", "/on_report", "/on_recon"];
/// Prefix under the settlement service URL that ingress paths are appended to.
pub const INGRESS_PREFIX: &str = "/api/v1/ondc";

/// A buffered incoming request.
#[derive(Debug, Clone)]
pub struct ProxyRequest {
    pub method: Method,
    pub path: String,
    pub query: Option<String>,
    pub headers: ProxyHeaders,
    pub body: Bytes,
}

/// Both directions of the proxy.
pub struct ProxyPipeline {
    egress: Egress,
    ingress: Ingress,
}

impl ProxyPipeline {
    pub fn new(egress: Egress, ingress: Ingress) -> Self {
        Self { egress, ingress }
    }

    /// Wire up both directions from a validated configuration.
    pub fn from_config(config: &ProxyConfig, client: reqwest::Client) -> Result<Self, ConfigError> {
        let identity = SigningIdentity::from_base64(
            config.subscriber.id.clone(),
            config.identity.key_id.clone(),
            &config.identity.private_key,
        )?;
        let rsf_url = base_url("upstream.rsf_url", &config.upstream.rsf_url)?;
        let registry_url = base_url("upstream.registry_url", &config.upstream.registry_url)?;

        let rsf_source = RsfKeySource::new(client.clone(), &rsf_url)
            .map_err(|e| ConfigError::Url(format!("upstream.rsf_url: {}", e)))?;
        let registry_source = RegistryKeySource::new(client.clone(), &registry_url)
            .map_err(|e| ConfigError::Url(format!("upstream.registry_url: {}", e)))?;

        let caller_keys = Arc::new(KeyCache::from_config("rsf", Arc::new(rsf_source), &config.key_cache));
        let registry_keys = Arc::new(KeyCache::from_config(
            "registry",
            Arc::new(registry_source),
            &config.key_cache,
        ));

        let policy = VerificationPolicy {
            enforce_window: config.verification.enforce_window,
            clock_skew_secs: config.verification.clock_skew_secs,
            trusted_subscriber_id: config
                .verification
                .trusted_subscriber_id
                .clone()
                .filter(|id| !id.trim().is_empty()),
        };
        let verifier = Verifier::new(Arc::new(RegistryResolver::new(registry_keys)), policy);

        let forwarder: Arc<dyn Forwarder> = Arc::new(HttpForwarder::new(client));

        tracing::info!(
            subscriber_id = %identity.subscriber_id(),
            key_id = %identity.unique_key_id(),
            rsf_url = %rsf_url,
            registry_url = %registry_url,
            debug_headers = config.test_mode.allow_debug_headers,
            "Proxy pipeline configured"
        );

        let egress = Egress::new(
            Signer::new(identity),
            CallerAuthenticator::new(&config.subscriber.id, &config.subscriber.uri),
            caller_keys,
            forwarder.clone(),
            config.test_mode.allow_debug_headers,
        );
        let ingress = Ingress::new(
            verifier,
            Credential::new(&config.credential.key_id, &config.credential.secret_key),
            rsf_url,
            forwarder,
        );

        Ok(Self::new(egress, ingress))
    }

    pub async fn egress(&self, request: ProxyRequest, now: u64) -> Result<UpstreamResponse, ProxyError> {
        self.egress.handle(request, now).await
    }

    pub async fn ingress(&self, request: ProxyRequest, now: u64) -> Result<UpstreamResponse, ProxyError> {
        self.ingress.handle(request, now).await
    }
}

/// Parse a base URL and make sure its path ends in `/` so relative joins stay below it.
fn base_url(field: &str, raw: &str) -> Result<Url, ConfigError> {
    let mut url = Url::parse(raw.trim()).map_err(|e| ConfigError::Url(format!("{}: {}", field, e)))?;
    if !url.path().ends_with('/') {
        let path = format!("{}/", url.path());
        url.set_path(&path);
    }
    Ok(url)
}
