//! Outbound forwarding.
//!
//! # Responsibilities
//! - Send a fully prepared request to its destination
//! - Buffer the upstream response for relaying
//!
//! # Design Decisions
//! - One shot: no retries, a failure fails the request
//! - Behind a trait so the pipeline can be tested without sockets

use axum::body::Bytes;
use axum::http::{HeaderMap, Method, StatusCode};
use axum::response::{IntoResponse, Response};
use futures_util::future::BoxFuture;
use std::time::Duration;
use url::Url;

use crate::http::error::ProxyError;
use crate::http::headers::sanitize_response_headers;

/// A request ready to leave the proxy.
#[derive(Debug, Clone)]
pub struct OutboundRequest {
    pub method: Method,
    pub url: Url,
    pub headers: HeaderMap,
    pub body: Bytes,
}

/// A buffered upstream response.
#[derive(Debug, Clone)]
pub struct UpstreamResponse {
    pub status: StatusCode,
    pub headers: HeaderMap,
    pub body: Bytes,
}

impl IntoResponse for UpstreamResponse {
    fn into_response(self) -> Response {
        let mut headers = self.headers;
        sanitize_response_headers(&mut headers);
        (self.status, headers, self.body).into_response()
    }
}

/// Sends requests onward.
pub trait Forwarder: Send + Sync {
    fn forward(&self, request: OutboundRequest) -> BoxFuture<'_, Result<UpstreamResponse, ProxyError>>;
}

/// `Forwarder` over a shared `reqwest` client.
#[derive(Debug, Clone)]
pub struct HttpForwarder {
    client: reqwest::Client,
}

impl HttpForwarder {
    pub fn new(client: reqwest::Client) -> Self {
        Self { client }
    }

    async fn send(&self, request: OutboundRequest) -> Result<UpstreamResponse, ProxyError> {
        let url = request.url.clone();
        let response = self
            .client
            .request(request.method, request.url)
            .headers(request.headers)
            .body(request.body)
            .send()
            .await
            .map_err(|e| ProxyError::Upstream(format!("{}: {}", url, e)))?;

        let status = response.status();
        let headers = response.headers().clone();
        let body = response
            .bytes()
            .await
            .map_err(|e| ProxyError::Upstream(format!("{}: reading body: {}", url, e)))?;

        Ok(UpstreamResponse { status, headers, body })
    }
}

impl Forwarder for HttpForwarder {
    fn forward(&self, request: OutboundRequest) -> BoxFuture<'_, Result<UpstreamResponse, ProxyError>> {
        Box::pin(self.send(request))
    }
}

/// Client shared by forwarding and key lookups.
pub fn build_client(timeout: Duration) -> Result<reqwest::Client, reqwest::Error> {
    reqwest::Client::builder()
        .timeout(timeout)
        .user_agent(concat!("settlement-proxy/", env!("CARGO_PKG_VERSION")))
        .build()
}
