//! Request identification and buffering.
//!
//! # Responsibilities
//! - Generate a UUID v4 request id when the caller did not send one
//! - Echo the id on the response
//! - Buffer the incoming request into a `ProxyRequest`
//!
//! # Design Decisions
//! - Request ID added as early as possible for tracing
//! - Body size limit enforced while buffering, not after

use axum::body::{to_bytes, Body};
use axum::http::{HeaderMap, HeaderName, HeaderValue, Request};
use tower_http::request_id::{MakeRequestId, PropagateRequestIdLayer, RequestId, SetRequestIdLayer};
use uuid::Uuid;

use crate::http::error::ProxyError;
use crate::http::headers::ProxyHeaders;
use crate::pipeline::ProxyRequest;

pub const X_REQUEST_ID: &str = "x-request-id";

/// Request ids as UUID v4.
#[derive(Debug, Clone, Copy, Default)]
pub struct MakeRequestUuid;

impl MakeRequestId for MakeRequestUuid {
    fn make_request_id<B>(&mut self, _request: &Request<B>) -> Option<RequestId> {
        HeaderValue::from_str(&Uuid::new_v4().to_string())
            .ok()
            .map(RequestId::new)
    }
}

/// Sets `x-request-id` on requests that lack one.
pub fn set_request_id_layer() -> SetRequestIdLayer<MakeRequestUuid> {
    SetRequestIdLayer::new(HeaderName::from_static(X_REQUEST_ID), MakeRequestUuid)
}

/// Copies `x-request-id` from the request to the response.
pub fn propagate_request_id_layer() -> PropagateRequestIdLayer {
    PropagateRequestIdLayer::new(HeaderName::from_static(X_REQUEST_ID))
}

/// Request id carried by `headers`, or `"unknown"`.
pub fn request_id(headers: &HeaderMap) -> &str {
    headers
        .get(X_REQUEST_ID)
        .and_then(|v| v.to_str().ok())
        .unwrap_or("unknown")
}

/// Read the whole request, refusing bodies over `limit` bytes.
pub async fn buffer_request(request: Request<Body>, limit: usize) -> Result<ProxyRequest, ProxyError> {
    let (parts, body) = request.into_parts();
    let headers = ProxyHeaders::from_header_map(&parts.headers);
    let body = to_bytes(body, limit)
        .await
        .map_err(|e| ProxyError::Body(e.to_string()))?;

    Ok(ProxyRequest {
        method: parts.method,
        path: parts.uri.path().to_string(),
        query: parts.uri.query().map(str::to_string),
        headers,
        body,
    })
}
