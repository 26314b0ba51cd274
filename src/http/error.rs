//! Request failure taxonomy and its mapping to responses.
//!
//! All authentication failures produce the same status and body, whatever
//! the underlying reason. The reason is only logged.

use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
};
use thiserror::Error;

use crate::signing::AuthError;

#[derive(Debug, Error)]
pub enum ProxyError {
    /// The route does not handle this method/path.
    #[error("no route for {0}")]
    Route(String),

    /// Egress destination absent or unusable.
    #[error("forward destination rejected: {0}")]
    Destination(String),

    /// Body could not be read or exceeded the size limit.
    #[error("request body rejected: {0}")]
    Body(String),

    /// Request failed authentication.
    #[error("authentication failed: {0}")]
    Authentication(#[from] AuthError),

    /// Forward target unreachable or failed mid-response.
    #[error("upstream unavailable: {0}")]
    Upstream(String),

    /// Request could not be represented; a defect rather than bad input.
    #[error("internal invariant violated: {0}")]
    Internal(String),
}

impl ProxyError {
    pub fn status(&self) -> StatusCode {
        match self {
            ProxyError::Route(_) => StatusCode::NOT_FOUND,
            ProxyError::Destination(_) => StatusCode::BAD_REQUEST,
            ProxyError::Body(_) => StatusCode::PAYLOAD_TOO_LARGE,
            ProxyError::Authentication(_) => StatusCode::UNAUTHORIZED,
            ProxyError::Upstream(_) => StatusCode::BAD_GATEWAY,
            ProxyError::Internal(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }

    /// Body sent to the caller. Never includes error detail.
    pub fn public_message(&self) -> &'static str {
        match self {
            ProxyError::Route(_) => "Not found",
            ProxyError::Destination(_) => "Invalid forward destination",
            ProxyError::Body(_) => "Request body rejected",
            ProxyError::Authentication(_) => "Request rejected",
            ProxyError::Upstream(_) => "Upstream request failed",
            ProxyError::Internal(_) => "Internal error",
        }
    }
}

impl IntoResponse for ProxyError {
    fn into_response(self) -> Response {
        (self.status(), self.public_message()).into_response()
    }
}
