//! HTTP protocol handling subsystem.
//!
//! # Data Flow
//! ```text
//! TCP connection
//!     → server.rs (Axum setup, request id, tracing, limits)
//!     → request.rs (buffer into ProxyRequest)
//!     → headers.rs (multimap, allow-list, hop-by-hop)
//!     → [pipeline transforms and authenticates]
//!     → forward.rs (send onward, buffer the upstream response)
//!     → error.rs (failures to status codes)
//!     → Send to client
//! ```

pub mod error;
pub mod forward;
pub mod headers;
pub mod request;
pub mod server;

pub use error::ProxyError;
pub use forward::{Forwarder, HttpForwarder, OutboundRequest, UpstreamResponse};
pub use headers::ProxyHeaders;
pub use request::X_REQUEST_ID;
pub use server::HttpServer;
