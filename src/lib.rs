//! Signing reverse proxy between a settlement service and a signed-request network.

pub mod config;
pub mod http;
pub mod keys;
pub mod lifecycle;
pub mod observability;
pub mod pipeline;
pub mod signing;

pub use config::schema::ProxyConfig;
pub use http::HttpServer;
pub use lifecycle::Shutdown;
pub use pipeline::ProxyPipeline;
