//! Metrics collection and exposition.
//!
//! # Metrics
//! - `proxy_requests_total` (counter): requests by route, status
//! - `proxy_request_duration_seconds` (histogram): latency by route
//! - `proxy_auth_failures_total` (counter): rejections by route, reason
//! - `proxy_key_cache_lookups_total` (counter): cache outcomes (hit, stale, miss, expired)
//! - `proxy_key_fetches_total` (counter): upstream key fetches (found, not_found, error)
//!
//! Recording is a no-op until `init_metrics` installs the exporter.

use metrics::{counter, histogram};
use metrics_exporter_prometheus::PrometheusBuilder;
use std::net::SocketAddr;
use std::time::Instant;

/// Install the Prometheus exporter with an HTTP scrape listener on `addr`.
pub fn init_metrics(addr: SocketAddr) {
    match PrometheusBuilder::new().with_http_listener(addr).install() {
        Ok(()) => tracing::info!(address = %addr, "Metrics endpoint listening"),
        Err(e) => tracing::error!(error = %e, "Failed to install metrics exporter"),
    }
}

pub fn record_request(route: &'static str, status: u16, start: Instant) {
    counter!(
        "proxy_requests_total",
        "route" => route,
        "status" => status.to_string()
    )
    .increment(1);
    histogram!("proxy_request_duration_seconds", "route" => route)
        .record(start.elapsed().as_secs_f64());
}

pub fn record_auth_failure(route: &'static str, reason: &'static str) {
    counter!("proxy_auth_failures_total", "route" => route, "reason" => reason).increment(1);
}

pub fn record_key_lookup(cache: &'static str, outcome: &'static str) {
    counter!("proxy_key_cache_lookups_total", "cache" => cache, "outcome" => outcome).increment(1);
}

pub fn record_key_fetch(cache: &'static str, outcome: &'static str) {
    counter!("proxy_key_fetches_total", "cache" => cache, "outcome" => outcome).increment(1);
}
