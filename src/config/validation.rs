//! Configuration validation.
//!
//! # Responsibilities
//! - Semantic validation (serde handles syntactic)
//! - Validate URLs, addresses and key material before anything binds
//! - Validate value ranges (TTLs and timeouts > 0, cache windows bounded)
//!
//! # Design Decisions
//! - Returns all validation errors, not just first
//! - Validation is pure function: ProxyConfig → Result<(), Vec<ValidationError>>
//! - Runs before config is accepted into the system

use std::net::SocketAddr;
use thiserror::Error;
use url::Url;

use crate::config::schema::ProxyConfig;
use crate::signing::identity::decode_signing_key;

/// Upper bound for key cache windows: one week.
pub const MAX_KEY_CACHE_SECS: u64 = 7 * 24 * 60 * 60;

/// A single semantic problem with the configuration.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("{field}: {message}")]
pub struct ValidationError {
    pub field: &'static str,
    pub message: String,
}

impl ValidationError {
    fn new(field: &'static str, message: impl Into<String>) -> Self {
        Self {
            field,
            message: message.into(),
        }
    }
}

/// Validate a loaded configuration.
pub fn validate_config(config: &ProxyConfig) -> Result<(), Vec<ValidationError>> {
    let mut errors = Vec::new();

    if config.listener.bind_address.parse::<SocketAddr>().is_err() {
        errors.push(ValidationError::new(
            "listener.bind_address",
            format!("'{}' is not a socket address", config.listener.bind_address),
        ));
    }

    check_http_url(&mut errors, "upstream.rsf_url", &config.upstream.rsf_url);
    check_http_url(&mut errors, "upstream.registry_url", &config.upstream.registry_url);

    check_required(&mut errors, "subscriber.id", &config.subscriber.id);
    check_http_url(&mut errors, "subscriber.uri", &config.subscriber.uri);
    check_required(&mut errors, "identity.key_id", &config.identity.key_id);
    check_required(&mut errors, "credential.key_id", &config.credential.key_id);
    check_required(&mut errors, "credential.secret_key", &config.credential.secret_key);

    if config.identity.private_key.trim().is_empty() {
        errors.push(ValidationError::new("identity.private_key", "must not be empty"));
    } else if let Err(e) = decode_signing_key(&config.identity.private_key) {
        errors.push(ValidationError::new("identity.private_key", e.to_string()));
    }

    if config.key_cache.ttl_secs == 0 {
        errors.push(ValidationError::new("key_cache.ttl_secs", "must be greater than 0"));
    } else if config.key_cache.ttl_secs > MAX_KEY_CACHE_SECS {
        errors.push(ValidationError::new(
            "key_cache.ttl_secs",
            format!("must be at most {}", MAX_KEY_CACHE_SECS),
        ));
    }
    if config.key_cache.stale_secs > MAX_KEY_CACHE_SECS {
        errors.push(ValidationError::new(
            "key_cache.stale_secs",
            format!("must be at most {}", MAX_KEY_CACHE_SECS),
        ));
    }
    if config.timeouts.request_secs == 0 {
        errors.push(ValidationError::new("timeouts.request_secs", "must be greater than 0"));
    }
    if config.timeouts.upstream_secs == 0 {
        errors.push(ValidationError::new("timeouts.upstream_secs", "must be greater than 0"));
    }
    if config.security.max_body_size == 0 {
        errors.push(ValidationError::new("security.max_body_size", "must be greater than 0"));
    }

    if config.observability.metrics_enabled
        && config.observability.metrics_address.parse::<SocketAddr>().is_err()
    {
        errors.push(ValidationError::new(
            "observability.metrics_address",
            format!("'{}' is not a socket address", config.observability.metrics_address),
        ));
    }

    if matches!(&config.verification.trusted_subscriber_id, Some(id) if id.trim().is_empty()) {
        errors.push(ValidationError::new(
            "verification.trusted_subscriber_id",
            "must not be empty when set",
        ));
    }

    if errors.is_empty() {
        Ok(())
    } else {
        Err(errors)
    }
}

fn check_required(errors: &mut Vec<ValidationError>, field: &'static str, value: &str) {
    if value.trim().is_empty() {
        errors.push(ValidationError::new(field, "must not be empty"));
    }
}

fn check_http_url(errors: &mut Vec<ValidationError>, field: &'static str, value: &str) {
    if value.trim().is_empty() {
        errors.push(ValidationError::new(field, "must not be empty"));
        return;
    }
    match Url::parse(value) {
        Ok(url) if matches!(url.scheme(), "http" | "https") && url.host().is_some() => {}
        Ok(url) => errors.push(ValidationError::new(
            field,
            format!("'{}' must be an http(s) URL with a host", url),
        )),
        Err(e) => errors.push(ValidationError::new(field, format!("'{}': {}", value, e))),
    }
}
