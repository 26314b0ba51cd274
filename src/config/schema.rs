//! Configuration schema definitions.
//!
//! This module defines the complete configuration structure for the proxy.
//! All types derive Serde traits for deserialization from config files.

use serde::{Deserialize, Serialize};

/// Root configuration for the signing proxy.
#[derive(Debug, Clone, Deserialize, Serialize, Default)]
#[serde(default)]
pub struct ProxyConfig {
    /// Listener configuration (bind address).
    pub listener: ListenerConfig,

    /// Settlement service and network registry locations.
    pub upstream: UpstreamConfig,

    /// Our participant identity on the network.
    pub subscriber: SubscriberConfig,

    /// Ed25519 key used to sign outgoing network traffic.
    pub identity: IdentityConfig,

    /// Shared-secret pair presented to the settlement service.
    pub credential: CredentialConfig,

    /// Public key cache policy.
    pub key_cache: KeyCacheConfig,

    /// Inbound signature acceptance rules.
    pub verification: VerificationConfig,

    /// Test-only behaviours.
    pub test_mode: TestModeConfig,

    /// Timeout configuration.
    pub timeouts: TimeoutConfig,

    /// Request limits.
    pub security: SecurityConfig,

    /// Observability settings.
    pub observability: ObservabilityConfig,
}

/// Listener configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct ListenerConfig {
    /// Bind address (e.g., "0.0.0.0:4000").
    pub bind_address: String,
}

impl Default for ListenerConfig {
    fn default() -> Self {
        Self {
            bind_address: "0.0.0.0:4000".to_string(),
        }
    }
}

/// Upstream locations.
#[derive(Debug, Clone, Deserialize, Serialize, Default)]
#[serde(default)]
pub struct UpstreamConfig {
    /// Base URL of the internal settlement service.
    pub rsf_url: String,

    /// Base URL of the network registry (lookup endpoint lives below it).
    pub registry_url: String,
}

/// Subscriber identity.
#[derive(Debug, Clone, Deserialize, Serialize, Default)]
#[serde(default)]
pub struct SubscriberConfig {
    /// Subscriber id registered on the network.
    pub id: String,

    /// Subscriber URI registered on the network.
    pub uri: String,
}

/// Network signing key.
#[derive(Clone, Deserialize, Serialize, Default)]
#[serde(default)]
pub struct IdentityConfig {
    /// Unique key id registered alongside the public key.
    pub key_id: String,

    /// Base64 Ed25519 private key (32-byte seed or 64-byte keypair).
    pub private_key: String,
}

impl std::fmt::Debug for IdentityConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("IdentityConfig")
            .field("key_id", &self.key_id)
            .field("private_key", &"<redacted>")
            .finish()
    }
}

/// Credential pair forwarded to the settlement service on ingress.
#[derive(Clone, Deserialize, Serialize, Default)]
#[serde(default)]
pub struct CredentialConfig {
    pub key_id: String,
    pub secret_key: String,
}

impl std::fmt::Debug for CredentialConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CredentialConfig")
            .field("key_id", &self.key_id)
            .field("secret_key", &"<redacted>")
            .finish()
    }
}

/// Key cache policy.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct KeyCacheConfig {
    /// Seconds an entry is served without refreshing.
    pub ttl_secs: u64,

    /// Seconds past the TTL an entry is still served while refreshing.
    pub stale_secs: u64,
}

impl Default for KeyCacheConfig {
    fn default() -> Self {
        Self {
            ttl_secs: 600,
            stale_secs: 600,
        }
    }
}

/// Inbound signature acceptance.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct VerificationConfig {
    /// Reject signatures outside their created/expires window.
    pub enforce_window: bool,

    /// Clock skew tolerated on both ends of the window.
    pub clock_skew_secs: u64,

    /// Subscriber accepted without signature checks. Leave unset in production.
    pub trusted_subscriber_id: Option<String>,
}

impl Default for VerificationConfig {
    fn default() -> Self {
        Self {
            enforce_window: true,
            clock_skew_secs: 0,
            trusted_subscriber_id: None,
        }
    }
}

/// Test-only behaviour.
#[derive(Debug, Clone, Deserialize, Serialize, Default)]
#[serde(default)]
pub struct TestModeConfig {
    /// Honour `x-debug-invalid-signature` / `x-debug-omit-signature` on egress.
    pub allow_debug_headers: bool,
}

/// Timeout configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct TimeoutConfig {
    /// Total time for a proxied request, in seconds.
    pub request_secs: u64,

    /// Timeout of each upstream call (forward, registry, key listing), in seconds.
    pub upstream_secs: u64,
}

impl Default for TimeoutConfig {
    fn default() -> Self {
        Self {
            request_secs: 30,
            upstream_secs: 10,
        }
    }
}

/// Request limits.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct SecurityConfig {
    /// Maximum body size in bytes.
    pub max_body_size: usize,
}

impl Default for SecurityConfig {
    fn default() -> Self {
        Self {
            max_body_size: 2 * 1024 * 1024, // 2MB
        }
    }
}

/// Log output format.
#[derive(Debug, Clone, Copy, Deserialize, Serialize, PartialEq, Eq, Default)]
#[serde(rename_all = "lowercase")]
pub enum LogFormat {
    #[default]
    Pretty,
    Json,
}

/// Observability configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct ObservabilityConfig {
    /// Log level (trace, debug, info, warn, error). `RUST_LOG` takes precedence.
    pub log_level: String,

    /// Log output format.
    pub log_format: LogFormat,

    /// Enable metrics endpoint.
    pub metrics_enabled: bool,

    /// Metrics endpoint bind address.
    pub metrics_address: String,
}

impl Default for ObservabilityConfig {
    fn default() -> Self {
        Self {
            log_level: "info".to_string(),
            log_format: LogFormat::Pretty,
            metrics_enabled: false,
            metrics_address: "0.0.0.0:9090".to_string(),
        }
    }
}
