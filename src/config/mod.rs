//! Configuration management subsystem.
//!
//! # Data Flow
//! ```text
//! config file (TOML, optional)
//!     → loader.rs (parse & deserialize)
//!     → environment overrides (PORT, RSF_URL, SUBSCRIBER_ID, ...)
//!     → validation.rs (semantic checks)
//!     → ProxyConfig (validated, immutable)
//!     → consumed once at startup to build the pipeline
//! ```
//!
//! # Design Decisions
//! - Config is immutable once loaded; the signing identity never changes at runtime
//! - All fields have defaults to allow minimal configs
//! - Validation separates syntactic (serde) from semantic checks
//! - Any error is fatal: the process does not start serving

pub mod loader;
pub mod schema;
pub mod validation;

pub use loader::{load_config, ConfigError};
pub use schema::{
    CredentialConfig, IdentityConfig, KeyCacheConfig, ListenerConfig, LogFormat,
    ObservabilityConfig, ProxyConfig, SecurityConfig, SubscriberConfig, TestModeConfig,
    TimeoutConfig, UpstreamConfig, VerificationConfig,
};
