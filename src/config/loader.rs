//! Configuration loading from disk and environment.

use std::fs;
use std::path::Path;

use crate::config::schema::ProxyConfig;
use crate::config::validation::{validate_config, ValidationError};
use crate::signing::identity::KeyMaterialError;

/// Error type for configuration loading. Always fatal at startup.
#[derive(Debug)]
pub enum ConfigError {
    Io(std::io::Error),
    Parse(toml::de::Error),
    Validation(Vec<ValidationError>),
    Identity(KeyMaterialError),
    Url(String),
    Client(String),
}

impl std::fmt::Display for ConfigError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ConfigError::Io(e) => write!(f, "IO error: {}", e),
            ConfigError::Parse(e) => write!(f, "Parse error: {}", e),
            ConfigError::Validation(errors) => {
                write!(f, "Validation failed: ")?;
                for (i, err) in errors.iter().enumerate() {
                    if i > 0 { write!(f, ", ")?; }
                    write!(f, "{}", err)?;
                }
                Ok(())
            }
            ConfigError::Identity(e) => write!(f, "Identity error: {}", e),
            ConfigError::Url(e) => write!(f, "URL error: {}", e),
            ConfigError::Client(e) => write!(f, "HTTP client error: {}", e),
        }
    }
}

impl std::error::Error for ConfigError {}

impl From<KeyMaterialError> for ConfigError {
    fn from(e: KeyMaterialError) -> Self {
        ConfigError::Identity(e)
    }
}

/// Load and validate configuration: optional TOML file, then environment overrides.
pub fn load_config(path: Option<&Path>) -> Result<ProxyConfig, ConfigError> {
    let mut config = match path {
        Some(path) => {
            let content = fs::read_to_string(path).map_err(ConfigError::Io)?;
            toml::from_str(&content).map_err(ConfigError::Parse)?
        }
        None => ProxyConfig::default(),
    };

    apply_env_overrides(&mut config, |name| std::env::var(name).ok());
    validate_config(&config).map_err(ConfigError::Validation)?;

    Ok(config)
}

/// Overlay environment variables on top of file values. Empty values are ignored.
pub fn apply_env_overrides<F>(config: &mut ProxyConfig, lookup: F)
where
    F: Fn(&str) -> Option<String>,
{
    let get = |name: &str| lookup(name).filter(|v| !v.trim().is_empty());

    if let Some(port) = get("PORT") {
        let host = config
            .listener
            .bind_address
            .rsplit_once(':')
            .map(|(host, _)| host.to_string())
            .unwrap_or_else(|| "0.0.0.0".to_string());
        config.listener.bind_address = format!("{}:{}", host, port.trim());
    }

    let overrides: [(&str, &mut String); 8] = [
        ("RSF_URL", &mut config.upstream.rsf_url),
        ("REGISTRY_URL", &mut config.upstream.registry_url),
        ("SUBSCRIBER_ID", &mut config.subscriber.id),
        ("SUBSCRIBER_URI", &mut config.subscriber.uri),
        ("KEY_ID", &mut config.credential.key_id),
        ("KEY_SECRET", &mut config.credential.secret_key),
        ("SIGNING_KEY_ID", &mut config.identity.key_id),
        ("SIGNING_PRIVATE_KEY", &mut config.identity.private_key),
    ];

    for (name, field) in overrides {
        if let Some(value) = get(name) {
            *field = value;
        }
    }
}
