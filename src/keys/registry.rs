//! Network registry lookup.
//!
//! The registry answers `POST <registry_url>/lookup` with the subscriber's
//! published keys. Cache entries are keyed by the composite
//! `subscriberId|uniqueKeyId`, which is how the network itself names a key.

use ed25519_dalek::VerifyingKey;
use futures_util::future::BoxFuture;
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use url::Url;

use crate::keys::{KeyCache, KeyError, KeySource, PublicKeyResolver};
use crate::signing::identity::decode_verifying_key;

/// Path of the lookup endpoint on the registry.
pub const LOOKUP_PATH: &str = "/lookup";

#[derive(Debug, Clone, Serialize)]
pub struct LookupRequest<'a> {
    pub subscriber_id: &'a str,
    #[serde(rename = "ukId")]
    pub unique_key_id: &'a str,
}

/// The part of a registry record we use.
#[derive(Debug, Clone, Deserialize)]
pub struct SubscriberRecord {
    pub subscriber_id: String,
    #[serde(rename = "ukId")]
    pub unique_key_id: String,
    pub signing_public_key: String,
}

/// Cache key for a subscriber's key.
pub fn composite_key_id(subscriber_id: &str, unique_key_id: &str) -> String {
    format!("{}|{}", subscriber_id, unique_key_id)
}

/// `KeySource` over the registry. Expects composite key ids.
#[derive(Debug, Clone)]
pub struct RegistryKeySource {
    client: reqwest::Client,
    url: Url,
}

impl RegistryKeySource {
    pub fn new(client: reqwest::Client, registry_url: &Url) -> Result<Self, url::ParseError> {
        Ok(Self {
            client,
            url: registry_url.join(LOOKUP_PATH.trim_start_matches('/'))?,
        })
    }

    pub fn url(&self) -> &Url {
        &self.url
    }

    async fn lookup(&self, key_id: &str) -> Result<Option<VerifyingKey>, KeyError> {
        let (subscriber_id, unique_key_id) = key_id
            .split_once('|')
            .filter(|(s, k)| !s.is_empty() && !k.is_empty())
            .ok_or_else(|| KeyError::InvalidKeyId(key_id.to_string()))?;

        let response = self
            .client
            .post(self.url.clone())
            .json(&LookupRequest {
                subscriber_id,
                unique_key_id,
            })
            .send()
            .await
            .map_err(|e| KeyError::Transport(e.to_string()))?;

        let status = response.status();
        if !status.is_success() {
            return Err(KeyError::Status(status.as_u16()));
        }

        let records: Vec<SubscriberRecord> = response
            .json()
            .await
            .map_err(|e| KeyError::Decode(e.to_string()))?;

        let record = records
            .into_iter()
            .find(|r| r.subscriber_id == subscriber_id && r.unique_key_id == unique_key_id);

        match record {
            Some(record) => decode_verifying_key(&record.signing_public_key)
                .map(Some)
                .map_err(|e| KeyError::Decode(e.to_string())),
            None => Ok(None),
        }
    }
}

impl KeySource for RegistryKeySource {
    fn fetch<'a>(&'a self, key_id: &'a str) -> BoxFuture<'a, Result<Option<VerifyingKey>, KeyError>> {
        Box::pin(self.lookup(key_id))
    }
}

/// Verifier-facing resolver backed by the registry cache.
pub struct RegistryResolver {
    cache: Arc<KeyCache>,
}

impl RegistryResolver {
    pub fn new(cache: Arc<KeyCache>) -> Self {
        Self { cache }
    }
}

impl PublicKeyResolver for RegistryResolver {
    fn resolve<'a>(
        &'a self,
        subscriber_id: &'a str,
        key_id: &'a str,
    ) -> BoxFuture<'a, Result<Option<VerifyingKey>, KeyError>> {
        Box::pin(async move {
            let composite = composite_key_id(subscriber_id, key_id);
            Ok(self.cache.get_public_key(&composite).await)
        })
    }
}
