//! Key listing published by the settlement service.

use ed25519_dalek::VerifyingKey;
use futures_util::future::BoxFuture;
use serde::Deserialize;
use url::Url;

use crate::keys::{KeyError, KeySource};
use crate::signing::identity::decode_verifying_key;

/// Path of the key listing on the settlement service.
pub const KEYS_PATH: &str = "/public/auth/keys";

/// One entry of the listing.
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PublishedKey {
    pub key_id: String,
    pub public_key: String,
}

/// Fetches `GET <rsf_url>/public/auth/keys` and picks the requested key.
#[derive(Debug, Clone)]
pub struct RsfKeySource {
    client: reqwest::Client,
    url: Url,
}

impl RsfKeySource {
    pub fn new(client: reqwest::Client, rsf_url: &Url) -> Result<Self, url::ParseError> {
        Ok(Self {
            client,
            url: rsf_url.join(KEYS_PATH)?,
        })
    }

    pub fn url(&self) -> &Url {
        &self.url
    }

    async fn lookup(&self, key_id: &str) -> Result<Option<VerifyingKey>, KeyError> {
        let response = self
            .client
            .get(self.url.clone())
            .send()
            .await
            .map_err(|e| KeyError::Transport(e.to_string()))?;

        let status = response.status();
        if !status.is_success() {
            return Err(KeyError::Status(status.as_u16()));
        }

        let keys: Vec<PublishedKey> = response
            .json()
            .await
            .map_err(|e| KeyError::Decode(e.to_string()))?;

        match keys.into_iter().find(|k| k.key_id == key_id) {
            Some(found) => decode_verifying_key(&found.public_key)
                .map(Some)
                .map_err(|e| KeyError::Decode(e.to_string())),
            None => Ok(None),
        }
    }
}

impl KeySource for RsfKeySource {
    fn fetch<'a>(&'a self, key_id: &'a str) -> BoxFuture<'a, Result<Option<VerifyingKey>, KeyError>> {
        Box::pin(self.lookup(key_id))
    }
}
