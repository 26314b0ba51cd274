//! Stale-while-revalidate public key cache with request coalescing.
//!
//! # Policy
//! - age < ttl: served from memory
//! - ttl <= age < ttl + stale: served from memory, refreshed in the background
//! - beyond that, or never fetched: the caller waits for a fetch
//!
//! Concurrent fetches for one key id share a single upstream call; every
//! waiter sees that call's result. A failed or empty fetch stores nothing, so
//! the next lookup tries again.

use dashmap::mapref::entry::Entry;
use dashmap::DashMap;
use ed25519_dalek::VerifyingKey;
use futures_util::future::{BoxFuture, FutureExt, Shared};
use std::sync::Arc;
use std::time::Duration;
use tokio::time::Instant;

use crate::config::KeyCacheConfig;
use crate::keys::KeySource;
use crate::observability::metrics;

/// A resolved key and when it was fetched. Replaced wholesale on refresh.
#[derive(Debug, Clone)]
pub struct CachedKey {
    pub key_id: String,
    pub public_key: VerifyingKey,
    pub fetched_at: Instant,
}

type SharedFetch = Shared<BoxFuture<'static, Option<VerifyingKey>>>;

/// Key cache in front of one `KeySource`.
pub struct KeyCache {
    name: &'static str,
    source: Arc<dyn KeySource>,
    entries: Arc<DashMap<String, CachedKey>>,
    in_flight: Arc<DashMap<String, SharedFetch>>,
    ttl: Duration,
    /// `ttl + stale`, saturated.
    serve_until: Duration,
}

impl KeyCache {
    /// `name` labels logs and metrics.
    pub fn new(name: &'static str, source: Arc<dyn KeySource>, ttl: Duration, stale: Duration) -> Self {
        Self {
            name,
            source,
            entries: Arc::new(DashMap::new()),
            in_flight: Arc::new(DashMap::new()),
            ttl,
            serve_until: ttl.saturating_add(stale),
        }
    }

    pub fn from_config(name: &'static str, source: Arc<dyn KeySource>, config: &KeyCacheConfig) -> Self {
        Self::new(
            name,
            source,
            Duration::from_secs(config.ttl_secs),
            Duration::from_secs(config.stale_secs),
        )
    }

    pub fn name(&self) -> &'static str {
        self.name
    }

    /// Look up a key, fetching it if needed. `None` means not found or unavailable.
    pub async fn get_public_key(&self, key_id: &str) -> Option<VerifyingKey> {
        let cached = self.entries.get(key_id).map(|entry| entry.value().clone());

        if let Some(entry) = cached {
            let age = entry.fetched_at.elapsed();
            if age < self.ttl {
                metrics::record_key_lookup(self.name, "hit");
                return Some(entry.public_key);
            }
            if age < self.serve_until {
                metrics::record_key_lookup(self.name, "stale");
                self.refresh_in_background(key_id);
                return Some(entry.public_key);
            }
            metrics::record_key_lookup(self.name, "expired");
        } else {
            metrics::record_key_lookup(self.name, "miss");
        }

        self.fetch(key_id).await
    }

    /// Current entry without triggering a fetch.
    pub fn peek(&self, key_id: &str) -> Option<CachedKey> {
        self.entries.get(key_id).map(|entry| entry.value().clone())
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    fn fresh(&self, key_id: &str) -> Option<VerifyingKey> {
        self.entries
            .get(key_id)
            .filter(|entry| entry.fetched_at.elapsed() < self.ttl)
            .map(|entry| entry.public_key)
    }

    fn refresh_in_background(&self, key_id: &str) {
        let fetch = self.fetch(key_id);
        tokio::spawn(async move {
            fetch.await;
        });
    }

    /// Join the in-flight fetch for `key_id`, or start one.
    fn fetch(&self, key_id: &str) -> SharedFetch {
        match self.in_flight.entry(key_id.to_string()) {
            Entry::Occupied(existing) => existing.get().clone(),
            Entry::Vacant(slot) => {
                // A fetch that finished since the caller's lookup has already
                // stored its key and released this slot.
                if let Some(public_key) = self.fresh(key_id) {
                    return futures_util::future::ready(Some(public_key)).boxed().shared();
                }
                let fetch = self.start_fetch(key_id.to_string());
                slot.insert(fetch.clone());
                fetch
            }
        }
    }

    fn start_fetch(&self, key_id: String) -> SharedFetch {
        let name = self.name;
        let source = self.source.clone();
        let entries = self.entries.clone();
        let in_flight = self.in_flight.clone();

        async move {
            tracing::debug!(cache = name, key_id = %key_id, "Fetching public key");

            let resolved = match source.fetch(&key_id).await {
                Ok(Some(public_key)) => {
                    entries.insert(
                        key_id.clone(),
                        CachedKey {
                            key_id: key_id.clone(),
                            public_key,
                            fetched_at: Instant::now(),
                        },
                    );
                    metrics::record_key_fetch(name, "found");
                    Some(public_key)
                }
                Ok(None) => {
                    tracing::info!(cache = name, key_id = %key_id, "Public key not found");
                    metrics::record_key_fetch(name, "not_found");
                    None
                }
                Err(e) => {
                    tracing::warn!(cache = name, key_id = %key_id, error = %e, "Public key fetch failed");
                    metrics::record_key_fetch(name, "error");
                    None
                }
            };

            in_flight.remove(&key_id);
            resolved
        }
        .boxed()
        .shared()
    }
}
