//! Key resolution with refresh-on-miss
//!
//! A cache hit never touches the network. A miss triggers at most
//! `max_refreshes` fetch-and-replace cycles (one by default) before the key ID
//! is declared unknown. Unknown key IDs therefore cost one JWKS request each,
//! never a loop.

use std::sync::Arc;

use tracing::{debug, info, warn};

use crate::cache::KeySetCache;
use crate::error::{AppleIdError, Result};
use crate::jwks::JwksFetcher;
use crate::keys::{ApplePublicKey, import_rsa_key};

/// Default number of refreshes per unknown key ID
pub const DEFAULT_MAX_REFRESHES: u32 = 1;

/// Resolves token key IDs to Apple public keys
#[derive(Debug, Clone)]
pub struct KeyResolver {
    cache: Arc<KeySetCache>,
    fetcher: Arc<dyn JwksFetcher>,
    max_refreshes: u32,
}

impl KeyResolver {
    /// Create a resolver over `cache`, refreshing it from `fetcher`
    pub fn new(cache: Arc<KeySetCache>, fetcher: Arc<dyn JwksFetcher>) -> Self {
        Self {
            cache,
            fetcher,
            max_refreshes: DEFAULT_MAX_REFRESHES,
        }
    }

    /// Set how many refreshes a miss may trigger (`0` resolves from cache only)
    pub fn with_max_refreshes(mut self, max_refreshes: u32) -> Self {
        self.max_refreshes = max_refreshes;
        self
    }

    /// Refresh bound per miss
    pub fn max_refreshes(&self) -> u32 {
        self.max_refreshes
    }

    /// The cache this resolver reads and refreshes
    pub fn cache(&self) -> &Arc<KeySetCache> {
        &self.cache
    }

    /// Resolve a key ID
    ///
    /// # Errors
    ///
    /// `KeyNotFound` when the key is still unknown after the allowed
    /// refreshes; fetch, format and import errors from a failed refresh.
    pub async fn resolve(&self, kid: &str) -> Result<ApplePublicKey> {
        self.resolve_with(kid, false).await
    }

    /// Resolve a key ID, optionally leaving the cache untouched
    ///
    /// With `disable_caching` set, a miss fetches the key set and searches
    /// the fetched keys directly instead of replacing the cache. Cached keys
    /// are still served without a fetch.
    ///
    /// # Errors
    ///
    /// As [`resolve`](Self::resolve).
    pub async fn resolve_with(&self, kid: &str, disable_caching: bool) -> Result<ApplePublicKey> {
        if let Some(key) = self.cache.lookup(kid) {
            debug!(kid = kid, "Apple key cache hit");
            return Ok(key);
        }

        for attempt in 1..=self.max_refreshes {
            debug!(
                kid = kid,
                attempt = attempt,
                disable_caching = disable_caching,
                "Apple key cache miss, refreshing"
            );
            let fetched = self.refresh(disable_caching).await?;

            let found = if disable_caching {
                fetched.into_iter().find(|key| key.kid() == kid)
            } else {
                self.cache.lookup(kid)
            };
            if let Some(key) = found {
                return Ok(key);
            }
        }

        warn!(
            kid = kid,
            refreshes = self.max_refreshes,
            "Key ID not among Apple's published keys"
        );
        Err(AppleIdError::KeyNotFound(kid.to_string()))
    }

    /// Fetch and import the current key set
    ///
    /// Replaces the cache unless `disable_caching` is set. Keys are returned in
    /// document order. A record that fails to import fails the whole refresh
    /// and leaves the cache as it was.
    ///
    /// # Errors
    ///
    /// Fetch, format and import errors.
    pub async fn refresh(&self, disable_caching: bool) -> Result<Vec<ApplePublicKey>> {
        let records = self.fetcher.fetch_keys().await?;
        let keys = records
            .iter()
            .map(import_rsa_key)
            .collect::<Result<Vec<_>>>()?;

        if disable_caching {
            debug!(key_count = keys.len(), "Fetched Apple keys without caching");
        } else {
            self.cache.replace_all(keys.iter().cloned());
            info!(key_count = keys.len(), "Refreshed Apple key cache");
        }

        Ok(keys)
    }
}
