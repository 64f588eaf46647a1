//! Key set cache: `kid` → imported Apple public key
//!
//! The whole mapping is swapped in one atomic store, so readers see either
//! the previous key set or the new one, never a mix. There is no merge: a
//! refresh drops keys Apple no longer publishes.

use std::collections::HashMap;
use std::sync::Arc;

use arc_swap::ArcSwap;
use once_cell::sync::Lazy;
use tracing::debug;

use crate::keys::ApplePublicKey;

static SHARED: Lazy<Arc<KeySetCache>> = Lazy::new(|| Arc::new(KeySetCache::new()));

/// Cache of Apple's currently published signing keys
#[derive(Debug)]
pub struct KeySetCache {
    keys: ArcSwap<HashMap<String, ApplePublicKey>>,
}

impl Default for KeySetCache {
    fn default() -> Self {
        Self::new()
    }
}

impl KeySetCache {
    /// Create an empty cache
    pub fn new() -> Self {
        Self {
            keys: ArcSwap::from_pointee(HashMap::new()),
        }
    }

    /// The process-wide cache, empty until the first successful refresh
    pub fn shared() -> Arc<Self> {
        Arc::clone(&SHARED)
    }

    /// Look up a key by ID
    pub fn lookup(&self, kid: &str) -> Option<ApplePublicKey> {
        self.keys.load().get(kid).cloned()
    }

    /// Replace the whole mapping with `entries`
    ///
    /// Duplicate key IDs keep the last entry.
    pub fn replace_all<I>(&self, entries: I)
    where
        I: IntoIterator<Item = ApplePublicKey>,
    {
        let map: HashMap<String, ApplePublicKey> = entries
            .into_iter()
            .map(|key| (key.kid().to_string(), key))
            .collect();
        debug!(key_count = map.len(), "Replacing cached Apple keys");
        self.keys.store(Arc::new(map));
    }

    /// Number of cached keys
    pub fn len(&self) -> usize {
        self.keys.load().len()
    }

    /// Whether nothing is cached
    pub fn is_empty(&self) -> bool {
        self.keys.load().is_empty()
    }

    /// Cached key IDs, sorted
    pub fn key_ids(&self) -> Vec<String> {
        let mut ids: Vec<String> = self.keys.load().keys().cloned().collect();
        ids.sort();
        ids
    }

    /// Drop every cached key
    pub fn clear(&self) {
        self.keys.store(Arc::new(HashMap::new()));
    }
}
