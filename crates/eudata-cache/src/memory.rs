//! In-memory cache implementation.

use async_trait::async_trait;
use eudata_core::{CacheEntry, CacheKey, FetchedPayload, PayloadCache, Result};
use std::collections::HashMap;
use std::time::Duration;
use tokio::sync::RwLock;
use tracing::{debug, instrument};

/// Process-local payload cache.
///
/// Entries live in a `RwLock`-protected `HashMap` and are lost when the cache
/// is dropped. Payloads are cloned on get and put.
#[derive(Debug, Default)]
pub struct InMemoryCache {
    entries: RwLock<HashMap<CacheKey, CacheEntry>>,
}

impl InMemoryCache {
    /// Create a new empty in-memory cache.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Inserts a pre-built entry, keeping its `cached_at`.
    ///
    /// Used to seed caches with entries of a known age.
    pub async fn insert_entry(&self, entry: CacheEntry) {
        self.entries.write().await.insert(entry.key.clone(), entry);
    }
}

#[async_trait]
impl PayloadCache for InMemoryCache {
    #[instrument(skip(self), fields(key = %key))]
    async fn get(&self, key: &CacheKey) -> Result<Option<CacheEntry>> {
        let cache = self.entries.read().await;
        match cache.get(key) {
            Some(entry) => {
                debug!("Cache hit");
                Ok(Some(entry.clone()))
            }
            None => {
                debug!("Cache miss");
                Ok(None)
            }
        }
    }

    #[instrument(skip(self, payload), fields(key = %key))]
    async fn put(&self, key: &CacheKey, payload: &FetchedPayload) -> Result<()> {
        let mut cache = self.entries.write().await;
        cache.insert(key.clone(), CacheEntry::new(key.clone(), payload.clone()));
        debug!(format = payload.raw.format_name(), "Cached payload");
        Ok(())
    }

    #[instrument(skip(self))]
    async fn invalidate_stale(&self, ttl: Duration) -> Result<usize> {
        let mut cache = self.entries.write().await;
        let before = cache.len();
        cache.retain(|_, entry| !entry.is_stale(ttl));
        let removed = before - cache.len();

        if removed > 0 {
            debug!("Invalidated {} stale cache entries", removed);
        }
        Ok(removed)
    }

    #[instrument(skip(self))]
    async fn clear(&self) -> Result<()> {
        self.entries.write().await.clear();
        debug!("Cleared all cache entries");
        Ok(())
    }

    async fn len(&self) -> Result<usize> {
        Ok(self.entries.read().await.len())
    }
}
