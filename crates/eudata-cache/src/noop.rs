//! No-op cache implementation.

use async_trait::async_trait;
use eudata_core::{CacheEntry, CacheKey, FetchedPayload, PayloadCache, Result};
use std::time::Duration;
use tracing::trace;

/// A no-op cache that doesn't store anything.
///
/// `get` always misses and `put` discards the payload, so every fetch goes to
/// the network and no stale fallback is ever available.
#[derive(Debug, Clone, Copy, Default)]
pub struct NoopCache;

impl NoopCache {
    /// Create a new no-op cache.
    #[must_use]
    pub const fn new() -> Self {
        Self
    }
}

#[async_trait]
impl PayloadCache for NoopCache {
    async fn get(&self, _key: &CacheKey) -> Result<Option<CacheEntry>> {
        trace!("NoopCache: get called, returning None");
        Ok(None)
    }

    async fn put(&self, _key: &CacheKey, _payload: &FetchedPayload) -> Result<()> {
        trace!("NoopCache: put called, doing nothing");
        Ok(())
    }

    async fn invalidate_stale(&self, _ttl: Duration) -> Result<usize> {
        Ok(0)
    }

    async fn clear(&self) -> Result<()> {
        Ok(())
    }

    async fn len(&self) -> Result<usize> {
        Ok(0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use eudata_core::{Provider, ProviderMeta, RawPayload, SparqlPayload};

    #[tokio::test]
    async fn test_noop_cache_never_stores() {
        let cache = NoopCache::new();
        let key = CacheKey::new(Provider::Oecd, "AIR_GHG".into(), 0);
        let payload = FetchedPayload::new(
            RawPayload::Sparql(SparqlPayload::default()),
            ProviderMeta::now(Provider::Oecd, "AIR_GHG".into(), "http://localhost"),
        );

        cache.put(&key, &payload).await.unwrap();
        assert!(cache.get(&key).await.unwrap().is_none());
        assert_eq!(cache.len().await.unwrap(), 0);
        assert_eq!(cache.invalidate_stale(Duration::ZERO).await.unwrap(), 0);
        cache.clear().await.unwrap();
    }
}
