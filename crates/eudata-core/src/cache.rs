//! Cache trait for storing fetched provider payloads.
//!
//! This module defines the [`PayloadCache`] trait that gives the fetch cache a
//! uniform interface over in-memory, persistent and no-op backends.

use std::fmt;
use std::time::Duration;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::error::Result;
use crate::payload::FetchedPayload;
use crate::provider::IndicatorRequest;
use crate::types::{IndicatorCode, Provider};

/// Identity of a cached payload: `(provider, dataset, params hash)`.
#[derive(Clone, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct CacheKey {
    /// Provider that served the payload.
    pub provider: Provider,
    /// Dataset/indicator code.
    pub dataset: IndicatorCode,
    /// Hash of the canonical query parameters.
    pub params_hash: u64,
}

impl CacheKey {
    /// Creates a key.
    #[must_use]
    pub const fn new(provider: Provider, dataset: IndicatorCode, params_hash: u64) -> Self {
        Self {
            provider,
            dataset,
            params_hash,
        }
    }

    /// Derives the key for a request.
    #[must_use]
    pub fn for_request(request: &IndicatorRequest) -> Self {
        Self::new(
            request.provider,
            request.indicator.clone(),
            request.params.params_hash(),
        )
    }
}

impl fmt::Display for CacheKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}/{}/{:016x}", self.provider, self.dataset, self.params_hash)
    }
}

/// A cached payload with the time it was stored.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct CacheEntry {
    /// Entry identity.
    pub key: CacheKey,
    /// Raw provider response.
    pub payload: FetchedPayload,
    /// When the entry was written.
    pub cached_at: DateTime<Utc>,
}

impl CacheEntry {
    /// Creates an entry stamped with the current time.
    #[must_use]
    pub fn new(key: CacheKey, payload: FetchedPayload) -> Self {
        Self {
            key,
            payload,
            cached_at: Utc::now(),
        }
    }

    /// Age of the entry relative to `now`; zero if the clock went backwards.
    #[must_use]
    pub fn age_at(&self, now: DateTime<Utc>) -> Duration {
        now.signed_duration_since(self.cached_at)
            .to_std()
            .unwrap_or_default()
    }

    /// Returns true if the entry is older than `ttl`.
    #[must_use]
    pub fn is_stale(&self, ttl: Duration) -> bool {
        self.age_at(Utc::now()) > ttl
    }
}

/// Storage for raw provider payloads.
///
/// Backends never expire entries on read: freshness is decided by the caller
/// from [`CacheEntry::cached_at`], so an expired entry stays available for the
/// stale fallback until [`invalidate_stale`](Self::invalidate_stale) or
/// [`clear`](Self::clear) removes it.
#[async_trait]
pub trait PayloadCache: Send + Sync + fmt::Debug {
    /// Retrieves the entry for `key`, fresh or not.
    ///
    /// Returns `Ok(None)` on a miss.
    async fn get(&self, key: &CacheKey) -> Result<Option<CacheEntry>>;

    /// Stores `payload` under `key`, replacing any previous entry.
    async fn put(&self, key: &CacheKey, payload: &FetchedPayload) -> Result<()>;

    /// Removes entries older than `ttl`.
    ///
    /// Returns the number of entries removed.
    async fn invalidate_stale(&self, ttl: Duration) -> Result<usize>;

    /// Clears all entries.
    async fn clear(&self) -> Result<()>;

    /// Number of stored entries.
    async fn len(&self) -> Result<usize>;
}
