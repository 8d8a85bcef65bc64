//! SQLite-based cache implementation.

use async_trait::async_trait;
use chrono::{DateTime, SecondsFormat, Utc};
use eudata_core::{CacheEntry, CacheKey, FetchedPayload, PayloadCache, Result, StatsError};
use rusqlite::{Connection, OptionalExtension, params};
use std::path::Path;
use std::sync::Mutex;
use std::time::Duration;
use tracing::{debug, instrument};

/// SQLite-based cache for provider payloads.
///
/// Payloads are stored as JSON alongside their key and write time, so entries
/// survive application restarts and remain available for stale fallback.
#[derive(Debug)]
pub struct SqliteCache {
    conn: Mutex<Connection>,
}

fn cache_err(e: impl ToString) -> StatsError {
    StatsError::Cache(e.to_string())
}

/// Fixed-width UTC timestamps compare correctly as text.
fn timestamp(at: DateTime<Utc>) -> String {
    at.to_rfc3339_opts(SecondsFormat::Micros, true)
}

fn hash_column(key: &CacheKey) -> String {
    format!("{:016x}", key.params_hash)
}

impl SqliteCache {
    /// Create a new SQLite cache at the given path.
    ///
    /// # Arguments
    /// * `path` - Path to the SQLite database file
    ///
    /// # Errors
    /// Returns an error if the database cannot be opened or schema creation fails.
    pub fn new(path: impl AsRef<Path>) -> Result<Self> {
        let conn = Connection::open(path).map_err(cache_err)?;
        let cache = Self {
            conn: Mutex::new(conn),
        };
        cache.initialize_schema()?;
        Ok(cache)
    }

    /// Create an in-memory SQLite cache.
    ///
    /// Useful for testing; data is lost when the cache is dropped.
    ///
    /// # Errors
    /// Returns an error if schema creation fails.
    pub fn in_memory() -> Result<Self> {
        let conn = Connection::open_in_memory().map_err(cache_err)?;
        let cache = Self {
            conn: Mutex::new(conn),
        };
        cache.initialize_schema()?;
        Ok(cache)
    }

    fn initialize_schema(&self) -> Result<()> {
        let conn = self.conn.lock().map_err(cache_err)?;

        conn.execute(
            "CREATE TABLE IF NOT EXISTS payload_cache (
                provider TEXT NOT NULL,
                dataset TEXT NOT NULL,
                params_hash TEXT NOT NULL,
                payload_json TEXT NOT NULL,
                cached_at TEXT NOT NULL,
                PRIMARY KEY (provider, dataset, params_hash)
            )",
            [],
        )
        .map_err(cache_err)?;

        conn.execute(
            "CREATE INDEX IF NOT EXISTS idx_payload_cache_cached_at
             ON payload_cache(cached_at)",
            [],
        )
        .map_err(cache_err)?;

        debug!("SQLite cache schema initialized");
        Ok(())
    }

    fn write(
        &self,
        key: &CacheKey,
        payload: &FetchedPayload,
        cached_at: DateTime<Utc>,
    ) -> Result<()> {
        let json = serde_json::to_string(payload).map_err(cache_err)?;
        let conn = self.conn.lock().map_err(cache_err)?;
        conn.execute(
            "INSERT OR REPLACE INTO payload_cache
             (provider, dataset, params_hash, payload_json, cached_at)
             VALUES (?1, ?2, ?3, ?4, ?5)",
            params![
                key.provider.as_str(),
                key.dataset.as_str(),
                hash_column(key),
                json,
                timestamp(cached_at)
            ],
        )
        .map_err(cache_err)?;
        Ok(())
    }
}

#[async_trait]
impl PayloadCache for SqliteCache {
    #[instrument(skip(self), fields(key = %key))]
    async fn get(&self, key: &CacheKey) -> Result<Option<CacheEntry>> {
        let conn = self.conn.lock().map_err(cache_err)?;

        let row = conn
            .query_row(
                "SELECT payload_json, cached_at FROM payload_cache
                 WHERE provider = ?1 AND dataset = ?2 AND params_hash = ?3",
                params![key.provider.as_str(), key.dataset.as_str(), hash_column(key)],
                |row| Ok((row.get::<_, String>(0)?, row.get::<_, String>(1)?)),
            )
            .optional()
            .map_err(cache_err)?;

        let Some((json, cached_at)) = row else {
            debug!("Cache miss");
            return Ok(None);
        };

        let payload: FetchedPayload = serde_json::from_str(&json).map_err(cache_err)?;
        let cached_at = DateTime::parse_from_rfc3339(&cached_at)
            .map_err(cache_err)?
            .with_timezone(&Utc);

        debug!("Cache hit");
        Ok(Some(CacheEntry {
            key: key.clone(),
            payload,
            cached_at,
        }))
    }

    #[instrument(skip(self, payload), fields(key = %key))]
    async fn put(&self, key: &CacheKey, payload: &FetchedPayload) -> Result<()> {
        self.write(key, payload, Utc::now())?;
        debug!(format = payload.raw.format_name(), "Cached payload");
        Ok(())
    }

    #[instrument(skip(self))]
    async fn invalidate_stale(&self, ttl: Duration) -> Result<usize> {
        let cutoff = Utc::now()
            - chrono::Duration::from_std(ttl)
                .map_err(|e| StatsError::Cache(format!("Invalid TTL duration: {}", e)))?;

        let conn = self.conn.lock().map_err(cache_err)?;
        let deleted = conn
            .execute(
                "DELETE FROM payload_cache WHERE cached_at < ?1",
                params![timestamp(cutoff)],
            )
            .map_err(cache_err)?;

        if deleted > 0 {
            debug!("Invalidated {} stale cache entries", deleted);
        }
        Ok(deleted)
    }

    #[instrument(skip(self))]
    async fn clear(&self) -> Result<()> {
        let conn = self.conn.lock().map_err(cache_err)?;
        conn.execute("DELETE FROM payload_cache", []).map_err(cache_err)?;
        debug!("Cleared all cache entries");
        Ok(())
    }

    async fn len(&self) -> Result<usize> {
        let conn = self.conn.lock().map_err(cache_err)?;
        let count: i64 = conn
            .query_row("SELECT COUNT(*) FROM payload_cache", [], |row| row.get(0))
            .map_err(cache_err)?;
        usize::try_from(count).map_err(cache_err)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use eudata_core::{EurostatPayload, IndicatorCode, Provider, ProviderMeta, RawPayload};
    use serde_json::json;

    fn payload(dataset: &str) -> FetchedPayload {
        let code = IndicatorCode::new(dataset);
        let raw = EurostatPayload::from_json(
            json!({
                "id": ["geo", "time"],
                "size": [1, 1],
                "value": {"0": 0.45},
                "dimension": {
                    "geo": {"category": {"index": {"FI": 0}}},
                    "time": {"category": {"index": {"2022": 0}}}
                }
            }),
            &code,
        )
        .unwrap();
        FetchedPayload::new(
            RawPayload::Eurostat(raw),
            ProviderMeta::now(Provider::Eurostat, code, "http://localhost/data"),
        )
    }

    fn key(dataset: &str, hash: u64) -> CacheKey {
        CacheKey::new(Provider::Eurostat, dataset.into(), hash)
    }

    #[tokio::test]
    async fn test_sqlite_cache_round_trip() {
        let cache = SqliteCache::in_memory().unwrap();
        let k = key("cei_wm011", u64::MAX);

        assert!(cache.get(&k).await.unwrap().is_none());

        let p = payload("cei_wm011");
        cache.put(&k, &p).await.unwrap();

        let entry = cache.get(&k).await.unwrap().unwrap();
        assert_eq!(entry.payload, p);
        assert!(!entry.is_stale(Duration::from_secs(60)));
        assert_eq!(cache.len().await.unwrap(), 1);

        // Replacing keeps a single row per key.
        cache.put(&k, &p).await.unwrap();
        assert_eq!(cache.len().await.unwrap(), 1);
        assert!(cache.get(&key("cei_wm011", 1)).await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_sqlite_invalidate_stale() {
        let cache = SqliteCache::in_memory().unwrap();
        let old_at = Utc::now() - chrono::Duration::hours(2);
        cache.write(&key("old", 0), &payload("old"), old_at).unwrap();
        cache.put(&key("new", 0), &payload("new")).await.unwrap();

        // Old entries are still served until invalidated.
        let entry = cache.get(&key("old", 0)).await.unwrap().unwrap();
        assert!(entry.is_stale(Duration::from_secs(3600)));

        let removed = cache.invalidate_stale(Duration::from_secs(3600)).await.unwrap();
        assert_eq!(removed, 1);
        assert!(cache.get(&key("old", 0)).await.unwrap().is_none());
        assert!(cache.get(&key("new", 0)).await.unwrap().is_some());

        cache.clear().await.unwrap();
        assert_eq!(cache.len().await.unwrap(), 0);
    }

    #[tokio::test]
    async fn test_sqlite_cache_survives_reopen() {
        let path = std::env::temp_dir().join(format!(
            "eudata-cache-test-{}.sqlite",
            std::process::id()
        ));
        let _ = std::fs::remove_file(&path);

        {
            let cache = SqliteCache::new(&path).unwrap();
            cache.put(&key("env_wasgen", 3), &payload("env_wasgen")).await.unwrap();
        }

        let cache = SqliteCache::new(&path).unwrap();
        assert!(cache.get(&key("env_wasgen", 3)).await.unwrap().is_some());

        drop(cache);
        let _ = std::fs::remove_file(&path);
    }
}
