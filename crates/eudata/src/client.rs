//! Fetch cache orchestration over registered source adapters.

use std::collections::HashMap;
use std::future::Future;
use std::sync::{Arc, Mutex, PoisonError};

use chrono::Utc;
use futures::future::join_all;
use polars::prelude::DataFrame;
use tracing::{debug, info, instrument, warn};

use eudata_cache::InMemoryCache;
use eudata_core::{
    CacheEntry, CacheKey, ClientConfig, DataOrigin, FetchedPayload, IndicatorCode,
    IndicatorRequest, Normalizer, PayloadCache, Provider, Result, SourceAdapter, StatsError,
    UniformRecord, records_to_frame,
};

use crate::placeholder;

type KeyLock = Arc<tokio::sync::Mutex<()>>;

/// A payload together with its records and where it came from.
struct Loaded {
    payload: FetchedPayload,
    origin: DataOrigin,
    records: Vec<UniformRecord>,
}

/// One caller's hold on a key's coalescing lock.
///
/// Dropping it removes the map entry once no other caller holds the lock,
/// including when the owning future is cancelled mid-fetch.
struct InFlight<'a> {
    client: &'a DataSourceClient,
    key: CacheKey,
    lock: KeyLock,
}

impl Drop for InFlight<'_> {
    fn drop(&mut self) {
        let mut locks = self
            .client
            .in_flight
            .lock()
            .unwrap_or_else(PoisonError::into_inner);
        // Only the map and this caller still hold it.
        if Arc::strong_count(&self.lock) == 2 {
            locks.remove(&self.key);
        }
    }
}

/// Normalized records for one requested indicator.
#[derive(Clone, Debug, PartialEq)]
pub struct IndicatorData {
    /// Provider the request went to.
    pub provider: Provider,
    /// Requested indicator.
    pub indicator: IndicatorCode,
    /// Whether the records are live, cached, stale or placeholder.
    pub origin: DataOrigin,
    /// Records in payload order.
    pub records: Vec<UniformRecord>,
}

/// A request that produced no data.
#[derive(Clone, Debug, PartialEq)]
pub struct LoadFailure {
    /// The failed request.
    pub request: IndicatorRequest,
    /// Why it failed.
    pub error: StatsError,
}

/// Outcome of a multi-indicator load.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct LoadReport {
    /// Indicators that produced a series, in request order.
    pub series: Vec<IndicatorData>,
    /// Indicators that failed, in request order.
    pub failures: Vec<LoadFailure>,
}

impl LoadReport {
    /// Returns true if at least one record came from a provider, now or earlier.
    ///
    /// A report that only holds placeholder series has no data.
    #[must_use]
    pub fn has_data(&self) -> bool {
        self.series
            .iter()
            .any(|s| s.origin.is_real() && !s.records.is_empty())
    }

    /// Returns true if any series is placeholder data.
    #[must_use]
    pub fn is_placeholder(&self) -> bool {
        self.series
            .iter()
            .any(|s| s.origin == DataOrigin::Placeholder)
    }

    /// All records, series after series.
    #[must_use]
    pub fn records(&self) -> Vec<UniformRecord> {
        self.series
            .iter()
            .flat_map(|s| s.records.iter().cloned())
            .collect()
    }

    /// All records as a DataFrame.
    ///
    /// # Errors
    /// Returns an error if the frame cannot be assembled.
    pub fn to_frame(&self) -> Result<DataFrame> {
        records_to_frame(&self.records())
    }
}

/// Client that fetches indicators through a shared payload cache.
///
/// For each request the client serves a fresh cache entry when there is one.
/// Otherwise it asks the provider's adapter and caches the response. When the
/// live fetch fails with a fallback-eligible error, an expired entry for the
/// same key is served instead and marked [`DataOrigin::Stale`].
///
/// Concurrent calls for the same key are coalesced: they wait on a per-key
/// lock and re-check the cache, so only the first one reaches the network.
///
/// # Example
///
/// ```rust,ignore
/// use eudata::{ClientConfig, DataSourceClient, IndicatorRequest, QueryParams};
///
/// #[tokio::main]
/// async fn main() -> eudata::Result<()> {
///     let client = DataSourceClient::from_config(ClientConfig::default().with_env_overrides())?;
///
///     let request = IndicatorRequest::eurostat("cei_wm011")
///         .with_params(QueryParams::new().with_geo(["FI", "DE"]));
///     let data = client.fetch_indicator(&request).await?;
///     println!("{} records ({:?})", data.records.len(), data.origin);
///
///     Ok(())
/// }
/// ```
pub struct DataSourceClient {
    adapters: HashMap<Provider, Arc<dyn SourceAdapter>>,
    cache: Arc<dyn PayloadCache>,
    config: ClientConfig,
    normalizer: Normalizer,
    in_flight: Mutex<HashMap<CacheKey, KeyLock>>,
}

impl std::fmt::Debug for DataSourceClient {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let mut adapters: Vec<&str> = self.adapters.values().map(|a| a.name()).collect();
        adapters.sort_unstable();
        f.debug_struct("DataSourceClient")
            .field("adapters", &adapters)
            .field("cache", &self.cache)
            .field("fallback", &self.config.fallback)
            .field("normalizer", &self.normalizer)
            .finish_non_exhaustive()
    }
}

impl Default for DataSourceClient {
    fn default() -> Self {
        Self::new(ClientConfig::default())
    }
}

impl DataSourceClient {
    /// Create a client without adapters, backed by an in-memory cache.
    #[must_use]
    pub fn new(config: ClientConfig) -> Self {
        Self {
            adapters: HashMap::new(),
            cache: Arc::new(InMemoryCache::new()),
            normalizer: Normalizer::new(config.normalizer),
            config,
            in_flight: Mutex::new(HashMap::new()),
        }
    }

    /// Create a client with every adapter enabled by crate features.
    ///
    /// # Errors
    /// Returns an error if an adapter's HTTP client cannot be built.
    #[allow(unused_mut)]
    pub fn from_config(config: ClientConfig) -> Result<Self> {
        let mut client = Self::new(config);
        #[cfg(feature = "eurostat")]
        {
            client = client.with_eurostat()?;
        }
        #[cfg(feature = "sparql")]
        {
            client = client.with_sparql()?;
        }
        #[cfg(feature = "oecd")]
        {
            client = client.with_oecd()?;
        }
        Ok(client)
    }

    /// Replace the payload cache.
    #[must_use]
    pub fn with_cache(mut self, cache: Arc<dyn PayloadCache>) -> Self {
        self.cache = cache;
        self
    }

    /// Register an adapter, replacing any previous one for its provider.
    pub fn register(&mut self, adapter: Arc<dyn SourceAdapter>) {
        debug!(provider = adapter.name(), "Registering source adapter");
        self.adapters.insert(adapter.provider(), adapter);
    }

    /// Builder form of [`register`](Self::register).
    #[must_use]
    pub fn with_adapter(mut self, adapter: Arc<dyn SourceAdapter>) -> Self {
        self.register(adapter);
        self
    }

    /// The active configuration.
    #[must_use]
    pub const fn config(&self) -> &ClientConfig {
        &self.config
    }

    /// The payload cache.
    #[must_use]
    pub fn cache(&self) -> &Arc<dyn PayloadCache> {
        &self.cache
    }

    /// Removes cache entries older than the longest configured TTL.
    ///
    /// # Errors
    /// Returns an error if the cache backend fails.
    pub async fn invalidate_stale(&self) -> Result<usize> {
        let ttl = Provider::ALL
            .iter()
            .map(|p| self.config.provider(*p).ttl())
            .max()
            .unwrap_or_default();
        self.cache.invalidate_stale(ttl).await
    }

    fn adapter(&self, provider: Provider) -> Result<&Arc<dyn SourceAdapter>> {
        self.adapters.get(&provider).ok_or_else(|| {
            StatsError::ProviderNotConfigured(format!("No adapter registered for {provider}"))
        })
    }

    /// Fetch the raw payload for a request through the cache.
    ///
    /// Only payloads that normalize cleanly are cached, so a stored entry can
    /// always be turned back into records.
    ///
    /// # Errors
    /// `ProviderNotConfigured` or `UnknownIndicator` before any lookup,
    /// `Normalization` when a fresh payload contradicts its own structure, or
    /// the adapter's error when no stale entry may be served.
    pub async fn fetch_payload(
        &self,
        request: &IndicatorRequest,
    ) -> Result<(FetchedPayload, DataOrigin)> {
        let loaded = self.load(request).await?;
        Ok((loaded.payload, loaded.origin))
    }

    #[instrument(skip(self), fields(provider = %request.provider, indicator = %request.indicator))]
    async fn load(&self, request: &IndicatorRequest) -> Result<Loaded> {
        let adapter = self.adapter(request.provider)?;
        adapter.validate(&request.indicator)?;
        request.params.validate()?;

        let key = CacheKey::for_request(request);
        let ttl = self.config.provider(request.provider).ttl();

        if let Some(entry) = self.lookup(&key).await {
            if !entry.is_stale(ttl) {
                debug!(key = %key, "Cache hit");
                return self.load_entry(entry, DataOrigin::Cached, request);
            }
        }

        let in_flight = self.key_lock(&key);
        let _guard = in_flight.lock.lock().await;
        self.fetch_locked(adapter.as_ref(), request, &key, ttl).await
    }

    async fn fetch_locked(
        &self,
        adapter: &dyn SourceAdapter,
        request: &IndicatorRequest,
        key: &CacheKey,
        ttl: std::time::Duration,
    ) -> Result<Loaded> {
        // Another caller may have filled the entry while we waited.
        let existing = match self.lookup(key).await {
            Some(entry) if !entry.is_stale(ttl) => {
                debug!(key = %key, "Cache hit after wait");
                return self.load_entry(entry, DataOrigin::Cached, request);
            }
            other => other,
        };
        debug!(key = %key, stale = existing.is_some(), "Cache miss");

        match adapter.fetch(request).await {
            Ok(payload) => {
                // A payload that fails here is never stored, so an older entry survives.
                let records = self.normalizer.normalize(&payload, &request.indicator)?;
                if let Err(e) = self.cache.put(key, &payload).await {
                    warn!(key = %key, error = %e, "Failed to cache payload");
                }
                Ok(Loaded {
                    payload,
                    origin: DataOrigin::Live,
                    records,
                })
            }
            Err(err) => match existing {
                Some(entry) if self.config.fallback.allows_stale_for(&err) => {
                    warn!(
                        key = %key,
                        error = %err,
                        age_secs = entry.age_at(Utc::now()).as_secs(),
                        "Serving stale cache entry"
                    );
                    self.load_entry(entry, DataOrigin::Stale, request)
                }
                _ => Err(err),
            },
        }
    }

    fn load_entry(
        &self,
        entry: CacheEntry,
        origin: DataOrigin,
        request: &IndicatorRequest,
    ) -> Result<Loaded> {
        let records = self.normalizer.normalize(&entry.payload, &request.indicator)?;
        Ok(Loaded {
            payload: entry.payload,
            origin,
            records,
        })
    }

    /// Fetch and normalize one indicator.
    ///
    /// # Errors
    /// As [`fetch_payload`](Self::fetch_payload).
    pub async fn fetch_indicator(&self, request: &IndicatorRequest) -> Result<IndicatorData> {
        let Loaded { origin, records, .. } = self.load(request).await?;

        info!(
            provider = %request.provider,
            indicator = %request.indicator,
            ?origin,
            records = records.len(),
            "Indicator loaded"
        );

        Ok(IndicatorData {
            provider: request.provider,
            indicator: request.indicator.clone(),
            origin,
            records,
        })
    }

    /// Fetch several indicators concurrently.
    ///
    /// Failures are collected rather than aborting the load. When nothing
    /// real was obtained and placeholders are enabled, each request gets an
    /// illustrative series labelled [`DataOrigin::Placeholder`].
    pub async fn fetch_all(&self, requests: &[IndicatorRequest]) -> LoadReport {
        let results = join_all(requests.iter().map(|r| self.fetch_indicator(r))).await;

        let mut report = LoadReport::default();
        for (request, result) in requests.iter().zip(results) {
            match result {
                Ok(data) => report.series.push(data),
                Err(error) => {
                    warn!(
                        provider = %request.provider,
                        indicator = %request.indicator,
                        error = %error,
                        "Indicator failed"
                    );
                    report.failures.push(LoadFailure {
                        request: request.clone(),
                        error,
                    });
                }
            }
        }

        if !report.has_data() && !requests.is_empty() {
            if self.config.allow_placeholder {
                warn!("No data obtained, substituting placeholder records");
                report.series = requests.iter().map(placeholder::series).collect();
            } else {
                warn!(failures = report.failures.len(), "No data obtained");
            }
        }
        report
    }

    /// Like [`fetch_all`](Self::fetch_all), abandoned when `signal` completes first.
    ///
    /// # Errors
    /// `Cancelled` if `signal` resolves before the load finishes.
    pub async fn fetch_all_until<F>(
        &self,
        requests: &[IndicatorRequest],
        signal: F,
    ) -> Result<LoadReport>
    where
        F: Future<Output = ()>,
    {
        tokio::select! {
            report = self.fetch_all(requests) => Ok(report),
            () = signal => {
                debug!(requests = requests.len(), "Load cancelled");
                Err(StatsError::Cancelled)
            }
        }
    }

    async fn lookup(&self, key: &CacheKey) -> Option<CacheEntry> {
        match self.cache.get(key).await {
            Ok(entry) => entry,
            Err(e) => {
                warn!(key = %key, error = %e, "Cache read failed");
                None
            }
        }
    }

    fn key_lock(&self, key: &CacheKey) -> InFlight<'_> {
        let mut locks = self.in_flight.lock().unwrap_or_else(PoisonError::into_inner);
        InFlight {
            client: self,
            key: key.clone(),
            lock: Arc::clone(locks.entry(key.clone()).or_default()),
        }
    }

    // Builder methods for the bundled adapters

    /// Add the Eurostat REST adapter using the configured settings.
    ///
    /// # Errors
    /// Returns an error if the HTTP client cannot be built.
    #[cfg(feature = "eurostat")]
    pub fn with_eurostat(self) -> Result<Self> {
        let provider = eudata_eurostat::EurostatProvider::from_settings(&self.config.eurostat)?;
        Ok(self.with_adapter(Arc::new(provider)))
    }

    /// Add the SPARQL adapter using the configured settings.
    ///
    /// # Errors
    /// Returns an error if the HTTP client cannot be built.
    #[cfg(feature = "sparql")]
    pub fn with_sparql(self) -> Result<Self> {
        let provider = eudata_sparql::SparqlProvider::from_settings(&self.config.sparql)?;
        Ok(self.with_adapter(Arc::new(provider)))
    }

    /// Add the OECD adapter using the configured settings.
    ///
    /// # Errors
    /// Returns an error if the HTTP client cannot be built.
    #[cfg(feature = "oecd")]
    pub fn with_oecd(self) -> Result<Self> {
        let provider = eudata_oecd::OecdProvider::from_settings(&self.config.oecd)?;
        Ok(self.with_adapter(Arc::new(provider)))
    }
}
