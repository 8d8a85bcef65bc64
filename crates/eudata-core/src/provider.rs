//! Source adapter trait and request types.
//!
//! This module defines:
//!
//! - [`DataProvider`] - Base trait describing a provider
//! - [`SourceAdapter`] - Fetches one indicator and returns a typed payload
//! - [`IndicatorRequest`] / [`QueryParams`] - What to fetch

use std::collections::BTreeMap;
use std::fmt::Debug;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};

use crate::error::{Result, StatsError};
use crate::payload::FetchedPayload;
use crate::types::{IndicatorCode, Provider};

/// Base trait for all data providers.
pub trait DataProvider: Send + Sync + Debug {
    /// Returns the provider this adapter talks to.
    fn provider(&self) -> Provider;

    /// Returns a human-readable name (e.g. "Eurostat").
    fn name(&self) -> &str;

    /// Returns a description of this provider.
    fn description(&self) -> &str;
}

/// Fetches raw indicator payloads from one upstream provider.
///
/// Implementations validate the indicator against their allow-list before any
/// network I/O, issue exactly one request per call, and never retry.
#[async_trait]
pub trait SourceAdapter: DataProvider {
    /// Codes this adapter accepts.
    fn allowed_indicators(&self) -> &[IndicatorCode];

    /// Returns true if `code` is on the allow-list.
    fn supports(&self, code: &IndicatorCode) -> bool {
        self.allowed_indicators().contains(code)
    }

    /// Fails with `UnknownIndicator` if `code` is not on the allow-list.
    ///
    /// # Errors
    /// `UnknownIndicator` for codes outside the allow-list.
    fn validate(&self, code: &IndicatorCode) -> Result<()> {
        if self.supports(code) {
            Ok(())
        } else {
            Err(StatsError::UnknownIndicator {
                provider: self.provider(),
                code: code.to_string(),
            })
        }
    }

    /// Fetches one indicator.
    async fn fetch(&self, request: &IndicatorRequest) -> Result<FetchedPayload>;
}

/// Optional query narrowing.
#[derive(Clone, Debug, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct QueryParams {
    /// First period to include (e.g. `2018`).
    pub since: Option<String>,
    /// Last period to include.
    pub until: Option<String>,
    /// Geography filter; empty means all.
    pub geo: Vec<String>,
    /// Provider-specific extra parameters.
    pub extra: BTreeMap<String, String>,
}

impl QueryParams {
    /// Creates empty params.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Restricts to a period range.
    #[must_use]
    pub fn with_time_range(mut self, since: impl Into<String>, until: impl Into<String>) -> Self {
        self.since = Some(since.into());
        self.until = Some(until.into());
        self
    }

    /// Restricts to the first period onwards.
    #[must_use]
    pub fn since(mut self, since: impl Into<String>) -> Self {
        self.since = Some(since.into());
        self
    }

    /// Adds geography codes.
    #[must_use]
    pub fn with_geo<I, S>(mut self, geo: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.geo.extend(geo.into_iter().map(Into::into));
        self
    }

    /// Adds a provider-specific parameter.
    #[must_use]
    pub fn with_param(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.extra.insert(key.into(), value.into());
        self
    }

    /// Canonical textual form: a JSON array of `since`, `until`, the sorted
    /// and deduplicated geo list, and the extras in key order.
    #[must_use]
    pub fn canonical(&self) -> String {
        let mut geo: Vec<&str> = self.geo.iter().map(String::as_str).collect();
        geo.sort_unstable();
        geo.dedup();

        serde_json::json!([self.since, self.until, geo, self.extra]).to_string()
    }

    /// First eight bytes of the SHA-256 of [`canonical`](Self::canonical).
    ///
    /// The value is identical across processes and builds, so it can key a
    /// persistent cache.
    #[must_use]
    pub fn params_hash(&self) -> u64 {
        let digest = Sha256::digest(self.canonical().as_bytes());
        let mut prefix = [0u8; 8];
        prefix.copy_from_slice(&digest[..8]);
        u64::from_be_bytes(prefix)
    }

    /// Validates the time range.
    ///
    /// # Errors
    /// `InvalidParameter` if `since` sorts after `until`.
    pub fn validate(&self) -> Result<()> {
        if let (Some(since), Some(until)) = (&self.since, &self.until) {
            if since > until {
                return Err(StatsError::InvalidParameter(format!(
                    "Start period {since} is after end period {until}"
                )));
            }
        }
        Ok(())
    }
}

/// A request for one indicator from one provider.
#[derive(Clone, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct IndicatorRequest {
    /// Provider to ask.
    pub provider: Provider,
    /// Indicator/dataset code.
    pub indicator: IndicatorCode,
    /// Narrowing parameters.
    pub params: QueryParams,
}

impl IndicatorRequest {
    /// Creates a request without parameters.
    #[must_use]
    pub fn new(provider: Provider, indicator: impl Into<IndicatorCode>) -> Self {
        Self {
            provider,
            indicator: indicator.into(),
            params: QueryParams::default(),
        }
    }

    /// Shorthand for a Eurostat REST request.
    #[must_use]
    pub fn eurostat(indicator: impl Into<IndicatorCode>) -> Self {
        Self::new(Provider::Eurostat, indicator)
    }

    /// Shorthand for a Eurostat SPARQL request.
    #[must_use]
    pub fn sparql(indicator: impl Into<IndicatorCode>) -> Self {
        Self::new(Provider::EurostatSparql, indicator)
    }

    /// Shorthand for an OECD request.
    #[must_use]
    pub fn oecd(indicator: impl Into<IndicatorCode>) -> Self {
        Self::new(Provider::Oecd, indicator)
    }

    /// Sets the parameters.
    #[must_use]
    pub fn with_params(mut self, params: QueryParams) -> Self {
        self.params = params;
        self
    }
}
