#![doc = include_str!("../README.md")]
#![doc(issue_tracker_base_url = "https://github.com/eudata/eudata/issues/")]
#![cfg_attr(docsrs, feature(doc_cfg, doc_auto_cfg))]
#![warn(missing_docs)]
#![forbid(unsafe_code)]

//! OECD SDMX-JSON adapter.
//!
//! This crate implements the `eudata-core` traits for the OECD.Stat SDMX-JSON
//! data endpoint.
//!
//! # Usage
//!
//! ```rust,ignore
//! use eudata_core::{IndicatorRequest, QueryParams, SourceAdapter};
//! use eudata_oecd::OecdProvider;
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let provider = OecdProvider::new()?;
//!
//!     let request = IndicatorRequest::oecd("AIR_GHG")
//!         .with_params(QueryParams::new().with_time_range("2018", "2022").with_geo(["FIN", "DEU"]));
//!     let payload = provider.fetch(&request).await?;
//!
//!     Ok(())
//! }
//! ```

use async_trait::async_trait;
use eudata_core::{
    DataProvider, FetchedPayload, IndicatorCode, IndicatorRequest, OecdPayload, Provider,
    ProviderMeta, ProviderSettings, QueryParams, RawPayload, Result, SourceAdapter, StatsError,
};
use reqwest::Client;
use std::time::{Duration, Instant};
use tracing::{debug, info, instrument};

/// User agent for HTTP requests.
const USER_AGENT: &str = concat!("eudata/", env!("CARGO_PKG_VERSION"));

/// Request timeout.
const REQUEST_TIMEOUT: Duration = Duration::from_secs(30);

/// Extra parameter that replaces the generated key filter verbatim.
pub const FILTER_PARAM: &str = "filter";

/// OECD SDMX-JSON data provider.
///
/// Provides access to OECD environmental datasets such as greenhouse gas
/// emissions (`AIR_GHG`) and municipal waste (`MUNW`).
#[derive(Debug, Clone)]
pub struct OecdProvider {
    client: Client,
    base_url: String,
    allowed: Vec<IndicatorCode>,
}

impl OecdProvider {
    /// Create a provider for the public OECD endpoint.
    ///
    /// # Errors
    /// Returns an error if the HTTP client cannot be built.
    pub fn new() -> Result<Self> {
        Self::from_settings(&ProviderSettings::for_provider(Provider::Oecd))
    }

    /// Create a provider from settings.
    ///
    /// # Errors
    /// `InvalidParameter` if the base URL is not absolute, or an error if the
    /// HTTP client cannot be built.
    pub fn from_settings(settings: &ProviderSettings) -> Result<Self> {
        settings.validate()?;
        let client = Client::builder()
            .user_agent(USER_AGENT)
            .timeout(REQUEST_TIMEOUT)
            .build()
            .map_err(|e| StatsError::Other(format!("Failed to create HTTP client: {e}")))?;
        Ok(Self::with_client(client, settings))
    }

    /// Create a provider with a custom HTTP client.
    #[must_use]
    pub fn with_client(client: Client, settings: &ProviderSettings) -> Self {
        Self {
            client,
            base_url: settings.base_url.trim_end_matches('/').to_string(),
            allowed: settings.allowed_indicators(Provider::Oecd),
        }
    }

    /// SDMX key filter: the `filter` extra if given, else the geo codes joined
    /// with `+` for the leading location dimension, else `all`.
    fn filter_expression(params: &QueryParams) -> String {
        if let Some(filter) = params.extra.get(FILTER_PARAM) {
            return filter.clone();
        }
        if params.geo.is_empty() {
            "all".to_string()
        } else {
            params.geo.join("+")
        }
    }

    fn query_pairs(params: &QueryParams) -> Vec<(String, String)> {
        let mut pairs = vec![
            ("format".to_string(), "json".to_string()),
            (
                "dimensionAtObservation".to_string(),
                "AllDimensions".to_string(),
            ),
        ];
        if let Some(since) = &params.since {
            pairs.push(("startPeriod".to_string(), since.clone()));
        }
        if let Some(until) = &params.until {
            pairs.push(("endPeriod".to_string(), until.clone()));
        }
        pairs.extend(
            params
                .extra
                .iter()
                .filter(|(k, _)| k.as_str() != FILTER_PARAM)
                .map(|(k, v)| (k.clone(), v.clone())),
        );
        pairs
    }

    fn build_request(&self, request: &IndicatorRequest) -> Result<reqwest::Request> {
        let url = format!(
            "{}/{}/{}",
            self.base_url,
            request.indicator,
            Self::filter_expression(&request.params)
        );
        self.client
            .get(&url)
            .query(&Self::query_pairs(&request.params))
            .build()
            .map_err(|e| StatsError::InvalidParameter(format!("Invalid request URL {url}: {e}")))
    }
}

impl DataProvider for OecdProvider {
    fn provider(&self) -> Provider {
        Provider::Oecd
    }

    fn name(&self) -> &str {
        "OECD"
    }

    fn description(&self) -> &str {
        "OECD SDMX-JSON data for environmental and green-growth indicators"
    }
}

#[async_trait]
impl SourceAdapter for OecdProvider {
    fn allowed_indicators(&self) -> &[IndicatorCode] {
        &self.allowed
    }

    #[instrument(skip(self), fields(indicator = %request.indicator))]
    async fn fetch(&self, request: &IndicatorRequest) -> Result<FetchedPayload> {
        self.validate(&request.indicator)?;
        request.params.validate()?;

        let http_request = self.build_request(request)?;
        let url = http_request.url().to_string();
        debug!("OECD request: {}", url);

        let upstream = |status: Option<u16>, message: String| StatsError::Upstream {
            provider: Provider::Oecd,
            status,
            message,
        };

        let started = Instant::now();
        let response = self.client.execute(http_request).await;
        let latency_ms = u64::try_from(started.elapsed().as_millis()).unwrap_or(u64::MAX);

        let response = response.map_err(|e| {
            info!(
                provider = "oecd",
                indicator = %request.indicator,
                latency_ms,
                error = %e,
                "Request failed"
            );
            upstream(None, e.to_string())
        })?;
        let status = response.status();
        info!(
            provider = "oecd",
            indicator = %request.indicator,
            latency_ms,
            status = status.as_u16(),
            "Request completed"
        );

        let text = response
            .text()
            .await
            .map_err(|e| upstream(Some(status.as_u16()), e.to_string()))?;

        if !status.is_success() {
            let message = match text.trim() {
                "" => status.canonical_reason().unwrap_or("request failed").to_string(),
                body => body.chars().take(200).collect(),
            };
            return Err(upstream(Some(status.as_u16()), message));
        }

        let body: serde_json::Value =
            serde_json::from_str(&text).map_err(|e| StatsError::EmptyResult {
                provider: Provider::Oecd,
                dataset: request.indicator.to_string(),
                reason: format!("response body is not JSON: {e}"),
            })?;
        let payload = OecdPayload::from_json(body, &request.indicator)?;

        Ok(FetchedPayload::new(
            RawPayload::Oecd(payload),
            ProviderMeta::now(Provider::Oecd, request.indicator.clone(), url),
        ))
    }
}
