#![doc = include_str!("../README.md")]
#![doc(issue_tracker_base_url = "https://github.com/eudata/eudata/issues/")]
#![cfg_attr(docsrs, feature(doc_cfg, doc_auto_cfg))]
#![warn(missing_docs)]
#![forbid(unsafe_code)]

//! Eurostat dissemination API adapter.
//!
//! Fetches one dataset per call from the Eurostat statistics REST API and
//! returns it as a typed [`EurostatPayload`].
//!
//! # Example
//!
//! ```no_run
//! use eudata_core::{IndicatorRequest, QueryParams, SourceAdapter};
//! use eudata_eurostat::EurostatProvider;
//!
//! # async fn example() -> eudata_core::Result<()> {
//! let provider = EurostatProvider::new()?;
//! let request = IndicatorRequest::eurostat("cei_wm011")
//!     .with_params(QueryParams::new().since("2018").with_geo(["FI", "DE"]));
//! let payload = provider.fetch(&request).await?;
//! # Ok(())
//! # }
//! ```

use std::time::{Duration, Instant};

use async_trait::async_trait;
use eudata_core::{
    DataProvider, EurostatPayload, FetchedPayload, IndicatorCode, IndicatorRequest, Provider,
    ProviderMeta, ProviderSettings, QueryParams, RawPayload, Result, SourceAdapter, StatsError,
};
use serde::Deserialize;
use tracing::{debug, info, instrument};

/// User agent for HTTP requests.
const USER_AGENT: &str = concat!("eudata/", env!("CARGO_PKG_VERSION"));

/// Request timeout.
const REQUEST_TIMEOUT: Duration = Duration::from_secs(30);

/// Eurostat dissemination API adapter.
///
/// Implements [`DataProvider`] and [`SourceAdapter`].
#[derive(Debug, Clone)]
pub struct EurostatProvider {
    client: reqwest::Client,
    base_url: String,
    allowed: Vec<IndicatorCode>,
}

impl EurostatProvider {
    /// Creates an adapter for the public API with the catalog allow-list.
    ///
    /// # Errors
    /// Returns an error if the HTTP client cannot be built.
    pub fn new() -> Result<Self> {
        Self::from_settings(&ProviderSettings::for_provider(Provider::Eurostat))
    }

    /// Creates an adapter from provider settings.
    ///
    /// # Errors
    /// `InvalidParameter` if the base URL is not absolute, or an error if the
    /// HTTP client cannot be built.
    pub fn from_settings(settings: &ProviderSettings) -> Result<Self> {
        settings.validate()?;
        let client = reqwest::Client::builder()
            .user_agent(USER_AGENT)
            .timeout(REQUEST_TIMEOUT)
            .build()
            .map_err(|e| StatsError::Other(format!("Failed to create HTTP client: {e}")))?;
        Ok(Self::with_client(client, settings))
    }

    /// Creates an adapter with a custom HTTP client.
    #[must_use]
    pub fn with_client(client: reqwest::Client, settings: &ProviderSettings) -> Self {
        Self {
            client,
            base_url: settings.base_url.trim_end_matches('/').to_string(),
            allowed: settings.allowed_indicators(Provider::Eurostat),
        }
    }

    /// Query string pairs for a request, in a stable order.
    fn query_pairs(params: &QueryParams) -> Vec<(String, String)> {
        let mut pairs = vec![
            ("format".to_string(), "JSON".to_string()),
            ("lang".to_string(), "EN".to_string()),
        ];
        if let Some(since) = &params.since {
            pairs.push(("sinceTimePeriod".to_string(), since.clone()));
        }
        if let Some(until) = &params.until {
            pairs.push(("untilTimePeriod".to_string(), until.clone()));
        }
        pairs.extend(params.geo.iter().map(|g| ("geo".to_string(), g.clone())));
        pairs.extend(params.extra.iter().map(|(k, v)| (k.clone(), v.clone())));
        pairs
    }

    /// Builds the dataset request.
    fn build_request(&self, request: &IndicatorRequest) -> Result<reqwest::Request> {
        let url = format!("{}/{}", self.base_url, request.indicator);
        self.client
            .get(&url)
            .query(&Self::query_pairs(&request.params))
            .build()
            .map_err(|e| StatsError::InvalidParameter(format!("Invalid request URL {url}: {e}")))
    }
}

impl DataProvider for EurostatProvider {
    fn provider(&self) -> Provider {
        Provider::Eurostat
    }

    fn name(&self) -> &str {
        "Eurostat"
    }

    fn description(&self) -> &str {
        "Eurostat dissemination API for EU environmental and circular-economy statistics"
    }
}

#[async_trait]
impl SourceAdapter for EurostatProvider {
    fn allowed_indicators(&self) -> &[IndicatorCode] {
        &self.allowed
    }

    #[instrument(skip(self), fields(indicator = %request.indicator))]
    async fn fetch(&self, request: &IndicatorRequest) -> Result<FetchedPayload> {
        self.validate(&request.indicator)?;
        request.params.validate()?;

        let http_request = self.build_request(request)?;
        let url = http_request.url().to_string();
        debug!("Fetching Eurostat dataset: {}", url);

        let started = Instant::now();
        let response = self.client.execute(http_request).await;
        let latency_ms = u64::try_from(started.elapsed().as_millis()).unwrap_or(u64::MAX);

        let response = response.map_err(|e| {
            info!(
                provider = "eurostat",
                indicator = %request.indicator,
                latency_ms,
                error = %e,
                "Request failed"
            );
            StatsError::Upstream {
                provider: Provider::Eurostat,
                status: None,
                message: e.to_string(),
            }
        })?;

        let status = response.status();
        info!(
            provider = "eurostat",
            indicator = %request.indicator,
            latency_ms,
            status = status.as_u16(),
            "Request completed"
        );

        let text = response.text().await.map_err(|e| StatsError::Upstream {
            provider: Provider::Eurostat,
            status: Some(status.as_u16()),
            message: e.to_string(),
        })?;

        if !status.is_success() {
            return Err(StatsError::Upstream {
                provider: Provider::Eurostat,
                status: Some(status.as_u16()),
                message: error_label(&text).unwrap_or_else(|| {
                    status.canonical_reason().unwrap_or("request failed").to_string()
                }),
            });
        }

        let body: serde_json::Value =
            serde_json::from_str(&text).map_err(|e| StatsError::EmptyResult {
                provider: Provider::Eurostat,
                dataset: request.indicator.to_string(),
                reason: format!("response body is not JSON: {e}"),
            })?;
        let payload = EurostatPayload::from_json(body, &request.indicator)?;

        Ok(FetchedPayload::new(
            RawPayload::Eurostat(payload),
            ProviderMeta::now(Provider::Eurostat, request.indicator.clone(), url),
        ))
    }
}

// ============================================================================
// Eurostat error body
// ============================================================================

#[derive(Debug, Deserialize)]
struct ErrorBody {
    error: ErrorField,
}

#[derive(Debug, Deserialize)]
#[serde(untagged)]
enum ErrorField {
    One(ErrorDetail),
    Many(Vec<ErrorDetail>),
}

#[derive(Debug, Deserialize)]
struct ErrorDetail {
    label: Option<String>,
}

/// Extracts the human-readable label from an SDMX error body.
fn error_label(text: &str) -> Option<String> {
    let body: ErrorBody = serde_json::from_str(text).ok()?;
    match body.error {
        ErrorField::One(detail) => detail.label,
        ErrorField::Many(details) => details.into_iter().find_map(|d| d.label),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;
    use wiremock::matchers::{method, path, query_param};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    fn provider_for(server: &MockServer) -> EurostatProvider {
        let settings =
            ProviderSettings::for_provider(Provider::Eurostat).with_base_url(server.uri());
        EurostatProvider::from_settings(&settings).unwrap()
    }

    fn dataset_body() -> serde_json::Value {
        json!({
            "label": "Recycling rate of municipal waste",
            "id": ["freq", "unit", "geo", "time"],
            "size": [1, 1, 2, 2],
            "value": {"0": 0.45, "1": 0.50, "2": 0.60, "3": 0.65},
            "dimension": {
                "freq": {"category": {"index": {"A": 0}}},
                "unit": {"category": {"index": {"PC": 0}}},
                "geo": {"category": {"index": {"FI": 0, "DE": 1}}},
                "time": {"category": {"index": {"2022": 0, "2023": 1}}}
            }
        })
    }

    #[test]
    fn test_query_pairs() {
        let params = QueryParams::new()
            .with_time_range("2018", "2023")
            .with_geo(["FI", "DE"])
            .with_param("unit", "PC");
        let pairs = EurostatProvider::query_pairs(&params);
        let keys: Vec<&str> = pairs.iter().map(|(k, _)| k.as_str()).collect();
        assert_eq!(
            keys,
            vec!["format", "lang", "sinceTimePeriod", "untilTimePeriod", "geo", "geo", "unit"]
        );
    }

    #[test]
    fn test_build_request_url() {
        let settings = ProviderSettings::for_provider(Provider::Eurostat);
        let provider = EurostatProvider::from_settings(&settings).unwrap();
        let request = IndicatorRequest::eurostat("cei_wm011")
            .with_params(QueryParams::new().since("2018").with_geo(["FI"]));
        let url = provider.build_request(&request).unwrap().url().to_string();

        assert!(url.starts_with(
            "https://ec.europa.eu/eurostat/api/dissemination/statistics/1.0/data/cei_wm011?"
        ));
        assert!(url.contains("format=JSON"));
        assert!(url.contains("sinceTimePeriod=2018"));
        assert!(url.contains("geo=FI"));
    }

    #[test]
    fn test_error_label() {
        assert_eq!(
            error_label(r#"{"error":{"status":404,"label":"Dataset not found"}}"#).as_deref(),
            Some("Dataset not found")
        );
        assert_eq!(
            error_label(r#"{"error":[{"status":400,"label":"Bad geo"}]}"#).as_deref(),
            Some("Bad geo")
        );
        assert!(error_label("<html>").is_none());
    }

    #[test]
    fn test_provider_info() {
        let provider = EurostatProvider::new().unwrap();
        assert_eq!(provider.name(), "Eurostat");
        assert_eq!(provider.provider(), Provider::Eurostat);
        assert!(provider.supports(&"cei_wm011".into()));
        assert!(!provider.supports(&"AIR_GHG".into()));
    }

    #[tokio::test]
    async fn test_fetch_success() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/cei_wm011"))
            .and(query_param("format", "JSON"))
            .and(query_param("sinceTimePeriod", "2018"))
            .respond_with(ResponseTemplate::new(200).set_body_json(dataset_body()))
            .expect(1)
            .mount(&server)
            .await;

        let provider = provider_for(&server);
        let request = IndicatorRequest::eurostat("cei_wm011")
            .with_params(QueryParams::new().since("2018"));
        let payload = provider.fetch(&request).await.unwrap();

        assert_eq!(payload.provider_meta.provider, Provider::Eurostat);
        assert_eq!(payload.provider_meta.dataset.as_str(), "cei_wm011");
        assert!(payload.provider_meta.url.contains("/cei_wm011?"));
        match payload.raw {
            RawPayload::Eurostat(p) => assert_eq!(p.size, vec![1, 1, 2, 2]),
            other => panic!("unexpected payload {}", other.format_name()),
        }
    }

    #[tokio::test]
    async fn test_unknown_indicator_makes_no_request() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .respond_with(ResponseTemplate::new(200))
            .expect(0)
            .mount(&server)
            .await;

        let err = provider_for(&server)
            .fetch(&IndicatorRequest::eurostat("not_a_dataset"))
            .await
            .unwrap_err();
        assert!(matches!(err, StatsError::UnknownIndicator { .. }));
    }

    #[tokio::test]
    async fn test_http_error_uses_sdmx_label() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/cei_wm011"))
            .respond_with(ResponseTemplate::new(404).set_body_json(json!({
                "error": {"status": 404, "label": "Dataset not found"}
            })))
            .mount(&server)
            .await;

        let err = provider_for(&server)
            .fetch(&IndicatorRequest::eurostat("cei_wm011"))
            .await
            .unwrap_err();
        assert_eq!(
            err,
            StatsError::Upstream {
                provider: Provider::Eurostat,
                status: Some(404),
                message: "Dataset not found".to_string(),
            }
        );
        assert!(err.is_fallback_eligible());
    }

    #[tokio::test]
    async fn test_missing_value_is_empty_result() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/cei_wm011"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({"dimension": {}})))
            .mount(&server)
            .await;

        let err = provider_for(&server)
            .fetch(&IndicatorRequest::eurostat("cei_wm011"))
            .await
            .unwrap_err();
        assert!(matches!(err, StatsError::EmptyResult { .. }));
    }

    #[tokio::test]
    async fn test_html_success_body_is_empty_result() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/cei_wm011"))
            .respond_with(ResponseTemplate::new(200).set_body_string("<html>proxy error page</html>"))
            .mount(&server)
            .await;

        let err = provider_for(&server)
            .fetch(&IndicatorRequest::eurostat("cei_wm011"))
            .await
            .unwrap_err();
        match &err {
            StatsError::EmptyResult { provider, dataset, reason } => {
                assert_eq!(*provider, Provider::Eurostat);
                assert_eq!(dataset, "cei_wm011");
                assert!(reason.contains("not JSON"));
            }
            other => panic!("unexpected error {other:?}"),
        }
        assert!(err.is_fallback_eligible());
    }

    #[tokio::test]
    async fn test_transport_failure_is_upstream_without_status() {
        let settings = ProviderSettings::for_provider(Provider::Eurostat)
            .with_base_url("http://127.0.0.1:1");
        let provider = EurostatProvider::from_settings(&settings).unwrap();
        let err = provider
            .fetch(&IndicatorRequest::eurostat("cei_wm011"))
            .await
            .unwrap_err();
        assert!(matches!(err, StatsError::Upstream { status: None, .. }));
    }
}
