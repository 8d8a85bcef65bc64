#![doc = include_str!("../README.md")]
#![doc(issue_tracker_base_url = "https://github.com/eudata/eudata/issues/")]
#![cfg_attr(docsrs, feature(doc_cfg, doc_auto_cfg))]
#![warn(missing_docs)]
#![forbid(unsafe_code)]

//! SPARQL adapter for EU linked-data endpoints.
//!
//! This crate provides access to:
//!
//! - Eurostat linked-data observations (normalized into records)
//! - EuroVoc concept label search
//! - EUR-Lex legal acts indexed under a EuroVoc concept
//!
//! # Example
//!
//! ```no_run
//! use eudata_sparql::SparqlProvider;
//!
//! # async fn example() -> eudata_core::Result<()> {
//! let provider = SparqlProvider::new()?;
//! let concepts = provider.search_eurovoc("waste management").await?;
//! for row in &concepts.results.bindings {
//!     if let Some(label) = row.get("label") {
//!         println!("{}", label.value);
//!     }
//! }
//! # Ok(())
//! # }
//! ```

/// Query templates.
pub mod query;

use std::time::{Duration, Instant};

use async_trait::async_trait;
use eudata_core::{
    DataProvider, FetchedPayload, IndicatorCode, IndicatorRequest, Provider, ProviderMeta,
    ProviderSettings, RawPayload, Result, SourceAdapter, SparqlPayload, StatsError,
};
use reqwest::header::{ACCEPT, CONTENT_TYPE};
use tracing::{debug, info, instrument};

/// User agent for HTTP requests.
const USER_AGENT: &str = concat!("eudata/", env!("CARGO_PKG_VERSION"));

/// Request timeout.
const REQUEST_TIMEOUT: Duration = Duration::from_secs(30);

const SPARQL_QUERY_MIME: &str = "application/sparql-query";
const SPARQL_RESULTS_MIME: &str = "application/sparql-results+json";

/// SPARQL endpoint adapter.
///
/// Implements [`DataProvider`] and [`SourceAdapter`]; the latter runs the
/// observation template for an indicator. Label search and EUR-Lex lookups are
/// exposed as inherent methods returning raw [`SparqlPayload`]s.
#[derive(Debug, Clone)]
pub struct SparqlProvider {
    client: reqwest::Client,
    endpoint: String,
    dataset_base: String,
    allowed: Vec<IndicatorCode>,
}

impl SparqlProvider {
    /// Creates an adapter for the Publications Office endpoint.
    ///
    /// # Errors
    /// Returns an error if the HTTP client cannot be built.
    pub fn new() -> Result<Self> {
        Self::from_settings(&ProviderSettings::for_provider(Provider::EurostatSparql))
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
            endpoint: settings.base_url.clone(),
            dataset_base: query::EUROSTAT_DATASET_BASE.to_string(),
            allowed: settings.allowed_indicators(Provider::EurostatSparql),
        }
    }

    /// Overrides the base IRI that dataset codes are appended to.
    #[must_use]
    pub fn with_dataset_base(mut self, base: impl Into<String>) -> Self {
        self.dataset_base = base.into();
        self
    }

    /// Runs an arbitrary SELECT query.
    ///
    /// `label` names the result in errors and logs.
    ///
    /// # Errors
    /// `Upstream` on transport failure or a non-2xx status, `EmptyResult` when
    /// the body is not JSON or no solution is bound, `Normalization` when the
    /// JSON is not a result set.
    #[instrument(skip(self, query), fields(label = %label))]
    pub async fn run_query(&self, query: &str, label: &IndicatorCode) -> Result<SparqlPayload> {
        let upstream = |status: Option<u16>, message: String| StatsError::Upstream {
            provider: Provider::EurostatSparql,
            status,
            message,
        };

        debug!("Running SPARQL query against {}", self.endpoint);
        let started = Instant::now();
        let response = self
            .client
            .post(&self.endpoint)
            .header(CONTENT_TYPE, SPARQL_QUERY_MIME)
            .header(ACCEPT, SPARQL_RESULTS_MIME)
            .body(query.to_string())
            .send()
            .await;
        let latency_ms = u64::try_from(started.elapsed().as_millis()).unwrap_or(u64::MAX);

        let response = response.map_err(|e| {
            info!(
                provider = "eurostat-sparql",
                indicator = %label,
                latency_ms,
                error = %e,
                "Request failed"
            );
            upstream(None, e.to_string())
        })?;
        let status = response.status();
        info!(
            provider = "eurostat-sparql",
            indicator = %label,
            latency_ms,
            status = status.as_u16(),
            "Request completed"
        );

        let text = response
            .text()
            .await
            .map_err(|e| upstream(Some(status.as_u16()), e.to_string()))?;

        if !status.is_success() {
            let message = text.lines().next().map(str::trim).filter(|l| !l.is_empty());
            return Err(upstream(
                Some(status.as_u16()),
                message
                    .or(status.canonical_reason())
                    .unwrap_or("request failed")
                    .to_string(),
            ));
        }

        let body: serde_json::Value =
            serde_json::from_str(&text).map_err(|e| StatsError::EmptyResult {
                provider: Provider::EurostatSparql,
                dataset: label.to_string(),
                reason: format!("response body is not JSON: {e}"),
            })?;
        SparqlPayload::from_json(body, label)
    }

    /// Searches EuroVoc concepts by English label.
    ///
    /// # Errors
    /// As [`run_query`](Self::run_query).
    pub async fn search_eurovoc(&self, text: &str) -> Result<SparqlPayload> {
        let query = query::eurovoc_label_search(text, "en", query::DEFAULT_LIMIT);
        self.run_query(&query, &IndicatorCode::new("eurovoc")).await
    }

    /// Lists EUR-Lex acts indexed under a EuroVoc concept id.
    ///
    /// # Errors
    /// `InvalidParameter` for a malformed concept id, otherwise as
    /// [`run_query`](Self::run_query).
    pub async fn eurlex_acts(&self, concept_id: &str) -> Result<SparqlPayload> {
        let query = query::eurlex_by_concept(concept_id, query::DEFAULT_LIMIT)?;
        self.run_query(&query, &IndicatorCode::new("eurlex")).await
    }
}

impl DataProvider for SparqlProvider {
    fn provider(&self) -> Provider {
        Provider::EurostatSparql
    }

    fn name(&self) -> &str {
        "Eurostat SPARQL"
    }

    fn description(&self) -> &str {
        "SPARQL endpoint for Eurostat linked data, EuroVoc and EUR-Lex"
    }
}

#[async_trait]
impl SourceAdapter for SparqlProvider {
    fn allowed_indicators(&self) -> &[IndicatorCode] {
        &self.allowed
    }

    #[instrument(skip(self), fields(indicator = %request.indicator))]
    async fn fetch(&self, request: &IndicatorRequest) -> Result<FetchedPayload> {
        self.validate(&request.indicator)?;
        request.params.validate()?;

        let query = query::observations(&self.dataset_base, &request.indicator, &request.params)?;
        let payload = self.run_query(&query, &request.indicator).await?;

        Ok(FetchedPayload::new(
            RawPayload::Sparql(payload),
            ProviderMeta::now(
                Provider::EurostatSparql,
                request.indicator.clone(),
                self.endpoint.clone(),
            ),
        ))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;
    use wiremock::matchers::{body_string_contains, header, method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    fn provider_for(server: &MockServer) -> SparqlProvider {
        let settings = ProviderSettings::for_provider(Provider::EurostatSparql)
            .with_base_url(format!("{}/sparql", server.uri()));
        SparqlProvider::from_settings(&settings).unwrap()
    }

    fn observation_results() -> serde_json::Value {
        json!({
            "head": {"vars": ["geo", "time", "value"]},
            "results": {"bindings": [{
                "geo": {"type": "uri", "value": "http://data.europa.eu/nuts/code/FI"},
                "time": {"type": "literal", "value": "2022"},
                "value": {"type": "literal", "value": "0.45"}
            }]}
        })
    }

    #[tokio::test]
    async fn test_fetch_posts_query() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/sparql"))
            .and(header("content-type", SPARQL_QUERY_MIME))
            .and(header("accept", SPARQL_RESULTS_MIME))
            .and(body_string_contains("dataset/cei_wm011>"))
            .respond_with(ResponseTemplate::new(200).set_body_json(observation_results()))
            .expect(1)
            .mount(&server)
            .await;

        let payload = provider_for(&server)
            .fetch(&IndicatorRequest::sparql("cei_wm011"))
            .await
            .unwrap();

        assert_eq!(payload.provider_meta.provider, Provider::EurostatSparql);
        match payload.raw {
            RawPayload::Sparql(p) => assert_eq!(p.results.bindings.len(), 1),
            other => panic!("unexpected payload {}", other.format_name()),
        }
    }

    #[tokio::test]
    async fn test_empty_bindings_is_empty_result() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "head": {"vars": ["concept", "label"]},
                "results": {"bindings": []}
            })))
            .mount(&server)
            .await;

        let err = provider_for(&server).search_eurovoc("nothing").await.unwrap_err();
        assert!(matches!(err, StatsError::EmptyResult { .. }));
    }

    #[tokio::test]
    async fn test_server_error_is_upstream() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .respond_with(ResponseTemplate::new(503).set_body_string("Virtuoso 42000 Error\nmore"))
            .mount(&server)
            .await;

        let err = provider_for(&server)
            .fetch(&IndicatorRequest::sparql("cei_wm011"))
            .await
            .unwrap_err();
        assert_eq!(
            err,
            StatsError::Upstream {
                provider: Provider::EurostatSparql,
                status: Some(503),
                message: "Virtuoso 42000 Error".to_string(),
            }
        );
    }

    #[tokio::test]
    async fn test_transport_failure_is_upstream_without_status() {
        let settings = ProviderSettings::for_provider(Provider::EurostatSparql)
            .with_base_url("http://127.0.0.1:1/sparql");
        let provider = SparqlProvider::from_settings(&settings).unwrap();
        let err = provider
            .fetch(&IndicatorRequest::sparql("cei_wm011"))
            .await
            .unwrap_err();
        assert!(matches!(
            err,
            StatsError::Upstream { provider: Provider::EurostatSparql, status: None, .. }
        ));
    }

    #[tokio::test]
    async fn test_non_json_success_body_is_empty_result() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .respond_with(ResponseTemplate::new(200).set_body_string("<html>gateway</html>"))
            .mount(&server)
            .await;

        let err = provider_for(&server)
            .fetch(&IndicatorRequest::sparql("cei_wm011"))
            .await
            .unwrap_err();
        assert!(matches!(err, StatsError::EmptyResult { provider: Provider::EurostatSparql, .. }));
        assert!(err.is_fallback_eligible());
    }

    #[tokio::test]
    async fn test_eurlex_acts() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(body_string_contains("<http://eurovoc.europa.eu/4038>"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "head": {"vars": ["work", "celex", "title", "date"]},
                "results": {"bindings": [{
                    "work": {"type": "uri", "value": "http://publications.europa.eu/resource/cellar/abc"},
                    "celex": {"type": "literal", "value": "32008L0098"}
                }]}
            })))
            .expect(1)
            .mount(&server)
            .await;

        let provider = provider_for(&server);
        let acts = provider.eurlex_acts("4038").await.unwrap();
        assert_eq!(acts.results.bindings[0]["celex"].value, "32008L0098");

        let err = provider.eurlex_acts("bad id").await.unwrap_err();
        assert!(matches!(err, StatsError::InvalidParameter(_)));
    }

    #[tokio::test]
    async fn test_unknown_indicator() {
        let provider = SparqlProvider::new().unwrap();
        let err = provider
            .fetch(&IndicatorRequest::sparql("AIR_GHG"))
            .await
            .unwrap_err();
        assert!(matches!(err, StatsError::UnknownIndicator { .. }));
    }
}
