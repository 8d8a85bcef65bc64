//! Client configuration.
//!
//! Everything an embedding application may want to tune lives here: absolute
//! base URLs (pointing one at a local reverse proxy is supported), cache TTLs,
//! indicator allow-lists, the historical year cutoff, the stale fallback policy
//! and whether placeholder data may be substituted.

use std::env;
use std::time::Duration;

use serde::{Deserialize, Serialize};
use tracing::warn;

use crate::catalog::known_indicators;
use crate::error::{Result, StatsError};
use crate::fallback::FallbackPolicy;
use crate::types::{IndicatorCode, Provider};

/// Default Eurostat dissemination API base URL.
pub const EUROSTAT_BASE_URL: &str =
    "https://ec.europa.eu/eurostat/api/dissemination/statistics/1.0/data";

/// Default SPARQL endpoint (EU Publications Office, hosts EuroVoc and EUR-Lex).
pub const SPARQL_ENDPOINT: &str = "https://publications.europa.eu/webapi/rdf/sparql";

/// Default OECD SDMX REST base URL.
pub const OECD_BASE_URL: &str = "https://stats.oecd.org/SDMX-JSON/data";

/// Default cutoff below which observations are dropped.
pub const DEFAULT_YEAR_CUTOFF: i32 = 2018;

/// Settings for one provider.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProviderSettings {
    /// Base URL or endpoint.
    pub base_url: String,
    /// Cache time-to-live in seconds.
    pub ttl_secs: u64,
    /// Codes the adapter accepts. `None` means the provider's catalog.
    #[serde(default)]
    pub allow_list: Option<Vec<IndicatorCode>>,
}

impl ProviderSettings {
    /// Default settings for a provider.
    #[must_use]
    pub fn for_provider(provider: Provider) -> Self {
        let (base_url, ttl_secs) = match provider {
            Provider::Eurostat => (EUROSTAT_BASE_URL, 30 * 60),
            Provider::EurostatSparql => (SPARQL_ENDPOINT, 30 * 60),
            Provider::Oecd => (OECD_BASE_URL, 60 * 60),
        };
        Self {
            base_url: base_url.to_string(),
            ttl_secs,
            allow_list: None,
        }
    }

    /// Cache TTL as a [`Duration`].
    #[must_use]
    pub const fn ttl(&self) -> Duration {
        Duration::from_secs(self.ttl_secs)
    }

    /// The effective allow-list: the configured one, or every catalog code.
    #[must_use]
    pub fn allowed_indicators(&self, provider: Provider) -> Vec<IndicatorCode> {
        self.allow_list.clone().unwrap_or_else(|| {
            known_indicators(provider)
                .iter()
                .map(|info| IndicatorCode::new(info.code))
                .collect()
        })
    }

    /// Checks that the base URL is an absolute `http` or `https` URL.
    ///
    /// # Errors
    /// `InvalidParameter` for relative or non-HTTP URLs.
    pub fn validate(&self) -> Result<()> {
        let rest = self
            .base_url
            .strip_prefix("https://")
            .or_else(|| self.base_url.strip_prefix("http://"));
        match rest {
            Some(host) if !host.is_empty() && !host.starts_with('/') => Ok(()),
            _ => Err(StatsError::InvalidParameter(format!(
                "base URL must be absolute http(s): {:?}",
                self.base_url
            ))),
        }
    }

    /// Sets the base URL.
    #[must_use]
    pub fn with_base_url(mut self, base_url: impl Into<String>) -> Self {
        self.base_url = base_url.into();
        self
    }

    /// Sets the cache TTL.
    #[must_use]
    pub fn with_ttl(mut self, ttl: Duration) -> Self {
        self.ttl_secs = ttl.as_secs();
        self
    }

    /// Replaces the allow-list.
    #[must_use]
    pub fn with_allow_list<I, C>(mut self, codes: I) -> Self
    where
        I: IntoIterator<Item = C>,
        C: Into<IndicatorCode>,
    {
        self.allow_list = Some(codes.into_iter().map(Into::into).collect());
        self
    }
}

/// Normalizer settings.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct NormalizerConfig {
    /// Observations from years before this are dropped. `None` keeps everything.
    pub year_cutoff: Option<i32>,
}

impl Default for NormalizerConfig {
    fn default() -> Self {
        Self {
            year_cutoff: Some(DEFAULT_YEAR_CUTOFF),
        }
    }
}

/// Top-level client configuration.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ClientConfig {
    /// Eurostat REST settings.
    pub eurostat: ProviderSettings,
    /// SPARQL settings.
    pub sparql: ProviderSettings,
    /// OECD settings.
    pub oecd: ProviderSettings,
    /// Normalizer settings.
    pub normalizer: NormalizerConfig,
    /// What to do when a live fetch fails.
    pub fallback: FallbackPolicy,
    /// Substitute labelled placeholder data when nothing can be fetched.
    pub allow_placeholder: bool,
}

impl Default for ClientConfig {
    fn default() -> Self {
        Self {
            eurostat: ProviderSettings::for_provider(Provider::Eurostat),
            sparql: ProviderSettings::for_provider(Provider::EurostatSparql),
            oecd: ProviderSettings::for_provider(Provider::Oecd),
            normalizer: NormalizerConfig::default(),
            fallback: FallbackPolicy::default(),
            allow_placeholder: false,
        }
    }
}

impl ClientConfig {
    /// Settings for a provider.
    #[must_use]
    pub const fn provider(&self, provider: Provider) -> &ProviderSettings {
        match provider {
            Provider::Eurostat => &self.eurostat,
            Provider::EurostatSparql => &self.sparql,
            Provider::Oecd => &self.oecd,
        }
    }

    /// Mutable settings for a provider.
    pub fn provider_mut(&mut self, provider: Provider) -> &mut ProviderSettings {
        match provider {
            Provider::Eurostat => &mut self.eurostat,
            Provider::EurostatSparql => &mut self.sparql,
            Provider::Oecd => &mut self.oecd,
        }
    }

    /// Sets the year cutoff.
    #[must_use]
    pub fn with_year_cutoff(mut self, cutoff: Option<i32>) -> Self {
        self.normalizer.year_cutoff = cutoff;
        self
    }

    /// Sets the fallback policy.
    #[must_use]
    pub fn with_fallback(mut self, fallback: FallbackPolicy) -> Self {
        self.fallback = fallback;
        self
    }

    /// Enables or disables placeholder substitution.
    #[must_use]
    pub fn with_placeholder(mut self, allow: bool) -> Self {
        self.allow_placeholder = allow;
        self
    }

    /// Replaces one provider's settings.
    #[must_use]
    pub fn with_provider(mut self, provider: Provider, settings: ProviderSettings) -> Self {
        *self.provider_mut(provider) = settings;
        self
    }

    /// Applies `EUDATA_*` environment overrides.
    ///
    /// Recognised variables: `EUDATA_EUROSTAT_BASE_URL`, `EUDATA_SPARQL_ENDPOINT`,
    /// `EUDATA_OECD_BASE_URL` and `EUDATA_YEAR_CUTOFF` (an integer, or `none`).
    /// Unparseable values are logged and ignored.
    #[must_use]
    pub fn with_env_overrides(mut self) -> Self {
        if let Ok(url) = env::var("EUDATA_EUROSTAT_BASE_URL") {
            self.eurostat.base_url = url;
        }
        if let Ok(url) = env::var("EUDATA_SPARQL_ENDPOINT") {
            self.sparql.base_url = url;
        }
        if let Ok(url) = env::var("EUDATA_OECD_BASE_URL") {
            self.oecd.base_url = url;
        }
        if let Ok(raw) = env::var("EUDATA_YEAR_CUTOFF") {
            if raw.eq_ignore_ascii_case("none") {
                self.normalizer.year_cutoff = None;
            } else {
                match raw.parse() {
                    Ok(year) => self.normalizer.year_cutoff = Some(year),
                    Err(_) => warn!(value = %raw, "Ignoring invalid EUDATA_YEAR_CUTOFF"),
                }
            }
        }
        self
    }
}
