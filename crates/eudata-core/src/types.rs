//! Core identifiers shared by every crate.
//!
//! - [`Provider`] - Upstream service an adapter talks to
//! - [`Source`] - Provenance tag carried on each record
//! - [`IndicatorCode`] - Dataset/indicator identifier
//! - [`ComplianceFlag`] - Threshold-rule outcome on a record
//! - [`DataOrigin`] - Whether a batch of records is live, cached, stale or illustrative

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// An upstream data provider.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum Provider {
    /// Eurostat dissemination REST API (SDMX-JSON / JSON-stat).
    Eurostat,
    /// Eurostat, EuroVoc and EUR-Lex linked-data SPARQL endpoints.
    EurostatSparql,
    /// OECD SDMX REST API.
    Oecd,
}

impl Provider {
    /// All providers, in registration order.
    pub const ALL: [Self; 3] = [Self::Eurostat, Self::EurostatSparql, Self::Oecd];

    /// Stable identifier used in cache keys and logs.
    #[must_use]
    pub const fn as_str(&self) -> &'static str {
        match self {
            Self::Eurostat => "eurostat",
            Self::EurostatSparql => "eurostat-sparql",
            Self::Oecd => "oecd",
        }
    }

    /// The provenance tag written on records produced from this provider.
    #[must_use]
    pub const fn source(&self) -> Source {
        match self {
            Self::Eurostat | Self::EurostatSparql => Source::Eurostat,
            Self::Oecd => Source::Oecd,
        }
    }
}

impl fmt::Display for Provider {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Provider {
    type Err = crate::error::StatsError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "eurostat" => Ok(Self::Eurostat),
            "eurostat-sparql" => Ok(Self::EurostatSparql),
            "oecd" => Ok(Self::Oecd),
            other => Err(crate::error::StatsError::InvalidParameter(format!(
                "Unknown provider: {other}"
            ))),
        }
    }
}

/// Record provenance as shown to consumers.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Source {
    /// Data originates from Eurostat (REST or SPARQL).
    Eurostat,
    /// Data originates from the OECD.
    Oecd,
}

impl Source {
    /// Returns the lowercase tag.
    #[must_use]
    pub const fn as_str(&self) -> &'static str {
        match self {
            Self::Eurostat => "eurostat",
            Self::Oecd => "oecd",
        }
    }
}

impl fmt::Display for Source {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A provider-specific dataset/indicator identifier (e.g. `cei_srm030`, `AIR_GHG`).
///
/// Codes are trimmed on creation; case is preserved because Eurostat codes are
/// lowercase and OECD codes uppercase.
#[derive(Clone, Debug, Default, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct IndicatorCode(String);

impl IndicatorCode {
    /// Creates a new indicator code.
    #[must_use]
    pub fn new(s: impl Into<String>) -> Self {
        let s = s.into();
        let trimmed = s.trim();
        if trimmed.len() == s.len() {
            Self(s)
        } else {
            Self(trimmed.to_string())
        }
    }

    /// Returns the code as a string slice.
    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for IndicatorCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for IndicatorCode {
    fn from(s: &str) -> Self {
        Self::new(s)
    }
}

impl From<String> for IndicatorCode {
    fn from(s: String) -> Self {
        Self::new(s)
    }
}

/// Outcome of an indicator's threshold rule on an observation.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ComplianceFlag {
    /// The observation meets the indicator's target.
    Compliant,
    /// The target is not met yet, or the indicator has no target.
    Pending,
}

impl ComplianceFlag {
    /// Returns the lowercase tag.
    #[must_use]
    pub const fn as_str(&self) -> &'static str {
        match self {
            Self::Compliant => "compliant",
            Self::Pending => "pending",
        }
    }
}

impl fmt::Display for ComplianceFlag {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Where a batch of records came from.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum DataOrigin {
    /// Fetched from the provider during this call.
    Live,
    /// Served from a cache entry still inside its TTL.
    Cached,
    /// Served from an expired cache entry because the live fetch failed.
    Stale,
    /// Illustrative data substituted because nothing could be fetched.
    Placeholder,
}

impl DataOrigin {
    /// Returns true for data obtained from the provider, now or earlier.
    #[must_use]
    pub const fn is_real(&self) -> bool {
        !matches!(self, Self::Placeholder)
    }
}
