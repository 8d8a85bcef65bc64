//! Error types for statistical data operations.
//!
//! This module defines [`StatsError`] which covers every failure that can occur
//! while validating, fetching, caching, or normalizing provider data.

use thiserror::Error;

use crate::types::Provider;

/// Errors that can occur during data operations.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum StatsError {
    /// The indicator is not on the allow-list of the adapter that was asked for it.
    ///
    /// Raised before any network call is made.
    #[error("Unknown indicator {code} for provider {provider}")]
    UnknownIndicator {
        /// The provider whose allow-list rejected the code.
        provider: Provider,
        /// The rejected indicator code.
        code: String,
    },

    /// Non-2xx response or transport failure from an upstream provider.
    #[error("Upstream error from {provider}{}: {message}", status_suffix(.status))]
    Upstream {
        /// The provider that failed.
        provider: Provider,
        /// HTTP status, absent for transport failures.
        status: Option<u16>,
        /// Provider or transport message.
        message: String,
    },

    /// A 2xx response that lacks the expected top-level structure or has no rows.
    #[error("Empty result from {provider} for {dataset}: {reason}")]
    EmptyResult {
        /// The provider that answered.
        provider: Provider,
        /// The dataset that was queried.
        dataset: String,
        /// What was missing.
        reason: String,
    },

    /// The payload is present but does not match its declared structure.
    #[error("Normalization error: {0}")]
    Normalization(String),

    /// Error interacting with the cache.
    #[error("Cache error: {0}")]
    Cache(String),

    /// An invalid parameter was provided.
    #[error("Invalid parameter: {0}")]
    InvalidParameter(String),

    /// No adapter is registered for the requested provider.
    #[error("Provider not configured: {0}")]
    ProviderNotConfigured(String),

    /// The load was abandoned because the caller's cancellation signal fired.
    #[error("Request cancelled")]
    Cancelled,

    /// Any other error.
    #[error("{0}")]
    Other(String),
}

impl StatsError {
    /// Returns true if a stale cache entry may be served in place of this error.
    ///
    /// Only transport/HTTP failures and empty results qualify; configuration and
    /// normalization errors always reach the caller.
    #[must_use]
    pub const fn is_fallback_eligible(&self) -> bool {
        matches!(self, Self::Upstream { .. } | Self::EmptyResult { .. })
    }

    /// Returns true if retrying the same request could succeed.
    #[must_use]
    pub const fn is_retryable(&self) -> bool {
        matches!(self, Self::Upstream { .. })
    }
}

fn status_suffix(status: &Option<u16>) -> String {
    status.map(|s| format!(" (HTTP {s})")).unwrap_or_default()
}

/// Result type alias using [`StatsError`].
pub type Result<T> = std::result::Result<T, StatsError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_fallback_eligibility() {
        let upstream = StatsError::Upstream {
            provider: Provider::Eurostat,
            status: Some(503),
            message: "Service Unavailable".to_string(),
        };
        let empty = StatsError::EmptyResult {
            provider: Provider::Oecd,
            dataset: "AIR_GHG".to_string(),
            reason: "missing dataSets".to_string(),
        };
        let unknown = StatsError::UnknownIndicator {
            provider: Provider::Eurostat,
            code: "nope".to_string(),
        };

        assert!(upstream.is_fallback_eligible());
        assert!(empty.is_fallback_eligible());
        assert!(!unknown.is_fallback_eligible());
        assert!(!StatsError::Normalization("bad".to_string()).is_fallback_eligible());

        assert!(upstream.is_retryable());
        assert!(!empty.is_retryable());
    }

    #[test]
    fn test_upstream_display() {
        let err = StatsError::Upstream {
            provider: Provider::Eurostat,
            status: Some(404),
            message: "Dataset not found".to_string(),
        };
        assert_eq!(
            err.to_string(),
            "Upstream error from eurostat (HTTP 404): Dataset not found"
        );

        let err = StatsError::Upstream {
            provider: Provider::Oecd,
            status: None,
            message: "connection refused".to_string(),
        };
        assert_eq!(err.to_string(), "Upstream error from oecd: connection refused");
    }
}
