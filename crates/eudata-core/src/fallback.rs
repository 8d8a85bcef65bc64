//! What to do when a live fetch fails.

use serde::{Deserialize, Serialize};

use crate::error::StatsError;

/// Failure policy applied by the fetch cache.
///
/// With [`FallbackPolicy::UseStaleIfPresent`], an eligible failure (see
/// [`StatsError::is_fallback_eligible`]) is answered from any cache entry for
/// the key, however old, and the result is marked stale.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FallbackPolicy {
    /// Serve an expired entry instead of the error when one exists.
    #[default]
    UseStaleIfPresent,
    /// Always surface the error.
    Reject,
}

impl FallbackPolicy {
    /// Returns true if `error` may be answered from a stale entry.
    #[must_use]
    pub const fn allows_stale_for(&self, error: &StatsError) -> bool {
        matches!(self, Self::UseStaleIfPresent) && error.is_fallback_eligible()
    }
}
