#![doc = include_str!("../README.md")]
#![doc(issue_tracker_base_url = "https://github.com/eudata/eudata/issues/")]
#![cfg_attr(docsrs, feature(doc_cfg, doc_auto_cfg))]
#![warn(missing_docs)]
#![forbid(unsafe_code)]

//! Core traits and types for EU statistics providers.
//!
//! This crate provides the shared abstractions:
//!
//! - [`SourceAdapter`](provider::SourceAdapter) - Fetches one indicator from one provider
//! - [`PayloadCache`](cache::PayloadCache) - Caching abstraction for raw payloads
//! - [`Normalizer`](normalize::Normalizer) - Payload to [`UniformRecord`](record::UniformRecord)
//! - [`FilterSpec`](filter::FilterSpec) and [`paginate`](filter::paginate) - Result narrowing

/// Cache trait and keys for storing fetched payloads.
pub mod cache;
/// Indicator and country catalog.
pub mod catalog;
/// Client and provider configuration.
pub mod config;
/// Error types.
pub mod error;
/// Stale-fallback policy.
pub mod fallback;
/// Record filtering and pagination.
pub mod filter;
/// DataFrame export.
pub mod frame;
/// Payload normalization.
pub mod normalize;
/// Typed provider payloads.
pub mod payload;
/// SDMX period parsing.
pub mod period;
/// Provider traits and requests.
pub mod provider;
/// Normalized record type.
pub mod record;
/// Core identifiers and tags.
pub mod types;

// Re-export commonly used items at crate root
pub use cache::{CacheEntry, CacheKey, PayloadCache};
pub use catalog::{IndicatorMeta, Unit};
pub use config::{ClientConfig, NormalizerConfig, ProviderSettings};
pub use error::{Result, StatsError};
pub use fallback::FallbackPolicy;
pub use filter::{FilterOptions, FilterSpec, Page, Selection, paginate};
pub use frame::records_to_frame;
pub use normalize::Normalizer;
pub use payload::{
    EurostatPayload, FetchedPayload, OecdPayload, ProviderMeta, RawPayload, SparqlPayload,
};
pub use provider::{DataProvider, IndicatorRequest, QueryParams, SourceAdapter};
pub use record::{Observation, UniformRecord};
pub use types::{ComplianceFlag, DataOrigin, IndicatorCode, Provider, Source};
