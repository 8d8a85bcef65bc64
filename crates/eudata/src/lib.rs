#![doc = include_str!("../README.md")]
#![doc(issue_tracker_base_url = "https://github.com/eudata/eudata/issues/")]
#![cfg_attr(docsrs, feature(doc_cfg, doc_auto_cfg))]
#![warn(missing_docs)]
#![forbid(unsafe_code)]

//! Unified client for EU environmental statistics.
//!
//! This crate re-exports the core types and the bundled source adapters, and
//! provides a [`DataSourceClient`] that fetches indicators through a shared
//! cache with stale fallback and request coalescing.
//!
//! # Features
//!
//! - `eurostat` - Eurostat dissemination API (JSON-stat)
//! - `sparql` - Eurostat linked data, EuroVoc and EUR-Lex over SPARQL
//! - `oecd` - OECD SDMX-JSON
//! - `cache-sqlite` - SQLite-based caching
//!
//! # Example
//!
//! ```rust,ignore
//! use eudata::{ClientConfig, DataSourceClient, FilterSpec, IndicatorRequest, paginate};
//!
//! #[tokio::main]
//! async fn main() -> eudata::Result<()> {
//!     let client = DataSourceClient::from_config(ClientConfig::default())?;
//!
//!     let report = client
//!         .fetch_all(&[
//!             IndicatorRequest::eurostat("cei_wm011"),
//!             IndicatorRequest::oecd("AIR_GHG"),
//!         ])
//!         .await;
//!
//!     let records = FilterSpec::new().with_countries(["FI"]).apply(&report.records());
//!     let page = paginate(&records, 1, 20);
//!     println!("{} of {} records", page.items.len(), page.total_items);
//!
//!     Ok(())
//! }
//! ```

// Core types and traits
pub use eudata_core::*;

// Cache implementations
#[cfg(feature = "cache-sqlite")]
pub use eudata_cache::SqliteCache;
pub use eudata_cache::{InMemoryCache, NoopCache};

// Providers
#[cfg(feature = "eurostat")]
pub use eudata_eurostat::EurostatProvider;
#[cfg(feature = "oecd")]
pub use eudata_oecd::OecdProvider;
#[cfg(feature = "sparql")]
pub use eudata_sparql::SparqlProvider;

mod client;
mod placeholder;

pub use client::{DataSourceClient, IndicatorData, LoadFailure, LoadReport};
