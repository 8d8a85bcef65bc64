//! Filtering and pagination of normalized records.
//!
//! A [`FilterSpec`] is a conjunction of independent predicates. With every
//! field left at its default it is the identity; narrowing any field only ever
//! removes records, and surviving records keep their input order.

use std::collections::BTreeSet;

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};

use crate::record::UniformRecord;
use crate::types::ComplianceFlag;

/// Either every value, or only the listed ones.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Selection<T: Ord> {
    /// No restriction.
    #[default]
    All,
    /// Restrict to this set.
    Only(BTreeSet<T>),
}

impl<T: Ord> Selection<T> {
    /// Builds an `Only` selection from any iterator.
    pub fn only<I: IntoIterator<Item = T>>(values: I) -> Self {
        Self::Only(values.into_iter().collect())
    }

    /// Returns true if `value` passes the selection.
    pub fn matches<Q>(&self, value: &Q) -> bool
    where
        T: std::borrow::Borrow<Q>,
        Q: Ord + ?Sized,
    {
        match self {
            Self::All => true,
            Self::Only(set) => set.contains(value),
        }
    }
}

/// Record filter.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct FilterSpec {
    /// Earliest date, inclusive.
    pub date_from: Option<NaiveDate>,
    /// Latest date, inclusive.
    pub date_to: Option<NaiveDate>,
    /// Country codes.
    pub countries: Selection<String>,
    /// Topic tags.
    pub topics: Selection<String>,
    /// Sector tags.
    pub sectors: Selection<String>,
    /// Compliance flags.
    pub compliance: Selection<ComplianceFlag>,
    /// Case-insensitive substring searched in title, country name,
    /// indicator name and topic. Blank means no search.
    pub search_text: Option<String>,
}

impl FilterSpec {
    /// A filter that keeps everything.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Restricts to a date range; either bound may be open.
    #[must_use]
    pub const fn with_dates(mut self, from: Option<NaiveDate>, to: Option<NaiveDate>) -> Self {
        self.date_from = from;
        self.date_to = to;
        self
    }

    /// Restricts to the given country codes.
    #[must_use]
    pub fn with_countries<I, S>(mut self, countries: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.countries = Selection::only(countries.into_iter().map(Into::into));
        self
    }

    /// Restricts to the given topics.
    #[must_use]
    pub fn with_topics<I, S>(mut self, topics: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.topics = Selection::only(topics.into_iter().map(Into::into));
        self
    }

    /// Restricts to the given sectors.
    #[must_use]
    pub fn with_sectors<I, S>(mut self, sectors: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.sectors = Selection::only(sectors.into_iter().map(Into::into));
        self
    }

    /// Restricts to the given compliance flags.
    #[must_use]
    pub fn with_compliance<I: IntoIterator<Item = ComplianceFlag>>(mut self, flags: I) -> Self {
        self.compliance = Selection::only(flags);
        self
    }

    /// Sets the search text.
    #[must_use]
    pub fn with_search(mut self, text: impl Into<String>) -> Self {
        self.search_text = Some(text.into());
        self
    }

    /// Returns true if `record` satisfies every predicate.
    #[must_use]
    pub fn matches(&self, record: &UniformRecord) -> bool {
        self.date_from.is_none_or(|from| record.date() >= from)
            && self.date_to.is_none_or(|to| record.date() <= to)
            && self.countries.matches(record.country())
            && self.topics.matches(record.topic())
            && self.sectors.matches(record.sector())
            && self.compliance.matches(&record.compliance_flag())
            && self.matches_search(record)
    }

    fn matches_search(&self, record: &UniformRecord) -> bool {
        let Some(needle) = self.search_text.as_deref().map(str::trim) else {
            return true;
        };
        if needle.is_empty() {
            return true;
        }
        let needle = needle.to_lowercase();
        [
            record.title(),
            record.country_name(),
            record.indicator_name(),
            record.topic(),
        ]
        .iter()
        .any(|field| field.to_lowercase().contains(&needle))
    }

    /// Keeps the matching records, preserving order.
    #[must_use]
    pub fn apply<'a, I>(&self, records: I) -> Vec<UniformRecord>
    where
        I: IntoIterator<Item = &'a UniformRecord>,
    {
        records
            .into_iter()
            .filter(|r| self.matches(r))
            .cloned()
            .collect()
    }
}

/// One page of items.
#[derive(Clone, Debug, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Page<T> {
    /// Items on this page; empty when the page is out of range.
    pub items: Vec<T>,
    /// 1-based page number as requested.
    pub page: usize,
    /// Page size used.
    pub page_size: usize,
    /// Items across all pages.
    pub total_items: usize,
    /// Number of pages; zero when there are no items.
    pub total_pages: usize,
}

/// Slices `items` into the 1-based `page` of `page_size` items.
///
/// A `page_size` of zero is treated as one.
#[must_use]
pub fn paginate<T: Clone>(items: &[T], page: usize, page_size: usize) -> Page<T> {
    let page_size = page_size.max(1);
    let total_items = items.len();
    let total_pages = total_items.div_ceil(page_size);

    let page_items = page
        .checked_sub(1)
        .and_then(|p| p.checked_mul(page_size))
        .and_then(|start| items.get(start..))
        .map(|rest| rest.iter().take(page_size).cloned().collect())
        .unwrap_or_default();

    Page {
        items: page_items,
        page,
        page_size,
        total_items,
        total_pages,
    }
}

/// Distinct values available for filter drop-downs.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct FilterOptions {
    /// `(code, name)` pairs sorted by code.
    pub countries: Vec<(String, String)>,
    /// Topic tags, sorted.
    pub topics: Vec<String>,
    /// Sector tags, sorted.
    pub sectors: Vec<String>,
    /// Earliest and latest record year.
    pub years: Option<(i32, i32)>,
}

impl FilterOptions {
    /// Collects the options present in `records`.
    #[must_use]
    pub fn from_records<'a, I>(records: I) -> Self
    where
        I: IntoIterator<Item = &'a UniformRecord>,
    {
        let mut countries = BTreeSet::new();
        let mut topics = BTreeSet::new();
        let mut sectors = BTreeSet::new();
        let mut years: Option<(i32, i32)> = None;

        for record in records {
            countries.insert((record.country().to_string(), record.country_name().to_string()));
            topics.insert(record.topic().to_string());
            sectors.insert(record.sector().to_string());
            let year = record.year();
            years = Some(years.map_or((year, year), |(lo, hi)| (lo.min(year), hi.max(year))));
        }

        Self {
            countries: countries.into_iter().collect(),
            topics: topics.into_iter().collect(),
            sectors: sectors.into_iter().collect(),
            years,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::catalog::IndicatorMeta;
    use crate::record::Observation;
    use crate::types::{Provider, Source};

    fn record(code: &str, country: &str, period: &str, value: f64) -> UniformRecord {
        let meta = IndicatorMeta::lookup(Provider::Eurostat, &code.into());
        UniformRecord::from_observation(
            &meta,
            Source::Eurostat,
            Observation::new(country, period, Some(value)),
        )
        .unwrap()
    }

    fn sample() -> Vec<UniformRecord> {
        vec![
            record("cei_wm011", "FI", "2022", 0.45),
            record("cei_wm011", "DE", "2022", 0.60),
            record("env_air_gge", "FI", "2021", 45.0),
            record("nrg_ind_ren", "SE", "2023", 66.0),
            record("cei_wm011", "FI", "2023", 0.50),
        ]
    }

    #[test]
    fn test_default_filter_is_identity() {
        let records = sample();
        assert_eq!(FilterSpec::new().apply(&records), records);
    }

    #[test]
    fn test_country_filter_is_order_preserving_subset() {
        let records = sample();
        let filtered = FilterSpec::new().with_countries(["FI"]).apply(&records);

        assert_eq!(filtered.len(), 3);
        assert!(filtered.iter().all(|r| r.country() == "FI"));
        assert!(filtered.iter().all(|r| records.contains(r)));
        let years: Vec<i32> = filtered.iter().map(UniformRecord::year).collect();
        assert_eq!(years, vec![2022, 2021, 2023]);
    }

    #[test]
    fn test_predicates_are_conjunctive() {
        let records = sample();
        let filtered = FilterSpec::new()
            .with_countries(["FI", "DE"])
            .with_topics(["waste"])
            .with_compliance([ComplianceFlag::Compliant])
            .apply(&records);
        assert_eq!(filtered.len(), 1);
        assert_eq!(filtered[0].country(), "DE");
    }

    #[test]
    fn test_date_range_is_inclusive() {
        let records = sample();
        let filtered = FilterSpec::new()
            .with_dates(NaiveDate::from_ymd_opt(2022, 1, 1), NaiveDate::from_ymd_opt(2022, 12, 31))
            .apply(&records);
        assert_eq!(filtered.len(), 2);
    }

    #[test]
    fn test_search_is_case_insensitive() {
        let records = sample();
        assert_eq!(FilterSpec::new().with_search("GERMANY").apply(&records).len(), 1);
        assert_eq!(FilterSpec::new().with_search("recycling").apply(&records).len(), 3);
        assert_eq!(FilterSpec::new().with_search("   ").apply(&records).len(), 5);
    }

    #[test]
    fn test_paginate() {
        let items: Vec<u32> = (1..=7).collect();

        let page = paginate(&items, 1, 3);
        assert_eq!(page.items, vec![1, 2, 3]);
        assert_eq!(page.total_items, 7);
        assert_eq!(page.total_pages, 3);

        assert_eq!(paginate(&items, 3, 3).items, vec![7]);
        assert!(paginate(&items, 4, 3).items.is_empty());
        assert!(paginate(&items, 0, 3).items.is_empty());

        let empty: Page<u32> = paginate(&[], 1, 10);
        assert_eq!(empty.total_pages, 0);
        assert!(empty.items.is_empty());
    }

    #[test]
    fn test_filter_options() {
        let options = FilterOptions::from_records(&sample());
        assert_eq!(options.countries.len(), 3);
        assert_eq!(options.countries[0], ("DE".to_string(), "Germany".to_string()));
        assert!(options.topics.contains(&"waste".to_string()));
        assert_eq!(options.years, Some((2021, 2023)));
    }
}
