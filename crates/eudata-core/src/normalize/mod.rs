//! Response normalizer.
//!
//! Turns a [`FetchedPayload`] of any wire format into an ordered sequence of
//! [`UniformRecord`]s. Each format has a parser producing [`Observation`]s;
//! all of them then pass through the same year cutoff and the single record
//! constructor, so formatting and compliance are identical across providers.

mod eurostat;
mod oecd;
mod sparql;

use tracing::debug;

use crate::catalog::IndicatorMeta;
use crate::config::NormalizerConfig;
use crate::error::Result;
use crate::payload::{FetchedPayload, RawPayload};
use crate::period::period_year;
use crate::record::{Observation, UniformRecord};
use crate::types::IndicatorCode;

pub use eurostat::{decompose_linear_index, row_major_strides};

/// Maps provider payloads to uniform records.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct Normalizer {
    config: NormalizerConfig,
}

impl Normalizer {
    /// Creates a normalizer with the given settings.
    #[must_use]
    pub const fn new(config: NormalizerConfig) -> Self {
        Self { config }
    }

    /// The active settings.
    #[must_use]
    pub const fn config(&self) -> NormalizerConfig {
        self.config
    }

    /// Decodes a payload's observations without enrichment or filtering.
    ///
    /// # Errors
    /// `Normalization` if the payload contradicts its own structure.
    pub fn observations(payload: &RawPayload) -> Result<Vec<Observation>> {
        match payload {
            RawPayload::Eurostat(p) => eurostat::observations(p),
            RawPayload::Oecd(p) => oecd::observations(p),
            RawPayload::Sparql(p) => sparql::observations(p),
        }
    }

    /// Normalizes a payload fetched for `indicator`.
    ///
    /// Missing and non-finite values, unparseable periods and observations
    /// older than the year cutoff are dropped; everything else keeps payload
    /// order.
    ///
    /// # Errors
    /// `Normalization` if the payload contradicts its own structure.
    pub fn normalize(
        &self,
        payload: &FetchedPayload,
        indicator: &IndicatorCode,
    ) -> Result<Vec<UniformRecord>> {
        let provider = payload.provider_meta.provider;
        let meta = IndicatorMeta::lookup(provider, indicator);
        let source = provider.source();

        let observations = Self::observations(&payload.raw)?;
        let total = observations.len();

        let records: Vec<UniformRecord> = observations
            .into_iter()
            .filter(|obs| self.within_cutoff(&obs.period))
            .filter_map(|obs| UniformRecord::from_observation(&meta, source, obs))
            .collect();

        debug!(
            provider = %provider,
            indicator = %indicator,
            observations = total,
            records = records.len(),
            "Normalized payload"
        );
        Ok(records)
    }

    fn within_cutoff(&self, period: &str) -> bool {
        match (self.config.year_cutoff, period_year(period)) {
            (Some(cutoff), Some(year)) => year >= cutoff,
            _ => true,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::NormalizerConfig;
    use crate::payload::{EurostatPayload, OecdPayload, ProviderMeta, SparqlPayload};
    use crate::types::{ComplianceFlag, Provider, Source};
    use serde_json::json;

    fn eurostat_payload(body: serde_json::Value, code: &str) -> FetchedPayload {
        let code = IndicatorCode::new(code);
        let raw = EurostatPayload::from_json(body, &code).unwrap();
        FetchedPayload::new(
            RawPayload::Eurostat(raw),
            ProviderMeta::now(Provider::Eurostat, code, "http://localhost/test"),
        )
    }

    fn wm011_body() -> serde_json::Value {
        json!({
            "label": "Recycling rate of municipal waste",
            "id": ["freq", "unit", "geo", "time"],
            "size": [1, 1, 2, 2],
            "value": {"0": 0.45, "1": 0.50, "2": 0.60, "3": 0.65},
            "dimension": {
                "freq": {"category": {"index": {"A": 0}}},
                "unit": {"category": {"index": {"PC": 0}}},
                "geo": {"category": {"index": {"FI": 0, "DE": 1},
                                     "label": {"FI": "Finland", "DE": "Germany"}}},
                "time": {"category": {"index": {"2022": 0, "2023": 1}}}
            },
            "extension": {"datasetId": "cei_wm011"}
        })
    }

    #[test]
    fn test_cei_wm011_end_to_end() {
        let payload = eurostat_payload(wm011_body(), "cei_wm011");
        let records = Normalizer::default()
            .normalize(&payload, &IndicatorCode::new("cei_wm011"))
            .unwrap();

        let triples: Vec<(&str, i32, &str)> = records
            .iter()
            .map(|r| (r.country(), r.year(), r.formatted_value()))
            .collect();
        assert_eq!(
            triples,
            vec![
                ("FI", 2022, "45.0%"),
                ("FI", 2023, "50.0%"),
                ("DE", 2022, "60.0%"),
                ("DE", 2023, "65.0%"),
            ]
        );

        assert!(records.iter().all(|r| r.source() == Source::Eurostat));
        assert!(records.iter().all(|r| r.indicator_name() == "Recycling rate of municipal waste"));
        assert_eq!(records[2].compliance_flag(), ComplianceFlag::Compliant);
        assert_eq!(records[0].compliance_flag(), ComplianceFlag::Pending);
    }

    #[test]
    fn test_year_cutoff_is_configurable() {
        let body = json!({
            "id": ["geo", "time"],
            "size": [1, 3],
            "value": {"0": 1.0, "1": 2.0, "2": 3.0},
            "dimension": {
                "geo": {"category": {"index": {"FI": 0}}},
                "time": {"category": {"index": {"2016": 0, "2018": 1, "2020": 2}}}
            }
        });
        let payload = eurostat_payload(body, "env_wasgen");
        let code = IndicatorCode::new("env_wasgen");

        let records = Normalizer::default().normalize(&payload, &code).unwrap();
        assert_eq!(records.iter().map(|r| r.year()).collect::<Vec<_>>(), vec![2018, 2020]);

        let records = Normalizer::new(NormalizerConfig { year_cutoff: None })
            .normalize(&payload, &code)
            .unwrap();
        assert_eq!(records.len(), 3);

        let records = Normalizer::new(NormalizerConfig {
            year_cutoff: Some(2019),
        })
        .normalize(&payload, &code)
        .unwrap();
        assert_eq!(records.len(), 1);
    }

    #[test]
    fn test_no_nan_reaches_output() {
        let body = json!({
            "id": ["geo", "time"],
            "size": [2, 2],
            "value": [0.3, null, 0.5, 0.7],
            "dimension": {
                "geo": {"category": {"index": ["FI", "SE"]}},
                "time": {"category": {"index": ["2021", "2022"]}}
            }
        });
        let payload = eurostat_payload(body, "cei_srm030");
        let records = Normalizer::default()
            .normalize(&payload, &IndicatorCode::new("cei_srm030"))
            .unwrap();

        assert_eq!(records.len(), 3);
        assert!(records.iter().all(|r| r.value().is_finite()));
    }

    #[test]
    fn test_unknown_indicator_uses_raw_code() {
        let payload = eurostat_payload(wm011_body(), "tps00001");
        let records = Normalizer::default()
            .normalize(&payload, &IndicatorCode::new("tps00001"))
            .unwrap();

        assert_eq!(records[0].indicator_name(), "tps00001");
        assert_eq!(records[0].formatted_value(), "0.45");
        assert_eq!(records[0].compliance_flag(), ComplianceFlag::Pending);
    }

    #[test]
    fn test_oecd_air_ghg_end_to_end() {
        let code = IndicatorCode::new("AIR_GHG");
        let raw = OecdPayload::from_json(
            json!({
                "dataSets": [{"observations": {
                    "0:0": [612.0],
                    "0:1": [512.3],
                    "1:1": [45.1],
                    "1:2": [null]
                }}],
                "structure": {"dimensions": {"observation": [
                    {"id": "COU", "values": [{"id": "DEU", "name": "Germany"},
                                              {"id": "FIN", "name": "Finland"}]},
                    {"id": "YEAR", "values": [{"id": "2016"}, {"id": "2021"}, {"id": "2022"}]}
                ]}}
            }),
            &code,
        )
        .unwrap();
        let payload = FetchedPayload::new(
            RawPayload::Oecd(raw),
            ProviderMeta::now(Provider::Oecd, code.clone(), "http://localhost/oecd"),
        );

        let records = Normalizer::default().normalize(&payload, &code).unwrap();

        let rows: Vec<(&str, &str, i32, &str)> = records
            .iter()
            .map(|r| (r.country(), r.country_name(), r.year(), r.formatted_value()))
            .collect();
        assert_eq!(
            rows,
            vec![
                ("DEU", "Germany", 2021, "512.30 Mt CO2e"),
                ("FIN", "Finland", 2021, "45.10 Mt CO2e"),
            ]
        );
        assert!(records.iter().all(|r| r.source() == Source::Oecd));
        assert!(records.iter().all(|r| r.indicator_name() == "Greenhouse gas emissions"));
        assert_eq!(records[1].title(), "Greenhouse gas emissions: Finland 2021");
        assert!(records.iter().all(|r| r.compliance_flag() == ComplianceFlag::Pending));
    }

    #[test]
    fn test_sparql_cei_wm011_end_to_end() {
        let code = IndicatorCode::new("cei_wm011");
        let raw = SparqlPayload::from_json(
            json!({
                "head": {"vars": ["geo", "time", "value"]},
                "results": {"bindings": [
                    {
                        "geo": {"type": "uri", "value": "http://data.europa.eu/nuts/code/FI"},
                        "time": {"type": "literal", "value": "2017"},
                        "value": {"type": "literal", "value": "0.40"}
                    },
                    {
                        "geo": {"type": "uri", "value": "http://data.europa.eu/nuts/code/FI"},
                        "time": {"type": "literal", "value": "2022"},
                        "value": {"type": "typed-literal", "value": "0.45",
                                  "datatype": "http://www.w3.org/2001/XMLSchema#decimal"}
                    },
                    {
                        "geo": {"type": "literal", "value": "DE"},
                        "time": {"type": "literal", "value": "2022"},
                        "value": {"type": "literal", "value": "0.672"}
                    }
                ]}
            }),
            &code,
        )
        .unwrap();
        let payload = FetchedPayload::new(
            RawPayload::Sparql(raw),
            ProviderMeta::now(Provider::EurostatSparql, code.clone(), "http://localhost/sparql"),
        );

        let records = Normalizer::default().normalize(&payload, &code).unwrap();

        let rows: Vec<(&str, i32, &str, ComplianceFlag)> = records
            .iter()
            .map(|r| (r.country(), r.year(), r.formatted_value(), r.compliance_flag()))
            .collect();
        assert_eq!(
            rows,
            vec![
                ("FI", 2022, "45.0%", ComplianceFlag::Pending),
                ("DE", 2022, "67.2%", ComplianceFlag::Compliant),
            ]
        );
        assert!(records.iter().all(|r| r.source() == Source::Eurostat));
        assert!(records.iter().all(|r| r.indicator_name() == "Recycling rate of municipal waste"));
    }
}
