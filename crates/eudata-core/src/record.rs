//! The normalized output unit.

use chrono::{Datelike, NaiveDate};
use serde::Serialize;

use crate::catalog::{IndicatorMeta, country_name, is_known_country};
use crate::period::parse_period;
use crate::types::{ComplianceFlag, IndicatorCode, Source};

/// One observation decoded from a provider payload, before enrichment.
///
/// Every provider parser produces these and nothing else; turning them into
/// records goes through [`UniformRecord::from_observation`].
#[derive(Clone, Debug, PartialEq)]
pub struct Observation {
    /// Country or aggregate code as the provider spells it.
    pub country: String,
    /// Provider's own label for the country, used when the static table lacks it.
    pub country_label: Option<String>,
    /// SDMX time period code.
    pub period: String,
    /// Observation value; `None` for missing cells.
    pub value: Option<f64>,
}

impl Observation {
    /// Creates an observation without a provider country label.
    #[must_use]
    pub fn new(country: impl Into<String>, period: impl Into<String>, value: Option<f64>) -> Self {
        Self {
            country: country.into(),
            country_label: None,
            period: period.into(),
            value,
        }
    }

    /// Attaches the provider's country label.
    #[must_use]
    pub fn with_country_label(mut self, label: impl Into<String>) -> Self {
        self.country_label = Some(label.into());
        self
    }
}

/// A uniform, provider-independent statistical record.
///
/// Fields are private so the invariants hold for every instance: `value` is
/// finite and `date` is a real calendar date.
#[derive(Clone, Debug, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct UniformRecord {
    date: NaiveDate,
    country: String,
    country_name: String,
    indicator_code: IndicatorCode,
    indicator_name: String,
    title: String,
    topic: String,
    sector: String,
    value: f64,
    formatted_value: String,
    compliance_flag: ComplianceFlag,
    source: Source,
    source_url: Option<String>,
}

impl UniformRecord {
    /// Builds a record from a decoded observation.
    ///
    /// Returns `None` when the value is missing or not finite, or the period
    /// does not resolve to a date.
    #[must_use]
    pub fn from_observation(
        indicator: &IndicatorMeta,
        source: Source,
        observation: Observation,
    ) -> Option<Self> {
        let value = observation.value.filter(|v| v.is_finite())?;
        let date = parse_period(&observation.period)?;

        let country_name = if is_known_country(&observation.country) {
            country_name(&observation.country).to_string()
        } else {
            observation
                .country_label
                .unwrap_or_else(|| observation.country.clone())
        };

        Some(Self {
            title: format!("{}: {} {}", indicator.name, country_name, date.year()),
            formatted_value: indicator.format_value(value),
            compliance_flag: indicator.compliance(value),
            indicator_code: indicator.code.clone(),
            indicator_name: indicator.name.clone(),
            topic: indicator.topic.to_string(),
            sector: indicator.sector.to_string(),
            source_url: indicator.source_url.clone(),
            country: observation.country,
            country_name,
            date,
            value,
            source,
        })
    }

    /// Observation date.
    #[must_use]
    pub const fn date(&self) -> NaiveDate {
        self.date
    }

    /// Observation year.
    #[must_use]
    pub fn year(&self) -> i32 {
        self.date.year()
    }

    /// Country or aggregate code.
    #[must_use]
    pub fn country(&self) -> &str {
        &self.country
    }

    /// Country display name.
    #[must_use]
    pub fn country_name(&self) -> &str {
        &self.country_name
    }

    /// Indicator code.
    #[must_use]
    pub const fn indicator_code(&self) -> &IndicatorCode {
        &self.indicator_code
    }

    /// Indicator display name.
    #[must_use]
    pub fn indicator_name(&self) -> &str {
        &self.indicator_name
    }

    /// Display title.
    #[must_use]
    pub fn title(&self) -> &str {
        &self.title
    }

    /// Topic tag.
    #[must_use]
    pub fn topic(&self) -> &str {
        &self.topic
    }

    /// Sector tag.
    #[must_use]
    pub fn sector(&self) -> &str {
        &self.sector
    }

    /// Numeric value, always finite.
    #[must_use]
    pub const fn value(&self) -> f64 {
        self.value
    }

    /// Unit-aware rendering of the value.
    #[must_use]
    pub fn formatted_value(&self) -> &str {
        &self.formatted_value
    }

    /// Compliance flag.
    #[must_use]
    pub const fn compliance_flag(&self) -> ComplianceFlag {
        self.compliance_flag
    }

    /// Provenance tag.
    #[must_use]
    pub const fn source(&self) -> Source {
        self.source
    }

    /// Dataset deep link.
    #[must_use]
    pub fn source_url(&self) -> Option<&str> {
        self.source_url.as_deref()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::Provider;

    fn meta(code: &str) -> IndicatorMeta {
        IndicatorMeta::lookup(Provider::Eurostat, &code.into())
    }

    #[test]
    fn test_from_observation() {
        let record = UniformRecord::from_observation(
            &meta("cei_wm011"),
            Source::Eurostat,
            Observation::new("FI", "2022", Some(0.45)),
        )
        .unwrap();

        assert_eq!(record.date(), NaiveDate::from_ymd_opt(2022, 1, 1).unwrap());
        assert_eq!(record.country_name(), "Finland");
        assert_eq!(record.formatted_value(), "45.0%");
        assert_eq!(record.compliance_flag(), ComplianceFlag::Pending);
        assert_eq!(record.topic(), "waste");
        assert_eq!(record.source(), Source::Eurostat);
        assert!(record.title().contains("Finland"));
    }

    #[test]
    fn test_missing_and_non_finite_values_are_dropped() {
        let m = meta("cei_wm011");
        for value in [None, Some(f64::NAN), Some(f64::INFINITY)] {
            assert!(
                UniformRecord::from_observation(
                    &m,
                    Source::Eurostat,
                    Observation::new("FI", "2022", value)
                )
                .is_none()
            );
        }
    }

    #[test]
    fn test_unparseable_period_is_dropped() {
        let record = UniformRecord::from_observation(
            &meta("cei_wm011"),
            Source::Eurostat,
            Observation::new("FI", "last year", Some(0.5)),
        );
        assert!(record.is_none());
    }

    #[test]
    fn test_country_label_fallback() {
        let record = UniformRecord::from_observation(
            &meta("cei_wm011"),
            Source::Eurostat,
            Observation::new("XK", "2022", Some(0.3)).with_country_label("Kosovo"),
        )
        .unwrap();
        assert_eq!(record.country_name(), "Kosovo");

        let record = UniformRecord::from_observation(
            &meta("cei_wm011"),
            Source::Eurostat,
            Observation::new("ZZ", "2022", Some(0.3)),
        )
        .unwrap();
        assert_eq!(record.country_name(), "ZZ");
    }

    #[test]
    fn test_serializes_camel_case() {
        let record = UniformRecord::from_observation(
            &meta("cei_srm030"),
            Source::Eurostat,
            Observation::new("DE", "2021", Some(13.0)),
        )
        .unwrap();
        let json = serde_json::to_value(&record).unwrap();
        assert_eq!(json["date"], "2021-01-01");
        assert_eq!(json["countryName"], "Germany");
        assert_eq!(json["indicatorCode"], "cei_srm030");
        assert_eq!(json["complianceFlag"], "pending");
        assert_eq!(json["source"], "eurostat");
    }
}
