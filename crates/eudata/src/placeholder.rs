//! Illustrative records substituted when no provider could be reached.
//!
//! Values are synthetic and deterministic. Every series built here carries
//! [`DataOrigin::Placeholder`] so callers can tell it apart from real data.

use eudata_core::{
    DataOrigin, IndicatorMeta, IndicatorRequest, Observation, Provider, UniformRecord, Unit,
};

use crate::client::IndicatorData;

const EUROSTAT_COUNTRIES: &[&str] = &["DE", "FR", "IT", "ES", "FI", "SE"];
const OECD_COUNTRIES: &[&str] = &["DEU", "FRA", "ITA", "ESP", "FIN", "SWE"];
const YEARS: std::ops::RangeInclusive<i32> = 2019..=2023;

/// `(base, step per country, step per year)` on the unit's natural scale.
const fn profile(unit: Unit) -> (f64, f64, f64) {
    match unit {
        Unit::Share => (0.30, 0.05, 0.02),
        Unit::Percent => (30.0, 5.0, 2.0),
        Unit::Tonnes => (1_500_000.0, 250_000.0, -20_000.0),
        Unit::KilogramsPerCapita => (420.0, 35.0, -6.0),
        Unit::MegatonnesCo2e => (45.0, 30.0, -1.5),
        Unit::Unitless => (1.0, 0.25, 0.05),
    }
}

/// Builds a labelled placeholder series for `request`.
///
/// Countries come from the request's `geo` filter when given.
pub(crate) fn series(request: &IndicatorRequest) -> IndicatorData {
    let meta = IndicatorMeta::lookup(request.provider, &request.indicator);
    let source = request.provider.source();
    let (base, per_country, per_year) = profile(meta.unit);

    let countries: Vec<&str> = if request.params.geo.is_empty() {
        match request.provider {
            Provider::Oecd => OECD_COUNTRIES.to_vec(),
            Provider::Eurostat | Provider::EurostatSparql => EUROSTAT_COUNTRIES.to_vec(),
        }
    } else {
        request.params.geo.iter().map(String::as_str).collect()
    };

    let records = countries
        .iter()
        .enumerate()
        .flat_map(|(i, country)| {
            YEARS.map(move |year| {
                let offset = f64::from(year - YEARS.start());
                let value = (i as f64).mul_add(per_country, offset.mul_add(per_year, base));
                Observation::new(*country, year.to_string(), Some(value))
            })
        })
        .filter_map(|obs| UniformRecord::from_observation(&meta, source, obs))
        .collect();

    IndicatorData {
        provider: request.provider,
        indicator: request.indicator.clone(),
        origin: DataOrigin::Placeholder,
        records,
    }
}
