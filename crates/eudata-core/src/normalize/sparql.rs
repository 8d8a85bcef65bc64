//! SPARQL result decoding.
//!
//! Observation queries project a geography, a period and a value variable.
//! URI-valued terms are reduced to their local name, so both
//! `<…/geo/FI>` and `"FI"` yield `FI`.

use crate::error::{Result, StatsError};
use crate::payload::SparqlPayload;
use crate::record::Observation;

const GEO_VARS: [&str; 3] = ["geo", "country", "area"];
const TIME_VARS: [&str; 3] = ["time", "period", "year"];
const VALUE_VARS: [&str; 2] = ["value", "obsValue"];
const GEO_LABEL_VARS: [&str; 2] = ["geoLabel", "countryName"];

fn pick<'a>(vars: &[String], candidates: &[&'a str]) -> Option<&'a str> {
    candidates
        .iter()
        .copied()
        .find(|c| vars.iter().any(|v| v == c))
}

pub(super) fn observations(payload: &SparqlPayload) -> Result<Vec<Observation>> {
    let vars = &payload.head.vars;
    let missing = |what: &str| {
        StatsError::Normalization(format!(
            "SPARQL result does not project a {what} variable (vars: {vars:?})"
        ))
    };
    let geo = pick(vars, &GEO_VARS).ok_or_else(|| missing("geography"))?;
    let time = pick(vars, &TIME_VARS).ok_or_else(|| missing("period"))?;
    let value = pick(vars, &VALUE_VARS).ok_or_else(|| missing("value"))?;
    let label = pick(vars, &GEO_LABEL_VARS);

    Ok(payload
        .results
        .bindings
        .iter()
        .filter_map(|row| {
            // Unbound OPTIONAL variables leave gaps; such rows carry no observation.
            let country = row.get(geo)?.local_name().to_string();
            let period = row.get(time)?.local_name().to_string();
            let number = row.get(value).and_then(|t| t.value.trim().parse::<f64>().ok());
            let mut observation = Observation::new(country, period, number);
            if let Some(l) = label.and_then(|l| row.get(l)) {
                observation = observation.with_country_label(l.value.clone());
            }
            Some(observation)
        })
        .collect())
}
