//! OECD SDMX-JSON decoding.
//!
//! Keys are colon-delimited positions into the structure's dimension lists.
//! The area and time dimensions are located by id rather than by a fixed key
//! position, since OECD datasets order their dimensions differently.

use serde_json::Value;

use crate::error::{Result, StatsError};
use crate::payload::{OecdDimension, OecdPayload};
use crate::record::Observation;

const AREA_IDS: [&str; 4] = ["REF_AREA", "COUNTRY", "LOCATION", "COU"];
const TIME_IDS: [&str; 3] = ["TIME_PERIOD", "TIME", "YEAR"];

/// Where a dimension lives in the composite key.
#[derive(Clone, Copy, Debug)]
enum Slot {
    Series(usize),
    Observation(usize),
}

struct Layout<'a> {
    series: &'a [OecdDimension],
    observation: &'a [OecdDimension],
    area: Slot,
    time: Slot,
}

impl<'a> Layout<'a> {
    fn new(payload: &'a OecdPayload) -> Result<Self> {
        let dims = &payload.structure.dimensions;
        let locate = |candidates: &[&str]| -> Result<Slot> {
            let matches =
                |d: &OecdDimension| candidates.iter().any(|c| d.id.eq_ignore_ascii_case(c));
            dims.observation
                .iter()
                .position(matches)
                .map(Slot::Observation)
                .or_else(|| dims.series.iter().position(matches).map(Slot::Series))
                .ok_or_else(|| {
                    StatsError::Normalization(format!(
                        "OECD structure has no `{}` dimension",
                        candidates[0]
                    ))
                })
        };
        Ok(Self {
            series: &dims.series,
            observation: &dims.observation,
            area: locate(&AREA_IDS[..])?,
            time: locate(&TIME_IDS[..])?,
        })
    }

    fn resolve(
        &self,
        slot: Slot,
        series_key: &[usize],
        obs_key: &[usize],
    ) -> Result<(String, Option<String>)> {
        let (dims, key, position) = match slot {
            Slot::Series(p) => (self.series, series_key, p),
            Slot::Observation(p) => (self.observation, obs_key, p),
        };
        let index = *key.get(position).ok_or_else(|| {
            StatsError::Normalization(format!(
                "key {key:?} is too short for dimension position {position}"
            ))
        })?;
        let dimension = &dims[position];
        let value = dimension.values.get(index).ok_or_else(|| {
            StatsError::Normalization(format!(
                "dimension `{}` has no value at position {index}",
                dimension.id
            ))
        })?;
        Ok((value.id.clone(), value.name.clone()))
    }
}

fn parse_key(key: &str) -> Result<Vec<usize>> {
    if key.is_empty() {
        return Ok(Vec::new());
    }
    key.split(':')
        .map(|part| {
            part.parse::<usize>().map_err(|_| {
                StatsError::Normalization(format!("malformed SDMX key `{key}`"))
            })
        })
        .collect()
}

/// First element of an observation array; anything non-numeric is missing.
fn observation_value(cells: &[Value]) -> Option<f64> {
    match cells.first()? {
        Value::Number(n) => n.as_f64(),
        Value::String(s) => s.trim().parse().ok(),
        _ => None,
    }
}

pub(super) fn observations(payload: &OecdPayload) -> Result<Vec<Observation>> {
    let Some(data_set) = payload.data_sets.first() else {
        return Ok(Vec::new());
    };
    let layout = Layout::new(payload)?;

    let mut out = Vec::new();
    let mut push = |series_key: &[usize], obs_key: &str, cells: &[Value]| -> Result<()> {
        let obs_key = parse_key(obs_key)?;
        let (country, label) = layout.resolve(layout.area, series_key, &obs_key)?;
        let (period, _) = layout.resolve(layout.time, series_key, &obs_key)?;
        let mut observation = Observation::new(country, period, observation_value(cells));
        if let Some(label) = label {
            observation = observation.with_country_label(label);
        }
        out.push(observation);
        Ok(())
    };

    for (key, cells) in &data_set.observations {
        push(&[], key, cells)?;
    }
    for (series_key, series) in &data_set.series {
        let series_key = parse_key(series_key)?;
        for (key, cells) in &series.observations {
            push(&series_key, key, cells)?;
        }
    }
    Ok(out)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::IndicatorCode;
    use serde_json::json;

    fn parse(body: Value) -> OecdPayload {
        OecdPayload::from_json(body, &IndicatorCode::new("AIR_GHG")).unwrap()
    }

    #[test]
    fn test_flat_observations_resolve_by_dimension_id() {
        let payload = parse(json!({
            "dataSets": [{
                "observations": {
                    "0:0:0": [512.3, 0],
                    "0:1:0": [498.7, 0],
                    "1:0:0": [45.1, null]
                }
            }],
            "structure": {"dimensions": {"observation": [
                {"id": "COU", "values": [{"id": "DEU", "name": "Germany"}, {"id": "FIN", "name": "Finland"}]},
                {"id": "YEAR", "values": [{"id": "2021"}, {"id": "2022"}]},
                {"id": "VAR", "values": [{"id": "TOTAL"}]}
            ]}}
        }));

        let obs = observations(&payload).unwrap();
        let triples: Vec<(&str, &str, Option<f64>)> = obs
            .iter()
            .map(|o| (o.country.as_str(), o.period.as_str(), o.value))
            .collect();
        assert_eq!(
            triples,
            vec![
                ("DEU", "2021", Some(512.3)),
                ("DEU", "2022", Some(498.7)),
                ("FIN", "2021", Some(45.1)),
            ]
        );
        assert_eq!(obs[0].country_label.as_deref(), Some("Germany"));
    }

    #[test]
    fn test_time_dimension_first() {
        let payload = parse(json!({
            "dataSets": [{"observations": {"1:0": [3.0]}}],
            "structure": {"dimensions": {"observation": [
                {"id": "TIME_PERIOD", "values": [{"id": "2019"}, {"id": "2020"}]},
                {"id": "REF_AREA", "values": [{"id": "SWE"}]}
            ]}}
        }));
        let obs = observations(&payload).unwrap();
        assert_eq!(obs[0].country, "SWE");
        assert_eq!(obs[0].period, "2020");
    }

    #[test]
    fn test_series_keyed_observations() {
        let payload = parse(json!({
            "dataSets": [{"series": {
                "0:1": {"observations": {"0": [10.0], "1": [11.0]}}
            }}],
            "structure": {"dimensions": {
                "series": [
                    {"id": "MEASURE", "values": [{"id": "T"}]},
                    {"id": "LOCATION", "values": [{"id": "AUT"}, {"id": "BEL"}]}
                ],
                "observation": [
                    {"id": "TIME_PERIOD", "values": [{"id": "2021"}, {"id": "2022"}]}
                ]
            }}
        }));
        let obs = observations(&payload).unwrap();
        assert_eq!(obs.len(), 2);
        assert!(obs.iter().all(|o| o.country == "BEL"));
        assert_eq!(obs[1].period, "2022");
        assert_eq!(obs[1].value, Some(11.0));
    }

    #[test]
    fn test_missing_area_dimension_is_error() {
        let payload = parse(json!({
            "dataSets": [{"observations": {"0": [1.0]}}],
            "structure": {"dimensions": {"observation": [
                {"id": "TIME_PERIOD", "values": [{"id": "2020"}]}
            ]}}
        }));
        assert!(matches!(
            observations(&payload),
            Err(StatsError::Normalization(_))
        ));
    }

    #[test]
    fn test_out_of_range_key_is_error() {
        let payload = parse(json!({
            "dataSets": [{"observations": {"0:5": [1.0]}}],
            "structure": {"dimensions": {"observation": [
                {"id": "REF_AREA", "values": [{"id": "FIN"}]},
                {"id": "TIME_PERIOD", "values": [{"id": "2020"}]}
            ]}}
        }));
        assert!(observations(&payload).is_err());
    }
}
