//! Eurostat cube decoding.
//!
//! Observations arrive keyed by a row-major linear index over the dimensions
//! listed in `id`, with extents in `size`. The last dimension varies fastest:
//! for `[freq, unit, geo, time]` with sizes `[s0, s1, s2, s3]`,
//! `time = linear % s3` and `geo = (linear / s3) % s2`.

use crate::error::{Result, StatsError};
use crate::payload::EurostatPayload;
use crate::record::Observation;

/// Dimension order assumed when a payload omits `id`.
const DEFAULT_DIMENSION_ORDER: [&str; 4] = ["freq", "unit", "geo", "time"];

const GEO_IDS: [&str; 2] = ["geo", "REF_AREA"];
const TIME_IDS: [&str; 2] = ["time", "TIME_PERIOD"];

/// Row-major strides for the given dimension sizes.
///
/// Returns `None` if the total cell count overflows `usize`; otherwise
/// `(strides, total)`.
#[must_use]
pub fn row_major_strides(sizes: &[usize]) -> Option<(Vec<usize>, usize)> {
    let mut strides = vec![0; sizes.len()];
    let mut acc: usize = 1;
    for (stride, &size) in strides.iter_mut().zip(sizes).rev() {
        *stride = acc;
        acc = acc.checked_mul(size)?;
    }
    Some((strides, acc))
}

/// Recovers per-dimension positions from a linear index.
///
/// # Errors
/// `Normalization` if `linear` lies outside the cube.
pub fn decompose_linear_index(linear: usize, sizes: &[usize]) -> Result<Vec<usize>> {
    let (strides, total) = row_major_strides(sizes).ok_or_else(|| {
        StatsError::Normalization(format!("dimension sizes {sizes:?} overflow"))
    })?;
    if linear >= total {
        return Err(StatsError::Normalization(format!(
            "linear index {linear} outside cube of {total} cells (sizes {sizes:?})"
        )));
    }
    Ok(strides
        .iter()
        .zip(sizes)
        .map(|(&stride, &size)| (linear / stride) % size)
        .collect())
}

fn position_of(ids: &[String], candidates: &[&str]) -> Result<usize> {
    ids.iter()
        .position(|id| candidates.iter().any(|c| id.eq_ignore_ascii_case(c)))
        .ok_or_else(|| {
            StatsError::Normalization(format!(
                "no `{}` dimension among {ids:?}",
                candidates[0]
            ))
        })
}

pub(super) fn observations(payload: &EurostatPayload) -> Result<Vec<Observation>> {
    let ids: Vec<String> = if payload.id.is_empty() {
        if payload.size.len() != DEFAULT_DIMENSION_ORDER.len() {
            return Err(StatsError::Normalization(format!(
                "payload has no `id` and {} sizes; cannot infer dimension order",
                payload.size.len()
            )));
        }
        DEFAULT_DIMENSION_ORDER.iter().map(|s| (*s).to_string()).collect()
    } else {
        payload.id.clone()
    };

    if ids.len() != payload.size.len() {
        return Err(StatsError::Normalization(format!(
            "dimension-size mismatch: {} ids but {} sizes",
            ids.len(),
            payload.size.len()
        )));
    }

    let geo_pos = position_of(&ids, &GEO_IDS)?;
    let time_pos = position_of(&ids, &TIME_IDS)?;

    let lookup = |pos: usize| -> Result<(Vec<String>, &std::collections::HashMap<String, String>)> {
        let id = &ids[pos];
        let dimension = payload.dimension.get(id).ok_or_else(|| {
            StatsError::Normalization(format!("dimension `{id}` missing from metadata"))
        })?;
        let codes = dimension.category.index.codes_by_position()?;
        if codes.len() != payload.size[pos] {
            return Err(StatsError::Normalization(format!(
                "dimension `{id}` declares size {} but has {} categories",
                payload.size[pos],
                codes.len()
            )));
        }
        Ok((codes, &dimension.category.label))
    };

    let (geo_codes, geo_labels) = lookup(geo_pos)?;
    let (time_codes, _) = lookup(time_pos)?;

    payload
        .value
        .entries()?
        .into_iter()
        .map(|(linear, value)| {
            let positions = decompose_linear_index(linear, &payload.size)?;
            let country = &geo_codes[positions[geo_pos]];
            let mut observation =
                Observation::new(country.clone(), time_codes[positions[time_pos]].clone(), value);
            if let Some(label) = geo_labels.get(country) {
                observation = observation.with_country_label(label.clone());
            }
            Ok(observation)
        })
        .collect()
}
