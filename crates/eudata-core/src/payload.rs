//! Typed provider payloads.
//!
//! Each upstream wire format gets its own serde model. Adapters decode into a
//! [`RawPayload`] variant and hand a [`FetchedPayload`] to the cache and the
//! normalizer; nothing downstream touches untyped JSON.

use std::collections::{BTreeMap, HashMap};

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::error::{Result, StatsError};
use crate::types::{IndicatorCode, Provider};

/// A decoded provider response, tagged by wire format.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(tag = "format", content = "body", rename_all = "lowercase")]
pub enum RawPayload {
    /// Eurostat dissemination API (JSON-stat flavoured SDMX-JSON).
    Eurostat(EurostatPayload),
    /// OECD SDMX-JSON.
    Oecd(OecdPayload),
    /// SPARQL 1.1 query results JSON.
    Sparql(SparqlPayload),
}

impl RawPayload {
    /// Short name of the wire format.
    #[must_use]
    pub const fn format_name(&self) -> &'static str {
        match self {
            Self::Eurostat(_) => "eurostat",
            Self::Oecd(_) => "oecd",
            Self::Sparql(_) => "sparql",
        }
    }
}

/// Where and when a payload was fetched.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct ProviderMeta {
    /// Provider that served the payload.
    pub provider: Provider,
    /// Dataset/indicator that was requested.
    pub dataset: IndicatorCode,
    /// Request URL.
    pub url: String,
    /// Time the response was received.
    pub fetched_at: DateTime<Utc>,
}

impl ProviderMeta {
    /// Creates metadata stamped with the current time.
    #[must_use]
    pub fn now(provider: Provider, dataset: IndicatorCode, url: impl Into<String>) -> Self {
        Self {
            provider,
            dataset,
            url: url.into(),
            fetched_at: Utc::now(),
        }
    }
}

/// The uniform adapter return shape: `{ raw, providerMeta }`.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FetchedPayload {
    /// Decoded response body.
    pub raw: RawPayload,
    /// Request metadata.
    pub provider_meta: ProviderMeta,
}

impl FetchedPayload {
    /// Bundles a payload with its metadata.
    #[must_use]
    pub const fn new(raw: RawPayload, provider_meta: ProviderMeta) -> Self {
        Self { raw, provider_meta }
    }
}

fn empty(provider: Provider, dataset: &IndicatorCode, reason: impl Into<String>) -> StatsError {
    StatsError::EmptyResult {
        provider,
        dataset: dataset.to_string(),
        reason: reason.into(),
    }
}

// ============================================================================
// Eurostat
// ============================================================================

/// Eurostat dataset response.
///
/// The observation cube is flattened: `value` maps a row-major linear index to
/// a number, `id` and `size` give dimension order and extent.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct EurostatPayload {
    /// Dataset title.
    #[serde(default)]
    pub label: Option<String>,
    /// Last update timestamp as sent by Eurostat.
    #[serde(default)]
    pub updated: Option<String>,
    /// Dimension ids in cube order.
    #[serde(default)]
    pub id: Vec<String>,
    /// Dimension sizes in cube order.
    #[serde(default)]
    pub size: Vec<usize>,
    /// Observations by linear index.
    pub value: ObservationValues,
    /// Dimension metadata by id.
    pub dimension: HashMap<String, JsonStatDimension>,
    /// Provider extension block (annotations, positions with data).
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub extension: Option<Value>,
}

impl EurostatPayload {
    /// Decodes a response body, classifying structurally empty bodies.
    ///
    /// # Errors
    /// `EmptyResult` when `value` or `dimension` is missing or there are no
    /// observations; `Normalization` when the fields exist but do not decode.
    pub fn from_json(body: Value, dataset: &IndicatorCode) -> Result<Self> {
        for field in ["value", "dimension"] {
            if body.get(field).is_none_or(Value::is_null) {
                return Err(empty(
                    Provider::Eurostat,
                    dataset,
                    format!("missing expected top-level field `{field}`"),
                ));
            }
        }

        let payload: Self = serde_json::from_value(body)
            .map_err(|e| StatsError::Normalization(format!("Eurostat {dataset}: {e}")))?;

        if payload.value.is_empty() {
            return Err(empty(Provider::Eurostat, dataset, "no observations"));
        }
        Ok(payload)
    }
}

/// Observation values, either sparse (`{"0": 1.2}`) or dense (`[1.2, null]`).
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum ObservationValues {
    /// Linear index (as string) to value.
    Sparse(BTreeMap<String, Option<f64>>),
    /// Value at every linear index.
    Dense(Vec<Option<f64>>),
}

impl ObservationValues {
    /// Number of cells carried, including nulls.
    #[must_use]
    pub fn len(&self) -> usize {
        match self {
            Self::Sparse(map) => map.len(),
            Self::Dense(values) => values.len(),
        }
    }

    /// True when no cell is carried.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Returns `(linear index, value)` pairs in ascending index order.
    ///
    /// # Errors
    /// `Normalization` if a sparse key is not a non-negative integer.
    pub fn entries(&self) -> Result<Vec<(usize, Option<f64>)>> {
        match self {
            Self::Dense(values) => Ok(values.iter().copied().enumerate().collect()),
            Self::Sparse(map) => {
                let mut entries = map
                    .iter()
                    .map(|(key, value)| {
                        key.parse::<usize>()
                            .map(|index| (index, *value))
                            .map_err(|_| {
                                StatsError::Normalization(format!(
                                    "observation key `{key}` is not a linear index"
                                ))
                            })
                    })
                    .collect::<Result<Vec<_>>>()?;
                entries.sort_unstable_by_key(|(index, _)| *index);
                Ok(entries)
            }
        }
    }
}

/// JSON-stat dimension metadata.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct JsonStatDimension {
    /// Dimension title.
    #[serde(default)]
    pub label: Option<String>,
    /// Category index and labels.
    pub category: JsonStatCategory,
}

/// Categories of a dimension.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct JsonStatCategory {
    /// Position of each category code.
    pub index: CategoryIndex,
    /// Category code to label.
    #[serde(default)]
    pub label: HashMap<String, String>,
}

/// A category index, as a code→position map or a positional code list.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum CategoryIndex {
    /// Code to position.
    Map(HashMap<String, usize>),
    /// Codes in position order.
    List(Vec<String>),
}

impl CategoryIndex {
    /// Inverts the index into position order.
    ///
    /// # Errors
    /// `Normalization` if two codes share a position or positions have gaps.
    pub fn codes_by_position(&self) -> Result<Vec<String>> {
        match self {
            Self::List(codes) => Ok(codes.clone()),
            Self::Map(map) => {
                let mut codes = vec![None; map.len()];
                for (code, &position) in map {
                    let slot = codes.get_mut(position).ok_or_else(|| {
                        StatsError::Normalization(format!(
                            "category `{code}` has position {position} outside 0..{}",
                            map.len()
                        ))
                    })?;
                    if slot.replace(code.clone()).is_some() {
                        return Err(StatsError::Normalization(format!(
                            "duplicate category position {position}"
                        )));
                    }
                }
                // Every slot is filled: positions are distinct and < len.
                Ok(codes.into_iter().flatten().collect())
            }
        }
    }
}

// ============================================================================
// OECD
// ============================================================================

/// OECD SDMX-JSON data message.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct OecdPayload {
    /// Data sets; the first one is used.
    #[serde(rename = "dataSets")]
    pub data_sets: Vec<OecdDataSet>,
    /// Structure describing the keys.
    pub structure: OecdStructure,
}

impl OecdPayload {
    /// Decodes a response body, classifying structurally empty bodies.
    ///
    /// # Errors
    /// `EmptyResult` when `dataSets`/`structure` is missing or the first data
    /// set carries no observations; `Normalization` on decode failure.
    pub fn from_json(body: Value, dataset: &IndicatorCode) -> Result<Self> {
        for field in ["dataSets", "structure"] {
            if body.get(field).is_none_or(Value::is_null) {
                return Err(empty(
                    Provider::Oecd,
                    dataset,
                    format!("missing expected top-level field `{field}`"),
                ));
            }
        }

        let payload: Self = serde_json::from_value(body)
            .map_err(|e| StatsError::Normalization(format!("OECD {dataset}: {e}")))?;

        let has_rows = payload.data_sets.first().is_some_and(|ds| {
            !ds.observations.is_empty() || ds.series.values().any(|s| !s.observations.is_empty())
        });
        if !has_rows {
            return Err(empty(Provider::Oecd, dataset, "no observations"));
        }
        Ok(payload)
    }
}

/// One SDMX data set.
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct OecdDataSet {
    /// Flat observations keyed by colon-delimited dimension positions.
    #[serde(default)]
    pub observations: BTreeMap<String, Vec<Value>>,
    /// Series keyed by colon-delimited series-dimension positions.
    #[serde(default)]
    pub series: BTreeMap<String, OecdSeries>,
}

/// Observations of one series.
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct OecdSeries {
    /// Observations keyed by observation-dimension positions.
    #[serde(default)]
    pub observations: BTreeMap<String, Vec<Value>>,
}

/// SDMX structure block.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct OecdStructure {
    /// Dimension lists.
    pub dimensions: OecdDimensions,
}

/// Dimensions attached at series and observation level.
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct OecdDimensions {
    /// Series-level dimensions.
    #[serde(default)]
    pub series: Vec<OecdDimension>,
    /// Observation-level dimensions.
    #[serde(default)]
    pub observation: Vec<OecdDimension>,
}

/// One SDMX dimension.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct OecdDimension {
    /// Dimension id, e.g. `REF_AREA`.
    pub id: String,
    /// Display name.
    #[serde(default)]
    pub name: Option<String>,
    /// Values in key-position order.
    #[serde(default)]
    pub values: Vec<OecdDimensionValue>,
}

/// A coded dimension value.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct OecdDimensionValue {
    /// Code, e.g. `FIN` or `2022`.
    pub id: String,
    /// Display name.
    #[serde(default)]
    pub name: Option<String>,
}

// ============================================================================
// SPARQL
// ============================================================================

/// SPARQL 1.1 query results (JSON).
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct SparqlPayload {
    /// Result header.
    #[serde(default)]
    pub head: SparqlHead,
    /// Solutions.
    pub results: SparqlResults,
}

impl SparqlPayload {
    /// Decodes a response body, classifying empty results.
    ///
    /// # Errors
    /// `EmptyResult` when `results.bindings` is missing or empty;
    /// `Normalization` on decode failure.
    pub fn from_json(body: Value, dataset: &IndicatorCode) -> Result<Self> {
        if body
            .get("results")
            .and_then(|r| r.get("bindings"))
            .is_none_or(Value::is_null)
        {
            return Err(empty(
                Provider::EurostatSparql,
                dataset,
                "missing expected field `results.bindings`",
            ));
        }

        let payload: Self = serde_json::from_value(body)
            .map_err(|e| StatsError::Normalization(format!("SPARQL {dataset}: {e}")))?;

        if payload.results.bindings.is_empty() {
            return Err(empty(Provider::EurostatSparql, dataset, "empty bindings"));
        }
        Ok(payload)
    }
}

/// Result header.
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct SparqlHead {
    /// Projected variable names.
    #[serde(default)]
    pub vars: Vec<String>,
}

/// Solution sequence.
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct SparqlResults {
    /// One map per solution, variable name to bound term.
    pub bindings: Vec<BTreeMap<String, SparqlTerm>>,
}

/// An RDF term bound to a variable.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct SparqlTerm {
    /// `uri`, `literal`, `typed-literal` or `bnode`.
    #[serde(rename = "type")]
    pub kind: String,
    /// Lexical value.
    pub value: String,
    /// Datatype IRI for typed literals.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub datatype: Option<String>,
    /// Language tag.
    #[serde(default, rename = "xml:lang", skip_serializing_if = "Option::is_none")]
    pub lang: Option<String>,
}

impl SparqlTerm {
    /// Last path or fragment segment of a URI, or the literal value itself.
    #[must_use]
    pub fn local_name(&self) -> &str {
        if self.kind == "uri" {
            self.value
                .rsplit(['/', '#'])
                .find(|segment| !segment.is_empty())
                .unwrap_or(&self.value)
        } else {
            &self.value
        }
    }
}
