//! SPARQL query templates.
//!
//! Identifiers interpolated into queries are restricted to a safe character
//! set and free text is escaped as a SPARQL string literal, so caller input
//! can never change the shape of a query.

use eudata_core::{IndicatorCode, QueryParams, Result, StatsError};

/// Base IRI of Eurostat linked-data datasets.
pub const EUROSTAT_DATASET_BASE: &str = "http://data.europa.eu/eurostat/id/dataset/";

/// EuroVoc concept scheme IRI.
pub const EUROVOC_SCHEME: &str = "http://eurovoc.europa.eu/100141";

/// Default row limit for search queries.
pub const DEFAULT_LIMIT: usize = 50;

fn is_identifier(s: &str) -> bool {
    !s.is_empty()
        && s
            .chars()
            .all(|c| c.is_ascii_alphanumeric() || c == '_' || c == '-')
}

fn identifier<'a>(what: &str, s: &'a str) -> Result<&'a str> {
    if is_identifier(s) {
        Ok(s)
    } else {
        Err(StatsError::InvalidParameter(format!(
            "{what} `{s}` contains characters not allowed in a query"
        )))
    }
}

/// Escapes text as the body of a double-quoted SPARQL literal.
#[must_use]
pub fn escape_literal(text: &str) -> String {
    let mut out = String::with_capacity(text.len());
    for c in text.chars() {
        match c {
            '\\' => out.push_str("\\\\"),
            '"' => out.push_str("\\\""),
            '\n' => out.push_str("\\n"),
            '\r' => out.push_str("\\r"),
            '\t' => out.push_str("\\t"),
            _ => out.push(c),
        }
    }
    out
}

/// Observations of a Eurostat dataset as `?geo ?time ?value` rows.
///
/// `geo` narrows by the local name of the area IRI, `since`/`until` compare
/// the period text.
///
/// # Errors
/// `InvalidParameter` if the code, a geo code or a period contains characters
/// outside `[A-Za-z0-9_-]`.
pub fn observations(
    dataset_base: &str,
    code: &IndicatorCode,
    params: &QueryParams,
) -> Result<String> {
    let code = identifier("indicator", code.as_str())?;

    let mut filters = Vec::new();
    if !params.geo.is_empty() {
        let codes = params
            .geo
            .iter()
            .map(|g| identifier("geo", g).map(|g| format!("\"{g}\"")))
            .collect::<Result<Vec<_>>>()?;
        filters.push(format!("FILTER(?geoCode IN ({}))", codes.join(", ")));
    }
    if let Some(since) = &params.since {
        let since = identifier("period", since)?;
        filters.push(format!("FILTER(STR(?time) >= \"{since}\")"));
    }
    if let Some(until) = &params.until {
        let until = identifier("period", until)?;
        filters.push(format!("FILTER(STR(?time) <= \"{until}\")"));
    }

    Ok(format!(
        r#"PREFIX qb: <http://purl.org/linked-data/cube#>
PREFIX sdmx-dimension: <http://purl.org/linked-data/sdmx/2009/dimension#>
PREFIX sdmx-measure: <http://purl.org/linked-data/sdmx/2009/measure#>
SELECT ?geo ?time ?value WHERE {{
  ?obs qb:dataSet <{dataset_base}{code}> ;
       sdmx-dimension:refArea ?geo ;
       sdmx-dimension:timePeriod ?time ;
       sdmx-measure:obsValue ?value .
  BIND(REPLACE(STR(?geo), "^.*[/#]", "") AS ?geoCode)
  {filters}
}}
ORDER BY ?geoCode ?time"#,
        filters = filters.join("\n  ")
    ))
}

/// EuroVoc concepts whose preferred label contains `text`.
#[must_use]
pub fn eurovoc_label_search(text: &str, lang: &str, limit: usize) -> String {
    let needle = escape_literal(&text.trim().to_lowercase());
    let lang = if is_identifier(lang) { lang } else { "en" };
    format!(
        r#"PREFIX skos: <http://www.w3.org/2004/02/skos/core#>
SELECT DISTINCT ?concept ?label WHERE {{
  ?concept skos:inScheme <{EUROVOC_SCHEME}> ;
           skos:prefLabel ?label .
  FILTER(LANG(?label) = "{lang}")
  FILTER(CONTAINS(LCASE(STR(?label)), "{needle}"))
}}
ORDER BY ?label
LIMIT {limit}"#
    )
}

/// EUR-Lex legal acts indexed under a EuroVoc concept, newest first.
///
/// # Errors
/// `InvalidParameter` if `concept_id` is not a bare identifier.
pub fn eurlex_by_concept(concept_id: &str, limit: usize) -> Result<String> {
    let concept = identifier("concept", concept_id)?;
    Ok(format!(
        r#"PREFIX cdm: <http://publications.europa.eu/ontology/cdm#>
SELECT DISTINCT ?work ?celex ?title ?date WHERE {{
  ?work cdm:work_is_about_concept_eurovoc <http://eurovoc.europa.eu/{concept}> ;
        cdm:resource_legal_id_celex ?celex .
  OPTIONAL {{ ?work cdm:work_date_document ?date }}
  OPTIONAL {{
    ?expr cdm:expression_belongs_to_work ?work ;
          cdm:expression_uses_language <http://publications.europa.eu/resource/authority/language/ENG> ;
          cdm:expression_title ?title .
  }}
}}
ORDER BY DESC(?date)
LIMIT {limit}"#
    ))
}
