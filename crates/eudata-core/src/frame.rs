//! Tabular view of normalized records.

use chrono::Datelike;
use polars::prelude::*;

use crate::error::{Result, StatsError};
use crate::record::UniformRecord;

/// Days from 0001-01-01 to 1970-01-01.
const UNIX_EPOCH_DAYS_FROM_CE: i32 = 719_163;

/// Converts records into a DataFrame, one row per record, in input order.
///
/// Columns: `date` (Date), `country`, `country_name`, `indicator_code`,
/// `indicator_name`, `topic`, `sector`, `value`, `formatted_value`,
/// `compliance_flag`, `source`.
///
/// # Errors
/// Returns an error if the frame cannot be assembled.
pub fn records_to_frame(records: &[UniformRecord]) -> Result<DataFrame> {
    let dates: Vec<i32> = records
        .iter()
        .map(|r| r.date().num_days_from_ce() - UNIX_EPOCH_DAYS_FROM_CE)
        .collect();
    let values: Vec<f64> = records.iter().map(UniformRecord::value).collect();

    let date_col = Column::new("date".into(), dates)
        .cast(&DataType::Date)
        .map_err(|e| StatsError::Other(e.to_string()))?;

    let df = DataFrame::new(vec![
        date_col,
        text_column("country", records, UniformRecord::country),
        text_column("country_name", records, UniformRecord::country_name),
        text_column("indicator_code", records, |r| r.indicator_code().as_str()),
        text_column("indicator_name", records, UniformRecord::indicator_name),
        text_column("topic", records, UniformRecord::topic),
        text_column("sector", records, UniformRecord::sector),
        Column::new("value".into(), values),
        text_column("formatted_value", records, UniformRecord::formatted_value),
        text_column("compliance_flag", records, |r| r.compliance_flag().as_str()),
        text_column("source", records, |r| r.source().as_str()),
    ])
    .map_err(|e| StatsError::Other(e.to_string()))?;

    Ok(df)
}

fn text_column<'a>(
    name: &str,
    records: &'a [UniformRecord],
    field: impl Fn(&'a UniformRecord) -> &'a str,
) -> Column {
    let values: Vec<&str> = records.iter().map(field).collect();
    Column::new(name.into(), values)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::catalog::IndicatorMeta;
    use crate::record::Observation;
    use crate::types::{Provider, Source};

    #[test]
    fn test_records_to_frame() {
        let meta = IndicatorMeta::lookup(Provider::Eurostat, &"cei_wm011".into());
        let records: Vec<UniformRecord> = [("FI", "2022", 0.45), ("DE", "2023", 0.65)]
            .into_iter()
            .filter_map(|(c, p, v)| {
                let obs = Observation::new(c, p, Some(v));
                UniformRecord::from_observation(&meta, Source::Eurostat, obs)
            })
            .collect();

        let df = records_to_frame(&records).unwrap();
        assert_eq!(df.height(), 2);
        assert_eq!(df.width(), 11);
        assert_eq!(df.column("date").unwrap().dtype(), &DataType::Date);

        let countries = df.column("country").unwrap().str().unwrap();
        assert_eq!(countries.get(1), Some("DE"));
        let values = df.column("value").unwrap().f64().unwrap();
        assert_eq!(values.get(0), Some(0.45));
    }

    #[test]
    fn test_empty_frame() {
        let df = records_to_frame(&[]).unwrap();
        assert_eq!(df.height(), 0);
    }
}
