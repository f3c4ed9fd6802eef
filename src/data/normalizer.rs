//! Data Normalizer Module
//! Reshapes wide time-series columns into long/tidy form and derives
//! standard fields (parsed dates, year/month, boolean flags).

use chrono::{Datelike, NaiveDate};
use polars::prelude::*;
use thiserror::Error;
use tracing::debug;

/// Canonical date rendering used for all derived date columns.
pub const ISO_DATE: &str = "%Y-%m-%d";

#[derive(Error, Debug)]
pub enum NormalizerError {
    #[error("Polars error: {0}")]
    Polars(#[from] PolarsError),
    #[error("Date parse failure in column '{column}' row {row}: '{value}'")]
    DateParse {
        column: String,
        row: usize,
        value: String,
    },
    #[error("No wide date columns matched format '{format}'")]
    NoDateColumns { format: String },
}

/// Transform wide date-per-column data to long format.
///
/// Every column outside `id_columns` whose *name* parses as a date under
/// `date_format` becomes a value column; each input row emits one output row
/// per matched column. Output columns: `[id_columns..., "date", "value"]`,
/// with dates re-rendered in ISO form. Null metric cells are kept as nulls so
/// downstream sums see them explicitly rather than as silently dropped rows.
/// The value cast is non-strict: a non-numeric cell inside a matched date
/// column also becomes a null (zero contribution to sums), unlike an
/// unparseable date, which aborts the run.
pub fn reshape_wide_to_long(
    df: &DataFrame,
    id_columns: &[String],
    date_format: &str,
) -> Result<DataFrame, NormalizerError> {
    // Columns whose names parse as dates are the value columns; anything
    // else outside the id set (coordinates, codes) is ignored.
    let date_cols: Vec<(String, NaiveDate)> = df
        .get_column_names()
        .iter()
        .map(|s| s.to_string())
        .filter(|name| !id_columns.contains(name))
        .filter_map(|name| {
            NaiveDate::parse_from_str(&name, date_format)
                .ok()
                .map(|d| (name, d))
        })
        .collect();

    if date_cols.is_empty() {
        return Err(NormalizerError::NoDateColumns {
            format: date_format.to_string(),
        });
    }
    debug!(matched = date_cols.len(), "wide date columns matched");

    let height = df.height();
    let mut ids: Vec<Vec<Option<String>>> = vec![Vec::new(); id_columns.len()];
    let mut dates: Vec<String> = Vec::new();
    let mut values: Vec<Option<f64>> = Vec::new();

    let id_series: Vec<&Column> = id_columns
        .iter()
        .map(|c| df.column(c))
        .collect::<Result<_, _>>()?;

    for (col_name, date) in &date_cols {
        let value_f64 = df.column(col_name)?.cast(&DataType::Float64)?;
        let value_ca = value_f64.f64()?;
        let iso = date.format(ISO_DATE).to_string();

        for i in 0..height {
            for (slot, series) in ids.iter_mut().zip(&id_series) {
                let v = series.get(i)?;
                if v.is_null() {
                    slot.push(None);
                } else {
                    slot.push(Some(v.to_string().trim_matches('"').to_string()));
                }
            }
            dates.push(iso.clone());
            values.push(value_ca.get(i));
        }
    }

    let mut columns: Vec<Column> = id_columns
        .iter()
        .zip(ids)
        .map(|(name, vals)| Column::new(name.as_str().into(), vals))
        .collect();
    columns.push(Column::new("date".into(), dates));
    columns.push(Column::new("value".into(), values));

    Ok(DataFrame::new(columns)?)
}

/// Parse a string date column in place, re-rendering values in ISO form.
///
/// Unparseable values abort the run rather than dropping the row; a dropped
/// row would corrupt downstream sums. Nulls pass through untouched.
pub fn parse_date_column(
    df: &DataFrame,
    column: &str,
    date_format: &str,
) -> Result<DataFrame, NormalizerError> {
    let raw = df.column(column)?.cast(&DataType::String)?;
    let ca = raw.str()?;

    let mut parsed: Vec<Option<String>> = Vec::with_capacity(df.height());
    for (row, value) in ca.into_iter().enumerate() {
        match value {
            None => parsed.push(None),
            Some(s) => {
                let date = NaiveDate::parse_from_str(s.trim(), date_format).map_err(|_| {
                    NormalizerError::DateParse {
                        column: column.to_string(),
                        row,
                        value: s.to_string(),
                    }
                })?;
                parsed.push(Some(date.format(ISO_DATE).to_string()));
            }
        }
    }

    let mut out = df.clone();
    out.with_column(Column::new(column.into(), parsed))?;
    Ok(out)
}

/// Derive `year` and `month` columns from an ISO date column.
pub fn with_date_parts(df: &DataFrame, date_column: &str) -> Result<DataFrame, NormalizerError> {
    let raw = df.column(date_column)?.cast(&DataType::String)?;
    let ca = raw.str()?;

    let mut years: Vec<Option<i32>> = Vec::with_capacity(df.height());
    let mut months: Vec<Option<i32>> = Vec::with_capacity(df.height());
    for (row, value) in ca.into_iter().enumerate() {
        match value {
            None => {
                years.push(None);
                months.push(None);
            }
            Some(s) => {
                let date = NaiveDate::parse_from_str(s, ISO_DATE).map_err(|_| {
                    NormalizerError::DateParse {
                        column: date_column.to_string(),
                        row,
                        value: s.to_string(),
                    }
                })?;
                years.push(Some(date.year()));
                months.push(Some(date.month() as i32));
            }
        }
    }

    let mut out = df.clone();
    out.with_column(Column::new("year".into(), years))?;
    out.with_column(Column::new("month".into(), months))?;
    Ok(out)
}

/// Map a raw flag value to a boolean, or `None` when absent or unrecognized.
///
/// Total by construction: optional demographic flags are frequently missing
/// in real datasets, so an unknown marker is returned instead of an error.
pub fn flag_to_bool(value: Option<&str>) -> Option<bool> {
    match value?.trim().to_ascii_uppercase().as_str() {
        "Y" | "YES" | "TRUE" | "1" => Some(true),
        "N" | "NO" | "FALSE" | "0" => Some(false),
        _ => None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn wide_frame() -> DataFrame {
        DataFrame::new(vec![
            Column::new("region".into(), vec!["North", "South"]),
            Column::new("1/22/20".into(), vec![1.0, 4.0]),
            Column::new("1/23/20".into(), vec![2.0, 5.0]),
        ])
        .unwrap()
    }

    #[test]
    fn reshape_emits_one_row_per_entity_date() {
        let long = reshape_wide_to_long(&wide_frame(), &["region".to_string()], "%m/%d/%y").unwrap();
        assert_eq!(long.height(), 4);
        assert_eq!(
            long.get_column_names()
                .iter()
                .map(|s| s.to_string())
                .collect::<Vec<_>>(),
            vec!["region", "date", "value"]
        );

        let dates = long.column("date").unwrap();
        assert_eq!(
            dates.get(0).unwrap().to_string().trim_matches('"'),
            "2020-01-22"
        );
    }

    #[test]
    fn reshape_round_trips_to_wide_form() {
        let wide = wide_frame();
        let long = reshape_wide_to_long(&wide, &["region".to_string()], "%m/%d/%y").unwrap();

        // Re-pivot by scanning the long rows back into (region, date) cells.
        let regions = long.column("region").unwrap();
        let dates = long.column("date").unwrap();
        let values = long.column("value").unwrap().f64().unwrap();

        let mut cells = std::collections::HashMap::new();
        for i in 0..long.height() {
            let r = regions.get(i).unwrap().to_string().trim_matches('"').to_string();
            let d = dates.get(i).unwrap().to_string().trim_matches('"').to_string();
            cells.insert((r, d), values.get(i).unwrap());
        }

        for (region, day, expected) in [
            ("North", "2020-01-22", 1.0),
            ("North", "2020-01-23", 2.0),
            ("South", "2020-01-22", 4.0),
            ("South", "2020-01-23", 5.0),
        ] {
            assert_eq!(cells[&(region.to_string(), day.to_string())], expected);
        }
    }

    #[test]
    fn non_numeric_metric_cells_become_nulls() {
        let df = DataFrame::new(vec![
            Column::new("region".into(), vec!["North", "South"]),
            Column::new("1/22/20".into(), vec!["7", "n/a"]),
        ])
        .unwrap();
        let long = reshape_wide_to_long(&df, &["region".to_string()], "%m/%d/%y").unwrap();
        let values = long.column("value").unwrap().f64().unwrap();
        assert_eq!(values.get(0), Some(7.0));
        assert_eq!(values.get(1), None);
    }

    #[test]
    fn reshape_without_matching_columns_fails() {
        let df = DataFrame::new(vec![
            Column::new("region".into(), vec!["North"]),
            Column::new("lat".into(), vec![51.5]),
        ])
        .unwrap();
        let err = reshape_wide_to_long(&df, &["region".to_string()], "%m/%d/%y").unwrap_err();
        assert!(matches!(err, NormalizerError::NoDateColumns { .. }));
    }

    #[test]
    fn unparseable_date_value_reports_column_and_row() {
        let df = DataFrame::new(vec![Column::new(
            "occurred".into(),
            vec!["3/14/20", "not-a-date"],
        )])
        .unwrap();
        let err = parse_date_column(&df, "occurred", "%m/%d/%y").unwrap_err();
        match err {
            NormalizerError::DateParse { column, row, value } => {
                assert_eq!(column, "occurred");
                assert_eq!(row, 1);
                assert_eq!(value, "not-a-date");
            }
            other => panic!("expected DateParse, got {other:?}"),
        }
    }

    #[test]
    fn date_parts_are_derived_from_iso_dates() {
        let df = DataFrame::new(vec![Column::new(
            "date".into(),
            vec![Some("2020-03-14"), None],
        )])
        .unwrap();
        let out = with_date_parts(&df, "date").unwrap();
        let years = out.column("year").unwrap().i32().unwrap();
        let months = out.column("month").unwrap().i32().unwrap();
        assert_eq!(years.get(0), Some(2020));
        assert_eq!(months.get(0), Some(3));
        assert_eq!(years.get(1), None);
    }

    #[test]
    fn flags_map_to_booleans_or_unknown() {
        assert_eq!(flag_to_bool(Some("Y")), Some(true));
        assert_eq!(flag_to_bool(Some("n")), Some(false));
        assert_eq!(flag_to_bool(Some(" TRUE ")), Some(true));
        assert_eq!(flag_to_bool(Some("unknown")), None);
        assert_eq!(flag_to_bool(None), None);
    }
}
