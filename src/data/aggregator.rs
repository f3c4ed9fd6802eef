//! Aggregator Module
//! Groups rows by categorical keys and sums metrics per group.

use polars::prelude::*;
use std::collections::HashMap;
use thiserror::Error;
use tracing::debug;

/// Bucket label for rows whose group field is null.
pub const UNKNOWN_BUCKET: &str = "unknown";

#[derive(Error, Debug)]
pub enum AggregatorError {
    #[error("Polars error: {0}")]
    Polars(#[from] PolarsError),
    #[error("group_sum requires at least one group column and one metric column")]
    EmptyGrouping,
}

/// One group key plus summed metrics. Created fresh per run, never mutated
/// after creation.
#[derive(Debug, Clone, PartialEq)]
pub struct AggregateRow {
    /// Ordered tuple of group field values, one per `group_by` column.
    pub key: Vec<String>,
    /// One sum per metric column, in metric-column order.
    pub sums: Vec<f64>,
    /// Number of input rows contributing to this group.
    pub count: usize,
}

/// Partition `df` by the ordered tuple of `group_by` values and sum each
/// metric per partition.
///
/// Output order is unspecified; callers that need determinism must sort
/// explicitly (see [`sort_rows`]). Rows with a null value in a group field
/// land in the `"unknown"` bucket rather than being dropped; null metric
/// cells contribute nothing to the sum.
pub fn group_sum(
    df: &DataFrame,
    group_by: &[String],
    metrics: &[String],
) -> Result<Vec<AggregateRow>, AggregatorError> {
    if group_by.is_empty() || metrics.is_empty() {
        return Err(AggregatorError::EmptyGrouping);
    }

    let key_series: Vec<&Column> = group_by
        .iter()
        .map(|c| df.column(c))
        .collect::<Result<_, _>>()?;

    let metric_f64: Vec<Column> = metrics
        .iter()
        .map(|c| df.column(c).and_then(|s| s.cast(&DataType::Float64)))
        .collect::<Result<_, _>>()?;
    let metric_ca: Vec<&Float64Chunked> = metric_f64
        .iter()
        .map(|c| c.f64())
        .collect::<Result<_, _>>()?;

    let mut groups: HashMap<Vec<String>, (Vec<f64>, usize)> = HashMap::new();

    for i in 0..df.height() {
        let mut key = Vec::with_capacity(group_by.len());
        for series in &key_series {
            let v = series.get(i)?;
            if v.is_null() {
                key.push(UNKNOWN_BUCKET.to_string());
            } else {
                key.push(v.to_string().trim_matches('"').to_string());
            }
        }

        let entry = groups
            .entry(key)
            .or_insert_with(|| (vec![0.0; metrics.len()], 0));
        for (sum, ca) in entry.0.iter_mut().zip(&metric_ca) {
            if let Some(v) = ca.get(i) {
                if !v.is_nan() {
                    *sum += v;
                }
            }
        }
        entry.1 += 1;
    }

    debug!(groups = groups.len(), rows = df.height(), "aggregated");

    Ok(groups
        .into_iter()
        .map(|(key, (sums, count))| AggregateRow { key, sums, count })
        .collect())
}

/// Sort aggregate rows lexicographically by group key, for deterministic
/// downstream consumption.
pub fn sort_rows(rows: &mut [AggregateRow]) {
    rows.sort_by(|a, b| a.key.cmp(&b.key));
}

/// Materialize aggregate rows back into a DataFrame with the original
/// group/metric column names plus a `count` column.
pub fn to_frame(
    rows: &[AggregateRow],
    group_by: &[String],
    metrics: &[String],
) -> Result<DataFrame, AggregatorError> {
    let mut columns: Vec<Column> = Vec::with_capacity(group_by.len() + metrics.len() + 1);

    for (idx, name) in group_by.iter().enumerate() {
        let vals: Vec<String> = rows.iter().map(|r| r.key[idx].clone()).collect();
        columns.push(Column::new(name.as_str().into(), vals));
    }
    for (idx, name) in metrics.iter().enumerate() {
        let vals: Vec<f64> = rows.iter().map(|r| r.sums[idx]).collect();
        columns.push(Column::new(name.as_str().into(), vals));
    }
    let counts: Vec<u32> = rows.iter().map(|r| r.count as u32).collect();
    columns.push(Column::new("count".into(), counts));

    Ok(DataFrame::new(columns)?)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample() -> DataFrame {
        DataFrame::new(vec![
            Column::new("entity".into(), vec!["A", "B", "A"]),
            Column::new(
                "date".into(),
                vec!["2020-01-01", "2020-01-01", "2020-01-02"],
            ),
            Column::new("cases".into(), vec![10i64, 20, 15]),
        ])
        .unwrap()
    }

    fn find<'a>(rows: &'a [AggregateRow], key: &[&str]) -> &'a AggregateRow {
        rows.iter()
            .find(|r| r.key.iter().map(String::as_str).eq(key.iter().copied()))
            .expect("group should exist")
    }

    #[test]
    fn groups_by_entity() {
        let rows = group_sum(&sample(), &["entity".to_string()], &["cases".to_string()]).unwrap();
        assert_eq!(rows.len(), 2);
        assert_eq!(find(&rows, &["A"]).sums, vec![25.0]);
        assert_eq!(find(&rows, &["A"]).count, 2);
        assert_eq!(find(&rows, &["B"]).sums, vec![20.0]);
    }

    #[test]
    fn groups_by_date() {
        let rows = group_sum(&sample(), &["date".to_string()], &["cases".to_string()]).unwrap();
        assert_eq!(rows.len(), 2);
        assert_eq!(find(&rows, &["2020-01-01"]).sums, vec![30.0]);
        assert_eq!(find(&rows, &["2020-01-02"]).sums, vec![15.0]);
    }

    #[test]
    fn sums_are_invariant_under_row_permutation() {
        let df = sample();
        let reversed = df.reverse();

        let mut a = group_sum(&df, &["entity".to_string()], &["cases".to_string()]).unwrap();
        let mut b = group_sum(&reversed, &["entity".to_string()], &["cases".to_string()]).unwrap();
        sort_rows(&mut a);
        sort_rows(&mut b);
        assert_eq!(a, b);
    }

    #[test]
    fn null_group_values_land_in_unknown_bucket() {
        let df = DataFrame::new(vec![
            Column::new("entity".into(), vec![Some("A"), None, None]),
            Column::new("cases".into(), vec![1i64, 2, 3]),
        ])
        .unwrap();
        let rows = group_sum(&df, &["entity".to_string()], &["cases".to_string()]).unwrap();
        assert_eq!(find(&rows, &[UNKNOWN_BUCKET]).sums, vec![5.0]);
        assert_eq!(find(&rows, &[UNKNOWN_BUCKET]).count, 2);
    }

    #[test]
    fn empty_grouping_is_rejected() {
        let err = group_sum(&sample(), &[], &["cases".to_string()]).unwrap_err();
        assert!(matches!(err, AggregatorError::EmptyGrouping));
    }

    #[test]
    fn aggregates_round_trip_into_a_frame() {
        let mut rows =
            group_sum(&sample(), &["entity".to_string()], &["cases".to_string()]).unwrap();
        sort_rows(&mut rows);
        let df = to_frame(&rows, &["entity".to_string()], &["cases".to_string()]).unwrap();
        assert_eq!(df.height(), 2);
        let cases = df.column("cases").unwrap().f64().unwrap();
        assert_eq!(cases.get(0), Some(25.0));
        assert_eq!(cases.get(1), Some(20.0));
    }
}
