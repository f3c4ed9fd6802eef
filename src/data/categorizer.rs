//! Categorizer Module
//! Maps raw categorical values to coarser buckets via ordered lookup rules.

use polars::prelude::*;
use serde::{Deserialize, Serialize};
use thiserror::Error;

#[derive(Error, Debug)]
pub enum CategorizerError {
    #[error("Polars error: {0}")]
    Polars(#[from] PolarsError),
}

/// Label returned when no rule matches.
pub const FALLBACK_BUCKET: &str = "Other";

/// One bucketing rule: a label and the set of raw values it covers.
///
/// Rules are evaluated in order and the first match wins, so overlapping
/// member sets resolve by position. Incomplete rule lists are expected (the
/// country-to-continent mapping in the source material covers only a short
/// list); broader coverage is a configuration concern.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BucketRule {
    pub label: String,
    pub members: Vec<String>,
}

/// Return the label of the first rule whose member set contains `value`,
/// else the fixed fallback. Deterministic and total.
pub fn bucket<'a>(value: &str, rules: &'a [BucketRule]) -> &'a str {
    rules
        .iter()
        .find(|rule| rule.members.iter().any(|m| m == value))
        .map(|rule| rule.label.as_str())
        .unwrap_or(FALLBACK_BUCKET)
}

/// Map an entire column through the bucket rules, appending the result as
/// `out_column`. Null inputs bucket to the fallback label like any other
/// unmatched value.
pub fn apply_buckets(
    df: &DataFrame,
    column: &str,
    rules: &[BucketRule],
    out_column: &str,
) -> Result<DataFrame, CategorizerError> {
    let raw = df.column(column)?.cast(&DataType::String)?;
    let ca = raw.str()?;

    let labels: Vec<String> = ca
        .into_iter()
        .map(|v| match v {
            Some(s) => bucket(s, rules).to_string(),
            None => FALLBACK_BUCKET.to_string(),
        })
        .collect();

    let mut out = df.clone();
    out.with_column(Column::new(out_column.into(), labels))?;
    Ok(out)
}
