//! Pipeline Module
//! Wires the components into one end-to-end batch run: load, reshape,
//! bucket, aggregate, and optionally fit a regression.

use chrono::NaiveDate;
use polars::prelude::*;
use thiserror::Error;
use tracing::info;

use crate::config::{ModelConfig, RunConfig};
use crate::data::{
    apply_buckets, flag_to_bool, group_sum, parse_date_column, reshape_wide_to_long, sort_rows,
    to_frame, with_date_parts, AggregateRow, AggregatorError, CategorizerError, DataLoader,
    LoaderError, NormalizerError, ISO_DATE, UNKNOWN_BUCKET,
};
use crate::stats::{fit_linear, fit_logistic, LinearFit, LogisticFit, ModelError};

#[derive(Error, Debug)]
pub enum PipelineError {
    #[error(transparent)]
    Loader(#[from] LoaderError),
    #[error(transparent)]
    Normalizer(#[from] NormalizerError),
    #[error(transparent)]
    Aggregator(#[from] AggregatorError),
    #[error(transparent)]
    Categorizer(#[from] CategorizerError),
    #[error(transparent)]
    Model(#[from] ModelError),
    #[error("Polars error: {0}")]
    Polars(#[from] PolarsError),
    #[error("Outcome column '{column}' row {row} is not binary")]
    NonBinaryOutcome { column: String, row: usize },
    #[error("Column '{column}' is neither numeric nor an ISO date")]
    NonNumericPredictor { column: String },
}

/// The fitted model of a run, when one was configured.
#[derive(Debug, Clone)]
pub enum ModelSummary {
    Linear(LinearFit),
    Logistic(LogisticFit),
}

/// Everything a reporting layer needs from one run: sorted aggregate rows
/// and the optional fitted model. Discarded at process end; nothing
/// persists between runs.
#[derive(Debug)]
pub struct RunSummary {
    pub group_by: Vec<String>,
    pub metrics: Vec<String>,
    pub rows: Vec<AggregateRow>,
    pub model: Option<ModelSummary>,
}

/// Execute one configured run end to end.
///
/// Single-threaded and single-pass; every failure aborts the run and
/// surfaces to the caller. There are no retries.
pub fn run(config: &RunConfig) -> Result<RunSummary, PipelineError> {
    let mut loader = DataLoader::new();
    let source = config.source.to_string_lossy();
    let mut df = loader
        .load_csv_with_schema(&source, &config.required_columns)?
        .clone();

    if let Some(reshape) = &config.reshape {
        df = reshape_wide_to_long(&df, &reshape.id_columns, &reshape.date_format)?;
        info!(rows = df.height(), "reshaped to long form");
    }

    if let Some(date) = &config.date {
        df = parse_date_column(&df, &date.column, &date.format)?;
        if date.derive_parts {
            df = with_date_parts(&df, &date.column)?;
        }
    }

    if let Some(category) = &config.category {
        df = apply_buckets(&df, &category.column, &category.rules, &category.out_column)?;
    }

    let mut rows = group_sum(&df, &config.group_by_columns, &config.metric_columns)?;
    sort_rows(&mut rows);
    info!(groups = rows.len(), "aggregation complete");

    let model = match &config.model {
        None => None,
        Some(ModelConfig::Linear { x_column, y_column }) => {
            // The linear variant models the aggregated series (e.g. summed
            // cases against elapsed time), not the raw records.
            let agg = to_frame(&rows, &config.group_by_columns, &config.metric_columns)?;
            let x = numeric_series(&agg, x_column)?;
            let y = numeric_series(&agg, y_column)?;
            Some(ModelSummary::Linear(fit_linear(&x, &y)?))
        }
        Some(ModelConfig::Logistic {
            predictor_columns,
            outcome_column,
        }) => {
            // The logistic variant models record-level binary outcomes.
            let predictors = predictor_columns
                .iter()
                .map(|c| Ok((c.clone(), string_series(&df, c)?)))
                .collect::<Result<Vec<_>, PipelineError>>()?;
            let outcome = binary_series(&df, outcome_column)?;
            Some(ModelSummary::Logistic(fit_logistic(&predictors, &outcome)?))
        }
    };

    Ok(RunSummary {
        group_by: config.group_by_columns.clone(),
        metrics: config.metric_columns.clone(),
        rows,
        model,
    })
}

/// Extract a column as f64 values. String columns holding ISO dates become
/// elapsed days since the earliest date, so a date key can serve directly as
/// the regression's time axis.
fn numeric_series(df: &DataFrame, column: &str) -> Result<Vec<f64>, PipelineError> {
    let col = df.column(column)?;

    if matches!(col.dtype(), DataType::String) {
        let ca = col.str()?;
        let raw: Vec<&str> = ca.into_iter().map(|v| v.unwrap_or("")).collect();

        let dates: Option<Vec<NaiveDate>> = raw
            .iter()
            .map(|s| NaiveDate::parse_from_str(s, ISO_DATE).ok())
            .collect();
        if let Some(dates) = dates {
            let start = dates
                .iter()
                .min()
                .copied()
                .ok_or_else(|| ModelError::InsufficientData("no observations".to_string()))?;
            return Ok(dates.iter().map(|d| (*d - start).num_days() as f64).collect());
        }

        let floats: Option<Vec<f64>> = raw.iter().map(|s| s.trim().parse().ok()).collect();
        return floats.ok_or_else(|| PipelineError::NonNumericPredictor {
            column: column.to_string(),
        });
    }

    let cast = col.cast(&DataType::Float64)?;
    let ca = cast.f64()?;
    Ok(ca.into_iter().map(|v| v.unwrap_or(f64::NAN)).collect())
}

/// Extract a column as categorical string values; nulls become the unknown
/// bucket so sparse demographic fields stay in the model.
fn string_series(df: &DataFrame, column: &str) -> Result<Vec<String>, PipelineError> {
    let cast = df.column(column)?.cast(&DataType::String)?;
    let ca = cast.str()?;
    Ok(ca
        .into_iter()
        .map(|v| v.unwrap_or(UNKNOWN_BUCKET).to_string())
        .collect())
}

/// Extract a binary outcome column. Accepts 0/1 numerics, booleans, and
/// Y/N-style flags; anything else aborts with the offending row index.
fn binary_series(df: &DataFrame, column: &str) -> Result<Vec<u8>, PipelineError> {
    let col = df.column(column)?;
    let mut outcome = Vec::with_capacity(df.height());

    for row in 0..df.height() {
        let value = col.get(row)?;
        let bit = match value {
            AnyValue::Boolean(b) => Some(u8::from(b)),
            AnyValue::Null => None,
            other => {
                let rendered = other.to_string().trim_matches('"').to_string();
                match rendered.trim() {
                    "0" | "0.0" => Some(0),
                    "1" | "1.0" => Some(1),
                    s => flag_to_bool(Some(s)).map(u8::from),
                }
            }
        };
        match bit {
            Some(b) => outcome.push(b),
            None => {
                return Err(PipelineError::NonBinaryOutcome {
                    column: column.to_string(),
                    row,
                })
            }
        }
    }
    Ok(outcome)
}
