//! Run Configuration Module
//! Column names and model selection are dataset-specific and supplied by the
//! caller instead of being hard-coded.

use anyhow::Context;
use serde::Deserialize;
use std::path::{Path, PathBuf};

use crate::data::BucketRule;

fn default_date_format() -> String {
    // Month/day/2-digit-year, the layout of the source datasets.
    "%m/%d/%y".to_string()
}

/// Full configuration for one end-to-end run.
#[derive(Debug, Clone, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct RunConfig {
    /// Path to the delimited input file.
    pub source: PathBuf,
    /// Columns that must be present after load; missing ones abort the run.
    #[serde(default)]
    pub required_columns: Vec<String>,
    /// When set, wide date-per-column input is reshaped to long form first.
    #[serde(default)]
    pub reshape: Option<ReshapeConfig>,
    /// When set, a string date column is parsed and optionally expanded into
    /// year/month fields.
    #[serde(default)]
    pub date: Option<DateConfig>,
    /// When set, a categorical column is bucketed through ordered rules.
    #[serde(default)]
    pub category: Option<CategoryConfig>,
    pub group_by_columns: Vec<String>,
    pub metric_columns: Vec<String>,
    /// Optional regression over the prepared data.
    #[serde(default)]
    pub model: Option<ModelConfig>,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct ReshapeConfig {
    /// Columns identifying the entity; everything else whose name parses as
    /// a date under `date_format` is treated as a value column.
    pub id_columns: Vec<String>,
    #[serde(default = "default_date_format")]
    pub date_format: String,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct DateConfig {
    pub column: String,
    #[serde(default = "default_date_format")]
    pub format: String,
    /// Also derive `year` and `month` columns.
    #[serde(default)]
    pub derive_parts: bool,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct CategoryConfig {
    pub column: String,
    pub rules: Vec<BucketRule>,
    pub out_column: String,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ModelConfig {
    /// OLS of a summed metric against a numeric or date-valued column of the
    /// aggregated output.
    Linear { x_column: String, y_column: String },
    /// Logistic regression of a binary outcome on categorical predictors at
    /// the record level.
    Logistic {
        predictor_columns: Vec<String>,
        outcome_column: String,
    },
}

impl RunConfig {
    /// Read a JSON run configuration from disk.
    pub fn from_path(path: &Path) -> anyhow::Result<Self> {
        let text = std::fs::read_to_string(path)
            .with_context(|| format!("reading config {}", path.display()))?;
        let config: RunConfig = serde_json::from_str(&text)
            .with_context(|| format!("parsing config {}", path.display()))?;
        Ok(config)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_a_full_config() {
        let json = r#"{
            "source": "cases.csv",
            "required_columns": ["Country/Region"],
            "reshape": { "id_columns": ["Country/Region"] },
            "category": {
                "column": "Country/Region",
                "rules": [ { "label": "Asia", "members": ["China"] } ],
                "out_column": "continent"
            },
            "group_by_columns": ["continent", "date"],
            "metric_columns": ["value"],
            "model": { "type": "linear", "x_column": "date", "y_column": "value" }
        }"#;

        let config: RunConfig = serde_json::from_str(json).unwrap();
        let reshape = config.reshape.unwrap();
        assert_eq!(reshape.date_format, "%m/%d/%y");
        assert_eq!(config.group_by_columns.len(), 2);
        assert!(matches!(config.model, Some(ModelConfig::Linear { .. })));
    }

    #[test]
    fn model_is_optional() {
        let json = r#"{
            "source": "incidents.csv",
            "group_by_columns": ["borough"],
            "metric_columns": ["count"]
        }"#;
        let config: RunConfig = serde_json::from_str(json).unwrap();
        assert!(config.model.is_none());
        assert!(config.reshape.is_none());
    }

    #[test]
    fn unknown_fields_are_rejected() {
        let json = r#"{
            "source": "a.csv",
            "group_by_columns": [],
            "metric_columns": [],
            "surprise": true
        }"#;
        assert!(serde_json::from_str::<RunConfig>(json).is_err());
    }
}
