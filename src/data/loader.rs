//! CSV Data Loader Module
//! Handles CSV file loading and schema validation using Polars.

use polars::prelude::*;
use thiserror::Error;
use tracing::{debug, info};

#[derive(Error, Debug)]
pub enum LoaderError {
    #[error("Source unavailable '{path}': {source}")]
    SourceUnavailable {
        path: String,
        #[source]
        source: PolarsError,
    },
    #[error("Schema mismatch: missing columns {missing:?}")]
    SchemaMismatch { missing: Vec<String> },
}

/// Handles CSV file loading with Polars.
pub struct DataLoader {
    df: Option<DataFrame>,
}

impl Default for DataLoader {
    fn default() -> Self {
        Self::new()
    }
}

impl DataLoader {
    pub fn new() -> Self {
        Self { df: None }
    }

    /// Load a CSV file using Polars, replacing any previously loaded data.
    ///
    /// Fails with `SourceUnavailable` when the file cannot be read or parsed.
    /// There are no retries; a failed load aborts the run.
    pub fn load_csv(&mut self, file_path: &str) -> Result<&DataFrame, LoaderError> {
        // Use lazy evaluation for memory efficiency, then collect
        let df = LazyCsvReader::new(file_path)
            .with_infer_schema_length(Some(10000))
            .finish()
            .and_then(|lf| lf.collect())
            .map_err(|source| LoaderError::SourceUnavailable {
                path: file_path.to_string(),
                source,
            })?;

        info!(path = file_path, rows = df.height(), "loaded csv");
        Ok(self.df.insert(df))
    }

    /// Load a CSV file and verify that every column in `required` is present.
    pub fn load_csv_with_schema(
        &mut self,
        file_path: &str,
        required: &[String],
    ) -> Result<&DataFrame, LoaderError> {
        let df = self.load_csv(file_path)?;
        require_columns(df, required)?;
        Ok(df)
    }

    /// Get list of column names from loaded DataFrame.
    pub fn get_columns(&self) -> Vec<String> {
        self.df
            .as_ref()
            .map(|df| {
                df.get_column_names()
                    .iter()
                    .map(|s| s.to_string())
                    .collect()
            })
            .unwrap_or_default()
    }
}

/// Check that `df` contains every column in `required`.
pub fn require_columns(df: &DataFrame, required: &[String]) -> Result<(), LoaderError> {
    let present: Vec<String> = df
        .get_column_names()
        .iter()
        .map(|s| s.to_string())
        .collect();

    let missing: Vec<String> = required
        .iter()
        .filter(|c| !present.contains(c))
        .cloned()
        .collect();

    if missing.is_empty() {
        debug!(columns = present.len(), "schema check passed");
        Ok(())
    } else {
        Err(LoaderError::SchemaMismatch { missing })
    }
}
