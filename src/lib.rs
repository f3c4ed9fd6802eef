//! epitab - Tabular Time-Series Summarization & Simple Regression
//!
//! A small batch-analysis library: load a delimited dataset, reshape wide
//! date columns into long form, bucket categorical values, aggregate metrics
//! per group, and fit a linear or logistic regression over the result.

pub mod config;
pub mod data;
pub mod pipeline;
pub mod stats;

pub use config::RunConfig;
pub use pipeline::{run, RunSummary};
