//! Statistics module - linear and logistic regression fitting

mod linear;
mod logistic;

pub use linear::{fit_linear, LinearFit};
pub use logistic::{fit_logistic, LogisticFit};

use thiserror::Error;

#[derive(Error, Debug)]
pub enum ModelError {
    #[error("Insufficient data: {0}")]
    InsufficientData(String),
    #[error("Predictor and outcome lengths differ ({left} vs {right})")]
    MismatchedLengths { left: usize, right: usize },
    #[error("Did not converge after {iterations} iterations")]
    NonConvergence { iterations: usize },
    #[error("Perfect separation detected on term '{term}'")]
    SeparationDetected { term: String },
    #[error("Normal equations are singular (collinear predictors)")]
    Singular,
}
