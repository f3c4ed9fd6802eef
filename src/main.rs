//! epitab - Tabular Time-Series Summarization & Simple Regression
//!
//! Batch entrypoint: reads a JSON run configuration, executes the pipeline
//! end to end, and prints the aggregate table and model summary.

use anyhow::{Context, Result};
use std::path::Path;
use tracing_subscriber::EnvFilter;

use epitab::pipeline::ModelSummary;
use epitab::{run, RunConfig};

fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .init();

    let config_path = std::env::args()
        .nth(1)
        .context("usage: epitab <config.json>")?;
    let config = RunConfig::from_path(Path::new(&config_path))?;

    let summary = run(&config).with_context(|| format!("run failed for {config_path}"))?;

    let header: Vec<&str> = summary
        .group_by
        .iter()
        .chain(summary.metrics.iter())
        .map(String::as_str)
        .chain(std::iter::once("count"))
        .collect();
    println!("{}", header.join("\t"));

    for row in &summary.rows {
        let sums: Vec<String> = row.sums.iter().map(|v| format!("{v:.3}")).collect();
        println!("{}\t{}\t{}", row.key.join("\t"), sums.join("\t"), row.count);
    }

    match summary.model {
        None => {}
        Some(ModelSummary::Linear(fit)) => {
            println!();
            println!("linear fit over {} points", fit.n);
            println!(
                "intercept\t{:.6}\t(se {:.6})",
                fit.intercept, fit.intercept_se
            );
            println!(
                "slope\t{:.6}\t(se {:.6}, p {:.4})",
                fit.slope, fit.slope_se, fit.slope_p_value
            );
            println!("r_squared\t{:.6}", fit.r_squared);
        }
        Some(ModelSummary::Logistic(fit)) => {
            println!();
            println!(
                "logistic fit, log-likelihood {:.6} after {} iterations",
                fit.log_likelihood, fit.iterations
            );
            println!("term\tcoefficient\tstd_error\tp_value");
            for (((term, coef), se), p) in fit
                .terms
                .iter()
                .zip(&fit.coefficients)
                .zip(&fit.standard_errors)
                .zip(&fit.p_values)
            {
                println!("{term}\t{coef:.6}\t{se:.6}\t{p:.4}");
            }
        }
    }

    Ok(())
}
