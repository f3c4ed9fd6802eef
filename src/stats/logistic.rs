//! Logistic Regression Module
//! Maximum-likelihood logistic regression over categorical predictors via
//! iteratively reweighted least squares (IRLS).

use statrs::distribution::{ContinuousCDF, Normal};
use tracing::debug;

use super::ModelError;

const MAX_ITERATIONS: usize = 25;
const LOG_LIK_TOLERANCE: f64 = 1e-8;
/// Coefficient magnitude beyond which the fit is treated as separated.
/// Documented policy: this implementation raises `SeparationDetected` rather
/// than returning inflated standard errors.
const SEPARATION_COEF: f64 = 15.0;
/// Fitted probabilities are clamped away from 0 and 1 to keep the
/// log-likelihood and the IRLS weights finite.
const PROB_EPS: f64 = 1e-10;

/// A fitted logistic model over dummy-encoded categorical predictors.
#[derive(Debug, Clone)]
pub struct LogisticFit {
    /// Term names: `(intercept)` followed by `predictor=level` dummies.
    pub terms: Vec<String>,
    pub coefficients: Vec<f64>,
    pub standard_errors: Vec<f64>,
    /// Two-tailed Wald p-values per term.
    pub p_values: Vec<f64>,
    pub log_likelihood: f64,
    pub iterations: usize,
    /// Per predictor: name and its observed levels, reference level first.
    levels: Vec<(String, Vec<String>)>,
}

impl LogisticFit {
    /// Predicted probability for one observation.
    ///
    /// `values` supplies one level per predictor, in the order the predictors
    /// were given to [`fit_logistic`]. A level not seen during fitting
    /// behaves as the reference level. The result is clamped to the open
    /// interval (0, 1).
    pub fn predict(&self, values: &[&str]) -> f64 {
        let mut eta = self.coefficients[0];
        let mut term = 1;
        for ((_, levels), value) in self.levels.iter().zip(values) {
            for level in &levels[1..] {
                if level == value {
                    eta += self.coefficients[term];
                }
                term += 1;
            }
        }
        sigmoid(eta).clamp(PROB_EPS, 1.0 - PROB_EPS)
    }
}

/// Fit a logistic regression of a binary outcome on categorical predictors.
///
/// Each predictor is dummy-encoded with its first level (sorted) as the
/// reference. Iterates IRLS until the log-likelihood change falls below a
/// fixed tolerance, failing with `NonConvergence` at the iteration cap and
/// with `SeparationDetected` when a coefficient diverges, which happens when
/// a predictor combination perfectly separates the outcomes.
pub fn fit_logistic(
    predictors: &[(String, Vec<String>)],
    outcome: &[u8],
) -> Result<LogisticFit, ModelError> {
    let n = outcome.len();
    for (name, values) in predictors {
        if values.len() != n {
            return Err(ModelError::MismatchedLengths {
                left: values.len(),
                right: n,
            });
        }
        debug!(predictor = name.as_str(), "encoding predictor");
    }
    if n == 0 {
        return Err(ModelError::InsufficientData("no observations".to_string()));
    }
    let ones = outcome.iter().filter(|&&v| v == 1).count();
    if ones == 0 || ones == n {
        return Err(ModelError::InsufficientData(
            "outcome contains a single class".to_string(),
        ));
    }

    let (terms, levels, rows) = encode(predictors, n);
    let p = terms.len();
    if n <= p {
        return Err(ModelError::InsufficientData(format!(
            "{n} observations for {p} model terms"
        )));
    }

    let y: Vec<f64> = outcome.iter().map(|&v| v as f64).collect();
    let mut beta = vec![0.0; p];
    let mut log_lik = f64::NEG_INFINITY;

    for iteration in 1..=MAX_ITERATIONS {
        // Weighted normal equations: (X'WX) beta = X'Wz with the working
        // response z = eta + (y - mu) / w.
        let mut xtwx = vec![vec![0.0; p]; p];
        let mut xtwz = vec![0.0; p];

        for (row, yv) in rows.iter().zip(&y) {
            let eta: f64 = row.iter().zip(&beta).map(|(x, b)| x * b).sum();
            let mu = sigmoid(eta).clamp(PROB_EPS, 1.0 - PROB_EPS);
            let w = mu * (1.0 - mu);
            let z = eta + (yv - mu) / w;

            for j in 0..p {
                for k in j..p {
                    xtwx[j][k] += w * row[j] * row[k];
                }
                xtwz[j] += w * row[j] * z;
            }
        }
        for j in 0..p {
            for k in 0..j {
                xtwx[j][k] = xtwx[k][j];
            }
        }

        beta = solve(xtwx, xtwz).ok_or(ModelError::Singular)?;

        if let Some(j) = beta.iter().position(|b| b.abs() > SEPARATION_COEF) {
            return Err(ModelError::SeparationDetected {
                term: terms[j].clone(),
            });
        }

        let new_log_lik: f64 = rows
            .iter()
            .zip(&y)
            .map(|(row, yv)| {
                let eta: f64 = row.iter().zip(&beta).map(|(x, b)| x * b).sum();
                let mu = sigmoid(eta).clamp(PROB_EPS, 1.0 - PROB_EPS);
                yv * mu.ln() + (1.0 - yv) * (1.0 - mu).ln()
            })
            .sum();

        if (new_log_lik - log_lik).abs() < LOG_LIK_TOLERANCE {
            debug!(iteration, log_lik = new_log_lik, "irls converged");
            return finish(terms, levels, rows, beta, new_log_lik, iteration);
        }
        log_lik = new_log_lik;
    }

    Err(ModelError::NonConvergence {
        iterations: MAX_ITERATIONS,
    })
}

/// Dummy-encode the predictors: intercept column plus one indicator per
/// non-reference level of each predictor. Constant predictors contribute no
/// terms.
fn encode(
    predictors: &[(String, Vec<String>)],
    n: usize,
) -> (Vec<String>, Vec<(String, Vec<String>)>, Vec<Vec<f64>>) {
    let mut terms = vec!["(intercept)".to_string()];
    let mut levels: Vec<(String, Vec<String>)> = Vec::with_capacity(predictors.len());

    for (name, values) in predictors {
        let mut unique: Vec<String> = values.to_vec();
        unique.sort();
        unique.dedup();
        for level in &unique[1..] {
            terms.push(format!("{name}={level}"));
        }
        levels.push((name.clone(), unique));
    }

    let mut rows: Vec<Vec<f64>> = vec![Vec::with_capacity(terms.len()); n];
    for (i, row) in rows.iter_mut().enumerate() {
        row.push(1.0);
        for ((_, values), (_, unique)) in predictors.iter().zip(&levels) {
            for level in &unique[1..] {
                row.push(if &values[i] == level { 1.0 } else { 0.0 });
            }
        }
    }

    (terms, levels, rows)
}

fn finish(
    terms: Vec<String>,
    levels: Vec<(String, Vec<String>)>,
    rows: Vec<Vec<f64>>,
    beta: Vec<f64>,
    log_likelihood: f64,
    iterations: usize,
) -> Result<LogisticFit, ModelError> {
    let p = terms.len();

    // Observed Fisher information at the fitted coefficients.
    let mut info = vec![vec![0.0; p]; p];
    for row in &rows {
        let eta: f64 = row.iter().zip(&beta).map(|(x, b)| x * b).sum();
        let mu = sigmoid(eta).clamp(PROB_EPS, 1.0 - PROB_EPS);
        let w = mu * (1.0 - mu);
        for j in 0..p {
            for k in 0..p {
                info[j][k] += w * row[j] * row[k];
            }
        }
    }
    let covariance = invert(info).ok_or(ModelError::Singular)?;

    let standard_errors: Vec<f64> = (0..p).map(|j| covariance[j][j].sqrt()).collect();
    let p_values: Vec<f64> = beta
        .iter()
        .zip(&standard_errors)
        .map(|(b, se)| {
            if *se > 0.0 {
                match Normal::new(0.0, 1.0) {
                    Ok(dist) => 2.0 * (1.0 - dist.cdf((b / se).abs())),
                    Err(_) => f64::NAN,
                }
            } else {
                f64::NAN
            }
        })
        .collect();

    Ok(LogisticFit {
        terms,
        coefficients: beta,
        standard_errors,
        p_values,
        log_likelihood,
        iterations,
        levels,
    })
}

fn sigmoid(eta: f64) -> f64 {
    1.0 / (1.0 + (-eta).exp())
}

/// Solve `a x = b` by Gaussian elimination with partial pivoting.
fn solve(mut a: Vec<Vec<f64>>, mut b: Vec<f64>) -> Option<Vec<f64>> {
    let n = b.len();

    for col in 0..n {
        let pivot = (col..n).max_by(|&i, &j| {
            a[i][col]
                .abs()
                .partial_cmp(&a[j][col].abs())
                .unwrap_or(std::cmp::Ordering::Equal)
        })?;
        if a[pivot][col].abs() < 1e-12 {
            return None;
        }
        a.swap(col, pivot);
        b.swap(col, pivot);

        for row in (col + 1)..n {
            let factor = a[row][col] / a[col][col];
            for k in col..n {
                a[row][k] -= factor * a[col][k];
            }
            b[row] -= factor * b[col];
        }
    }

    let mut x = vec![0.0; n];
    for row in (0..n).rev() {
        let mut acc = b[row];
        for k in (row + 1)..n {
            acc -= a[row][k] * x[k];
        }
        x[row] = acc / a[row][row];
    }
    Some(x)
}

/// Invert a symmetric positive-definite matrix by Gauss-Jordan elimination.
fn invert(mut a: Vec<Vec<f64>>) -> Option<Vec<Vec<f64>>> {
    let n = a.len();
    let mut inv = vec![vec![0.0; n]; n];
    for (i, row) in inv.iter_mut().enumerate() {
        row[i] = 1.0;
    }

    for col in 0..n {
        let pivot = (col..n).max_by(|&i, &j| {
            a[i][col]
                .abs()
                .partial_cmp(&a[j][col].abs())
                .unwrap_or(std::cmp::Ordering::Equal)
        })?;
        if a[pivot][col].abs() < 1e-12 {
            return None;
        }
        a.swap(col, pivot);
        inv.swap(col, pivot);

        let divisor = a[col][col];
        for k in 0..n {
            a[col][k] /= divisor;
            inv[col][k] /= divisor;
        }
        for row in 0..n {
            if row != col {
                let factor = a[row][col];
                for k in 0..n {
                    a[row][k] -= factor * a[col][k];
                    inv[row][k] -= factor * inv[col][k];
                }
            }
        }
    }
    Some(inv)
}
