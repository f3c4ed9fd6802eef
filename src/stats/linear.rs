//! Linear Regression Module
//! Single-variable ordinary least squares with closed-form normal equations.

use statrs::distribution::{ContinuousCDF, StudentsT};
use tracing::debug;

use super::ModelError;

/// A fitted `y = a + b*x` model.
#[derive(Debug, Clone)]
pub struct LinearFit {
    pub intercept: f64,
    pub slope: f64,
    pub intercept_se: f64,
    pub slope_se: f64,
    pub r_squared: f64,
    /// Two-tailed p-value for the slope (t distribution, n-2 df).
    pub slope_p_value: f64,
    pub n: usize,
}

impl LinearFit {
    /// Predicted value at `x`.
    pub fn predict(&self, x: f64) -> f64 {
        self.intercept + self.slope * x
    }
}

/// Fit `y = a + b*x` by ordinary least squares.
///
/// Fails with `InsufficientData` when fewer than 2 distinct x values are
/// supplied; the normal equations are degenerate in that case.
pub fn fit_linear(x: &[f64], y: &[f64]) -> Result<LinearFit, ModelError> {
    if x.len() != y.len() {
        return Err(ModelError::MismatchedLengths {
            left: x.len(),
            right: y.len(),
        });
    }
    let n = x.len();
    if n < 2 {
        return Err(ModelError::InsufficientData(format!(
            "need at least 2 observations, got {n}"
        )));
    }

    let nf = n as f64;
    let x_mean = x.iter().sum::<f64>() / nf;
    let y_mean = y.iter().sum::<f64>() / nf;

    let sxx: f64 = x.iter().map(|v| (v - x_mean).powi(2)).sum();
    let sxy: f64 = x
        .iter()
        .zip(y)
        .map(|(xv, yv)| (xv - x_mean) * (yv - y_mean))
        .sum();

    if sxx == 0.0 {
        return Err(ModelError::InsufficientData(
            "fewer than 2 distinct x values".to_string(),
        ));
    }

    let slope = sxy / sxx;
    let intercept = y_mean - slope * x_mean;

    let sse: f64 = x
        .iter()
        .zip(y)
        .map(|(xv, yv)| (yv - intercept - slope * xv).powi(2))
        .sum();
    let sst: f64 = y.iter().map(|v| (v - y_mean).powi(2)).sum();
    let r_squared = if sst == 0.0 { 1.0 } else { 1.0 - sse / sst };

    // Residual variance needs n > 2; with exactly 2 points the fit is exact
    // and the standard errors are undefined.
    let (slope_se, intercept_se, slope_p_value) = if n > 2 {
        let sigma2 = sse / (nf - 2.0);
        let slope_se = (sigma2 / sxx).sqrt();
        let intercept_se = (sigma2 * (1.0 / nf + x_mean * x_mean / sxx)).sqrt();

        let p = if slope_se > 0.0 {
            match StudentsT::new(0.0, 1.0, nf - 2.0) {
                Ok(dist) => 2.0 * (1.0 - dist.cdf((slope / slope_se).abs())),
                Err(_) => f64::NAN,
            }
        } else {
            // Exact fit: the slope is infinitely many standard errors from 0.
            0.0
        };
        (slope_se, intercept_se, p)
    } else {
        (f64::NAN, f64::NAN, f64::NAN)
    };

    debug!(slope, intercept, r_squared, n, "ols fit complete");

    Ok(LinearFit {
        intercept,
        slope,
        intercept_se,
        slope_se,
        r_squared,
        slope_p_value,
        n,
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn recovers_noiseless_line() {
        let x: Vec<f64> = (0..10).map(|i| i as f64).collect();
        let y: Vec<f64> = x.iter().map(|v| 3.0 + 2.0 * v).collect();

        let fit = fit_linear(&x, &y).unwrap();
        assert!((fit.intercept - 3.0).abs() < 1e-9);
        assert!((fit.slope - 2.0).abs() < 1e-9);
        assert!((fit.r_squared - 1.0).abs() < 1e-9);
        assert!((fit.predict(20.0) - 43.0).abs() < 1e-9);
    }

    #[test]
    fn noisy_fit_has_finite_standard_errors() {
        let x = vec![1.0, 2.0, 3.0, 4.0, 5.0, 6.0];
        let y = vec![2.1, 3.9, 6.2, 7.8, 10.1, 11.9];

        let fit = fit_linear(&x, &y).unwrap();
        assert!((fit.slope - 2.0).abs() < 0.1);
        assert!(fit.slope_se.is_finite() && fit.slope_se > 0.0);
        assert!(fit.intercept_se.is_finite());
        assert!(fit.slope_p_value < 0.001);
        assert!(fit.r_squared > 0.99);
    }

    #[test]
    fn identical_x_values_are_insufficient() {
        let x = vec![4.0, 4.0, 4.0];
        let y = vec![1.0, 2.0, 3.0];
        let err = fit_linear(&x, &y).unwrap_err();
        assert!(matches!(err, ModelError::InsufficientData(_)));
    }

    #[test]
    fn fewer_than_two_points_are_insufficient() {
        assert!(matches!(
            fit_linear(&[1.0], &[1.0]).unwrap_err(),
            ModelError::InsufficientData(_)
        ));
    }

    #[test]
    fn mismatched_lengths_are_rejected() {
        assert!(matches!(
            fit_linear(&[1.0, 2.0], &[1.0]).unwrap_err(),
            ModelError::MismatchedLengths { left: 2, right: 1 }
        ));
    }
}
