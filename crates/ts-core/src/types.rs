//! Common data types for tstat

use serde::{Deserialize, Serialize};

/// Result of a template-fraction fit.
///
/// Components are kept by name so downstream code does not have to remember
/// the parameter ordering of the fit.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FractionFitResult {
    /// Component names, in fit-parameter order (e.g. `["mc", "qcd"]`).
    pub components: Vec<String>,

    /// Best-fit fractions.
    pub fractions: Vec<f64>,

    /// Fraction uncertainties (sqrt of covariance diagonal).
    pub uncertainties: Vec<f64>,

    /// Covariance matrix (row-major, N×N). `None` if Hessian inversion failed.
    pub covariance: Option<Vec<f64>>,

    /// Negative log-likelihood at minimum
    pub nll: f64,

    /// Convergence status
    pub converged: bool,

    /// Number of function evaluations
    pub n_evaluations: usize,
}

impl FractionFitResult {
    /// Create a new fit result without covariance information.
    pub fn new(
        components: Vec<String>,
        fractions: Vec<f64>,
        uncertainties: Vec<f64>,
        nll: f64,
        converged: bool,
        n_evaluations: usize,
    ) -> Self {
        Self { components, fractions, uncertainties, covariance: None, nll, converged, n_evaluations }
    }

    /// Create a fit result with covariance matrix
    pub fn with_covariance(
        components: Vec<String>,
        fractions: Vec<f64>,
        uncertainties: Vec<f64>,
        covariance: Vec<f64>,
        nll: f64,
        converged: bool,
        n_evaluations: usize,
    ) -> Self {
        Self {
            components,
            fractions,
            uncertainties,
            covariance: Some(covariance),
            nll,
            converged,
            n_evaluations,
        }
    }

    /// Look up a component fraction and its uncertainty by name.
    pub fn fraction(&self, component: &str) -> Option<(f64, f64)> {
        let i = self.components.iter().position(|c| c == component)?;
        Some((self.fractions[i], self.uncertainties[i]))
    }

    /// Get correlation matrix element (i, j). Returns `None` if covariance is unavailable.
    pub fn correlation(&self, i: usize, j: usize) -> Option<f64> {
        let cov = self.covariance.as_ref()?;
        let n = self.fractions.len();
        if i >= n || j >= n {
            return None;
        }
        let sigma_i = self.uncertainties[i];
        let sigma_j = self.uncertainties[j];
        if sigma_i <= 0.0 || sigma_j <= 0.0 {
            return None;
        }
        Some(cov[i * n + j] / (sigma_i * sigma_j))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;

    #[test]
    fn test_fraction_lookup() {
        let result = FractionFitResult::new(
            vec!["mc".into(), "qcd".into()],
            vec![0.85, 0.15],
            vec![0.02, 0.01],
            123.45,
            true,
            64,
        );
        let (f, e) = result.fraction("qcd").unwrap();
        assert_relative_eq!(f, 0.15);
        assert_relative_eq!(e, 0.01);
        assert!(result.fraction("data").is_none());
    }

    #[test]
    fn test_correlation() {
        let result = FractionFitResult::with_covariance(
            vec!["mc".into(), "qcd".into()],
            vec![0.85, 0.15],
            vec![0.1, 0.2],
            vec![0.01, -0.01, -0.01, 0.04],
            1.0,
            true,
            10,
        );
        assert_relative_eq!(result.correlation(0, 0).unwrap(), 1.0);
        assert_relative_eq!(result.correlation(0, 1).unwrap(), -0.5);
        assert!(result.correlation(0, 2).is_none());
    }

    #[test]
    fn test_correlation_without_covariance() {
        let result = FractionFitResult::new(
            vec!["mc".into(), "qcd".into()],
            vec![0.85, 0.15],
            vec![0.1, 0.2],
            1.0,
            true,
            10,
        );
        assert!(result.correlation(0, 1).is_none());
    }
}
