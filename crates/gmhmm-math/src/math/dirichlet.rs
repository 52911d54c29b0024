//! Dirichlet conjugate model for the HMM's discrete distributions.
//!
//! Initial-state probabilities, every transition row and every state's
//! mixture weights carry a Dirichlet prior. The M-step uses:
//! - Prior: `p = (p_1..p_K) ~ Dirichlet(α_1..α_K)`
//! - Expected counts: `n = (n_1..n_K)` (fractional, from the E-step)
//! - Posterior: `p | n ~ Dirichlet(α_i + n_i)`
//! - MAP estimate: the posterior mode `(α'_i - 1) / (Σ_j α'_j - K)`
//!
//! The mode is only defined when every `α'_i > 1`. That is a caller
//! contract: it is not checked at runtime.

use super::stable::log_gamma;

/// Concentration vector of a Dirichlet distribution.
#[derive(Debug, Clone, PartialEq)]
pub struct DirichletParams {
    /// α_i > 0 for every category.
    pub alpha: Vec<f64>,
}

impl DirichletParams {
    /// Returns None for an empty vector or any entry that is not a positive number.
    pub fn new(alpha: Vec<f64>) -> Option<Self> {
        if alpha.is_empty() || alpha.iter().any(|a| a.is_nan() || *a <= 0.0) {
            return None;
        }
        Some(Self { alpha })
    }

    pub fn k(&self) -> usize {
        self.alpha.len()
    }

    /// `(α_i - 1) / (α_0 - K)`; a probability vector only when every α_i > 1.
    pub fn mode(&self) -> Vec<f64> {
        posterior_mode(&self.alpha, &vec![0.0; self.k()])
    }

    /// `Σ_i (α_i - 1) ln x_i - ln B(α)`.
    ///
    /// NAN for a point of the wrong length or containing NaN; NEG_INFINITY
    /// for a negative coordinate. A zero coordinate under `α_i = 1`
    /// contributes nothing.
    pub fn log_pdf(&self, x: &[f64]) -> f64 {
        if x.len() != self.k() || x.iter().any(|v| v.is_nan()) {
            return f64::NAN;
        }
        if x.iter().any(|&v| v < 0.0) {
            return f64::NEG_INFINITY;
        }
        let kernel: f64 = self
            .alpha
            .iter()
            .zip(x)
            .filter(|(a, _)| **a != 1.0)
            .map(|(a, xi)| (a - 1.0) * xi.ln())
            .sum();
        kernel - log_multivariate_beta(&self.alpha)
    }
}

/// MAP estimate of a categorical distribution: mode of `Dirichlet(α + n)`.
///
/// Works directly on slices so callers can map it over rows without
/// allocating intermediate parameter structs. Same precondition as
/// [`DirichletParams::mode`].
pub fn posterior_mode(alpha: &[f64], counts: &[f64]) -> Vec<f64> {
    debug_assert_eq!(alpha.len(), counts.len());
    let k = alpha.len() as f64;
    let total: f64 = alpha.iter().zip(counts).map(|(a, n)| a + n).sum();
    let denom = total - k;
    alpha
        .iter()
        .zip(counts)
        .map(|(a, n)| (a + n - 1.0) / denom)
        .collect()
}

/// `ln B(α) = Σ_i ln Γ(α_i) - ln Γ(Σ_i α_i)`; NAN for empty or non-positive input.
pub fn log_multivariate_beta(alpha: &[f64]) -> f64 {
    if alpha.is_empty() || alpha.iter().any(|a| a.is_nan() || *a <= 0.0) {
        return f64::NAN;
    }
    let total: f64 = alpha.iter().sum();
    alpha.iter().map(|&a| log_gamma(a)).sum::<f64>() - log_gamma(total)
}
