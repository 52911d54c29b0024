//! Normal-Inverse-Gamma conjugate prior for a Gaussian with unknown mean
//! and unknown variance.
//!
//! # Model
//!
//! - Variance: `σ² ~ InvGamma(α, β)`
//! - Mean given variance: `μ | σ² ~ Normal(m, σ² / κ)`
//!
//! `κ` (mean concentration) acts as a pseudo-count of prior observations
//! supporting the location `m`; `α` and `β` are the shape and scale of the
//! inverse-gamma factor.
//!
//! Given weighted sufficient statistics `(Σx, Σx², N)` the posterior stays in
//! the family:
//!
//! ```text
//! κ' = κ + N
//! m' = (κ m + Σx) / κ'
//! α' = α + N / 2
//! β' = β + ½ (Σx² − (Σx)² / N) + ½ (κ N / κ') (x̄ − m)²
//! ```
//!
//! The MAP point estimate used by the M-step is `(β' / (α' + 1), m')`: the
//! mode of the inverse-gamma marginal of the variance paired with the
//! posterior location.

use serde::{Deserialize, Serialize};

use super::inverse_gamma::{inverse_gamma_log_pdf, inverse_gamma_mode};
use super::normal::normal_log_pdf;

/// Weighted sufficient statistics for one scalar Gaussian dimension.
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct NigStats {
    /// Σ_t w_t x_t
    pub sum_x: f64,
    /// Σ_t w_t x_t²
    pub sum_x_sq: f64,
    /// Σ_t w_t
    pub count: f64,
}

impl NigStats {
    pub fn new(sum_x: f64, sum_x_sq: f64, count: f64) -> Self {
        Self {
            sum_x,
            sum_x_sq,
            count,
        }
    }
}

/// Normal-Inverse-Gamma distribution over a (variance, mean) pair.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct NormalInverseGamma {
    /// Prior location of the mean (m).
    pub loc: f64,
    /// Pseudo-count behind the location (κ > 0).
    pub mean_concentration: f64,
    /// Inverse-gamma shape (α > 0).
    pub shape: f64,
    /// Inverse-gamma scale (β > 0).
    pub scale: f64,
}

impl NormalInverseGamma {
    /// Create a new NIG distribution with validation.
    ///
    /// Returns None if `loc` is not finite or any of the other parameters is
    /// non-positive or not finite.
    pub fn new(loc: f64, mean_concentration: f64, shape: f64, scale: f64) -> Option<Self> {
        if !loc.is_finite() {
            return None;
        }
        for p in [mean_concentration, shape, scale] {
            if !p.is_finite() || p <= 0.0 {
                return None;
            }
        }
        Some(Self {
            loc,
            mean_concentration,
            shape,
            scale,
        })
    }

    /// Joint log density at `(variance, mean)`.
    ///
    /// log InvGamma(variance; α, β) + log Normal(mean; m, variance / κ)
    pub fn log_prob(&self, variance: f64, mean: f64) -> f64 {
        let log_var = inverse_gamma_log_pdf(variance, self.shape, self.scale);
        if log_var.is_nan() || log_var == f64::NEG_INFINITY {
            return log_var;
        }
        let std_dev = (variance / self.mean_concentration).sqrt();
        log_var + normal_log_pdf(mean, self.loc, std_dev)
    }

    /// Log density of the variance marginal, InvGamma(α, β).
    ///
    /// This is the density whose maximizer [`mode`](Self::mode) reports for
    /// the variance coordinate.
    pub fn variance_marginal_log_prob(&self, variance: f64) -> f64 {
        inverse_gamma_log_pdf(variance, self.shape, self.scale)
    }

    /// Conjugate update with weighted sufficient statistics.
    ///
    /// A zero (or negative, or NaN) count leaves the prior unchanged, so
    /// mixture components that received no responsibility mass never produce
    /// NaN or infinite hyperparameters.
    pub fn posterior_update(&self, stats: NigStats) -> Self {
        let n = stats.count;
        if n.is_nan() || n <= 0.0 {
            return *self;
        }

        let kappa_post = self.mean_concentration + n;
        let loc_post = (self.mean_concentration * self.loc + stats.sum_x) / kappa_post;
        let shape_post = self.shape + 0.5 * n;

        let empirical_mean = stats.sum_x / n;
        // Rounding can push the centered sum of squares slightly below zero.
        let centered_ss = (stats.sum_x_sq - stats.sum_x * empirical_mean).max(0.0);
        let diff = empirical_mean - self.loc;
        let shrinkage = self.mean_concentration * n / kappa_post;
        let scale_post = self.scale + 0.5 * centered_ss + 0.5 * shrinkage * diff * diff;

        Self {
            loc: loc_post,
            mean_concentration: kappa_post,
            shape: shape_post,
            scale: scale_post,
        }
    }

    /// MAP point estimate `(variance, mean)` = `(β / (α + 1), m)`.
    pub fn mode(&self) -> (f64, f64) {
        (inverse_gamma_mode(self.shape, self.scale), self.loc)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn approx_eq(a: f64, b: f64, tol: f64) -> bool {
        if a.is_nan() || b.is_nan() {
            return false;
        }
        (a - b).abs() <= tol
    }

    fn unit_prior() -> NormalInverseGamma {
        NormalInverseGamma::new(0.0, 1.0, 1.0, 1.0).unwrap()
    }

    #[test]
    fn new_validates() {
        assert!(NormalInverseGamma::new(0.0, 1e-4, 1.0, 1.0).is_some());
        assert!(NormalInverseGamma::new(f64::NAN, 1.0, 1.0, 1.0).is_none());
        assert!(NormalInverseGamma::new(0.0, 0.0, 1.0, 1.0).is_none());
        assert!(NormalInverseGamma::new(0.0, 1.0, -1.0, 1.0).is_none());
        assert!(NormalInverseGamma::new(0.0, 1.0, 1.0, f64::INFINITY).is_none());
    }

    #[test]
    fn three_identical_observations() {
        let post = unit_prior().posterior_update(NigStats::new(3.0, 3.0, 3.0));
        assert!(approx_eq(post.mean_concentration, 4.0, 1e-12));
        assert!(approx_eq(post.loc, 0.75, 1e-12));
        assert!(approx_eq(post.shape, 2.5, 1e-12));
        // 1 + 0 + ½ * (3/4) * 1²
        assert!(approx_eq(post.scale, 1.375, 1e-12));

        let (variance, mean) = post.mode();
        assert!(approx_eq(mean, 0.75, 1e-12));
        assert!(approx_eq(variance, 1.375 / 3.5, 1e-12));
    }

    #[test]
    fn update_matches_expanded_form() {
        // β' = β + ½Σx² + ½κm² − ½κ'm'²
        let prior = NormalInverseGamma::new(0.4, 2.0, 1.5, 0.7).unwrap();
        let stats = NigStats::new(5.2, 11.9, 4.0);
        let post = prior.posterior_update(stats);
        let expanded = prior.scale + 0.5 * stats.sum_x_sq
            + 0.5 * prior.mean_concentration * prior.loc * prior.loc
            - 0.5 * post.mean_concentration * post.loc * post.loc;
        assert!(approx_eq(post.scale, expanded, 1e-10));
    }

    #[test]
    fn zero_count_returns_prior() {
        let prior = NormalInverseGamma::new(1.5, 0.1, 2.0, 3.0).unwrap();
        let post = prior.posterior_update(NigStats::new(0.0, 0.0, 0.0));
        assert_eq!(post, prior);
        let (variance, mean) = post.mode();
        assert_eq!(mean, 1.5);
        assert_eq!(variance, 3.0 / 3.0);
    }

    #[test]
    fn nan_count_returns_prior() {
        let prior = unit_prior();
        assert_eq!(prior.posterior_update(NigStats::new(1.0, 1.0, f64::NAN)), prior);
    }

    #[test]
    fn tiny_count_stays_finite() {
        let post = unit_prior().posterior_update(NigStats::new(1e-300, 1e-300, 1e-300));
        assert!(post.loc.is_finite());
        assert!(post.scale.is_finite() && post.scale > 0.0);
    }

    #[test]
    fn sequential_updates_compose() {
        // Conjugacy: updating with A then B equals updating with A ∪ B.
        let prior = NormalInverseGamma::new(-0.3, 0.5, 2.0, 1.0).unwrap();
        let a = NigStats::new(2.0, 5.0, 2.0);
        let b = NigStats::new(-1.0, 3.5, 1.5);
        let both = NigStats::new(1.0, 8.5, 3.5);
        let seq = prior.posterior_update(a).posterior_update(b);
        let joint = prior.posterior_update(both);
        assert!(approx_eq(seq.loc, joint.loc, 1e-10));
        assert!(approx_eq(seq.mean_concentration, joint.mean_concentration, 1e-10));
        assert!(approx_eq(seq.shape, joint.shape, 1e-10));
        assert!(approx_eq(seq.scale, joint.scale, 1e-10));
    }

    #[test]
    fn log_prob_known_value() {
        // InvGamma(1,1) at 1 → -1; Normal(0; 0, 1) → -½ ln 2π
        let lp = unit_prior().log_prob(1.0, 0.0);
        let expected = -1.0 - 0.5 * (2.0 * std::f64::consts::PI).ln();
        assert!(approx_eq(lp, expected, 1e-12));
    }

    #[test]
    fn log_prob_non_positive_variance() {
        assert_eq!(unit_prior().log_prob(0.0, 0.0), f64::NEG_INFINITY);
        assert_eq!(unit_prior().log_prob(-2.0, 0.0), f64::NEG_INFINITY);
    }

    #[test]
    fn posterior_mode_is_local_maximum() {
        let post = unit_prior().posterior_update(NigStats::new(3.0, 3.0, 3.0));
        let (variance, mean) = post.mode();
        let at_mode = post.log_prob(variance, mean);
        for delta in [1e-4, -1e-4, 1e-2, -1e-2] {
            assert!(at_mode > post.log_prob(variance, mean + delta));
        }
        let marginal_at_mode = post.variance_marginal_log_prob(variance);
        for delta in [1e-4, -1e-4, 1e-2, -1e-2] {
            assert!(marginal_at_mode > post.variance_marginal_log_prob(variance + delta));
        }
    }
}
