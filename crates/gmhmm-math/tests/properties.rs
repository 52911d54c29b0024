//! Property-based tests for gmhmm-math numerical functions.
//!
//! Uses proptest to verify mathematical properties hold across many random inputs.

use gmhmm_math::dirichlet::{posterior_mode, DirichletParams};
use gmhmm_math::{
    inverse_gamma_log_pdf, inverse_gamma_mode, log_gamma, log_normalize, log_sum_exp, NigStats,
    NormalInverseGamma,
};
use proptest::prelude::*;

/// Tolerance for floating point comparisons.
const TOL: f64 = 1e-10;

/// Extended tolerance for log_gamma where Lanczos approximation has some error.
const LGAMMA_TOL: f64 = 1e-8;

/// Helper to check approximate equality.
fn approx_eq(a: f64, b: f64, tol: f64) -> bool {
    if a.is_nan() && b.is_nan() {
        return true;
    }
    if a.is_nan() || b.is_nan() {
        return false;
    }
    if a.is_infinite() && b.is_infinite() {
        return a.signum() == b.signum();
    }
    if a.is_infinite() || b.is_infinite() {
        return false;
    }
    (a - b).abs() <= tol.max(tol * a.abs().max(b.abs()))
}

// ============================================================================
// log_sum_exp / log_normalize properties
// ============================================================================

proptest! {
    #![proptest_config(ProptestConfig::with_cases(1000))]

    /// log_sum_exp is commutative: order doesn't matter.
    #[test]
    fn log_sum_exp_commutative(a in -100.0..100.0f64, b in -100.0..100.0f64) {
        let ab = log_sum_exp(&[a, b]);
        let ba = log_sum_exp(&[b, a]);
        prop_assert!(approx_eq(ab, ba, TOL), "lse([{},{}])={} != lse([{},{}])={}", a, b, ab, b, a, ba);
    }

    /// log_sum_exp is associative: grouping doesn't matter.
    #[test]
    fn log_sum_exp_associative(a in -50.0..50.0f64, b in -50.0..50.0f64, c in -50.0..50.0f64) {
        let direct = log_sum_exp(&[a, b, c]);
        let grouped = log_sum_exp(&[log_sum_exp(&[a, b]), c]);
        prop_assert!(approx_eq(direct, grouped, TOL),
            "lse([{},{},{}])={} != lse([lse([{},{}]),{}])={}", a, b, c, direct, a, b, c, grouped);
    }

    /// log_sum_exp numerical stability: no overflow with large values.
    #[test]
    fn log_sum_exp_no_overflow(a in 500.0..700.0f64, b in 500.0..700.0f64) {
        let result = log_sum_exp(&[a, b]);
        prop_assert!(result.is_finite(), "lse([{},{}]) should be finite, got {}", a, b, result);
        prop_assert!(result >= a.max(b) - TOL);
    }

    /// Normalized log-weights exponentiate to a probability vector, even for
    /// log-likelihoods far outside exp()'s range.
    #[test]
    fn log_normalize_is_probability(values in prop::collection::vec(-5000.0..5000.0f64, 1..12)) {
        let mut v = values.clone();
        log_normalize(&mut v);
        let total: f64 = v.iter().map(|x| x.exp()).sum();
        prop_assert!(approx_eq(total, 1.0, 1e-9), "sum={}", total);
        prop_assert!(v.iter().all(|x| *x <= TOL));
    }
}

// ============================================================================
// log_gamma properties
// ============================================================================

proptest! {
    #![proptest_config(ProptestConfig::with_cases(1000))]

    /// log_gamma recurrence: log_gamma(z+1) = log_gamma(z) + ln(z).
    #[test]
    fn log_gamma_recurrence(z in 1.0..100.0f64) {
        let lg_z = log_gamma(z);
        let lg_z1 = log_gamma(z + 1.0);
        let expected = lg_z + z.ln();
        prop_assert!(approx_eq(lg_z1, expected, LGAMMA_TOL),
            "lg({}+1)={} != lg({}) + ln({}) = {}", z, lg_z1, z, z, expected);
    }

    /// log_gamma is positive for z > 2 (since Gamma(z) > 1 for z > 2).
    #[test]
    fn log_gamma_positive_for_large_z(z in 2.1..1000.0f64) {
        let result = log_gamma(z);
        prop_assert!(result > 0.0, "lg({})={} should be positive", z, result);
    }
}

// ============================================================================
// Dirichlet properties
// ============================================================================

proptest! {
    #![proptest_config(ProptestConfig::with_cases(500))]

    /// The MAP mixture weights lie on the simplex whenever the prior
    /// concentration exceeds one.
    #[test]
    fn dirichlet_posterior_mode_on_simplex(
        alpha in prop::collection::vec(1.000_1..20.0f64, 1..8),
        scale in 0.0..500.0f64,
    ) {
        let counts: Vec<f64> = alpha.iter().enumerate()
            .map(|(i, _)| scale * ((i * 7 + 3) % 5) as f64 / 5.0)
            .collect();
        let mode = posterior_mode(&alpha, &counts);
        let total: f64 = mode.iter().sum();
        prop_assert!(approx_eq(total, 1.0, 1e-9), "sum={}", total);
        prop_assert!(mode.iter().all(|&m| m >= 0.0 && m <= 1.0 + TOL));
    }

    /// Flat Dirichlet density is constant on the simplex.
    #[test]
    fn dirichlet_flat_density_constant(a in 0.01..0.98f64) {
        let p = DirichletParams::new(vec![1.0, 1.0]).unwrap();
        prop_assert!(approx_eq(p.log_pdf(&[a, 1.0 - a]), 0.0, LGAMMA_TOL));
    }
}

// ============================================================================
// Normal-Inverse-Gamma properties
// ============================================================================

fn nig_strategy() -> impl Strategy<Value = NormalInverseGamma> {
    (-10.0..10.0f64, 1e-4..10.0f64, 0.1..10.0f64, 0.01..10.0f64)
        .prop_map(|(m, k, a, b)| NormalInverseGamma::new(m, k, a, b).unwrap())
}

proptest! {
    #![proptest_config(ProptestConfig::with_cases(500))]

    /// Posterior hyperparameters stay valid for any non-negative weights.
    #[test]
    fn nig_posterior_valid(
        prior in nig_strategy(),
        xs in prop::collection::vec((-20.0..20.0f64, 0.0..1.0f64), 1..30),
    ) {
        let stats = xs.iter().fold(NigStats::default(), |acc, &(x, w)| NigStats {
            sum_x: acc.sum_x + w * x,
            sum_x_sq: acc.sum_x_sq + w * x * x,
            count: acc.count + w,
        });
        let post = prior.posterior_update(stats);
        prop_assert!(post.loc.is_finite());
        prop_assert!(post.mean_concentration >= prior.mean_concentration);
        prop_assert!(post.shape >= prior.shape);
        prop_assert!(post.scale >= prior.scale);
        let (variance, mean) = post.mode();
        prop_assert!(variance > 0.0 && variance.is_finite());
        prop_assert!(mean.is_finite());
    }

    /// The posterior location lies between the prior location and the
    /// empirical mean.
    #[test]
    fn nig_posterior_location_is_blend(
        prior in nig_strategy(),
        xbar in -20.0..20.0f64,
        n in 0.01..100.0f64,
    ) {
        let post = prior.posterior_update(NigStats::new(xbar * n, xbar * xbar * n + 1.0, n));
        let lo = prior.loc.min(xbar) - TOL;
        let hi = prior.loc.max(xbar) + TOL;
        prop_assert!(post.loc >= lo && post.loc <= hi, "{} not in [{}, {}]", post.loc, lo, hi);
    }

    /// The reported variance mode maximizes the inverse-gamma marginal.
    #[test]
    fn nig_variance_mode_is_marginal_max(prior in nig_strategy(), rel in 0.001..0.5f64) {
        let (variance, _) = prior.mode();
        prop_assert!(approx_eq(variance, inverse_gamma_mode(prior.shape, prior.scale), TOL));
        let at = inverse_gamma_log_pdf(variance, prior.shape, prior.scale);
        prop_assert!(at >= prior.variance_marginal_log_prob(variance * (1.0 + rel)));
        prop_assert!(at >= prior.variance_marginal_log_prob(variance * (1.0 - rel)));
    }
}

// ============================================================================
// Edge case tests
// ============================================================================

#[test]
fn edge_case_empty_log_sum_exp() {
    let result = log_sum_exp(&[]);
    assert!(result == f64::NEG_INFINITY, "lse([]) should be -inf");
}

#[test]
fn edge_case_nan_propagation() {
    assert!(log_sum_exp(&[1.0, f64::NAN]).is_nan());
    assert!(log_gamma(f64::NAN).is_nan());
}

#[test]
fn edge_case_log_gamma_negative_integers() {
    // Gamma is undefined at negative integers (poles)
    assert!(log_gamma(0.0).is_nan());
    assert!(log_gamma(-1.0).is_nan());
    assert!(log_gamma(-10.0).is_nan());
}

#[test]
fn zero_count_component_keeps_prior_mode() {
    let prior = NormalInverseGamma::new(2.0, 1e-4, 1.0, 1.0).unwrap();
    let (variance, mean) = prior.posterior_update(NigStats::default()).mode();
    assert_eq!(mean, 2.0);
    assert_eq!(variance, 1.0 / 2.0);
}
