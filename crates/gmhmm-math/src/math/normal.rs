//! Univariate and diagonal-covariance normal log-densities.

use super::stable::LOG_SQRT_2PI;

/// Log density of Normal(mean, std_dev²) at x.
///
/// Returns NAN when `std_dev` is not strictly positive.
pub fn normal_log_pdf(x: f64, mean: f64, std_dev: f64) -> f64 {
    if x.is_nan() || mean.is_nan() || std_dev.is_nan() || std_dev <= 0.0 {
        return f64::NAN;
    }
    let z = (x - mean) / std_dev;
    -LOG_SQRT_2PI - std_dev.ln() - 0.5 * z * z
}

/// Log density of a multivariate normal with diagonal covariance.
///
/// `scale_diag` holds per-dimension standard deviations. All three slices
/// must have the same length; otherwise NAN is returned.
pub fn diag_normal_log_pdf(x: &[f64], mean: &[f64], scale_diag: &[f64]) -> f64 {
    if x.len() != mean.len() || x.len() != scale_diag.len() {
        return f64::NAN;
    }
    let mut log_prob = 0.0;
    for ((&xi, &mi), &si) in x.iter().zip(mean).zip(scale_diag) {
        log_prob += normal_log_pdf(xi, mi, si);
    }
    log_prob
}
