//! Inverse-gamma distribution utilities for emission variances.
//!
//! # Parameterization
//!
//! Uses **shape/scale parameterization**: `InvGamma(α, β)` where:
//! - `α` = shape parameter (α > 0)
//! - `β` = scale parameter (β > 0)
//!
//! The density is: `f(v) = β^α / Γ(α) * v^(-α-1) * e^(-β/v)`
//!
//! If `1/v ~ Gamma(α, rate = β)` then `v ~ InvGamma(α, β)`.

use super::stable::log_gamma;

/// Log of the inverse-gamma PDF at v.
///
/// # Returns
/// * `log f(v | α, β)`, NEG_INFINITY for `v <= 0`, NAN for invalid parameters
pub fn inverse_gamma_log_pdf(v: f64, alpha: f64, beta: f64) -> f64 {
    if v.is_nan() || alpha.is_nan() || beta.is_nan() {
        return f64::NAN;
    }
    if alpha <= 0.0 || beta <= 0.0 {
        return f64::NAN;
    }
    if v <= 0.0 {
        return f64::NEG_INFINITY;
    }
    if v.is_infinite() {
        return f64::NEG_INFINITY;
    }

    // log f(v) = α*log(β) - log(Γ(α)) - (α+1)*log(v) - β/v
    alpha * beta.ln() - log_gamma(alpha) - (alpha + 1.0) * v.ln() - beta / v
}

/// Mode of InvGamma(α, β) = β / (α + 1).
pub fn inverse_gamma_mode(alpha: f64, beta: f64) -> f64 {
    if alpha.is_nan() || beta.is_nan() || alpha <= 0.0 || beta <= 0.0 {
        return f64::NAN;
    }
    beta / (alpha + 1.0)
}
