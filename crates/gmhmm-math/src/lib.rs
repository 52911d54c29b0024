//! Numerical primitives for Bayesian EM on Gaussian-mixture HMMs.
//!
//! Everything here is pure math on scalars and slices: log-domain helpers,
//! Dirichlet and inverse-gamma densities, diagonal normals, and the
//! Normal-Inverse-Gamma conjugate prior used for emission means and variances.

pub mod math;

pub use math::stable::*;
pub use math::dirichlet;
pub use math::inverse_gamma::*;
pub use math::nig::{NigStats, NormalInverseGamma};
pub use math::normal::*;
