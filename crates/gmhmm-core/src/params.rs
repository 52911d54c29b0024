//! HMM parameter set: initial distribution, transitions, and per-state
//! diagonal Gaussian mixtures.
//!
//! Shapes, with `K` states, `C` mixture components and emission dimension `D`:
//!
//! | field | shape |
//! |---|---|
//! | `initial_probs` | `(K,)` |
//! | `transition_matrix` | `(K, K)` |
//! | `mixture_weights` | `(K, C)` |
//! | `means` | `(K, C, D)` |
//! | `scale_diag` | `(K, C, D)` |
//!
//! A `GmmHmmParams` is an immutable value: the M-step builds a new one
//! instead of overwriting the old one.

use ndarray::{Array1, Array2, Array3, ArrayView1, Axis};
use rand::Rng;
use rand_distr::{Exp1, StandardNormal};

use crate::error::{GmmHmmError, Result};

/// Tolerance on probability-vector sums.
pub const SIMPLEX_TOL: f64 = 1e-6;

/// Complete parameter set of a Gaussian-mixture diagonal HMM.
#[derive(Debug, Clone, PartialEq)]
pub struct GmmHmmParams {
    initial_probs: Array1<f64>,
    transition_matrix: Array2<f64>,
    mixture_weights: Array2<f64>,
    means: Array3<f64>,
    scale_diag: Array3<f64>,
}

impl GmmHmmParams {
    /// Build a parameter set, validating every shape and domain constraint.
    pub fn new(
        initial_probs: Array1<f64>,
        transition_matrix: Array2<f64>,
        mixture_weights: Array2<f64>,
        means: Array3<f64>,
        scale_diag: Array3<f64>,
    ) -> Result<Self> {
        let (k, c, d) = means.dim();
        if k == 0 || c == 0 || d == 0 {
            return Err(GmmHmmError::invalid(
                "emission_means",
                format!("every dimension must be non-zero, got {:?}", means.shape()),
            ));
        }
        expect_shape("initial_probs", initial_probs.shape(), &[k])?;
        expect_shape("transition_matrix", transition_matrix.shape(), &[k, k])?;
        expect_shape("mixture_weights", mixture_weights.shape(), &[k, c])?;
        expect_shape("scale_diag", scale_diag.shape(), &[k, c, d])?;

        check_simplex("initial_probs", initial_probs.view())?;
        for row in transition_matrix.axis_iter(Axis(0)) {
            check_simplex("transition_matrix", row)?;
        }
        for row in mixture_weights.axis_iter(Axis(0)) {
            check_simplex("mixture_weights", row)?;
        }
        if means.iter().any(|m| !m.is_finite()) {
            return Err(GmmHmmError::invalid("emission_means", "non-finite entry"));
        }
        if scale_diag.iter().any(|s| !s.is_finite() || *s <= 0.0) {
            return Err(GmmHmmError::invalid(
                "scale_diag",
                "entries must be finite and positive",
            ));
        }

        Ok(Self {
            initial_probs,
            transition_matrix,
            mixture_weights,
            means,
            scale_diag,
        })
    }

    /// Assemble a parameter set whose shapes are already known to agree.
    ///
    /// Used by the M-step, whose Dirichlet modes are only guaranteed to be
    /// probability vectors under the caller's concentration > 1 contract.
    pub(crate) fn from_parts(
        initial_probs: Array1<f64>,
        transition_matrix: Array2<f64>,
        mixture_weights: Array2<f64>,
        means: Array3<f64>,
        scale_diag: Array3<f64>,
    ) -> Self {
        debug_assert_eq!(means.dim(), scale_diag.dim());
        Self {
            initial_probs,
            transition_matrix,
            mixture_weights,
            means,
            scale_diag,
        }
    }

    /// Random parameters: Dirichlet(1) initial, transition and mixture
    /// weights, standard-normal means and unit scales.
    pub fn random<R: Rng + ?Sized>(
        rng: &mut R,
        num_states: usize,
        num_components: usize,
        emission_dim: usize,
    ) -> Result<Self> {
        let initial_probs = Array1::from(sample_flat_dirichlet(rng, num_states));
        let mut transition_matrix = Array2::zeros((num_states, num_states));
        for mut row in transition_matrix.axis_iter_mut(Axis(0)) {
            row.assign(&Array1::from(sample_flat_dirichlet(rng, num_states)));
        }
        let mut mixture_weights = Array2::zeros((num_states, num_components));
        for mut row in mixture_weights.axis_iter_mut(Axis(0)) {
            row.assign(&Array1::from(sample_flat_dirichlet(rng, num_components)));
        }
        let means = Array3::from_shape_simple_fn((num_states, num_components, emission_dim), || {
            rng.sample::<f64, _>(StandardNormal)
        });
        let scale_diag = Array3::ones((num_states, num_components, emission_dim));

        Self::new(
            initial_probs,
            transition_matrix,
            mixture_weights,
            means,
            scale_diag,
        )
    }

    /// Number of hidden states K.
    pub fn num_states(&self) -> usize {
        self.means.dim().0
    }

    /// Number of mixture components C per state.
    pub fn num_components(&self) -> usize {
        self.means.dim().1
    }

    /// Emission dimension D.
    pub fn emission_dim(&self) -> usize {
        self.means.dim().2
    }

    pub fn initial_probs(&self) -> &Array1<f64> {
        &self.initial_probs
    }

    pub fn transition_matrix(&self) -> &Array2<f64> {
        &self.transition_matrix
    }

    pub fn mixture_weights(&self) -> &Array2<f64> {
        &self.mixture_weights
    }

    pub fn means(&self) -> &Array3<f64> {
        &self.means
    }

    /// Diagonal standard deviations.
    pub fn scale_diag(&self) -> &Array3<f64> {
        &self.scale_diag
    }
}

pub(crate) fn expect_shape(name: &'static str, got: &[usize], expected: &[usize]) -> Result<()> {
    if got != expected {
        return Err(GmmHmmError::shape(name, expected, got));
    }
    Ok(())
}

fn check_simplex(name: &'static str, row: ArrayView1<'_, f64>) -> Result<()> {
    if row.iter().any(|p| !p.is_finite() || *p < 0.0) {
        return Err(GmmHmmError::invalid(
            name,
            "probabilities must be finite and non-negative",
        ));
    }
    let sum = row.sum();
    if (sum - 1.0).abs() > SIMPLEX_TOL {
        return Err(GmmHmmError::invalid(
            name,
            format!("probabilities sum to {}, expected 1.0", sum),
        ));
    }
    Ok(())
}

/// Dirichlet(1, ..., 1) draw via normalized unit exponentials.
fn sample_flat_dirichlet<R: Rng + ?Sized>(rng: &mut R, k: usize) -> Vec<f64> {
    let draws: Vec<f64> = (0..k).map(|_| rng.sample::<f64, _>(Exp1)).collect();
    let total: f64 = draws.iter().sum();
    if total > 0.0 {
        draws.into_iter().map(|x| x / total).collect()
    } else {
        vec![1.0 / k as f64; k]
    }
}
