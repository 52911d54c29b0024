//! Per-state emission model: a mixture of diagonal-covariance Gaussians.
//!
//! For state `k` and observation `x`:
//!
//! ```text
//! log p(x | k)        = logsumexp_c [ log w_kc + log N(x; μ_kc, diag(σ_kc²)) ]
//! log p(c | x, k)     = log w_kc + log N(x; μ_kc, diag(σ_kc²)) − log p(x | k)
//! ```
//!
//! Every normalization subtracts the running maximum before exponentiating.

use std::borrow::Cow;

use ndarray::{s, Array1, Array2, ArrayView1, ArrayView2, Axis};

use crate::error::{GmmHmmError, Result};
use crate::params::{expect_shape, GmmHmmParams};

/// Mixture of diagonal Gaussians sharing one emission dimension.
#[derive(Debug, Clone, PartialEq)]
pub struct MixtureDiagGaussian {
    weights: Array1<f64>,
    means: Array2<f64>,
    scale_diag: Array2<f64>,
}

impl MixtureDiagGaussian {
    /// Build a mixture; `means` and `scale_diag` are `(C, D)`, `weights` is `(C,)`.
    pub fn new(weights: Array1<f64>, means: Array2<f64>, scale_diag: Array2<f64>) -> Result<Self> {
        let (c, d) = means.dim();
        expect_shape("mixture_weights", weights.shape(), &[c])?;
        expect_shape("scale_diag", scale_diag.shape(), &[c, d])?;
        Ok(Self {
            weights,
            means,
            scale_diag,
        })
    }

    pub fn num_components(&self) -> usize {
        self.weights.len()
    }

    pub fn dim(&self) -> usize {
        self.means.ncols()
    }

    pub fn weights(&self) -> &Array1<f64> {
        &self.weights
    }

    pub fn means(&self) -> &Array2<f64> {
        &self.means
    }

    pub fn scale_diag(&self) -> &Array2<f64> {
        &self.scale_diag
    }

    /// `log w_c + log N(x; μ_c, σ_c)` for every component.
    pub fn component_log_probs(&self, x: ArrayView1<'_, f64>) -> Result<Array1<f64>> {
        Ok(Array1::from(self.component_log_probs_vec(x)?))
    }

    /// Mixture log-density at `x`.
    pub fn log_prob(&self, x: ArrayView1<'_, f64>) -> Result<f64> {
        Ok(gmhmm_math::log_sum_exp(&self.component_log_probs_vec(x)?))
    }

    /// Normalized log posterior over components given `x`.
    pub fn log_responsibility(&self, x: ArrayView1<'_, f64>) -> Result<Array1<f64>> {
        let mut lp = self.component_log_probs_vec(x)?;
        gmhmm_math::log_normalize(&mut lp);
        Ok(Array1::from(lp))
    }

    fn component_log_probs_vec(&self, x: ArrayView1<'_, f64>) -> Result<Vec<f64>> {
        check_dim(self.dim(), x.len())?;
        let mut out = vec![0.0; self.num_components()];
        weighted_log_probs(
            self.weights.view(),
            self.means.view(),
            self.scale_diag.view(),
            x,
            &mut out,
        );
        Ok(out)
    }

    /// Mixture mean `Σ_c w_c μ_c`.
    pub fn mean(&self) -> Array1<f64> {
        self.weights.dot(&self.means)
    }
}

impl GmmHmmParams {
    /// Emission distribution of one hidden state.
    pub fn emission_distribution(&self, state: usize) -> Result<MixtureDiagGaussian> {
        self.check_state(state)?;
        Ok(MixtureDiagGaussian {
            weights: self.mixture_weights().row(state).to_owned(),
            means: self.means().slice(s![state, .., ..]).to_owned(),
            scale_diag: self.scale_diag().slice(s![state, .., ..]).to_owned(),
        })
    }

    /// Per-time-step, per-state mixture log-likelihoods, shape `(T, K)`.
    pub fn conditional_loglik(&self, emissions: ArrayView2<'_, f64>) -> Result<Array2<f64>> {
        check_dim(self.emission_dim(), emissions.ncols())?;
        let k = self.num_states();
        let mut lls = Array2::zeros((emissions.nrows(), k));
        let mut scratch = vec![0.0; self.num_components()];
        for (x, mut row) in emissions.axis_iter(Axis(0)).zip(lls.axis_iter_mut(Axis(0))) {
            for state in 0..k {
                self.component_log_probs_into(state, x, &mut scratch);
                row[state] = gmhmm_math::log_sum_exp(&scratch);
            }
        }
        Ok(lls)
    }

    /// Normalized log-responsibilities `log p(c | x, state)`, shape `(C,)`.
    pub fn log_responsibility(&self, emission: ArrayView1<'_, f64>, state: usize) -> Result<Array1<f64>> {
        self.check_state(state)?;
        check_dim(self.emission_dim(), emission.len())?;
        let mut lp = vec![0.0; self.num_components()];
        self.log_responsibility_into(state, emission, &mut lp);
        Ok(Array1::from(lp))
    }

    /// Responsibilities `p(c | x, state)`; sums to one.
    pub fn responsibility(&self, emission: ArrayView1<'_, f64>, state: usize) -> Result<Array1<f64>> {
        Ok(self.log_responsibility(emission, state)?.mapv(f64::exp))
    }

    /// Unchecked kernel shared by the E-step: writes normalized
    /// log-responsibilities for `state` into `out`.
    pub(crate) fn log_responsibility_into(
        &self,
        state: usize,
        x: ArrayView1<'_, f64>,
        out: &mut [f64],
    ) {
        self.component_log_probs_into(state, x, out);
        gmhmm_math::log_normalize(out);
    }

    fn component_log_probs_into(&self, state: usize, x: ArrayView1<'_, f64>, out: &mut [f64]) {
        weighted_log_probs(
            self.mixture_weights().row(state),
            self.means().slice(s![state, .., ..]),
            self.scale_diag().slice(s![state, .., ..]),
            x,
            out,
        );
    }

    fn check_state(&self, state: usize) -> Result<()> {
        if state >= self.num_states() {
            return Err(GmmHmmError::invalid(
                "state",
                format!("{} out of range for {} states", state, self.num_states()),
            ));
        }
        Ok(())
    }
}

fn check_dim(expected: usize, got: usize) -> Result<()> {
    if expected != got {
        return Err(GmmHmmError::DimensionMismatch { expected, got });
    }
    Ok(())
}

fn weighted_log_probs(
    weights: ArrayView1<'_, f64>,
    means: ArrayView2<'_, f64>,
    scale_diag: ArrayView2<'_, f64>,
    x: ArrayView1<'_, f64>,
    out: &mut [f64],
) {
    let x = contiguous(x);
    for (c, slot) in out.iter_mut().enumerate() {
        let mean = contiguous(means.row(c));
        let scale = contiguous(scale_diag.row(c));
        *slot = weights[c].ln() + gmhmm_math::diag_normal_log_pdf(&x, &mean, &scale);
    }
}

fn contiguous<'a>(v: ArrayView1<'a, f64>) -> Cow<'a, [f64]> {
    match v.to_slice() {
        Some(slice) => Cow::Borrowed(slice),
        None => Cow::Owned(v.to_vec()),
    }
}
