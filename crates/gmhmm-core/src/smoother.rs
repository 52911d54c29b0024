//! Scaled forward-backward inference for a discrete-state HMM.
//!
//! Works on per-step conditional log-likelihoods `ll[t, k] = log p(x_t | z_t = k)`
//! so it is independent of the emission family. Each forward step subtracts
//! the row maximum of `ll[t, :]` before exponentiating and renormalizes, so
//! sequences of any length stay in range; the log normalizers accumulate into
//! the marginal log-likelihood.
//!
//! The backward pass uses the ratio form
//!
//! ```text
//! smoothed[t, i] = filtered[t, i] Σ_j A[i, j] smoothed[t+1, j] / predicted[t+1, j]
//! ```
//!
//! which shares its terms with [`compute_transition_probs`].

use ndarray::{Array1, Array2, ArrayView1, ArrayView2, Axis, Zip};

use crate::error::{GmmHmmError, Result};
use crate::params::expect_shape;

/// Posterior marginals of one sequence, all `(T, K)`.
#[derive(Debug, Clone, PartialEq)]
pub struct HmmPosterior {
    /// `log p(x_{0:T})`
    pub marginal_loglik: f64,
    /// `p(z_t | x_{0:t})`
    pub filtered_probs: Array2<f64>,
    /// `p(z_t | x_{0:t-1})`; row 0 is the initial distribution.
    pub predicted_probs: Array2<f64>,
    /// `p(z_t | x_{0:T})`
    pub smoothed_probs: Array2<f64>,
}

impl HmmPosterior {
    pub fn num_timesteps(&self) -> usize {
        self.smoothed_probs.nrows()
    }
}

/// Output of the forward pass alone.
#[derive(Debug, Clone, PartialEq)]
pub struct HmmFilterOutput {
    pub marginal_loglik: f64,
    pub filtered_probs: Array2<f64>,
    pub predicted_probs: Array2<f64>,
}

/// Forward pass: filtered and one-step predicted state distributions.
pub fn hmm_filter(
    initial_probs: ArrayView1<'_, f64>,
    transition_matrix: ArrayView2<'_, f64>,
    log_likelihoods: ArrayView2<'_, f64>,
) -> Result<HmmFilterOutput> {
    let (t_len, k) = log_likelihoods.dim();
    if t_len == 0 {
        return Err(GmmHmmError::EmptySequence { index: 0 });
    }
    expect_shape("initial_probs", initial_probs.shape(), &[k])?;
    expect_shape("transition_matrix", transition_matrix.shape(), &[k, k])?;

    let mut filtered = Array2::zeros((t_len, k));
    let mut predicted = Array2::zeros((t_len, k));
    predicted.row_mut(0).assign(&initial_probs);

    let mut marginal_loglik = 0.0;
    let mut weighted = Array1::zeros(k);
    for t in 0..t_len {
        let ll = log_likelihoods.row(t);
        let shift = ll.fold(f64::NEG_INFINITY, |m, &v| m.max(v));
        if !shift.is_finite() {
            return Err(GmmHmmError::NumericalInstability(format!(
                "no state can emit observation {t}"
            )));
        }

        Zip::from(&mut weighted)
            .and(predicted.row(t))
            .and(ll)
            .for_each(|w, &p, &l| *w = p * (l - shift).exp());
        let norm = weighted.sum();
        if !(norm > 0.0 && norm.is_finite()) {
            return Err(GmmHmmError::NumericalInstability(format!(
                "forward normalizer is {norm} at step {t}"
            )));
        }
        marginal_loglik += shift + norm.ln();
        filtered.row_mut(t).assign(&(&weighted / norm));

        if t + 1 < t_len {
            let next = filtered.row(t).dot(&transition_matrix);
            predicted.row_mut(t + 1).assign(&next);
        }
    }

    Ok(HmmFilterOutput {
        marginal_loglik,
        filtered_probs: filtered,
        predicted_probs: predicted,
    })
}

/// Forward-backward smoother.
pub fn hmm_smoother(
    initial_probs: ArrayView1<'_, f64>,
    transition_matrix: ArrayView2<'_, f64>,
    log_likelihoods: ArrayView2<'_, f64>,
) -> Result<HmmPosterior> {
    let HmmFilterOutput {
        marginal_loglik,
        filtered_probs,
        predicted_probs,
    } = hmm_filter(initial_probs, transition_matrix, log_likelihoods)?;

    let t_len = filtered_probs.nrows();
    let mut smoothed = filtered_probs.clone();
    for t in (0..t_len.saturating_sub(1)).rev() {
        let ratio = smoothing_ratio(smoothed.row(t + 1), predicted_probs.row(t + 1));
        let mut row = &filtered_probs.row(t) * &transition_matrix.dot(&ratio);
        let total = row.sum();
        if total > 0.0 {
            row /= total;
        }
        smoothed.row_mut(t).assign(&row);
    }

    Ok(HmmPosterior {
        marginal_loglik,
        filtered_probs,
        predicted_probs,
        smoothed_probs: smoothed,
    })
}

/// Expected transition counts `Σ_t p(z_t = i, z_{t+1} = j | x_{0:T})`.
///
/// The entries sum to `T - 1`.
pub fn compute_transition_probs(
    transition_matrix: ArrayView2<'_, f64>,
    posterior: &HmmPosterior,
) -> Result<Array2<f64>> {
    let k = posterior.smoothed_probs.ncols();
    expect_shape("transition_matrix", transition_matrix.shape(), &[k, k])?;

    let mut counts = Array2::zeros((k, k));
    let t_len = posterior.num_timesteps();
    for t in 0..t_len.saturating_sub(1) {
        let ratio = smoothing_ratio(
            posterior.smoothed_probs.row(t + 1),
            posterior.predicted_probs.row(t + 1),
        );
        let filtered = posterior.filtered_probs.row(t);
        for (i, mut out_row) in counts.axis_iter_mut(Axis(0)).enumerate() {
            let f = filtered[i];
            if f == 0.0 {
                continue;
            }
            Zip::from(&mut out_row)
                .and(transition_matrix.row(i))
                .and(&ratio)
                .for_each(|c, &a, &r| *c += f * a * r);
        }
    }
    Ok(counts)
}

/// `smoothed / predicted`, with 0 where the predicted mass is 0.
fn smoothing_ratio(smoothed: ArrayView1<'_, f64>, predicted: ArrayView1<'_, f64>) -> Array1<f64> {
    Zip::from(smoothed)
        .and(predicted)
        .map_collect(|&s, &p| if p > 0.0 { s / p } else { 0.0 })
}
