//! E-step (expected sufficient statistics) and M-step (closed-form MAP
//! updates) for the Gaussian-mixture diagonal HMM.
//!
//! The E-step joint weight of time `t`, state `k`, component `c` is
//!
//! ```text
//! w[t, k, c] = p(z_t = k | x_{0:T}) · p(c | x_t, z_t = k)
//! ```
//!
//! and the statistics are `N = Σ_t w`, `Σx = Σ_t w x_t`, `Σx² = Σ_t w x_t²`
//! (elementwise squares; only the covariance diagonal is estimated).
//!
//! The M-step replaces every parameter with its posterior mode under the
//! conjugate priors: Dirichlet modes for the initial distribution, transition
//! rows and mixture weights, Normal-Inverse-Gamma modes per emission
//! dimension for means and variances.

use ndarray::{s, Array1, Array2, Array3, ArrayBase, Axis, Data, Ix2};
use tracing::{debug, trace, warn};

use gmhmm_math::{dirichlet, NigStats};

use crate::error::{GmmHmmError, Result};
use crate::params::{expect_shape, GmmHmmParams};
use crate::priors::GmmHmmPriors;
use crate::smoother::{compute_transition_probs, hmm_smoother};
use crate::stats::GmmHmmSuffStats;

/// Expected sufficient statistics for every sequence of a batch.
///
/// Sequences are processed independently (in parallel with the `parallel`
/// feature); the output has one record per input sequence, in input order.
pub fn e_step<S>(params: &GmmHmmParams, batch: &[ArrayBase<S, Ix2>]) -> Result<Vec<GmmHmmSuffStats>>
where
    S: Data<Elem = f64> + Sync,
{
    #[cfg(feature = "parallel")]
    let records: Result<Vec<GmmHmmSuffStats>> = {
        use rayon::prelude::*;
        batch
            .par_iter()
            .enumerate()
            .map(|(index, emissions)| sequence_stats(params, index, emissions))
            .collect()
    };
    #[cfg(not(feature = "parallel"))]
    let records: Result<Vec<GmmHmmSuffStats>> = batch
        .iter()
        .enumerate()
        .map(|(index, emissions)| sequence_stats(params, index, emissions))
        .collect();

    let records = records?;
    debug!(
        sequences = records.len(),
        num_states = params.num_states(),
        num_components = params.num_components(),
        emission_dim = params.emission_dim(),
        marginal_loglik = records.iter().map(|r| r.marginal_loglik).sum::<f64>(),
        "e-step complete"
    );
    Ok(records)
}

fn sequence_stats<S>(
    params: &GmmHmmParams,
    index: usize,
    emissions: &ArrayBase<S, Ix2>,
) -> Result<GmmHmmSuffStats>
where
    S: Data<Elem = f64>,
{
    if emissions.nrows() == 0 {
        return Err(GmmHmmError::EmptySequence { index });
    }
    let (k, c, d) = (
        params.num_states(),
        params.num_components(),
        params.emission_dim(),
    );

    let lls = params.conditional_loglik(emissions.view())?;
    let posterior = hmm_smoother(
        params.initial_probs().view(),
        params.transition_matrix().view(),
        lls.view(),
    )?;

    let mut stats = GmmHmmSuffStats::zeros(k, c, d);
    stats.marginal_loglik = posterior.marginal_loglik;
    stats.initial_probs = posterior.smoothed_probs.row(0).to_owned();
    stats.trans_probs = compute_transition_probs(params.transition_matrix().view(), &posterior)?;

    let mut log_resp = vec![0.0; c];
    for (t, x) in emissions.axis_iter(Axis(0)).enumerate() {
        for state in 0..k {
            let gamma = posterior.smoothed_probs[[t, state]];
            if gamma == 0.0 {
                continue;
            }
            params.log_responsibility_into(state, x, &mut log_resp);
            for (comp, &lr) in log_resp.iter().enumerate() {
                let w = gamma * lr.exp();
                stats.n[[state, comp]] += w;
                let mut sum_x = stats.sum_x.slice_mut(s![state, comp, ..]);
                sum_x.scaled_add(w, &x);
                let mut sum_x_sq = stats.sum_x_sq.slice_mut(s![state, comp, ..]);
                sum_x_sq.zip_mut_with(&x, |acc, &xi| *acc += w * xi * xi);
            }
        }
    }

    trace!(
        sequence = index,
        timesteps = emissions.nrows(),
        marginal_loglik = stats.marginal_loglik,
        "sequence statistics"
    );
    Ok(stats)
}

/// MAP emission parameters for every state: the M-step restricted to the
/// mixture weights, means and diagonal scales.
#[derive(Debug, Clone, PartialEq)]
pub struct EmissionUpdate {
    /// `(K, C)`
    pub mixture_weights: Array2<f64>,
    /// `(K, C, D)`
    pub means: Array3<f64>,
    /// `(K, C, D)` NIG variance modes, exactly as computed.
    pub variances: Array3<f64>,
    /// `(K, C, D)` standard deviations, the square roots of `variances`.
    pub scale_diag: Array3<f64>,
}

/// Emission part of the M-step.
///
/// A component with no responsibility mass keeps the prior: its mean is the
/// prior location and its variance `scale / (shape + 1)`.
pub fn m_step_emissions(priors: &GmmHmmPriors, stats: &GmmHmmSuffStats) -> Result<EmissionUpdate> {
    let (k, c, d) = stats.dims();
    check_stats(stats, k, c, d)?;
    priors.check_dims(priors.num_states(), c, d)?;

    let mut mixture_weights = Array2::zeros((k, c));
    let mut means = Array3::zeros((k, c, d));
    let mut variances = Array3::zeros((k, c, d));
    let weights_alpha = priors.mixture_weights_concentration().to_vec();

    for state in 0..k {
        let counts = stats.n.row(state).to_vec();
        let mode = dirichlet::posterior_mode(&weights_alpha, &counts);
        mixture_weights.row_mut(state).assign(&Array1::from(mode));

        for comp in 0..c {
            let n = counts[comp];
            if n.is_nan() || n <= 0.0 {
                warn!(
                    state,
                    component = comp,
                    "no responsibility mass; emission parameters fall back to the prior"
                );
            }
            for dim in 0..d {
                let moments = NigStats::new(
                    stats.sum_x[[state, comp, dim]],
                    stats.sum_x_sq[[state, comp, dim]],
                    n,
                );
                let (variance, mean) = priors.nig(comp, dim).posterior_update(moments).mode();
                means[[state, comp, dim]] = mean;
                variances[[state, comp, dim]] = variance;
            }
        }
    }

    let scale_diag = variances.mapv(f64::sqrt);
    Ok(EmissionUpdate {
        mixture_weights,
        means,
        variances,
        scale_diag,
    })
}

/// Full M-step: returns a new parameter set built from summed statistics.
///
/// The previous parameters only supply the shapes the statistics must match;
/// every value is replaced.
pub fn m_step(
    params: &GmmHmmParams,
    priors: &GmmHmmPriors,
    stats: &GmmHmmSuffStats,
) -> Result<GmmHmmParams> {
    let (k, c, d) = (
        params.num_states(),
        params.num_components(),
        params.emission_dim(),
    );
    priors.check_dims(k, c, d)?;
    check_stats(stats, k, c, d)?;

    let initial_probs = Array1::from(dirichlet::posterior_mode(
        &priors.initial_probs_concentration().to_vec(),
        &stats.initial_probs.to_vec(),
    ));

    let trans_alpha = priors.transition_matrix_concentration().to_vec();
    let mut transition_matrix = Array2::zeros((k, k));
    for (mut row, counts) in transition_matrix
        .axis_iter_mut(Axis(0))
        .zip(stats.trans_probs.axis_iter(Axis(0)))
    {
        row.assign(&Array1::from(dirichlet::posterior_mode(
            &trans_alpha,
            &counts.to_vec(),
        )));
    }

    let EmissionUpdate {
        mixture_weights,
        means,
        scale_diag,
        ..
    } = m_step_emissions(priors, stats)?;

    debug!(
        num_states = k,
        num_components = c,
        emission_dim = d,
        total_mass = stats.n.sum(),
        "m-step complete"
    );

    Ok(GmmHmmParams::from_parts(
        initial_probs,
        transition_matrix,
        mixture_weights,
        means,
        scale_diag,
    ))
}

fn check_stats(stats: &GmmHmmSuffStats, k: usize, c: usize, d: usize) -> Result<()> {
    expect_shape("initial_probs stats", stats.initial_probs.shape(), &[k])?;
    expect_shape("trans_probs stats", stats.trans_probs.shape(), &[k, k])?;
    expect_shape("n stats", stats.n.shape(), &[k, c])?;
    expect_shape("sum_x stats", stats.sum_x.shape(), &[k, c, d])?;
    expect_shape("sum_x_sq stats", stats.sum_x_sq.shape(), &[k, c, d])?;
    Ok(())
}
