//! Log density of a parameter set under the conjugate priors.

use ndarray::Axis;

use gmhmm_math::dirichlet::DirichletParams;

use crate::error::Result;
use crate::params::GmmHmmParams;
use crate::priors::GmmHmmPriors;

/// `log p(θ)`: Dirichlet terms for the initial distribution, every transition
/// row and every mixture-weight row, plus one NIG term per
/// (state, component, dimension) evaluated at `(scale², mean)`.
///
/// A simplex entry of exactly zero under a concentration above one gives
/// `-inf`.
pub fn log_prior(params: &GmmHmmParams, priors: &GmmHmmPriors) -> Result<f64> {
    let (k, c, d) = (
        params.num_states(),
        params.num_components(),
        params.emission_dim(),
    );
    priors.check_dims(k, c, d)?;

    let mut lp = dirichlet_log_pdf(
        &priors.initial_probs_concentration().to_vec(),
        &params.initial_probs().to_vec(),
    );

    let trans_alpha = priors.transition_matrix_concentration().to_vec();
    for row in params.transition_matrix().axis_iter(Axis(0)) {
        lp += dirichlet_log_pdf(&trans_alpha, &row.to_vec());
    }

    let weights_alpha = priors.mixture_weights_concentration().to_vec();
    for row in params.mixture_weights().axis_iter(Axis(0)) {
        lp += dirichlet_log_pdf(&weights_alpha, &row.to_vec());
    }

    for state in 0..k {
        for comp in 0..c {
            for dim in 0..d {
                let scale = params.scale_diag()[[state, comp, dim]];
                let mean = params.means()[[state, comp, dim]];
                lp += priors.nig(comp, dim).log_prob(scale * scale, mean);
            }
        }
    }
    Ok(lp)
}

fn dirichlet_log_pdf(alpha: &[f64], x: &[f64]) -> f64 {
    DirichletParams::new(alpha.to_vec())
        .map(|dist| dist.log_pdf(x))
        .unwrap_or(f64::NAN)
}
