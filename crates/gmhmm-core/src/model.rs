//! Model facade pairing a parameter set with its frozen priors.

use ndarray::{ArrayBase, Data, Ix2};
use rand::Rng;

use crate::em::{self, EmissionUpdate};
use crate::error::{GmmHmmError, Result};
use crate::log_prior;
use crate::params::GmmHmmParams;
use crate::priors::{GmmHmmPriors, PriorConfig};
use crate::smoother::hmm_filter;
use crate::stats::GmmHmmSuffStats;

/// A Gaussian-mixture diagonal HMM with conjugate priors.
///
/// Immutable: [`m_step`](Self::m_step) returns a new model sharing the priors.
#[derive(Debug, Clone, PartialEq)]
pub struct GaussianMixtureDiagHmm {
    params: GmmHmmParams,
    priors: GmmHmmPriors,
}

impl GaussianMixtureDiagHmm {
    pub fn new(params: GmmHmmParams, priors: GmmHmmPriors) -> Result<Self> {
        priors.check_dims(
            params.num_states(),
            params.num_components(),
            params.emission_dim(),
        )?;
        Ok(Self { params, priors })
    }

    /// Expand `config` to the shapes of `params`.
    pub fn from_config(params: GmmHmmParams, config: &PriorConfig) -> Result<Self> {
        let priors = GmmHmmPriors::expand(
            config,
            params.num_states(),
            params.num_components(),
            params.emission_dim(),
        )?;
        Ok(Self { params, priors })
    }

    /// Random starting point; see [`GmmHmmParams::random`].
    pub fn random_initialization<R: Rng + ?Sized>(
        rng: &mut R,
        num_states: usize,
        num_components: usize,
        emission_dim: usize,
        config: &PriorConfig,
    ) -> Result<Self> {
        let priors = GmmHmmPriors::expand(config, num_states, num_components, emission_dim)?;
        let params = GmmHmmParams::random(rng, num_states, num_components, emission_dim)?;
        Ok(Self { params, priors })
    }

    pub fn params(&self) -> &GmmHmmParams {
        &self.params
    }

    pub fn priors(&self) -> &GmmHmmPriors {
        &self.priors
    }

    pub fn num_states(&self) -> usize {
        self.params.num_states()
    }

    pub fn num_components(&self) -> usize {
        self.params.num_components()
    }

    pub fn emission_dim(&self) -> usize {
        self.params.emission_dim()
    }

    /// One statistics record per sequence.
    pub fn e_step<S>(&self, batch: &[ArrayBase<S, Ix2>]) -> Result<Vec<GmmHmmSuffStats>>
    where
        S: Data<Elem = f64> + Sync,
    {
        em::e_step(&self.params, batch)
    }

    /// Sum the batch statistics and return the updated model.
    pub fn m_step(&self, batch_stats: &[GmmHmmSuffStats]) -> Result<Self> {
        let total = GmmHmmSuffStats::sum(batch_stats).ok_or(GmmHmmError::EmptyBatch)?;
        self.m_step_summed(&total)
    }

    /// M-step from statistics that are already summed.
    pub fn m_step_summed(&self, stats: &GmmHmmSuffStats) -> Result<Self> {
        Ok(Self {
            params: em::m_step(&self.params, &self.priors, stats)?,
            priors: self.priors.clone(),
        })
    }

    /// Emission-only M-step from summed statistics.
    pub fn m_step_emissions(&self, stats: &GmmHmmSuffStats) -> Result<EmissionUpdate> {
        if stats.dims() != (self.num_states(), self.num_components(), self.emission_dim()) {
            return Err(GmmHmmError::shape(
                "sum_x stats",
                &[self.num_states(), self.num_components(), self.emission_dim()],
                stats.sum_x.shape(),
            ));
        }
        em::m_step_emissions(&self.priors, stats)
    }

    pub fn log_prior(&self) -> Result<f64> {
        log_prior::log_prior(&self.params, &self.priors)
    }

    /// `log p(x_{0:T})` of one sequence (forward pass only).
    pub fn marginal_log_prob<S>(&self, emissions: &ArrayBase<S, Ix2>) -> Result<f64>
    where
        S: Data<Elem = f64>,
    {
        let lls = self.params.conditional_loglik(emissions.view())?;
        let filtered = hmm_filter(
            self.params.initial_probs().view(),
            self.params.transition_matrix().view(),
            lls.view(),
        )?;
        Ok(filtered.marginal_loglik)
    }

    /// Batch log-likelihood plus the full normalized log-prior.
    ///
    /// A diagnostic for monitoring fits and comparing models. EM does not
    /// ascend it exactly: the variance update maximizes the NIG kernel
    /// without the `-½ ln v` term of the normal normalizer, so this value
    /// may dip between iterations.
    pub fn log_joint<S>(&self, batch: &[ArrayBase<S, Ix2>]) -> Result<f64>
    where
        S: Data<Elem = f64>,
    {
        let mut total = self.log_prior()?;
        for (index, emissions) in batch.iter().enumerate() {
            if emissions.nrows() == 0 {
                return Err(GmmHmmError::EmptySequence { index });
            }
            total += self.marginal_log_prob(emissions)?;
        }
        Ok(total)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use ndarray::{array, Array2, Array3};
    use rand::rngs::StdRng;
    use rand::SeedableRng;

    fn approx_eq(a: f64, b: f64, tol: f64) -> bool {
        (a - b).abs() <= tol
    }

    fn model() -> GaussianMixtureDiagHmm {
        let params = GmmHmmParams::new(
            array![0.5, 0.5],
            array![[0.9, 0.1], [0.1, 0.9]],
            array![[0.5, 0.5], [0.5, 0.5]],
            Array3::from_shape_vec((2, 2, 1), vec![-1.0, 1.0, 4.0, 6.0]).unwrap(),
            Array3::ones((2, 2, 1)),
        )
        .unwrap();
        GaussianMixtureDiagHmm::from_config(params, &PriorConfig::default()).unwrap()
    }

    #[test]
    fn new_checks_prior_shapes() {
        let m = model();
        let wrong = GmmHmmPriors::expand(&PriorConfig::default(), 2, 3, 1).unwrap();
        assert!(GaussianMixtureDiagHmm::new(m.params().clone(), wrong).is_err());
        assert!(GaussianMixtureDiagHmm::new(m.params().clone(), m.priors().clone()).is_ok());
    }

    #[test]
    fn random_initialization_shapes() {
        let mut rng = StdRng::seed_from_u64(3);
        let m = GaussianMixtureDiagHmm::random_initialization(&mut rng, 3, 2, 4, &PriorConfig::default())
            .unwrap();
        assert_eq!(m.num_states(), 3);
        assert_eq!(m.num_components(), 2);
        assert_eq!(m.emission_dim(), 4);
        assert_eq!(m.priors().emission_prior_mean().dim(), (2, 4));
    }

    #[test]
    fn marginal_log_prob_matches_e_step() {
        let m = model();
        let seq = array![[0.0], [5.0], [4.5], [-0.5]];
        let stats = m.e_step(&[seq.clone()]).unwrap();
        let direct = m.marginal_log_prob(&seq).unwrap();
        assert!(approx_eq(stats[0].marginal_loglik, direct, 1e-12));
    }

    #[test]
    fn log_joint_adds_prior() {
        let m = model();
        let batch = vec![array![[0.0], [5.0]], array![[1.0]]];
        let expected = m.log_prior().unwrap()
            + m.marginal_log_prob(&batch[0]).unwrap()
            + m.marginal_log_prob(&batch[1]).unwrap();
        assert!(approx_eq(m.log_joint(&batch).unwrap(), expected, 1e-12));
    }

    #[test]
    fn log_joint_prior_carries_normal_normalizer() {
        // One state, one component: the Dirichlet terms vanish and the prior
        // is the single NIG term at (variance, mean) = (4, 0).
        let params = GmmHmmParams::new(
            array![1.0],
            array![[1.0]],
            array![[1.0]],
            Array3::zeros((1, 1, 1)),
            Array3::from_elem((1, 1, 1), 2.0),
        )
        .unwrap();
        let m = GaussianMixtureDiagHmm::from_config(params, &PriorConfig::default()).unwrap();
        let (v, kappa): (f64, f64) = (4.0, 1e-4);
        let kernel = -2.0 * v.ln() - 1.0 / v;
        let normalizer = 0.5 * kappa.ln() - gmhmm_math::LOG_SQRT_2PI - 0.5 * v.ln();
        assert!(approx_eq(m.log_prior().unwrap() - kernel, normalizer, 1e-9));
    }

    #[test]
    fn m_step_returns_new_model() {
        let m = model();
        let batch = vec![array![[0.0], [5.0], [4.5], [-0.5]]];
        let stats = m.e_step(&batch).unwrap();
        let next = m.m_step(&stats).unwrap();
        assert_ne!(next.params(), m.params());
        assert_eq!(next.priors(), m.priors());
    }

    #[test]
    fn m_step_on_empty_batch_fails() {
        assert_eq!(model().m_step(&[]).unwrap_err(), GmmHmmError::EmptyBatch);
    }

    #[test]
    fn log_joint_rejects_empty_sequence() {
        let batch = vec![array![[0.0]], Array2::zeros((0, 1))];
        assert_eq!(
            model().log_joint(&batch).unwrap_err(),
            GmmHmmError::EmptySequence { index: 1 }
        );
    }
}
