//! Bayesian EM for hidden Markov models whose per-state emissions are
//! mixtures of diagonal-covariance Gaussians.
//!
//! Priors are conjugate (Dirichlet on the initial distribution, transition
//! rows and mixture weights; Normal-Inverse-Gamma on each emission mean and
//! variance), so every M-step update is a closed-form posterior mode.
//!
//! ```ignore
//! use gmhmm_core::{GaussianMixtureDiagHmm, PriorConfig};
//! use rand::SeedableRng;
//!
//! let mut rng = rand::rngs::StdRng::seed_from_u64(0);
//! let mut model = GaussianMixtureDiagHmm::random_initialization(&mut rng, 3, 2, 4, &PriorConfig::default())?;
//! for _ in 0..50 {
//!     let stats = model.e_step(&batch)?;
//!     model = model.m_step(&stats)?;
//! }
//! ```

pub mod em;
pub mod emission;
pub mod error;
pub mod log_prior;
pub mod logging;
pub mod model;
pub mod parameter;
pub mod params;
pub mod priors;
pub mod smoother;
pub mod stats;

pub use em::{e_step, m_step, m_step_emissions, EmissionUpdate};
pub use emission::MixtureDiagGaussian;
pub use error::{GmmHmmError, Result};
pub use log_prior::log_prior;
pub use model::GaussianMixtureDiagHmm;
pub use parameter::{Bijector, Parameter, UnconstrainedParams};
pub use params::GmmHmmParams;
pub use priors::{GmmHmmPriors, HyperParam, PriorConfig};
pub use smoother::{compute_transition_probs, hmm_filter, hmm_smoother, HmmFilterOutput, HmmPosterior};
pub use stats::GmmHmmSuffStats;
