//! Conjugate prior configuration and its eager expansion to fixed shapes.
//!
//! Hyperparameters are written either as a scalar, which is broadcast, or as
//! an array whose shape must match the target exactly:
//!
//! ```toml
//! initial_probs_concentration = 1.1
//! mixture_weights_concentration = [1.5, 1.1, 1.1]
//! emission_prior_mean = [[0.0, 0.0], [1.0, 1.0], [-1.0, -1.0]]
//! emission_prior_mean_concentration = 1e-4
//! emission_prior_shape = 1.0
//! emission_prior_scale = 1.0
//! ```
//!
//! [`GmmHmmPriors::expand`] performs the broadcast once, at construction, so
//! the E/M code never branches on hyperparameter shapes.

use ndarray::{Array1, Array2};
use serde::{Deserialize, Serialize};

use crate::error::{GmmHmmError, Result};

/// A scalar-or-array hyperparameter as written in configuration.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum HyperParam {
    Scalar(f64),
    Vector(Vec<f64>),
    Matrix(Vec<Vec<f64>>),
}

impl From<f64> for HyperParam {
    fn from(value: f64) -> Self {
        HyperParam::Scalar(value)
    }
}

impl From<Vec<f64>> for HyperParam {
    fn from(value: Vec<f64>) -> Self {
        HyperParam::Vector(value)
    }
}

impl From<Vec<Vec<f64>>> for HyperParam {
    fn from(value: Vec<Vec<f64>>) -> Self {
        HyperParam::Matrix(value)
    }
}

impl HyperParam {
    fn shape(&self) -> Vec<usize> {
        match self {
            HyperParam::Scalar(_) => vec![],
            HyperParam::Vector(v) => vec![v.len()],
            HyperParam::Matrix(rows) => {
                let cols = rows.first().map_or(0, Vec::len);
                vec![rows.len(), cols]
            }
        }
    }

    fn values(&self) -> Box<dyn Iterator<Item = f64> + '_> {
        match self {
            HyperParam::Scalar(x) => Box::new(std::iter::once(*x)),
            HyperParam::Vector(v) => Box::new(v.iter().copied()),
            HyperParam::Matrix(rows) => Box::new(rows.iter().flatten().copied()),
        }
    }

    /// Broadcast to a `(len,)` array.
    pub fn expand_vector(&self, name: &'static str, len: usize) -> Result<Array1<f64>> {
        match self {
            HyperParam::Scalar(x) => Ok(Array1::from_elem(len, *x)),
            HyperParam::Vector(v) if v.len() == len => Ok(Array1::from(v.clone())),
            other => Err(GmmHmmError::shape(name, &[len], &other.shape())),
        }
    }

    /// Broadcast to a `(rows, cols)` array.
    pub fn expand_matrix(&self, name: &'static str, rows: usize, cols: usize) -> Result<Array2<f64>> {
        match self {
            HyperParam::Scalar(x) => Ok(Array2::from_elem((rows, cols), *x)),
            HyperParam::Matrix(m) if m.len() == rows && m.iter().all(|r| r.len() == cols) => {
                let flat: Vec<f64> = m.iter().flatten().copied().collect();
                Array2::from_shape_vec((rows, cols), flat)
                    .map_err(|e| GmmHmmError::Config(e.to_string()))
            }
            HyperParam::Matrix(m) => {
                // Report the first offending row length for ragged input.
                let got_cols = m
                    .iter()
                    .map(Vec::len)
                    .find(|&len| len != cols)
                    .unwrap_or(cols);
                Err(GmmHmmError::shape(name, &[rows, cols], &[m.len(), got_cols]))
            }
            other => Err(GmmHmmError::shape(name, &[rows, cols], &other.shape())),
        }
    }
}

/// Hyperparameters as configured, before broadcasting.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct PriorConfig {
    /// Dirichlet concentration on the initial distribution, `(K,)`.
    pub initial_probs_concentration: HyperParam,
    /// Dirichlet concentration shared by every transition row, `(K,)`.
    pub transition_matrix_concentration: HyperParam,
    /// Dirichlet concentration on each state's mixture weights, `(C,)`.
    pub mixture_weights_concentration: HyperParam,
    /// NIG location per component, `(C, D)`.
    pub emission_prior_mean: HyperParam,
    /// NIG mean pseudo-count per component, `(C,)`.
    pub emission_prior_mean_concentration: HyperParam,
    /// NIG inverse-gamma shape per component, `(C,)`.
    pub emission_prior_shape: HyperParam,
    /// NIG inverse-gamma scale per component, `(C, D)`.
    pub emission_prior_scale: HyperParam,
}

impl Default for PriorConfig {
    fn default() -> Self {
        Self {
            initial_probs_concentration: HyperParam::Scalar(1.1),
            transition_matrix_concentration: HyperParam::Scalar(1.1),
            mixture_weights_concentration: HyperParam::Scalar(1.1),
            emission_prior_mean: HyperParam::Scalar(0.0),
            emission_prior_mean_concentration: HyperParam::Scalar(1e-4),
            emission_prior_shape: HyperParam::Scalar(1.0),
            emission_prior_scale: HyperParam::Scalar(1.0),
        }
    }
}

impl PriorConfig {
    /// Parse from TOML.
    pub fn from_toml_str(s: &str) -> Result<Self> {
        let config: Self = toml::from_str(s).map_err(|e| GmmHmmError::Config(e.to_string()))?;
        config.validate()?;
        Ok(config)
    }

    /// Parse from JSON.
    pub fn from_json_str(s: &str) -> Result<Self> {
        let config: Self =
            serde_json::from_str(s).map_err(|e| GmmHmmError::Config(e.to_string()))?;
        config.validate()?;
        Ok(config)
    }

    /// Check value domains (shapes are checked by [`GmmHmmPriors::expand`]).
    pub fn validate(&self) -> Result<()> {
        let positive = [
            (
                "initial_probs_concentration",
                &self.initial_probs_concentration,
            ),
            (
                "transition_matrix_concentration",
                &self.transition_matrix_concentration,
            ),
            (
                "mixture_weights_concentration",
                &self.mixture_weights_concentration,
            ),
            (
                "emission_prior_mean_concentration",
                &self.emission_prior_mean_concentration,
            ),
            ("emission_prior_shape", &self.emission_prior_shape),
            ("emission_prior_scale", &self.emission_prior_scale),
        ];
        for (name, param) in positive {
            if param.values().any(|v| !v.is_finite() || v <= 0.0) {
                return Err(GmmHmmError::Config(format!(
                    "{} must be finite and positive",
                    name
                )));
            }
        }
        if self.emission_prior_mean.values().any(|v| !v.is_finite()) {
            return Err(GmmHmmError::Config(
                "emission_prior_mean must be finite".to_string(),
            ));
        }
        Ok(())
    }
}

/// Frozen, fully broadcast conjugate priors.
///
/// Only [`GmmHmmPriors::expand`] builds one, so every array always has the
/// shape implied by `(K, C, D)`.
#[derive(Debug, Clone, PartialEq)]
pub struct GmmHmmPriors {
    /// `(K,)`
    initial_probs_concentration: Array1<f64>,
    /// `(K,)`, applied to every transition row.
    transition_matrix_concentration: Array1<f64>,
    /// `(C,)`
    mixture_weights_concentration: Array1<f64>,
    /// `(C, D)`
    emission_prior_mean: Array2<f64>,
    /// `(C,)`
    emission_prior_mean_concentration: Array1<f64>,
    /// `(C,)`
    emission_prior_shape: Array1<f64>,
    /// `(C, D)`
    emission_prior_scale: Array2<f64>,
}

impl GmmHmmPriors {
    /// Broadcast and shape-check every hyperparameter.
    ///
    /// Fails on the first hyperparameter whose shape is neither scalar nor
    /// the exact target shape; nothing is constructed in that case.
    pub fn expand(
        config: &PriorConfig,
        num_states: usize,
        num_components: usize,
        emission_dim: usize,
    ) -> Result<Self> {
        config.validate()?;
        let k = num_states;
        let c = num_components;
        let d = emission_dim;
        Ok(Self {
            initial_probs_concentration: config
                .initial_probs_concentration
                .expand_vector("initial_probs_concentration", k)?,
            transition_matrix_concentration: config
                .transition_matrix_concentration
                .expand_vector("transition_matrix_concentration", k)?,
            mixture_weights_concentration: config
                .mixture_weights_concentration
                .expand_vector("mixture_weights_concentration", c)?,
            emission_prior_mean: config
                .emission_prior_mean
                .expand_matrix("emission_prior_mean", c, d)?,
            emission_prior_mean_concentration: config
                .emission_prior_mean_concentration
                .expand_vector("emission_prior_mean_concentration", c)?,
            emission_prior_shape: config
                .emission_prior_shape
                .expand_vector("emission_prior_shape", c)?,
            emission_prior_scale: config
                .emission_prior_scale
                .expand_matrix("emission_prior_scale", c, d)?,
        })
    }

    /// Number of states the priors were expanded for.
    pub fn num_states(&self) -> usize {
        self.initial_probs_concentration.len()
    }

    /// Number of mixture components the priors were expanded for.
    pub fn num_components(&self) -> usize {
        self.mixture_weights_concentration.len()
    }

    /// Emission dimension the priors were expanded for.
    pub fn emission_dim(&self) -> usize {
        self.emission_prior_mean.ncols()
    }

    pub fn initial_probs_concentration(&self) -> &Array1<f64> {
        &self.initial_probs_concentration
    }

    pub fn transition_matrix_concentration(&self) -> &Array1<f64> {
        &self.transition_matrix_concentration
    }

    pub fn mixture_weights_concentration(&self) -> &Array1<f64> {
        &self.mixture_weights_concentration
    }

    pub fn emission_prior_mean_concentration(&self) -> &Array1<f64> {
        &self.emission_prior_mean_concentration
    }

    pub fn emission_prior_mean(&self) -> &Array2<f64> {
        &self.emission_prior_mean
    }

    pub fn emission_prior_shape(&self) -> &Array1<f64> {
        &self.emission_prior_shape
    }

    pub fn emission_prior_scale(&self) -> &Array2<f64> {
        &self.emission_prior_scale
    }

    /// Fail unless the priors were expanded for exactly `(K, C, D)`.
    pub(crate) fn check_dims(
        &self,
        num_states: usize,
        num_components: usize,
        emission_dim: usize,
    ) -> Result<()> {
        let got = [self.num_states(), self.num_components(), self.emission_dim()];
        let expected = [num_states, num_components, emission_dim];
        if got != expected {
            return Err(GmmHmmError::shape("priors", &expected, &got));
        }
        Ok(())
    }

    /// The per-dimension NIG prior of component `c`, dimension `d`.
    pub(crate) fn nig(&self, c: usize, d: usize) -> gmhmm_math::NormalInverseGamma {
        gmhmm_math::NormalInverseGamma {
            loc: self.emission_prior_mean[[c, d]],
            mean_concentration: self.emission_prior_mean_concentration[c],
            shape: self.emission_prior_shape[c],
            scale: self.emission_prior_scale[[c, d]],
        }
    }
}
