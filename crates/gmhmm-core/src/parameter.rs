//! Parameter container with invertible reparameterizations.
//!
//! A [`Parameter`] stores the *unconstrained* representation of a value plus
//! the [`Bijector`] that maps it into the constrained space. The constrained
//! value is recomputed on every read, so it can never go stale relative to
//! the stored array.
//!
//! EM does not go through this container: it writes MAP estimates directly
//! in constrained space. The container exists for gradient-based fitting
//! done outside this crate.

use ndarray::{ArrayD, ArrayViewD, Axis, IxDyn};
use serde::{Deserialize, Serialize};

use crate::error::{GmmHmmError, Result};
use crate::params::GmmHmmParams;

/// Invertible map between unconstrained reals and a constrained domain.
///
/// Transforms act on the last axis; leading axes are batch axes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Bijector {
    /// `y = x`
    Identity,
    /// `y = log(1 + exp(x))`, onto the positive reals.
    Softplus,
    /// `y = softmax([x, 0])`, from `R^(n-1)` onto the open simplex in `R^n`.
    SoftmaxCentered,
}

impl Bijector {
    /// Map an unconstrained array to its constrained value.
    pub fn forward(&self, x: ArrayViewD<'_, f64>) -> Result<ArrayD<f64>> {
        match self {
            Bijector::Identity => Ok(x.to_owned()),
            Bijector::Softplus => Ok(x.mapv(gmhmm_math::softplus)),
            Bijector::SoftmaxCentered => map_last_axis(x, 1, |lane, out| {
                let mut logits: Vec<f64> = lane.to_vec();
                logits.push(0.0);
                out.extend(gmhmm_math::softmax(&logits));
            }),
        }
    }

    /// Map a constrained value back to the unconstrained space.
    pub fn inverse(&self, y: ArrayViewD<'_, f64>) -> Result<ArrayD<f64>> {
        match self {
            Bijector::Identity => Ok(y.to_owned()),
            Bijector::Softplus => {
                if y.iter().any(|v| v.is_nan() || *v <= 0.0) {
                    return Err(GmmHmmError::invalid(
                        "softplus input",
                        "values must be positive",
                    ));
                }
                Ok(y.mapv(gmhmm_math::softplus_inverse))
            }
            Bijector::SoftmaxCentered => {
                if y.ndim() == 0 || y.shape()[y.ndim() - 1] < 2 {
                    return Err(GmmHmmError::invalid(
                        "simplex input",
                        "last axis must have at least two entries",
                    ));
                }
                if y.iter().any(|v| v.is_nan() || *v <= 0.0) {
                    return Err(GmmHmmError::invalid(
                        "simplex input",
                        "entries must be strictly positive",
                    ));
                }
                map_last_axis(y, -1, |lane, out| {
                    let last = lane[lane.len() - 1].ln();
                    out.extend(lane.iter().take(lane.len() - 1).map(|v| v.ln() - last));
                })
            }
        }
    }
}

/// Apply `f` lane-by-lane along the last axis, changing its length by `delta`.
fn map_last_axis<F>(x: ArrayViewD<'_, f64>, delta: isize, mut f: F) -> Result<ArrayD<f64>>
where
    F: FnMut(ndarray::ArrayView1<'_, f64>, &mut Vec<f64>),
{
    if x.ndim() == 0 {
        return Err(GmmHmmError::invalid(
            "bijector input",
            "scalar input has no last axis",
        ));
    }
    let last = Axis(x.ndim() - 1);
    let mut shape = x.shape().to_vec();
    let new_len = shape[last.index()] as isize + delta;
    if new_len < 0 {
        return Err(GmmHmmError::invalid("bijector input", "last axis too short"));
    }
    shape[last.index()] = new_len as usize;

    let mut out = Vec::with_capacity(shape.iter().product());
    for lane in x.lanes(last) {
        f(lane, &mut out);
    }
    ArrayD::from_shape_vec(IxDyn(&shape), out)
        .map_err(|e| GmmHmmError::NumericalInstability(e.to_string()))
}

/// A parameter stored in unconstrained form.
#[derive(Debug, Clone, PartialEq)]
pub struct Parameter {
    unconstrained: ArrayD<f64>,
    bijector: Bijector,
    frozen: bool,
}

impl Parameter {
    /// Wrap a constrained value, storing its inverse image.
    pub fn from_value(value: ArrayViewD<'_, f64>, bijector: Bijector) -> Result<Self> {
        Ok(Self {
            unconstrained: bijector.inverse(value)?,
            bijector,
            frozen: false,
        })
    }

    /// Mark the parameter as fixed for unconstrained optimizers.
    pub fn frozen(mut self) -> Self {
        self.frozen = true;
        self
    }

    pub fn is_frozen(&self) -> bool {
        self.frozen
    }

    pub fn bijector(&self) -> Bijector {
        self.bijector
    }

    /// Constrained value, computed from the stored array on every call.
    pub fn value(&self) -> Result<ArrayD<f64>> {
        self.bijector.forward(self.unconstrained.view())
    }

    pub fn unconstrained(&self) -> &ArrayD<f64> {
        &self.unconstrained
    }

    /// Replace the unconstrained array. Shape must not change.
    pub fn set_unconstrained(&mut self, raw: ArrayD<f64>) -> Result<()> {
        if self.frozen {
            return Err(GmmHmmError::invalid("parameter", "parameter is frozen"));
        }
        if raw.shape() != self.unconstrained.shape() {
            return Err(GmmHmmError::shape(
                "unconstrained parameter",
                self.unconstrained.shape(),
                raw.shape(),
            ));
        }
        self.unconstrained = raw;
        Ok(())
    }
}

/// All five model parameters in unconstrained form.
#[derive(Debug, Clone, PartialEq)]
pub struct UnconstrainedParams {
    pub initial_probs: Parameter,
    pub transition_matrix: Parameter,
    pub mixture_weights: Parameter,
    pub means: Parameter,
    pub scale_diag: Parameter,
}

impl GmmHmmParams {
    /// Reparameterize for unconstrained optimization.
    ///
    /// Single-state / single-component simplices have no free coordinates;
    /// they are kept as frozen identity parameters.
    pub fn to_unconstrained(&self) -> Result<UnconstrainedParams> {
        Ok(UnconstrainedParams {
            initial_probs: simplex_parameter(self.initial_probs().view().into_dyn())?,
            transition_matrix: simplex_parameter(self.transition_matrix().view().into_dyn())?,
            mixture_weights: simplex_parameter(self.mixture_weights().view().into_dyn())?,
            means: Parameter::from_value(self.means().view().into_dyn(), Bijector::Identity)?,
            scale_diag: Parameter::from_value(
                self.scale_diag().view().into_dyn(),
                Bijector::Softplus,
            )?,
        })
    }

    /// Inverse of [`to_unconstrained`](Self::to_unconstrained).
    pub fn from_unconstrained(raw: &UnconstrainedParams) -> Result<Self> {
        raw.to_params()
    }
}

impl UnconstrainedParams {
    /// Map back to a validated constrained parameter set.
    pub fn to_params(&self) -> Result<GmmHmmParams> {
        let shape_err =
            |name: &'static str| move |e: ndarray::ShapeError| GmmHmmError::invalid(name, e.to_string());
        GmmHmmParams::new(
            self.initial_probs
                .value()?
                .into_dimensionality()
                .map_err(shape_err("initial_probs"))?,
            self.transition_matrix
                .value()?
                .into_dimensionality()
                .map_err(shape_err("transition_matrix"))?,
            self.mixture_weights
                .value()?
                .into_dimensionality()
                .map_err(shape_err("mixture_weights"))?,
            self.means
                .value()?
                .into_dimensionality()
                .map_err(shape_err("emission_means"))?,
            self.scale_diag
                .value()?
                .into_dimensionality()
                .map_err(shape_err("scale_diag"))?,
        )
    }
}

fn simplex_parameter(value: ArrayViewD<'_, f64>) -> Result<Parameter> {
    let width = value.shape().last().copied().unwrap_or(0);
    if width < 2 {
        return Ok(Parameter::from_value(value, Bijector::Identity)?.frozen());
    }
    Parameter::from_value(value, Bijector::SoftmaxCentered)
}

#[cfg(test)]
mod tests {
    use super::*;
    use ndarray::{array, Array3};

    fn approx_eq(a: f64, b: f64, tol: f64) -> bool {
        (a - b).abs() <= tol
    }

    #[test]
    fn softmax_centered_round_trip() {
        let y = array![[0.2, 0.3, 0.5], [0.7, 0.2, 0.1]].into_dyn();
        let x = Bijector::SoftmaxCentered.inverse(y.view()).unwrap();
        assert_eq!(x.shape(), &[2, 2]);
        let back = Bijector::SoftmaxCentered.forward(x.view()).unwrap();
        assert_eq!(back.shape(), &[2, 3]);
        for (a, b) in back.iter().zip(y.iter()) {
            assert!(approx_eq(*a, *b, 1e-12));
        }
    }

    #[test]
    fn softmax_centered_forward_is_simplex() {
        let x = array![[10.0, -4.0], [0.0, 0.0]].into_dyn();
        let y = Bijector::SoftmaxCentered.forward(x.view()).unwrap();
        for row in y.lanes(Axis(1)) {
            assert!(approx_eq(row.sum(), 1.0, 1e-12));
        }
        assert!(approx_eq(y[[1, 0]], 1.0 / 3.0, 1e-12));
    }

    #[test]
    fn softplus_round_trip() {
        let y = array![0.01, 1.0, 50.0].into_dyn();
        let x = Bijector::Softplus.inverse(y.view()).unwrap();
        let back = Bijector::Softplus.forward(x.view()).unwrap();
        for (a, b) in back.iter().zip(y.iter()) {
            assert!(approx_eq(*a, *b, 1e-9));
        }
    }

    #[test]
    fn softplus_rejects_non_positive() {
        let y = array![1.0, 0.0].into_dyn();
        assert!(Bijector::Softplus.inverse(y.view()).is_err());
    }

    #[test]
    fn value_is_computed_from_raw() {
        let mut p = Parameter::from_value(array![1.0, 2.0].into_dyn().view(), Bijector::Softplus)
            .unwrap();
        p.set_unconstrained(array![0.0, 0.0].into_dyn()).unwrap();
        let v = p.value().unwrap();
        assert!(approx_eq(v[0], 2.0f64.ln(), 1e-12));
    }

    #[test]
    fn frozen_rejects_updates() {
        let mut p = Parameter::from_value(array![1.0].into_dyn().view(), Bijector::Identity)
            .unwrap()
            .frozen();
        assert!(p.is_frozen());
        assert!(p.set_unconstrained(array![2.0].into_dyn()).is_err());
    }

    #[test]
    fn set_rejects_shape_change() {
        let mut p =
            Parameter::from_value(array![1.0, 2.0].into_dyn().view(), Bijector::Identity).unwrap();
        assert!(p.set_unconstrained(array![1.0].into_dyn()).is_err());
    }

    #[test]
    fn params_round_trip() {
        let params = GmmHmmParams::new(
            array![0.25, 0.75],
            array![[0.9, 0.1], [0.4, 0.6]],
            array![[1.0], [1.0]],
            Array3::from_elem((2, 1, 2), -0.5),
            Array3::from_elem((2, 1, 2), 0.3),
        )
        .unwrap();
        let raw = params.to_unconstrained().unwrap();
        assert_eq!(raw.initial_probs.bijector(), Bijector::SoftmaxCentered);
        assert_eq!(raw.initial_probs.unconstrained().shape(), &[1]);
        assert!(raw.mixture_weights.is_frozen());
        let back = GmmHmmParams::from_unconstrained(&raw).unwrap();
        for (a, b) in back.transition_matrix().iter().zip(params.transition_matrix()) {
            assert!(approx_eq(*a, *b, 1e-12));
        }
        for (a, b) in back.scale_diag().iter().zip(params.scale_diag()) {
            assert!(approx_eq(*a, *b, 1e-12));
        }
        assert_eq!(back.means(), params.means());
    }
}
