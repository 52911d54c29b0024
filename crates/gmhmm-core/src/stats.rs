//! Expected sufficient statistics produced by the E-step.

use std::ops::{Add, AddAssign};

use ndarray::{Array1, Array2, Array3};

/// Per-sequence (or summed) expected sufficient statistics.
///
/// Records are additive: summing the records of two batches gives the
/// record sum of their concatenation.
#[derive(Debug, Clone, PartialEq)]
pub struct GmmHmmSuffStats {
    pub marginal_loglik: f64,
    /// Smoothed posterior at the first step, `(K,)`.
    pub initial_probs: Array1<f64>,
    /// Expected transition counts, `(K, K)`.
    pub trans_probs: Array2<f64>,
    /// Expected responsibility mass, `(K, C)`.
    pub n: Array2<f64>,
    /// Weighted first moments, `(K, C, D)`.
    pub sum_x: Array3<f64>,
    /// Weighted diagonal second moments, `(K, C, D)`.
    pub sum_x_sq: Array3<f64>,
}

impl GmmHmmSuffStats {
    pub fn zeros(num_states: usize, num_components: usize, emission_dim: usize) -> Self {
        Self {
            marginal_loglik: 0.0,
            initial_probs: Array1::zeros(num_states),
            trans_probs: Array2::zeros((num_states, num_states)),
            n: Array2::zeros((num_states, num_components)),
            sum_x: Array3::zeros((num_states, num_components, emission_dim)),
            sum_x_sq: Array3::zeros((num_states, num_components, emission_dim)),
        }
    }

    /// `(K, C, D)` implied by the moment arrays.
    pub fn dims(&self) -> (usize, usize, usize) {
        self.sum_x.dim()
    }

    /// Fold a batch of records into one. `None` for an empty batch.
    ///
    /// # Panics
    ///
    /// Panics if the records disagree in shape.
    pub fn sum(records: &[GmmHmmSuffStats]) -> Option<Self> {
        let (first, rest) = records.split_first()?;
        let mut total = first.clone();
        for r in rest {
            total += r;
        }
        Some(total)
    }

    /// True when every array has the same shape as in `other`.
    pub fn same_shape(&self, other: &GmmHmmSuffStats) -> bool {
        self.initial_probs.shape() == other.initial_probs.shape()
            && self.trans_probs.shape() == other.trans_probs.shape()
            && self.n.shape() == other.n.shape()
            && self.sum_x.shape() == other.sum_x.shape()
            && self.sum_x_sq.shape() == other.sum_x_sq.shape()
    }
}

/// # Panics
///
/// Panics if the two records disagree in any array shape. A `(1, C)`
/// record is never broadcast across states.
impl AddAssign<&GmmHmmSuffStats> for GmmHmmSuffStats {
    fn add_assign(&mut self, rhs: &GmmHmmSuffStats) {
        assert!(
            self.same_shape(rhs),
            "sufficient statistics shape mismatch: {:?} vs {:?}",
            self.dims(),
            rhs.dims()
        );
        self.marginal_loglik += rhs.marginal_loglik;
        self.initial_probs += &rhs.initial_probs;
        self.trans_probs += &rhs.trans_probs;
        self.n += &rhs.n;
        self.sum_x += &rhs.sum_x;
        self.sum_x_sq += &rhs.sum_x_sq;
    }
}

impl AddAssign for GmmHmmSuffStats {
    fn add_assign(&mut self, rhs: GmmHmmSuffStats) {
        *self += &rhs;
    }
}

impl Add for GmmHmmSuffStats {
    type Output = GmmHmmSuffStats;

    fn add(mut self, rhs: GmmHmmSuffStats) -> Self::Output {
        self += &rhs;
        self
    }
}

impl Add<&GmmHmmSuffStats> for GmmHmmSuffStats {
    type Output = GmmHmmSuffStats;

    fn add(mut self, rhs: &GmmHmmSuffStats) -> Self::Output {
        self += rhs;
        self
    }
}
