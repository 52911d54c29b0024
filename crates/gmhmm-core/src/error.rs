//! Error types for model construction and EM.

use thiserror::Error;

/// Errors from building a model or running an E/M step.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum GmmHmmError {
    /// An array or hyperparameter does not have the shape it must have.
    #[error("shape mismatch for {name}: expected {expected:?}, got {got:?}")]
    ShapeMismatch {
        name: &'static str,
        expected: Vec<usize>,
        got: Vec<usize>,
    },

    /// Observation dimension differs from the model's emission dimension.
    #[error("emission dimension mismatch: expected {expected}, got {got}")]
    DimensionMismatch { expected: usize, got: usize },

    /// A sequence in the batch has no time steps.
    #[error("sequence {index} is empty")]
    EmptySequence { index: usize },

    /// The batch contains no sequences.
    #[error("empty batch")]
    EmptyBatch,

    /// A parameter value is outside its domain.
    #[error("invalid {name}: {reason}")]
    InvalidParameter { name: &'static str, reason: String },

    /// A normalizer underflowed or produced a non-finite value.
    #[error("numerical instability: {0}")]
    NumericalInstability(String),

    /// Prior configuration could not be parsed or validated.
    #[error("invalid prior configuration: {0}")]
    Config(String),
}

/// Result type for model operations.
pub type Result<T> = std::result::Result<T, GmmHmmError>;

impl GmmHmmError {
    pub(crate) fn shape(name: &'static str, expected: &[usize], got: &[usize]) -> Self {
        GmmHmmError::ShapeMismatch {
            name,
            expected: expected.to_vec(),
            got: got.to_vec(),
        }
    }

    pub(crate) fn invalid(name: &'static str, reason: impl Into<String>) -> Self {
        GmmHmmError::InvalidParameter {
            name,
            reason: reason.into(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn shape_mismatch_message() {
        let err = GmmHmmError::shape("emission_prior_scale", &[2, 3], &[3]);
        assert_eq!(
            err.to_string(),
            "shape mismatch for emission_prior_scale: expected [2, 3], got [3]"
        );
    }

    #[test]
    fn empty_sequence_message() {
        let err = GmmHmmError::EmptySequence { index: 4 };
        assert_eq!(err.to_string(), "sequence 4 is empty");
    }
}
