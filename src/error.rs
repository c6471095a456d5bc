//! Error type shared by tensor kernels, metrics and layers.

use thiserror::Error;

/// Everything that can go wrong while building or calling a layer.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum LayerError {
    /// Two operands could not be broadcast together, or an op got a shape it cannot handle.
    #[error("shape mismatch in `{op}`: {lhs:?} vs {rhs:?}")]
    ShapeMismatch {
        op: &'static str,
        lhs: Vec<usize>,
        rhs: Vec<usize>,
    },

    /// A layer received the wrong number of inputs (or a list where one tensor was expected).
    #[error("expected {expected} input(s), got {got}")]
    InputArity { expected: usize, got: usize },

    /// `call` was used before `build`.
    #[error("layer `{0}` has not been built")]
    NotBuilt(&'static str),

    /// A mask was passed to a layer that cannot consume one.
    #[error("layer `{0}` does not support masking")]
    MaskingUnsupported(&'static str),

    /// No metric is registered under this name.
    #[error("unknown metric `{0}`")]
    UnknownMetric(String),

    /// Tensor shape and data length disagree.
    #[error("tensor failed validation")]
    InvalidTensor,

    /// Rejected configuration value.
    #[error("invalid configuration: {0}")]
    InvalidConfig(String),
}

/// Result alias used throughout the crate.
pub type Result<T> = core::result::Result<T, LayerError>;
