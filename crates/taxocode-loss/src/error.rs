//! Error types for taxocode-loss.

use thiserror::Error;

/// Errors raised while configuring or evaluating a loss.
#[derive(Error, Debug)]
pub enum Error {
    /// Distance metric name is not one of the known metrics.
    #[error("Unsupported distance metric: {0}")]
    UnsupportedMetric(String),

    /// Reduction name is not `mean` or `sum`.
    #[error("Unsupported reduction: {0}")]
    UnsupportedReduction(String),

    /// A target refers to a row the code batch does not have.
    #[error("Index {index} out of bounds for batch of {len}")]
    IndexOutOfBounds { index: usize, len: usize },

    /// No targets were given.
    #[error("Empty target list")]
    EmptyTargets,

    /// Arrays do not have compatible shapes.
    #[error("Shape mismatch: {0}")]
    ShapeMismatch(String),

    /// Binary cross-entropy target outside [0, 1].
    #[error("Invalid probability target: {0}")]
    InvalidTarget(f32),

    /// Binary cross-entropy prediction outside [0, 1].
    #[error("Invalid probability prediction: {0}")]
    InvalidPrediction(f32),
}

/// Result type for taxocode-loss.
pub type Result<T> = std::result::Result<T, Error>;
