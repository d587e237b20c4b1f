//! Error types for taxocode-core.

use thiserror::Error;

/// Errors raised while building datasets, embedding stores and taxonomies.
#[derive(Error, Debug)]
pub enum Error {
    /// A configuration value violates a construction-time precondition.
    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),

    /// The taxonomy kind is not one this crate can build.
    #[error("Unsupported taxonomy type: {0}")]
    UnsupportedTaxonomy(String),

    /// The operation exists on the interface but this variant does not implement it.
    #[error("Not supported: {0}")]
    NotSupported(String),

    /// Include/exclude filter was given both maps or neither.
    #[error("Invalid filter configuration: {0}")]
    FilterConfig(String),

    /// Entity has no embedding.
    #[error("Entity not found: {0}")]
    EntityNotFound(String),

    /// Vector width does not match the store dimension.
    #[error("Dimension mismatch: expected {expected}, got {got}")]
    DimensionMismatch { expected: usize, got: usize },

    /// Chunk index past the end of the relation source.
    #[error("Index {index} out of range for {len} chunks")]
    OutOfRange { index: usize, len: usize },

    /// Malformed input line.
    #[error("Parse error at line {line}: {message}")]
    Parse { line: usize, message: String },

    /// IO error.
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

/// Result type for taxocode-core.
pub type Result<T> = std::result::Result<T, Error>;
