use thiserror::Error;

/// Failures that can occur in the hash/signature primitive layer.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum PrimitiveError {
    #[error("invalid hash encoding")]
    InvalidHash,

    #[error("failed to canonicalize value for hashing")]
    Canonicalization,

    #[error("invalid amount: {0}")]
    InvalidAmount(String),

    #[error("unrecognized signature scheme: {0}")]
    UnknownScheme(String),

    #[error("invalid key or signature size: expected {expected}, got {actual}")]
    InvalidSize { expected: usize, actual: usize },
}
