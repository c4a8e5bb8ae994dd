// ecert-cache — Top-level error types
//
// Aggregates store errors into a single enum for the application boundary.

use thiserror::Error;

/// Top-level error type for all ecert-cache operations.
#[derive(Debug, Error)]
pub enum EcertError {
    #[error("Store error: {0}")]
    Store(#[from] crate::store::StoreError),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("{0}")]
    Other(String),
}

pub type Result<T> = std::result::Result<T, EcertError>;
