// ecert-cache — Store error types

use std::path::PathBuf;

use thiserror::Error;

/// Boxed error returned by a caller-supplied certificate fetcher.
pub type FetchError = Box<dyn std::error::Error + Send + Sync>;

#[derive(Debug, Error)]
pub enum StoreError {
    #[error("Certificate store already initialized")]
    AlreadyInitialized,

    #[error("Certificate store already exists at {}", .0.display())]
    AlreadyExists(PathBuf),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// The engine opened the file but could not read from it.
    #[error("Liveness probe failed, store file is unreadable or not a database: {0}")]
    LivenessProbe(#[source] rusqlite::Error),

    #[error("Database error: {0}")]
    Database(#[from] rusqlite::Error),

    #[error("Failed committing certificate insert: {0}")]
    Commit(#[source] rusqlite::Error),

    #[error("Certificate fetch failed: {0}")]
    Fetch(#[source] FetchError),

    #[error("Issuer returned an empty certificate for {0}")]
    EmptyCertificate(String),

    #[error("Stored certificate for {0} is empty or NULL")]
    CorruptRecord(String),

    #[error("Certificate for {0} not readable after insert")]
    ReadAfterWrite(String),

    #[error("Certificate store is not open")]
    NotOpen,

    #[error("{0}")]
    Other(String),
}
