//! Error types for pool operations

/// Errors from pool operations.
#[derive(Debug, thiserror::Error)]
pub enum Error {
    #[error("pool exhausted: {0}")]
    PoolExhausted(String),

    #[error("credential payload has no extractable identity")]
    MissingIdentity,

    #[error("duplicate credential identity: {0}")]
    DuplicateIdentity(String),

    #[error("seed file I/O error: {0}")]
    Io(String),

    #[error("seed file parse error: {0}")]
    Parse(String),
}

/// Result alias for pool operations.
pub type Result<T> = std::result::Result<T, Error>;
