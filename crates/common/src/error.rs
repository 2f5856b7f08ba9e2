//! Fetch error taxonomy
//!
//! A closed classification of request outcomes that decides retry vs. rotate
//! vs. evict vs. propagate:
//!
//! - `Transient`: credential-independent network failure, retried in place
//!   by the executor with bounded backoff
//! - `RateLimited`: credential-specific, triggers rotation plus cooldown
//! - `InvalidCredential`: credential-specific, triggers permanent eviction
//! - `Fatal`: non-retryable upstream error, surfaced immediately
//! - `PoolExhausted`: no usable credential remains

use thiserror::Error;

/// Classified failure of one logical fetch.
#[derive(Debug, Error)]
pub enum FetchError {
    /// Upstream signalled too many requests for this credential.
    #[error("rate limited: {0}")]
    RateLimited(String),

    /// Upstream rejected the credential (expired cookie, dead session).
    #[error("invalid credential: {0}")]
    InvalidCredential(String),

    /// Network-level failure (timeout, reset, proxy error). Retryable.
    #[error("transient error: {0}")]
    Transient(String),

    /// Non-retryable application-level error. Terminal for the paginator.
    #[error("upstream error {code}: {message}")]
    Fatal { code: i64, message: String },

    /// Every credential is cooling, evicted, or already tried.
    #[error("pool exhausted: {0}")]
    PoolExhausted(String),
}

impl FetchError {
    /// Whether the error should be resolved by rotating credentials.
    pub fn is_credential_specific(&self) -> bool {
        matches!(
            self,
            FetchError::RateLimited(_) | FetchError::InvalidCredential(_)
        )
    }

    /// Whether the error is retryable on the same credential.
    pub fn is_transient(&self) -> bool {
        matches!(self, FetchError::Transient(_))
    }

    /// Whether the error is terminal for the whole paginated sequence.
    pub fn is_fatal(&self) -> bool {
        matches!(self, FetchError::Fatal { .. })
    }
}

/// One page of decoded items, or a classified failure.
pub type FetchResult<T> = Result<Vec<T>, FetchError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn credential_specific_variants() {
        assert!(FetchError::RateLimited("429".into()).is_credential_specific());
        assert!(FetchError::InvalidCredential("cookie".into()).is_credential_specific());
        assert!(!FetchError::Transient("timeout".into()).is_credential_specific());
        assert!(
            !FetchError::Fatal {
                code: 4,
                message: "bad arg".into()
            }
            .is_credential_specific()
        );
        assert!(!FetchError::PoolExhausted("empty".into()).is_credential_specific());
    }

    #[test]
    fn transient_and_fatal_predicates() {
        assert!(FetchError::Transient("reset".into()).is_transient());
        assert!(!FetchError::RateLimited("429".into()).is_transient());
        assert!(
            FetchError::Fatal {
                code: -1,
                message: "unknown".into()
            }
            .is_fatal()
        );
        assert!(!FetchError::PoolExhausted("empty".into()).is_fatal());
    }

    #[test]
    fn display_includes_context() {
        let err = FetchError::Fatal {
            code: 1002,
            message: "parameter out of range".into(),
        };
        assert_eq!(err.to_string(), "upstream error 1002: parameter out of range");

        let err = FetchError::PoolExhausted("2 cooling, 1 evicted".into());
        assert!(err.to_string().starts_with("pool exhausted:"));
    }
}
