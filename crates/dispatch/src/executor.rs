//! Request executor with bounded transient retry
//!
//! Performs one logical request bound to a credential and classifies the
//! outcome. Transient failures are retried in place with exponential backoff
//! and jitter; credential-specific and fatal outcomes return immediately so
//! the dispatcher can decide whether to rotate.

use std::future::Future;

use common::FetchError;
use credpool::Candidate;
use tracing::{debug, warn};

use crate::retry::RetryPolicy;

/// Executes units of work against a single credential per call.
#[derive(Debug, Clone, Default)]
pub struct RequestExecutor {
    policy: RetryPolicy,
}

impl RequestExecutor {
    pub fn new(policy: RetryPolicy) -> Self {
        Self { policy }
    }

    pub fn policy(&self) -> &RetryPolicy {
        &self.policy
    }

    /// Run `work` bound to `candidate`, retrying transient failures.
    ///
    /// Retries happen on the same credential, up to `max_attempts` total
    /// tries; an exhausted retry budget surfaces the last transient error
    /// as-is. Every other failure kind returns after the first attempt.
    pub async fn execute<R, W, Fut>(&self, candidate: &Candidate, work: &W) -> Result<R, FetchError>
    where
        W: Fn(Candidate) -> Fut,
        Fut: Future<Output = Result<R, FetchError>>,
    {
        let mut attempt: u32 = 0;
        loop {
            match work(candidate.clone()).await {
                Ok(value) => return Ok(value),
                Err(err) if err.is_transient() => {
                    attempt += 1;
                    if attempt >= self.policy.max_attempts.max(1) {
                        warn!(
                            credential_id = %candidate.id,
                            attempts = attempt,
                            error = %err,
                            "transient retries exhausted"
                        );
                        return Err(err);
                    }
                    let delay = self.policy.delay_for(attempt - 1);
                    debug!(
                        credential_id = %candidate.id,
                        attempt,
                        delay_ms = delay.as_millis() as u64,
                        error = %err,
                        "transient failure, backing off"
                    );
                    metrics::counter!("dispatch_retries_total").increment(1);
                    tokio::time::sleep(delay).await;
                }
                Err(err) => return Err(err),
            }
        }
    }
}
