//! Credential rotation around the executor
//!
//! Walks the pool's drain-first candidate order until one credential
//! succeeds or nothing usable remains. Only credential-specific failures
//! rotate: rate limits cool the credential down, invalid sessions evict it.
//! Transient exhaustion and fatal errors surface immediately without trying
//! further credentials.

use std::collections::HashSet;
use std::future::Future;
use std::sync::Arc;

use common::FetchError;
use credpool::{Candidate, CredentialPool, Error as PoolError};
use tracing::{debug, warn};

use crate::executor::RequestExecutor;
use crate::retry::RetryPolicy;

/// Dispatches units of work across a credential pool.
///
/// Cheap to clone; one dispatcher per sub-pool when a `PartitionedPool` is
/// in play (resolve the sub-pool through its inference function first).
#[derive(Clone)]
pub struct Dispatcher {
    pool: Arc<CredentialPool>,
    executor: RequestExecutor,
}

impl Dispatcher {
    pub fn new(pool: Arc<CredentialPool>, policy: RetryPolicy) -> Self {
        Self {
            pool,
            executor: RequestExecutor::new(policy),
        }
    }

    /// The pool this dispatcher rotates over.
    pub fn pool(&self) -> &Arc<CredentialPool> {
        &self.pool
    }

    /// Run `work` with the first credential that succeeds.
    ///
    /// The selection order is recomputed before every attempt, since pool
    /// state moves under concurrent dispatches; identities already tried in
    /// this call are skipped. Fails with `PoolExhausted` once no untried
    /// usable credential remains — it never blocks waiting for a cooldown.
    pub async fn dispatch<R, W, Fut>(&self, work: W) -> Result<R, FetchError>
    where
        W: Fn(Candidate) -> Fut,
        Fut: Future<Output = Result<R, FetchError>>,
    {
        let mut tried: HashSet<String> = HashSet::new();
        loop {
            let order = match self.pool.select_order().await {
                Ok(order) => order,
                Err(PoolError::PoolExhausted(msg)) => {
                    return Err(FetchError::PoolExhausted(msg));
                }
                Err(err) => return Err(FetchError::PoolExhausted(err.to_string())),
            };

            let Some(candidate) = order.into_iter().find(|c| !tried.contains(&c.id)) else {
                return Err(FetchError::PoolExhausted(format!(
                    "all {} usable credentials failed for this request",
                    tried.len()
                )));
            };

            debug!(credential_id = %candidate.id, "dispatching with credential");
            match self.executor.execute(&candidate, &work).await {
                Ok(value) => {
                    self.pool.record_success(&candidate.id).await;
                    return Ok(value);
                }
                Err(FetchError::RateLimited(msg)) => {
                    warn!(credential_id = %candidate.id, error = %msg, "rate limited, rotating");
                    metrics::counter!("dispatch_rotations_total", "reason" => "rate_limited")
                        .increment(1);
                    self.pool.record_rate_limited(&candidate.id).await;
                    tried.insert(candidate.id);
                }
                Err(FetchError::InvalidCredential(msg)) => {
                    warn!(credential_id = %candidate.id, error = %msg, "invalid credential, rotating");
                    metrics::counter!("dispatch_rotations_total", "reason" => "invalid_credential")
                        .increment(1);
                    self.pool.record_invalid(&candidate.id).await;
                    tried.insert(candidate.id);
                }
                // Transient exhaustion and fatal errors are not
                // credential-specific; trying another credential would
                // repeat the same failure.
                Err(err) => return Err(err),
            }
        }
    }
}
