//! Pool state machine and drain-first credential selection
//!
//! The pool holds per-credential usage counters and status and recomputes the
//! selection order before every dispatch attempt, since state is mutated by
//! concurrent dispatches. Selection is drain-first: among credentials under
//! the usage cap, the most-used one is preferred, so one credential is driven
//! to its cap before a fresher one is touched.
//!
//! Cooldown transitions happen automatically: when a Cooling credential is
//! observed after its window elapsed, it returns to Active with its usage
//! counter reset for the new quota window.

use std::collections::HashMap;
use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::Duration;

use common::Payload;
use serde::Deserialize;
use tokio::sync::RwLock;
use tokio::time::Instant;
use tracing::{debug, info, warn};

use crate::credential::{Candidate, Credential, CredentialStatus};
use crate::error::{Error, Result};

/// Extracts a stable identity from an opaque payload (e.g. an account id
/// embedded in a cookie). Supplied by the endpoint-specific layer.
pub type IdentityFn = dyn Fn(&Payload) -> Option<String> + Send + Sync;

/// Pool tuning knobs, deserializable from application config.
#[derive(Debug, Clone, Deserialize)]
pub struct PoolConfig {
    /// Requests per credential before it enters cooldown.
    #[serde(default = "default_max_uses")]
    pub max_uses: u32,
    /// Cooldown window in seconds. Defaults to one quota day.
    #[serde(default = "default_cooldown_secs")]
    pub cooldown_secs: u64,
}

fn default_max_uses() -> u32 {
    100
}

fn default_cooldown_secs() -> u64 {
    86_400
}

impl Default for PoolConfig {
    fn default() -> Self {
        Self {
            max_uses: default_max_uses(),
            cooldown_secs: default_cooldown_secs(),
        }
    }
}

impl PoolConfig {
    /// Cooldown window as a `Duration`.
    pub fn cooldown(&self) -> Duration {
        Duration::from_secs(self.cooldown_secs)
    }
}

/// Credential pool with drain-first selection.
///
/// All mutating operations take the write lock for one short critical
/// section, so interleaved concurrent dispatches stay consistent. Double
/// eviction of the same identity is a no-op.
pub struct CredentialPool {
    entries: RwLock<HashMap<String, Credential>>,
    insert_seq: AtomicUsize,
    max_uses: u32,
    cooldown: Duration,
    extract: Arc<IdentityFn>,
}

impl CredentialPool {
    /// Create an empty pool with the given identity extractor.
    pub fn new(
        config: PoolConfig,
        extract: impl Fn(&Payload) -> Option<String> + Send + Sync + 'static,
    ) -> Self {
        Self::with_extractor(config, Arc::new(extract))
    }

    pub(crate) fn with_extractor(config: PoolConfig, extract: Arc<IdentityFn>) -> Self {
        Self {
            entries: RwLock::new(HashMap::new()),
            insert_seq: AtomicUsize::new(0),
            max_uses: config.max_uses,
            cooldown: config.cooldown(),
            extract,
        }
    }

    /// Add a credential, deriving its identity from the payload.
    ///
    /// Rejects payloads the extractor cannot identify and identities already
    /// present — including evicted ones, so an evicted credential is never
    /// resurrected under the same identity.
    pub async fn insert(&self, payload: Payload) -> Result<String> {
        let id = (self.extract)(&payload).ok_or(Error::MissingIdentity)?;
        let mut entries = self.entries.write().await;
        if entries.contains_key(&id) {
            return Err(Error::DuplicateIdentity(id));
        }
        let inserted = self.insert_seq.fetch_add(1, Ordering::Relaxed);
        entries.insert(
            id.clone(),
            Credential {
                payload,
                used: 0,
                status: CredentialStatus::Active,
                inserted,
            },
        );
        info!(credential_id = %id, "credential added to pool");
        Ok(id)
    }

    /// All currently usable credentials in drain-first order.
    ///
    /// Elapsed cooldowns are transitioned back to Active (counter reset) as a
    /// side effect, which puts those credentials at the back of the order.
    /// Recomputed before every dispatch attempt.
    ///
    /// Returns `PoolExhausted` with pool counts if nothing is usable right
    /// now; the caller must not block waiting for a cooldown.
    pub async fn select_order(&self) -> Result<Vec<Candidate>> {
        let mut entries = self.entries.write().await;
        let now = Instant::now();

        for (id, cred) in entries.iter_mut() {
            if let CredentialStatus::Cooling { until } = cred.status
                && now >= until
            {
                info!(credential_id = %id, "cooldown elapsed, credential usable again");
                cred.status = CredentialStatus::Active;
                cred.used = 0;
            }
        }

        let mut usable: Vec<(&String, &Credential)> = entries
            .iter()
            .filter(|(_, cred)| matches!(cred.status, CredentialStatus::Active))
            .collect();
        usable.sort_by(|(_, a), (_, b)| b.used.cmp(&a.used).then(a.inserted.cmp(&b.inserted)));

        if usable.is_empty() {
            let (total, active, cooling, evicted) = count(&entries, now);
            return Err(Error::PoolExhausted(
                exhausted_message(total, active, cooling, evicted),
            ));
        }

        Ok(usable
            .into_iter()
            .map(|(id, cred)| Candidate {
                id: id.clone(),
                payload: cred.payload.clone(),
            })
            .collect())
    }

    /// Record a successful request on a credential.
    ///
    /// Crossing the usage cap transitions the credential to Cooling for the
    /// configured window.
    pub async fn record_success(&self, id: &str) {
        let mut entries = self.entries.write().await;
        let Some(cred) = entries.get_mut(id) else {
            warn!(credential_id = %id, "success recorded for unknown credential");
            return;
        };
        cred.used += 1;
        if cred.used >= self.max_uses {
            let until = Instant::now() + self.cooldown;
            info!(
                credential_id = %id,
                used = cred.used,
                cooldown_secs = self.cooldown.as_secs(),
                "usage cap reached, credential entering cooldown"
            );
            metrics::counter!("pool_cooldowns_total", "reason" => "usage_cap").increment(1);
            cred.status = CredentialStatus::Cooling { until };
        }
    }

    /// Force a credential into cooldown after an upstream rate-limit signal.
    ///
    /// The usage counter is left unchanged; it resets when the cooldown
    /// elapses.
    pub async fn record_rate_limited(&self, id: &str) {
        let mut entries = self.entries.write().await;
        let Some(cred) = entries.get_mut(id) else {
            warn!(credential_id = %id, "rate limit recorded for unknown credential");
            return;
        };
        if matches!(cred.status, CredentialStatus::Evicted) {
            return;
        }
        let until = Instant::now() + self.cooldown;
        info!(
            credential_id = %id,
            cooldown_secs = self.cooldown.as_secs(),
            "credential entering cooldown (rate limited)"
        );
        metrics::counter!("pool_cooldowns_total", "reason" => "rate_limited").increment(1);
        cred.status = CredentialStatus::Cooling { until };
    }

    /// Evict a credential permanently after an invalid-session signal.
    ///
    /// Idempotent: evicting an already-evicted or unknown identity is a
    /// no-op, since two concurrent dispatches may both observe the same
    /// now-invalid credential.
    pub async fn record_invalid(&self, id: &str) {
        let mut entries = self.entries.write().await;
        let Some(cred) = entries.get_mut(id) else {
            debug!(credential_id = %id, "eviction of unknown credential is a no-op");
            return;
        };
        if matches!(cred.status, CredentialStatus::Evicted) {
            debug!(credential_id = %id, "credential already evicted");
            return;
        }
        warn!(credential_id = %id, "credential evicted (invalid session)");
        metrics::counter!("pool_evictions_total").increment(1);
        cred.status = CredentialStatus::Evicted;
    }

    /// Current usage counter for a credential.
    pub async fn usage_of(&self, id: &str) -> Option<u32> {
        let entries = self.entries.read().await;
        entries.get(id).map(|cred| cred.used)
    }

    /// Current status label for a credential.
    pub async fn status_of(&self, id: &str) -> Option<&'static str> {
        let entries = self.entries.read().await;
        entries.get(id).map(|cred| cred.status.label())
    }

    /// Number of credentials, evicted included.
    pub async fn len(&self) -> usize {
        self.entries.read().await.len()
    }

    /// Whether the pool holds no credentials at all.
    pub async fn is_empty(&self) -> bool {
        self.len().await == 0
    }

    /// Pool health summary.
    ///
    /// Status mapping: all usable → healthy, some usable → degraded,
    /// none usable → unhealthy.
    pub async fn health(&self) -> serde_json::Value {
        let entries = self.entries.read().await;
        let now = Instant::now();

        let mut credentials = Vec::new();
        let mut active = 0usize;
        let mut cooling = 0usize;
        let mut evicted = 0usize;

        let mut ids: Vec<&String> = entries.keys().collect();
        ids.sort();
        for id in ids {
            let cred = &entries[id];
            match cred.status {
                CredentialStatus::Active => {
                    active += 1;
                    credentials.push(serde_json::json!({
                        "id": id,
                        "status": "active",
                        "used": cred.used,
                    }));
                }
                CredentialStatus::Cooling { until } => {
                    if now >= until {
                        // Usable again; select_order will flip the status.
                        active += 1;
                    } else {
                        cooling += 1;
                    }
                    let remaining = until.saturating_duration_since(now).as_secs();
                    credentials.push(serde_json::json!({
                        "id": id,
                        "status": "cooling",
                        "used": cred.used,
                        "cooldown_remaining_secs": remaining,
                    }));
                }
                CredentialStatus::Evicted => {
                    evicted += 1;
                    credentials.push(serde_json::json!({
                        "id": id,
                        "status": "evicted",
                    }));
                }
            }
        }

        let total = entries.len();
        let status = if active == total && total > 0 {
            "healthy"
        } else if active > 0 {
            "degraded"
        } else {
            "unhealthy"
        };

        serde_json::json!({
            "status": status,
            "credentials_total": total,
            "credentials_active": active,
            "credentials_cooling": cooling,
            "credentials_evicted": evicted,
            "credentials": credentials,
        })
    }
}

/// Count credentials by effective status (elapsed cooldowns count as active).
fn count(entries: &HashMap<String, Credential>, now: Instant) -> (usize, usize, usize, usize) {
    let total = entries.len();
    let mut active = 0usize;
    let mut cooling = 0usize;
    let mut evicted = 0usize;
    for cred in entries.values() {
        match cred.status {
            CredentialStatus::Active => active += 1,
            CredentialStatus::Cooling { until } => {
                if now >= until {
                    active += 1;
                } else {
                    cooling += 1;
                }
            }
            CredentialStatus::Evicted => evicted += 1,
        }
    }
    (total, active, cooling, evicted)
}

/// Build the exhausted error message JSON.
fn exhausted_message(total: usize, active: usize, cooling: usize, evicted: usize) -> String {
    serde_json::json!({
        "error": {
            "type": "pool_exhausted",
            "message": "no credential currently usable",
            "pool": {
                "credentials_total": total,
                "credentials_active": active,
                "credentials_cooling": cooling,
                "credentials_evicted": evicted,
            }
        }
    })
    .to_string()
}
