//! Per-credential state
//!
//! Transitions:
//! - Active → Cooling (usage cap crossed, or rate-limited upstream)
//! - Active → Evicted (invalid session)
//! - Cooling → Active (cooldown elapsed, counter reset)
//! - Cooling → Evicted (invalid session while cooling)
//! - Evicted → (terminal, never resurrected)

use common::Payload;
use tokio::time::Instant;

/// Runtime status of a pooled credential.
#[derive(Debug, Clone)]
pub enum CredentialStatus {
    Active,
    Cooling { until: Instant },
    Evicted,
}

impl CredentialStatus {
    /// Status label for health output and logging.
    pub fn label(&self) -> &'static str {
        match self {
            CredentialStatus::Active => "active",
            CredentialStatus::Cooling { .. } => "cooling",
            CredentialStatus::Evicted => "evicted",
        }
    }
}

/// Pool-internal credential record.
#[derive(Debug)]
pub(crate) struct Credential {
    pub payload: Payload,
    pub used: u32,
    pub status: CredentialStatus,
    /// Insertion order, the tie-break when usage counters are equal.
    pub inserted: usize,
}

/// A selected credential handed to the dispatcher for one attempt.
#[derive(Debug, Clone)]
pub struct Candidate {
    pub id: String,
    pub payload: Payload,
}
