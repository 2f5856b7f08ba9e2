//! Credential pool with drain-first selection, cooldown, and eviction
//!
//! Manages a set of per-account credentials under rate-limit feedback. The
//! pool tracks a usage counter and a status per credential and hands the
//! dispatcher an ordered candidate list before every attempt.
//!
//! Credential lifecycle:
//! 1. Payload produced by the external login layer → `insert` extracts the
//!    identity and stores the credential as `Active`
//! 2. Each successful request increments the usage counter; crossing the
//!    configured cap transitions the credential to `Cooling`
//! 3. An upstream rate-limit signal forces `Cooling` immediately
//! 4. An invalid-session signal transitions to `Evicted` permanently
//! 5. An elapsed cooldown is observed at selection time: the credential
//!    returns to `Active` with its counter reset for the new quota window
//!
//! Nothing here is persisted: counters and cooldowns live for the process
//! lifetime only. The seed file (`CredentialFile`) stores payloads, not state.

pub mod credential;
pub mod error;
pub mod partition;
pub mod pool;
pub mod seed;

pub use credential::{Candidate, CredentialStatus};
pub use error::{Error, Result};
pub use partition::PartitionedPool;
pub use pool::{CredentialPool, IdentityFn, PoolConfig};
pub use seed::CredentialFile;
