//! Partitioned pool variant
//!
//! Keeps one independent sub-pool per partition tag (e.g. per service
//! region). A caller-supplied inference function maps a request target to a
//! tag; selection, cooldown, and eviction semantics apply within each
//! sub-pool on their own.

use std::collections::HashMap;
use std::sync::Arc;

use common::Payload;
use tokio::sync::RwLock;
use tracing::debug;

use crate::error::Result;
use crate::pool::{CredentialPool, IdentityFn, PoolConfig};

/// Maps a request target (URL, host, symbol prefix) to a partition tag.
pub type InferFn = dyn Fn(&str) -> String + Send + Sync;

/// A family of credential pools keyed by partition tag.
///
/// Sub-pools share the pool settings and identity extractor and are created
/// lazily on first use. Credentials are inserted into an explicit tag's
/// sub-pool; dispatch resolves the sub-pool through the inference function.
pub struct PartitionedPool {
    pools: RwLock<HashMap<String, Arc<CredentialPool>>>,
    config: PoolConfig,
    extract: Arc<IdentityFn>,
    infer: Box<InferFn>,
}

impl PartitionedPool {
    /// Create an empty partitioned pool.
    pub fn new(
        config: PoolConfig,
        extract: impl Fn(&Payload) -> Option<String> + Send + Sync + 'static,
        infer: impl Fn(&str) -> String + Send + Sync + 'static,
    ) -> Self {
        Self {
            pools: RwLock::new(HashMap::new()),
            config,
            extract: Arc::new(extract),
            infer: Box::new(infer),
        }
    }

    /// Insert a credential into the sub-pool for `tag`.
    pub async fn insert(&self, tag: &str, payload: Payload) -> Result<String> {
        self.pool_for_tag(tag).await.insert(payload).await
    }

    /// Resolve the sub-pool for a request target through the inference
    /// function.
    pub async fn pool_for(&self, target: &str) -> Arc<CredentialPool> {
        let tag = (self.infer)(target);
        self.pool_for_tag(&tag).await
    }

    /// The sub-pool for an explicit tag, created if absent.
    pub async fn pool_for_tag(&self, tag: &str) -> Arc<CredentialPool> {
        {
            let pools = self.pools.read().await;
            if let Some(pool) = pools.get(tag) {
                return pool.clone();
            }
        }
        let mut pools = self.pools.write().await;
        pools
            .entry(tag.to_string())
            .or_insert_with(|| {
                debug!(tag, "creating sub-pool");
                Arc::new(CredentialPool::with_extractor(
                    self.config.clone(),
                    self.extract.clone(),
                ))
            })
            .clone()
    }

    /// All known partition tags.
    pub async fn tags(&self) -> Vec<String> {
        let pools = self.pools.read().await;
        let mut tags: Vec<String> = pools.keys().cloned().collect();
        tags.sort();
        tags
    }

    /// Health summary per partition.
    pub async fn health(&self) -> serde_json::Value {
        let pools = self.pools.read().await;
        let mut partitions = serde_json::Map::new();
        for (tag, pool) in pools.iter() {
            partitions.insert(tag.clone(), pool.health().await);
        }
        serde_json::Value::Object(partitions)
    }
}
