//! Bounded resolution pool.
//!
//! Caps the number of in-flight resolver calls so a burst of ingestion
//! requests queues at this boundary instead of starving other pipeline
//! stages.

use crate::error::{ResolveError, ResolveResult};
use crate::UidResolver;
use std::sync::Arc;
use tokio::sync::Semaphore;

/// Default number of concurrent resolutions.
pub const DEFAULT_POOL_CAPACITY: usize = 50;

/// Shared handle over a resolver with bounded concurrency.
#[derive(Clone)]
pub struct ResolverPool {
    inner: Arc<dyn UidResolver>,
    permits: Arc<Semaphore>,
}

impl ResolverPool {
    pub fn new(inner: Arc<dyn UidResolver>, capacity: usize) -> Self {
        Self {
            inner,
            permits: Arc::new(Semaphore::new(capacity.max(1))),
        }
    }

    pub fn with_default_capacity(inner: Arc<dyn UidResolver>) -> Self {
        Self::new(inner, DEFAULT_POOL_CAPACITY)
    }

    /// Resolve one token, waiting for a pool slot first.
    pub async fn resolve(&self, token: &str) -> ResolveResult<u32> {
        let _permit = self
            .permits
            .acquire()
            .await
            .map_err(|_| ResolveError::PoolClosed)?;
        self.inner.resolve(token).await
    }
}
