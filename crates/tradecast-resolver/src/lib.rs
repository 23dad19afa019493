//! UID resolution for market and code tokens.
//!
//! The resolver service assigns a small integer uid to every token. This
//! crate consumes it through the `UidResolver` seam: an HTTP-backed
//! client for the real service, a static in-process map for tests and
//! local runs, and a bounded pool that caps concurrent resolutions so an
//! ingestion burst cannot starve the rest of the pipeline.

pub mod client;
pub mod error;
pub mod pool;

pub use client::HttpResolver;
pub use error::{ResolveError, ResolveResult};
pub use pool::{ResolverPool, DEFAULT_POOL_CAPACITY};

use futures_util::future::BoxFuture;
use parking_lot::RwLock;
use std::collections::HashMap;

/// Asynchronous token → uid resolver.
pub trait UidResolver: Send + Sync {
    fn resolve<'a>(&'a self, token: &'a str) -> BoxFuture<'a, ResolveResult<u32>>;
}

/// In-process resolver backed by a fixed token table.
///
/// Used in tests and in local mode where the token universe is known
/// up front from configuration.
#[derive(Debug, Default)]
pub struct StaticResolver {
    uids: RwLock<HashMap<String, u32>>,
}

impl StaticResolver {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_tokens(tokens: impl IntoIterator<Item = (String, u32)>) -> Self {
        Self {
            uids: RwLock::new(tokens.into_iter().collect()),
        }
    }

    pub fn insert(&self, token: impl Into<String>, uid: u32) {
        self.uids.write().insert(token.into(), uid);
    }
}

impl UidResolver for StaticResolver {
    fn resolve<'a>(&'a self, token: &'a str) -> BoxFuture<'a, ResolveResult<u32>> {
        Box::pin(async move {
            if token.is_empty() {
                return Err(ResolveError::EmptyToken);
            }
            self.uids
                .read()
                .get(token)
                .copied()
                .ok_or_else(|| ResolveError::UnknownToken(token.to_string()))
        })
    }
}
